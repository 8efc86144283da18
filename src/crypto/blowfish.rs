//! EksBlowfish: Blowfish with the expensive, salted key schedule used by bcrypt.
//!
//! Only the pieces bcrypt needs are here. There is no decryption and the state
//! is never meant to be used as a general-purpose cipher.

use zeroize::{Zeroize, Zeroizing};

use super::consts::{P_INIT, S_INIT};
use super::{P_LEN, SALT_LEN};
use crate::format::Cost;

const SBOX_LEN: usize = 256;

/// Key material spread cyclically over the 18 words of the P-array.
#[derive(Clone)]
pub struct KeyWords([u32; P_LEN]);

impl KeyWords {
    /// Builds key words from `key`, repeating it until all 18 words are filled.
    ///
    /// An empty key expands as a single zero byte.
    pub fn new(key: &[u8]) -> Self {
        Self::stream(key, false)
    }

    /// Same as [`KeyWords::new`], but bytes are sign-extended before being
    /// shifted in. This reproduces the historical `$2x$` behaviour for bytes
    /// with the high bit set.
    pub fn sign_extended(key: &[u8]) -> Self {
        Self::stream(key, true)
    }

    fn stream(key: &[u8], sign_extend: bool) -> Self {
        let key: &[u8] = if key.is_empty() { &[0] } else { key };
        let mut words = [0u32; P_LEN];
        let mut bytes = key.iter().cycle();

        for word in words.iter_mut() {
            for _ in 0..4 {
                let byte = bytes.next().copied().unwrap_or(0);
                let extended = if sign_extend {
                    byte as i8 as i32 as u32
                } else {
                    u32::from(byte)
                };
                *word = (*word << 8) | extended;
            }
        }

        Self(words)
    }
}

impl Drop for KeyWords {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Blowfish subkeys (P-array and S-boxes).
pub struct EksBlowfish {
    p: [u32; P_LEN],
    s: [[u32; SBOX_LEN]; 4],
}

impl Default for EksBlowfish {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EksBlowfish {
    fn drop(&mut self) {
        self.p.zeroize();
        for sbox in self.s.iter_mut() {
            sbox.zeroize();
        }
    }
}

impl EksBlowfish {
    /// State initialised with the standard Blowfish constants.
    pub fn new() -> Self {
        Self {
            p: P_INIT,
            s: S_INIT,
        }
    }

    /// Runs the full expensive key schedule.
    ///
    /// The salted expansion happens once, then `2^cost` rounds alternate
    /// between expanding the key and expanding the salt, in that order.
    pub fn setup_key(key: &KeyWords, salt: &[u8; SALT_LEN], cost: Cost) -> Self {
        let salt_key = KeyWords::new(salt);
        let mut state = Self::new();

        state.expand_key_with_salt(key, salt);
        for _ in 0..cost.rounds() {
            state.expand_key(key);
            state.expand_key(&salt_key);
        }

        state
    }

    /// Plain Blowfish key expansion.
    pub fn expand_key(&mut self, key: &KeyWords) {
        self.mix_key(key);
        self.regenerate(|| (0, 0));
    }

    /// Key expansion where every block is first XORed with the next 64 bits
    /// of the salt, cycling through all 128 bits.
    pub fn expand_key_with_salt(&mut self, key: &KeyWords, salt: &[u8; SALT_LEN]) {
        let salt_words = Zeroizing::new(salt_words(salt));
        let mut next = 0;

        self.mix_key(key);
        self.regenerate(|| {
            let pair = (salt_words[next % 4], salt_words[(next + 1) % 4]);
            next += 2;
            pair
        });
    }

    /// Encrypts one 64-bit block given as its big-endian halves.
    pub fn encrypt(&self, mut l: u32, mut r: u32) -> (u32, u32) {
        l ^= self.p[0];
        for i in (1..P_LEN - 2).step_by(2) {
            r ^= self.f(l) ^ self.p[i];
            l ^= self.f(r) ^ self.p[i + 1];
        }
        (r ^ self.p[P_LEN - 1], l)
    }

    fn f(&self, x: u32) -> u32 {
        let [a, b, c, d] = x.to_be_bytes();
        (self.s[0][a as usize].wrapping_add(self.s[1][b as usize]) ^ self.s[2][c as usize])
            .wrapping_add(self.s[3][d as usize])
    }

    fn mix_key(&mut self, key: &KeyWords) {
        for (p, k) in self.p.iter_mut().zip(key.0.iter()) {
            *p ^= k;
        }
    }

    /// Replaces every subkey by chained encryptions of the running block.
    /// `salt` yields the value XORed into the block before each encryption.
    fn regenerate(&mut self, mut salt: impl FnMut() -> (u32, u32)) {
        let (mut l, mut r) = (0u32, 0u32);

        for i in (0..P_LEN).step_by(2) {
            let (sl, sr) = salt();
            (l, r) = self.encrypt(l ^ sl, r ^ sr);
            self.p[i] = l;
            self.p[i + 1] = r;
        }

        for sbox in 0..self.s.len() {
            for i in (0..SBOX_LEN).step_by(2) {
                let (sl, sr) = salt();
                (l, r) = self.encrypt(l ^ sl, r ^ sr);
                self.s[sbox][i] = l;
                self.s[sbox][i + 1] = r;
            }
        }
    }
}

fn salt_words(salt: &[u8; SALT_LEN]) -> [u32; 4] {
    let mut words = [0u32; 4];
    for (word, chunk) in words.iter_mut().zip(salt.chunks_exact(4)) {
        *word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    words
}
