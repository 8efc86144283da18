//! The base64 variant used by bcrypt.
//!
//! Same bit layout as standard base64, but with the alphabet
//! `./A-Za-z0-9`, no padding, and unused trailing bits required to be zero.

use thiserror::Error;

const ENCODE: &[u8; 64] = b"./ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

const INVALID: u8 = 0xff;

const DECODE: [u8; 128] = {
    let mut table = [INVALID; 128];
    let mut i = 0;
    while i < ENCODE.len() {
        table[ENCODE[i] as usize] = i as u8;
        i += 1;
    }
    table
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("expected {expected} characters, found {found}")]
    Length { expected: usize, found: usize },

    #[error("invalid character {0:?}")]
    Character(char),

    #[error("non-zero trailing bits")]
    TrailingBits,
}

/// Number of characters needed to encode `len` bytes.
pub const fn encoded_len(len: usize) -> usize {
    (len * 8).div_ceil(6)
}

pub fn encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(encoded_len(bytes.len()));
    let mut push = |sextet: u8| out.push(ENCODE[(sextet & 0x3f) as usize] as char);

    for chunk in bytes.chunks(3) {
        let b0 = chunk[0];
        push(b0 >> 2);
        match (chunk.get(1), chunk.get(2)) {
            (None, _) => push(b0 << 4),
            (Some(&b1), None) => {
                push((b0 << 4) | (b1 >> 4));
                push(b1 << 2);
            }
            (Some(&b1), Some(&b2)) => {
                push((b0 << 4) | (b1 >> 4));
                push((b1 << 2) | (b2 >> 6));
                push(b2);
            }
        }
    }

    out
}

/// Decodes exactly `N` bytes from `s`.
pub fn decode<const N: usize>(s: &str) -> Result<[u8; N], DecodeError> {
    let expected = encoded_len(N);
    if s.len() != expected {
        return Err(DecodeError::Length {
            expected,
            found: s.chars().count(),
        });
    }

    let mut out = [0u8; N];
    let mut acc: u32 = 0;
    let mut bits = 0u32;
    let mut pos = 0;

    for c in s.chars() {
        let value = DECODE
            .get(c as usize)
            .copied()
            .filter(|&v| v != INVALID)
            .ok_or(DecodeError::Character(c))?;

        acc = (acc << 6) | u32::from(value);
        bits += 6;
        if bits >= 8 {
            bits -= 8;
            out[pos] = (acc >> bits) as u8;
            pos += 1;
            acc &= (1 << bits) - 1;
        }
    }

    if acc != 0 {
        return Err(DecodeError::TrailingBits);
    }

    Ok(out)
}
