//! bcrypt password hashing and verification.
//!
//! ```no_run
//! use bcrypt_tool::{Cost, FallbackPolicy, FallbackRandom, check_password, gen_salt, hash_password};
//!
//! let mut rng = FallbackRandom::system(FallbackPolicy::Deny);
//! let salt = gen_salt(Cost::DEFAULT, &mut rng)?;
//! let hash = hash_password("hunter2", &salt.to_string())?;
//! assert!(check_password("hunter2", &hash)?);
//! # Ok::<(), bcrypt_tool::BcryptError>(())
//! ```

pub mod crypto;
mod error;
pub mod format;

pub use crate::crypto::{
    FallbackPolicy, FallbackRandom, OsRandom, RandomQuality, RandomSource, WeakRandom,
};
pub use crate::error::{BcryptError, Result};
pub use crate::format::{BcryptHash, Cost, Salt, Version};

use crate::crypto::{EksBlowfish, HASH_LEN, KeyWords, MAX_KEY_LEN, SALT_LEN};
use tracing::debug;
use zeroize::Zeroizing;

/// Block encrypted 64 times with the derived key state.
const MAGIC: &[u8; 24] = b"OrpheanBeholderScryDoubt";
const ECB_ROUNDS: usize = 64;

/// Generates a `$2a$` salt with the given cost.
pub fn gen_salt<R: RandomSource + ?Sized>(cost: Cost, rng: &mut R) -> Result<Salt> {
    gen_salt_with_version(Version::TwoA, cost, rng)
}

/// Generates a salt for `version`, which must be one that may be produced.
pub fn gen_salt_with_version<R: RandomSource + ?Sized>(
    version: Version,
    cost: Cost,
    rng: &mut R,
) -> Result<Salt> {
    if !version.is_producible() {
        return Err(BcryptError::VerifyOnly(version));
    }

    let mut bytes = [0u8; SALT_LEN];
    rng.fill_random_bytes(&mut bytes)?;
    Ok(Salt::new(version, cost, bytes))
}

/// Hashes `password` with a textual salt.
///
/// A complete hash is accepted in place of the salt; only its salt part is used.
pub fn hash_password(password: impl AsRef<[u8]>, salt: &str) -> Result<String> {
    let salt = parse_salt(salt)?;
    Ok(hash_with_salt(password.as_ref(), &salt)?.to_string())
}

/// Checks `password` against a stored hash.
///
/// A wrong password is `Ok(false)`. A hash that does not parse is
/// [`BcryptError::MalformedHash`], except that a well-formed two-digit cost
/// outside 4..=30 is reported as [`BcryptError::InvalidCost`].
pub fn check_password(password: impl AsRef<[u8]>, hash: &str) -> Result<bool> {
    let stored: BcryptHash = hash.parse()?;
    let computed = compute(password.as_ref(), stored.salt()).to_string();
    Ok(crypto::constant_time_eq(computed.as_bytes(), hash.as_bytes()))
}

/// Runs bcrypt on raw password bytes.
///
/// At most 72 bytes of key material are used, including the implicit zero
/// byte that every version except `$2$` appends. Salts of a verify-only
/// version are refused with [`BcryptError::VerifyOnly`].
pub fn hash_with_salt(password: &[u8], salt: &Salt) -> Result<BcryptHash> {
    if !salt.version().is_producible() {
        return Err(BcryptError::VerifyOnly(salt.version()));
    }
    Ok(compute(password, salt))
}

fn compute(password: &[u8], salt: &Salt) -> BcryptHash {
    debug!(
        version = %salt.version(),
        cost = salt.cost().get(),
        "computing bcrypt hash"
    );

    let key = key_material(password, salt.version());
    let words = if salt.version().sign_extends() {
        KeyWords::sign_extended(&key)
    } else {
        KeyWords::new(&key)
    };

    let state = EksBlowfish::setup_key(&words, salt.as_bytes(), salt.cost());
    BcryptHash::new(salt.clone(), encrypt_magic(&state))
}

fn parse_salt(salt: &str) -> Result<Salt> {
    match salt.parse::<Salt>() {
        Ok(salt) => Ok(salt),
        Err(err @ BcryptError::MalformedSalt(_)) => salt
            .parse::<BcryptHash>()
            .map(|hash| hash.salt().clone())
            .map_err(|_| err),
        Err(err) => Err(err),
    }
}

fn key_material(password: &[u8], version: Version) -> Zeroizing<Vec<u8>> {
    let mut key = Zeroizing::new(Vec::with_capacity(MAX_KEY_LEN));
    key.extend_from_slice(&password[..password.len().min(MAX_KEY_LEN)]);
    if version.appends_terminator() && key.len() < MAX_KEY_LEN {
        key.push(0);
    }
    key
}

fn encrypt_magic(state: &EksBlowfish) -> [u8; HASH_LEN] {
    let mut words = [0u32; 6];
    for (word, chunk) in words.iter_mut().zip(MAGIC.chunks_exact(4)) {
        *word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }

    for _ in 0..ECB_ROUNDS {
        for block in words.chunks_exact_mut(2) {
            (block[0], block[1]) = state.encrypt(block[0], block[1]);
        }
    }

    let mut out = [0u8; MAGIC.len()];
    for (chunk, word) in out.chunks_exact_mut(4).zip(words) {
        chunk.copy_from_slice(&word.to_be_bytes());
    }

    let mut digest = [0u8; HASH_LEN];
    digest.copy_from_slice(&out[..HASH_LEN]);
    digest
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic source for reproducible salts.
    struct Counter(u8);

    impl RandomSource for Counter {
        fn fill_random_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
            for b in buf.iter_mut() {
                *b = self.0;
                self.0 = self.0.wrapping_add(1);
            }
            Ok(())
        }
    }

    fn cost(c: u32) -> Cost {
        Cost::new(c).unwrap()
    }

    #[test]
    fn known_answer_vectors() {
        let vectors: &[(&[u8], &str)] = &[
            (
                b"",
                "$2a$06$DCq7YPn5Rq63x1Lad4cll.TV4S6ytwfsfvkgY8jIucDrjc8deX1s.",
            ),
            (
                b"a",
                "$2a$06$m0CrhHm10qJ3lXRY.5zDGO3rS2KdeeWLuGmsfGlMfOxih58VYVfxe",
            ),
            (
                b"abc",
                "$2a$06$If6bvum7DFjUnE9p2uDeDu0YHzrHM6tf.iqN8.yx.jNN1ILEf7h0i",
            ),
            (
                b"abcdefghijklmnopqrstuvwxyz",
                "$2a$06$.rCVZVOThsIa97pEDOxvGuRRgzG64bvtJ0938xuqzv18d3ZpQhstC",
            ),
            (
                b"~!@#$%^&*()      ~!@#$%^&*()PNBFRD",
                "$2a$06$fPIsBO8qRqkjj273rfaOI.HtSV9jLDpTbZn782DC6/t7qT67P6FfO",
            ),
            (
                b"password",
                "$2a$04$UuTkLRZZ6QofpDOlMz32MuuxEHA43WOemOYHPz6.SjsVsyO1tDU96",
            ),
            (
                b"correctbatteryhorsestapler",
                "$2b$04$EGdrhbKUv8Oc9vGiXX0HQOxSg445d458Muh7DAHskb6QbtCvdxcie",
            ),
            (
                b"My S3cre7 P@55w0rd!",
                "$2y$05$HlFShUxTu4ZHHfOLJwfmCeDj/kuKFKboanXtDJXxCC7aIPTUgxNDe",
            ),
        ];

        for (password, expected) in vectors {
            let salt = &expected[..29];
            assert_eq!(&hash_password(password, salt).unwrap(), expected);
            assert!(check_password(password, expected).unwrap());
        }
    }

    #[test]
    fn binary_password_vector() {
        let password = [
            29, 225, 195, 167, 223, 236, 85, 195, 114, 227, 7, 0, 209, 239, 189, 24, 51, 105, 124,
            168, 151, 75, 144, 64, 198, 197, 196, 4, 241, 97, 110, 135,
        ];
        let hash = "$2a$04$tjARW6ZON3PhrAIRW2LG/u9aDw5eFdstYLR8nFCNaOQmsH9XD23w.";
        assert!(check_password(password, hash).unwrap());
        assert!(!check_password(&password[..11], hash).unwrap());
    }

    #[test]
    fn long_passwords_are_truncated() {
        let hash = "$2a$05$......................YgIDy4hFBdVlc/6LHnD9mX488r9cLd2";
        assert!(check_password("x".repeat(100), hash).unwrap());
        assert!(check_password("x".repeat(72), hash).unwrap());
        assert!(!check_password("x".repeat(71), hash).unwrap());

        let salt = "$2b$04$......................";
        let a = [b"y".repeat(72), b"tail one".to_vec()].concat();
        let b = [b"y".repeat(72), b"another tail".to_vec()].concat();
        assert_eq!(hash_password(&a, salt).unwrap(), hash_password(&b, salt).unwrap());
    }

    #[test]
    fn sign_extension_variant() {
        let buggy = "$2x$05$/OK.fbVrR/bpIqNJ5ianF.CE5elHaaO4EbggVDjb8P19RukzXSM3e";
        assert!(check_password(b"\xa3", buggy).unwrap());
        assert!(check_password(b"\xff\xff\xa3", buggy).unwrap());

        let fixed = "$2y$05$/OK.fbVrR/bpIqNJ5ianF.Sa7shbm4.OzKpvFnX1pQLmQW96oUlCq";
        assert!(check_password(b"\xa3", fixed).unwrap());
        assert!(!check_password(b"\xff\xff\xa3", fixed).unwrap());

        let fixed = "$2b$05$/OK.fbVrR/bpIqNJ5ianF.CE5elHaaO4EbggVDjb8P19RukzXSM3e";
        assert!(check_password(b"\xff\xff\xa3", fixed).unwrap());
    }

    #[test]
    fn sign_extension_variant_is_never_produced() {
        assert!(matches!(
            hash_password("pw", "$2x$04$......................"),
            Err(BcryptError::VerifyOnly(Version::TwoX))
        ));
        assert!(matches!(
            gen_salt_with_version(Version::TwoX, Cost::MIN, &mut Counter(0)),
            Err(BcryptError::VerifyOnly(Version::TwoX))
        ));

        let salt = Salt::new(Version::TwoX, Cost::MIN, [0; SALT_LEN]);
        assert!(matches!(
            hash_with_salt(b"pw", &salt),
            Err(BcryptError::VerifyOnly(Version::TwoX))
        ));

        let salt = Salt::new(Version::TwoB, Cost::MIN, [0; SALT_LEN]);
        let hash = hash_with_salt(b"pw", &salt).unwrap().to_string();
        assert!(hash.starts_with("$2b$04$......................"));
        assert!(check_password("pw", &hash).unwrap());
    }

    #[test]
    fn legacy_version_has_no_terminator() {
        let legacy = hash_password("abc", "$2$04$......................").unwrap();
        assert_eq!(legacy.len(), 59);
        assert!(legacy.starts_with("$2$04$"));
        assert!(check_password("abc", &legacy).unwrap());

        // Same key material once the zero byte is spelled out.
        let modern = hash_password("abc", "$2a$04$......................").unwrap();
        let spelled = hash_password("abc\0", "$2$04$......................").unwrap();
        assert_eq!(modern[7..], spelled[6..]);

        let empty = hash_password("", "$2$04$......................").unwrap();
        assert!(check_password("", &empty).unwrap());
    }

    #[test]
    fn gen_salt_format() {
        let salt = gen_salt(cost(10), &mut Counter(0)).unwrap().to_string();
        assert_eq!(salt.len(), 29);
        assert!(salt.starts_with("$2a$10$"));
        assert!(salt.parse::<Salt>().is_ok());

        let salt = gen_salt_with_version(Version::TwoY, Cost::MAX, &mut Counter(7)).unwrap();
        assert_eq!(salt.to_string()[..7], *"$2y$30$");
    }

    #[test]
    fn gen_salt_uses_the_source() {
        let mut rng = Counter(0);
        let first = gen_salt(Cost::MIN, &mut rng).unwrap();
        let second = gen_salt(Cost::MIN, &mut rng).unwrap();
        assert_eq!(first.as_bytes()[0], 0);
        assert_eq!(second.as_bytes()[0], 16);
        assert_ne!(first, second);
    }

    #[test]
    fn roundtrip_with_system_random() {
        let mut rng = FallbackRandom::system(FallbackPolicy::Deny);
        for password in ["", "a", "hunter2", "pässwörd", "with space"] {
            let salt = gen_salt(Cost::MIN, &mut rng).unwrap();
            let hash = hash_password(password, &salt.to_string()).unwrap();
            assert_eq!(hash.len(), 60);
            assert!(hash.starts_with(&salt.to_string()));
            assert!(check_password(password, &hash).unwrap());
        }
    }

    #[test]
    fn wrong_passwords_are_rejected() {
        let salt = gen_salt(Cost::MIN, &mut Counter(42)).unwrap().to_string();
        let passwords = ["", "a", "b", "ab", "ba", "a\0", "\0a", "hunter2", "hunter3"];
        let hashes: Vec<String> = passwords
            .iter()
            .map(|p| hash_password(p, &salt).unwrap())
            .collect();

        for (i, p) in passwords.iter().enumerate() {
            for (j, h) in hashes.iter().enumerate() {
                assert_eq!(check_password(p, h).unwrap(), i == j, "{p:?} vs {h}");
            }
        }
    }

    #[test]
    fn hashing_is_deterministic() {
        let salt = "$2b$05$If6bvum7DFjUnE9p2uDeDu";
        assert_eq!(
            hash_password("same", salt).unwrap(),
            hash_password("same", salt).unwrap()
        );
    }

    #[test]
    fn full_hash_is_accepted_as_salt() {
        let hash = "$2a$06$m0CrhHm10qJ3lXRY.5zDGO3rS2KdeeWLuGmsfGlMfOxih58VYVfxe";
        assert_eq!(hash_password("a", hash).unwrap(), hash);
        assert_ne!(hash_password("b", hash).unwrap(), hash);
    }

    #[test]
    fn malformed_input_is_an_error() {
        assert!(matches!(
            check_password("x", "not-a-hash"),
            Err(BcryptError::MalformedHash(_))
        ));
        assert!(matches!(
            hash_password("x", "not-a-salt"),
            Err(BcryptError::MalformedSalt(_))
        ));
        assert!(matches!(
            hash_password("x", "$2a$31$......................"),
            Err(BcryptError::InvalidCost(_))
        ));
    }

    #[test]
    fn stored_hash_with_out_of_range_cost() {
        let rest = "If6bvum7DFjUnE9p2uDeDu0YHzrHM6tf.iqN8.yx.jNN1ILEf7h0i";
        for cost in [31, 3, 99] {
            let hash = format!("$2b${cost:02}${rest}");
            assert!(
                matches!(check_password("x", &hash), Err(BcryptError::InvalidCost(c)) if c == cost.to_string()),
                "{hash}"
            );
        }
        assert!(matches!(
            check_password("x", &format!("$2b$3${rest}")),
            Err(BcryptError::MalformedHash(_))
        ));
    }

    #[test]
    fn cost_boundaries() {
        assert!(matches!(Cost::new(3), Err(BcryptError::InvalidCost(_))));
        assert!(gen_salt(cost(4), &mut Counter(0)).is_ok());
        assert!(gen_salt(cost(30), &mut Counter(0)).is_ok());
        assert!(matches!(Cost::new(31), Err(BcryptError::InvalidCost(_))));
    }

    #[test]
    fn concurrent_hashing_is_independent() {
        let salt = "$2a$04$......................";
        let expected: Vec<String> = (0..4)
            .map(|i| hash_password(format!("pw{i}"), salt).unwrap())
            .collect();

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|i| scope.spawn(move || hash_password(format!("pw{i}"), salt).unwrap()))
                .collect();
            for (handle, expected) in handles.into_iter().zip(&expected) {
                assert_eq!(&handle.join().unwrap(), expected);
            }
        });
    }
}
