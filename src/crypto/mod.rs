//! Cryptographic primitives behind bcrypt.
//!
//! Provides the EksBlowfish key schedule, randomness sources and
//! constant-time comparison.

pub mod blowfish;
mod consts;
pub mod random;

pub use blowfish::{EksBlowfish, KeyWords};
pub use random::{FallbackPolicy, FallbackRandom, OsRandom, RandomQuality, RandomSource, WeakRandom};

use subtle::ConstantTimeEq;

/// Number of 32-bit words in the P-array.
pub const P_LEN: usize = 18;
/// Length of the raw salt (16 bytes / 128 bits).
pub const SALT_LEN: usize = 16;
/// Maximum number of key bytes that reach the key schedule.
pub const MAX_KEY_LEN: usize = 72;
/// Length of the raw hash kept in the output (23 of the 24 cipher bytes).
pub const HASH_LEN: usize = 23;

/// Compares two byte strings without stopping at the first difference.
///
/// Inputs of different lengths are never equal.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
