use std::time::{SystemTime, UNIX_EPOCH};

use getrandom::fill;
use rand::{RngCore, SeedableRng, rngs::StdRng};
use tracing::warn;

use crate::error::{BcryptError, Result};

/// How trustworthy the bytes produced by a [`RandomSource`] are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RandomQuality {
    /// Bytes come from a cryptographically secure generator.
    Strong,
    /// The secure generator was unavailable and a weaker one was used instead.
    WeakRandomFallback,
}

/// Anything that can fill a buffer with random bytes.
pub trait RandomSource {
    fn fill_random_bytes(&mut self, buf: &mut [u8]) -> Result<()>;

    fn quality(&self) -> RandomQuality {
        RandomQuality::Strong
    }
}

/// The operating system's secure random generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill_random_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        fill(buf).map_err(|e| BcryptError::RandomUnavailable(e.to_string()))
    }
}

/// Non-cryptographic generator seeded from the clock and process id.
///
/// Only ever used when [`OsRandom`] fails and fallback is allowed.
pub struct WeakRandom(StdRng);

impl WeakRandom {
    pub fn new() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        let pid = u64::from(std::process::id());
        Self(StdRng::seed_from_u64(nanos ^ pid.rotate_left(32)))
    }
}

impl Default for WeakRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for WeakRandom {
    fn fill_random_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        self.0.fill_bytes(buf);
        Ok(())
    }

    fn quality(&self) -> RandomQuality {
        RandomQuality::WeakRandomFallback
    }
}

/// Whether a failing secure source may be replaced by [`WeakRandom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    #[default]
    Allow,
    Deny,
}

/// Uses `primary` until it fails, then either errors or switches to
/// [`WeakRandom`] for good, depending on the policy.
pub struct FallbackRandom<P = OsRandom> {
    primary: P,
    policy: FallbackPolicy,
    fallback: Option<WeakRandom>,
}

impl FallbackRandom<OsRandom> {
    /// The OS generator with the given fallback policy.
    pub fn system(policy: FallbackPolicy) -> Self {
        Self::new(OsRandom, policy)
    }
}

impl<P: RandomSource> FallbackRandom<P> {
    pub fn new(primary: P, policy: FallbackPolicy) -> Self {
        Self {
            primary,
            policy,
            fallback: None,
        }
    }
}

impl<P: RandomSource> RandomSource for FallbackRandom<P> {
    fn fill_random_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.fallback.is_none() {
            match self.primary.fill_random_bytes(buf) {
                Ok(()) => return Ok(()),
                Err(err) if self.policy == FallbackPolicy::Deny => return Err(err),
                Err(err) => {
                    warn!(
                        error = %err,
                        "no strong secure random source available, falling back to a weaker generator"
                    );
                }
            }
        }

        self.fallback
            .get_or_insert_with(WeakRandom::new)
            .fill_random_bytes(buf)
    }

    fn quality(&self) -> RandomQuality {
        match self.fallback {
            Some(_) => RandomQuality::WeakRandomFallback,
            None => self.primary.quality(),
        }
    }
}
