//! Textual bcrypt format.
//!
//! ```text
//! $<version>$<cost>$<salt: 22 chars><hash: 31 chars>
//! ```
//!
//! Salts are the first 29 characters (28 for `$2$`), hashes are 60 (59).

use std::fmt;
use std::str::FromStr;

use crate::crypto::{HASH_LEN, SALT_LEN};
use crate::error::{BcryptError, Result};

pub mod radix64;

/// Characters used by the encoded salt.
pub const ENCODED_SALT_LEN: usize = radix64::encoded_len(SALT_LEN);
/// Characters used by the encoded hash.
pub const ENCODED_HASH_LEN: usize = radix64::encoded_len(HASH_LEN);

/// bcrypt version tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Version {
    /// `$2$`, the original format without a trailing zero byte on the key.
    Two,
    #[default]
    TwoA,
    TwoB,
    /// `$2x$`, hashes made with the sign-extension bug. Checked, never produced.
    TwoX,
    TwoY,
}

impl Version {
    pub fn tag(self) -> &'static str {
        match self {
            Version::Two => "2",
            Version::TwoA => "2a",
            Version::TwoB => "2b",
            Version::TwoX => "2x",
            Version::TwoY => "2y",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "2" => Some(Version::Two),
            "2a" => Some(Version::TwoA),
            "2b" => Some(Version::TwoB),
            "2x" => Some(Version::TwoX),
            "2y" => Some(Version::TwoY),
            _ => None,
        }
    }

    /// Whether salts and hashes of this version may be generated.
    pub fn is_producible(self) -> bool {
        self != Version::TwoX
    }

    /// Whether a zero byte is appended to the password before keying.
    pub fn appends_terminator(self) -> bool {
        self != Version::Two
    }

    /// Whether key bytes are sign-extended into key words.
    pub fn sign_extends(self) -> bool {
        self == Version::TwoX
    }

    /// Length of `$<version>$<cost>$`.
    fn prefix_len(self) -> usize {
        self.tag().len() + 5
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Base-2 logarithm of the number of key schedule rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cost(u32);

impl Cost {
    pub const MIN: Cost = Cost(4);
    /// 31 overflowed a signed round counter in older implementations.
    pub const MAX: Cost = Cost(30);
    pub const DEFAULT: Cost = Cost(10);

    pub fn new(log_rounds: u32) -> Result<Self> {
        if (Self::MIN.0..=Self::MAX.0).contains(&log_rounds) {
            Ok(Self(log_rounds))
        } else {
            Err(BcryptError::InvalidCost(log_rounds.to_string()))
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Number of key schedule rounds, `2^cost`.
    pub fn rounds(self) -> u64 {
        1u64 << self.0
    }
}

impl Default for Cost {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u32> for Cost {
    type Error = BcryptError;

    fn try_from(log_rounds: u32) -> Result<Self> {
        Self::new(log_rounds)
    }
}

impl FromStr for Cost {
    type Err = BcryptError;

    fn from_str(s: &str) -> Result<Self> {
        let log_rounds = s
            .trim()
            .parse::<u32>()
            .map_err(|_| BcryptError::InvalidCost(s.to_string()))?;
        Self::new(log_rounds)
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Version, cost and 16 random bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Salt {
    version: Version,
    cost: Cost,
    bytes: [u8; SALT_LEN],
}

impl Salt {
    pub fn new(version: Version, cost: Cost, bytes: [u8; SALT_LEN]) -> Self {
        Self {
            version,
            cost,
            bytes,
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn cost(&self) -> Cost {
        self.cost
    }

    pub fn as_bytes(&self) -> &[u8; SALT_LEN] {
        &self.bytes
    }

    /// Length of the textual form.
    pub fn encoded_len(&self) -> usize {
        self.version.prefix_len() + ENCODED_SALT_LEN
    }
}

impl fmt::Display for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "${}${:02}${}",
            self.version,
            self.cost.get(),
            radix64::encode(&self.bytes)
        )
    }
}

impl FromStr for Salt {
    type Err = BcryptError;

    fn from_str(s: &str) -> Result<Self> {
        let (version, cost, rest) = parse_prefix(s, BcryptError::MalformedSalt)?;
        let bytes = radix64::decode(rest)
            .map_err(|e| BcryptError::MalformedSalt(format!("salt: {e}")))?;
        Ok(Salt::new(version, cost, bytes))
    }
}

/// A complete bcrypt hash: its salt followed by 23 bytes of cipher output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BcryptHash {
    salt: Salt,
    digest: [u8; HASH_LEN],
}

impl BcryptHash {
    pub fn new(salt: Salt, digest: [u8; HASH_LEN]) -> Self {
        Self { salt, digest }
    }

    pub fn salt(&self) -> &Salt {
        &self.salt
    }

    pub fn digest(&self) -> &[u8; HASH_LEN] {
        &self.digest
    }
}

impl fmt::Display for BcryptHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.salt, radix64::encode(&self.digest))
    }
}

impl FromStr for BcryptHash {
    type Err = BcryptError;

    fn from_str(s: &str) -> Result<Self> {
        let (version, cost, rest) = parse_prefix(s, BcryptError::MalformedHash)?;
        let expected = ENCODED_SALT_LEN + ENCODED_HASH_LEN;
        if rest.len() != expected {
            return Err(BcryptError::MalformedHash(format!(
                "expected {expected} characters after the cost, found {}",
                rest.len()
            )));
        }

        let (salt, digest) = rest.split_at(ENCODED_SALT_LEN);
        let salt = radix64::decode(salt)
            .map_err(|e| BcryptError::MalformedHash(format!("salt: {e}")))?;
        let digest = radix64::decode(digest)
            .map_err(|e| BcryptError::MalformedHash(format!("digest: {e}")))?;

        Ok(BcryptHash::new(Salt::new(version, cost, salt), digest))
    }
}

/// Splits `$<version>$<cost>$` off `s`.
///
/// Structural problems are reported through `malformed`; a well-formed but
/// out-of-range cost is [`BcryptError::InvalidCost`].
fn parse_prefix(
    s: &str,
    malformed: fn(String) -> BcryptError,
) -> Result<(Version, Cost, &str)> {
    if !s.is_ascii() {
        return Err(malformed("contains non-ASCII characters".into()));
    }

    let body = s
        .strip_prefix('$')
        .ok_or_else(|| malformed("missing leading '$'".into()))?;
    let (tag, body) = body
        .split_once('$')
        .ok_or_else(|| malformed("missing version".into()))?;
    let version = Version::from_tag(tag)
        .ok_or_else(|| malformed(format!("unsupported version '{tag}'")))?;

    let digits = body.get(..2).unwrap_or(body);
    if digits.len() != 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(format!("bad cost field '{digits}'")));
    }
    let rest = body[2..]
        .strip_prefix('$')
        .ok_or_else(|| malformed("missing '$' after cost".into()))?;

    let cost = digits.parse::<Cost>()?;
    Ok((version, cost, rest))
}
