use thiserror::Error;

use crate::format::Version;

#[derive(Debug, Error)]
pub enum BcryptError {
    #[error("bad number of rounds '{0}', expected a value between 4 and 30")]
    InvalidCost(String),

    #[error("malformed salt: {0}")]
    MalformedSalt(String),

    #[error("malformed hash: {0}")]
    MalformedHash(String),

    #[error("${0}$ hashes can be checked but not generated")]
    VerifyOnly(Version),

    #[error("secure random generator unavailable: {0}")]
    RandomUnavailable(String),
}

pub type Result<T, E = BcryptError> = std::result::Result<T, E>;
