use std::fmt;

use crate::txn::conflict::Conflict;

/// Unified error type for the conflict engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A write was refused. The transaction must abort, and may retry
    /// with a fresh snapshot.
    Conflict(Conflict),
    /// Engine options failed validation.
    InvalidOptions(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Conflict(c) => write!(f, "Write conflict: {c}"),
            Error::InvalidOptions(msg) => write!(f, "Invalid options: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<Conflict> for Error {
    fn from(c: Conflict) -> Self {
        Error::Conflict(c)
    }
}

impl Error {
    /// Whether retrying the whole transaction with a new snapshot can succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Conflict(c) => c.is_retryable(),
            Error::InvalidOptions(_) => false,
        }
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
