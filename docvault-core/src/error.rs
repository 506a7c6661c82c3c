// docvault-core/src/error.rs
// Error taxonomy shared by every store operation

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the lock manager, transactions and record store.
///
/// Corrupt file content under the lenient decode policy is NOT an error:
/// it is logged and replaced by an empty collection.
#[derive(Error, Debug)]
pub enum VaultError {
    /// The file lock was not obtained before the deadline. Retryable.
    #[error("Timed out after {waited:?} waiting for lock on {}", path.display())]
    LockTimeout { path: PathBuf, waited: Duration },

    #[error("Record with id '{0}' already exists")]
    DuplicateId(String),

    #[error("Record with id '{0}' not found")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Only produced under `DecodePolicy::Strict`.
    #[error("Unreadable content in {}: {reason}", path.display())]
    Corruption { path: PathBuf, reason: String },

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Invalid collection name: {0}")]
    InvalidName(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A caller-supplied mutator refused the change. Nothing was written.
    #[error("Rejected: {0}")]
    Rejected(String),
}

impl VaultError {
    /// Lock timeouts are transient; everything else needs caller action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, VaultError::LockTimeout { .. })
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        VaultError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, VaultError>;
