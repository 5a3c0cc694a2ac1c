//! Error types for session-keeper.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for session-keeper operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Reading or writing the session document failed.
    #[error("session store I/O failed at {}: {source}", .path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The session document could not be decoded or encoded.
    #[error("session store at {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The token service refused to issue a token.
    #[error("token acquisition failed: {0}")]
    Acquisition(String),

    /// The credential provider could not supply an identity or secret.
    #[error("credentials unavailable: {0}")]
    Credential(String),

    /// I/O error outside the session document (e.g. writing a report).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid phase transition attempted.
    #[error("invalid session phase transition from {from} to {to}")]
    InvalidTransition {
        from: crate::session::Phase,
        to: crate::session::Phase,
    },

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,
}

impl Error {
    /// True for failures of the durable store (I/O or encoding).
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, Error::Storage { .. } | Error::Corrupt { .. })
    }

    /// True when the token service rejected the exchange.
    pub fn is_acquisition_failure(&self) -> bool {
        matches!(self, Error::Acquisition(_))
    }
}

/// Convenience Result type for session-keeper operations.
pub type Result<T> = std::result::Result<T, Error>;
