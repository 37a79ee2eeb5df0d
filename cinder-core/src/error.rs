//! Error types for Cinder.
//!
//! Validation rejections are ordinary `Err` values: the offending payload is
//! dropped and neither chain nor state is altered. Only load-time tampering
//! is treated as fatal by callers.

use std::io;
use thiserror::Error;

/// Result type for Cinder operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Cinder.
#[derive(Debug, Error)]
pub enum Error {
    /// Transaction validation failed.
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Block validation failed.
    #[error("invalid block: {0}")]
    InvalidBlock(String),

    /// Signature verification failed.
    #[error("signature verification failed")]
    InvalidSignature,

    /// Invalid public or secret key material.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A persisted block failed re-validation during load.
    #[error("chain tampering detected at height {height}: {message}")]
    Tampering { height: u64, message: String },

    /// Storage operation failed.
    #[error("storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<io::Error>,
    },

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Peer synchronization failed.
    #[error("sync error: {0}")]
    Sync(String),
}

impl Error {
    /// Create an InvalidTransaction error.
    pub fn invalid_tx(message: impl Into<String>) -> Self {
        Error::InvalidTransaction(message.into())
    }

    /// Create an InvalidBlock error.
    pub fn invalid_block(message: impl Into<String>) -> Self {
        Error::InvalidBlock(message.into())
    }

    /// Create an InvalidKey error.
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Error::InvalidKey(message.into())
    }

    /// Create a Tampering error for a block that failed replay.
    pub fn tampering(height: u64, message: impl Into<String>) -> Self {
        Error::Tampering {
            height,
            message: message.into(),
        }
    }

    /// Create a Storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Error::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Create a Sync error.
    pub fn sync(message: impl Into<String>) -> Self {
        Error::Sync(message.into())
    }

    /// Check whether this error is a validation rejection (as opposed to an
    /// infrastructure failure).
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::InvalidTransaction(_) | Error::InvalidBlock(_) | Error::InvalidSignature
        )
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Storage {
            message: e.to_string(),
            source: Some(e),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error::InvalidKey(e.to_string())
    }
}

impl From<secp256k1::Error> for Error {
    fn from(_: secp256k1::Error) -> Self {
        Error::InvalidSignature
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_classification() {
        assert!(Error::invalid_tx("bad nonce").is_rejection());
        assert!(Error::invalid_block("bad hash").is_rejection());
        assert!(Error::InvalidSignature.is_rejection());
        assert!(!Error::storage("disk full").is_rejection());
        assert!(!Error::sync("timeout").is_rejection());
    }

    #[test]
    fn test_display() {
        let e = Error::tampering(42, "prev_hash mismatch");
        let s = e.to_string();
        assert!(s.contains("42"));
        assert!(s.contains("prev_hash mismatch"));
    }

    #[test]
    fn test_from_io() {
        let io = io::Error::new(io::ErrorKind::NotFound, "gone");
        let e: Error = io.into();
        assert!(matches!(e, Error::Storage { .. }));
    }
}
