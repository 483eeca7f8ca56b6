//! Domain error types
//!
//! [`DomainError`] covers validation failures and invalid state transitions.
//! [`ManifestError`] covers loading and saving the persisted manifest.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid content hash format (expected hex digest)
    #[error("Invalid hash format: {0}")]
    InvalidHash(String),

    /// Invalid object key
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    /// Invalid key prefix
    #[error("Invalid key prefix: {0}")]
    InvalidPrefix(String),

    /// Path is not within the sync root
    #[error("Path not within sync root: {0}")]
    PathNotInSyncRoot(String),

    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },
}

/// Errors raised while loading or saving the manifest document
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest exists but cannot be parsed.
    ///
    /// History is never discarded silently; the operator decides what to do.
    #[error("Manifest at {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The manifest parsed but holds an invalid entry
    #[error("Manifest at {path} has an invalid entry for {local_path}: {source}")]
    InvalidEntry {
        path: PathBuf,
        local_path: String,
        #[source]
        source: DomainError,
    },

    /// Reading, writing or renaming the manifest failed
    #[error("Manifest I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The manifest could not be serialized
    #[error("Failed to serialize manifest: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl ManifestError {
    /// Returns true when the persisted manifest is unreadable as data
    /// (as opposed to an I/O failure).
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. } | Self::InvalidEntry { .. })
    }
}
