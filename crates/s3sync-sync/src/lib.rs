//! s3sync Sync - Incremental upload engine
//!
//! Provides:
//! - Content fingerprints (SHA-256, chunked reads)
//! - Deterministic tree walk with name-based exclusion
//! - A JSON manifest store with atomic saves
//! - The per-file skip/upload decision loop
//!
//! ## Modules
//!
//! - [`fingerprint`] - Chunked SHA-256 of local files
//! - [`walker`] - Sorted, exclusion-aware directory traversal
//! - [`manifest`] - `IManifestStore` backed by a JSON document
//! - [`report`] - Pre-flight count and size
//! - [`engine`] - Sync decision engine orchestrating a run

pub mod engine;
pub mod fingerprint;
pub mod manifest;
pub mod report;
pub mod walker;

use std::path::PathBuf;

use thiserror::Error;

use s3sync_core::domain::errors::{DomainError, ManifestError};

/// Errors that abort a whole sync run
///
/// Per-file problems never surface here; they are recorded in the
/// [`engine::SyncReport`] instead.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The sync root does not exist
    #[error("Sync root not found: {0}")]
    RootNotFound(PathBuf),

    /// The sync root exists but is not a directory
    #[error("Sync root is not a directory: {0}")]
    RootNotDirectory(PathBuf),

    /// The persisted manifest could not be read
    #[error("Cannot load manifest: {0}")]
    CorruptState(#[source] ManifestError),

    /// The manifest could not be written back at the end of the run
    #[error("Cannot save manifest: {0}")]
    ManifestSave(#[source] ManifestError),

    /// An I/O error occurred outside per-file processing
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A domain-level error propagated from s3sync-core
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl From<walker::WalkError> for SyncError {
    fn from(err: walker::WalkError) -> Self {
        match err {
            walker::WalkError::RootNotFound(path) => Self::RootNotFound(path),
            walker::WalkError::RootNotDirectory(path) => Self::RootNotDirectory(path),
            walker::WalkError::Entry { source, .. } => Self::Io(source),
        }
    }
}
