//! Manifest store port (driven/secondary port)
//!
//! Loads and persists the [`Manifest`] as a whole document. The store is
//! constructed with an explicit location and handed to the engine; there is
//! no ambient global state file.

use std::path::{Path, PathBuf};

use crate::domain::errors::ManifestError;
use crate::domain::manifest::Manifest;

/// Port trait for manifest persistence
#[async_trait::async_trait]
pub trait IManifestStore: Send + Sync {
    /// Where the manifest lives (for logging and operator messages)
    fn location(&self) -> &Path;

    /// Every file the store writes, the document and any scratch copies
    ///
    /// A sync whose root contains these files leaves them out.
    fn state_files(&self) -> Vec<PathBuf> {
        vec![self.location().to_path_buf()]
    }

    /// Reads the persisted manifest
    ///
    /// A missing document yields an empty manifest. An unparseable document
    /// fails with [`ManifestError::Corrupt`] instead of resetting history.
    async fn load(&self) -> Result<Manifest, ManifestError>;

    /// Atomically replaces the persisted manifest
    ///
    /// A crash part-way through must leave the previous document readable.
    async fn save(&self, manifest: &Manifest) -> Result<(), ManifestError>;
}
