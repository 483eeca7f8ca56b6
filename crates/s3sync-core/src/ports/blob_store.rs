//! Blob store port (driven/secondary port)
//!
//! The engine sees object storage as a single operation: store the bytes of
//! a local file under a key. Authentication, transport and bucket selection
//! are the adapter's business and are fixed when the adapter is built.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because failures at this boundary are
//!   adapter-specific; the engine only needs success or failure.
//! - Implementations must not retry forever; the engine records a failure
//!   and moves on to the next file.

use std::path::Path;

use crate::domain::newtypes::ObjectKey;

/// Port trait for object storage destinations
#[async_trait::async_trait]
pub trait IBlobStore: Send + Sync {
    /// Stores the contents of `local_path` under `key`, overwriting any
    /// existing object with the same key
    ///
    /// # Arguments
    /// * `key` - Destination key (`prefix/relative/path`, `/`-separated)
    /// * `local_path` - File whose bytes are uploaded
    async fn store(&self, key: &ObjectKey, local_path: &Path) -> anyhow::Result<()>;
}
