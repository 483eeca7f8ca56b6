//! Filesystem blob store
//!
//! Treats `{root}/{bucket}` as the bucket and writes each object to
//! `{root}/{bucket}/{key}`, creating intermediate directories. Objects are
//! copied to a temporary sibling and renamed into place so readers never
//! see a partial object.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use s3sync_core::domain::newtypes::ObjectKey;
use s3sync_core::ports::blob_store::IBlobStore;

use crate::SetupError;

/// [`IBlobStore`] backed by a local directory
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    bucket_dir: PathBuf,
}

impl FsBlobStore {
    /// Opens `bucket` below `root`, creating the bucket directory if needed
    ///
    /// # Errors
    /// `SetupError::Io` if `root` is missing, not a directory, or the
    /// bucket directory cannot be created
    pub fn open(root: &Path, bucket: &str) -> Result<Self, SetupError> {
        let io = |source: std::io::Error| SetupError::Io {
            path: root.to_path_buf(),
            source,
        };

        let meta = std::fs::metadata(root).map_err(io)?;
        if !meta.is_dir() {
            return Err(io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "not a directory",
            )));
        }

        let bucket_dir = root.join(bucket);
        std::fs::create_dir_all(&bucket_dir).map_err(io)?;
        Ok(Self { bucket_dir })
    }

    pub fn bucket_dir(&self) -> &Path {
        &self.bucket_dir
    }

    /// Where the object stored under `key` lives
    pub fn object_path(&self, key: &ObjectKey) -> PathBuf {
        key.as_str()
            .split('/')
            .fold(self.bucket_dir.clone(), |path, segment| path.join(segment))
    }
}

#[async_trait::async_trait]
impl IBlobStore for FsBlobStore {
    #[instrument(skip(self), fields(key = %key))]
    async fn store(&self, key: &ObjectKey, local_path: &Path) -> Result<()> {
        let target = self.object_path(key);

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let tmp_path = {
            let mut p = target.as_os_str().to_owned();
            p.push(".part");
            PathBuf::from(p)
        };

        debug!(?tmp_path, "copying to temporary object");
        let bytes = tokio::fs::copy(local_path, &tmp_path)
            .await
            .with_context(|| format!("Failed to copy {}", local_path.display()))?;

        tokio::fs::rename(&tmp_path, &target)
            .await
            .with_context(|| format!("Failed to move object into {}", target.display()))?;

        debug!(bytes, target = %target.display(), "object stored");
        Ok(())
    }
}
