//! Content fingerprints
//!
//! A fingerprint is the SHA-256 digest of a file's bytes, as lowercase hex.
//! Files are read in bounded chunks so arbitrarily large files never have
//! to fit in memory.

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use tracing::trace;

use s3sync_core::domain::newtypes::ContentHash;

/// Default read buffer size (64 KiB)
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Computes content fingerprints with a fixed read buffer
#[derive(Debug, Clone, Copy)]
pub struct Fingerprinter {
    chunk_size: usize,
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl Fingerprinter {
    /// Create a fingerprinter reading `chunk_size` bytes at a time.
    /// A zero size falls back to [`DEFAULT_CHUNK_SIZE`].
    pub fn new(chunk_size: usize) -> Self {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Self { chunk_size }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Hash the contents of the file at `path`
    ///
    /// # Errors
    /// Any I/O error opening or reading the file is returned unchanged.
    pub async fn hash(&self, path: &Path) -> std::io::Result<ContentHash> {
        let mut file = tokio::fs::File::open(path).await?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; self.chunk_size];
        let mut total: u64 = 0;

        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            total += n as u64;
        }

        let digest = format!("{:x}", hasher.finalize());
        trace!(path = %path.display(), bytes = total, %digest, "fingerprinted");

        ContentHash::new(digest)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }
}
