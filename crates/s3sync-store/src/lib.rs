//! s3sync Store - Blob store adapters
//!
//! Implementations of [`IBlobStore`]:
//!
//! - [`http::HttpBlobStore`] - `PUT {endpoint}/{bucket}/{key}` with a bearer
//!   token, for S3-compatible gateways
//! - [`fs::FsBlobStore`] - objects written below `{root}/{bucket}/`, for
//!   local mirrors and tests
//!
//! [`build_blob_store`] picks one from the configuration. Every setup
//! problem (missing endpoint, missing credentials, bad root) is reported as
//! a [`SetupError`] before any file is processed.

pub mod fs;
pub mod http;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use s3sync_core::config::{StoreBackend, StoreConfig};
use s3sync_core::ports::blob_store::IBlobStore;

/// Errors raised while constructing a blob store
#[derive(Debug, Error)]
pub enum SetupError {
    /// The `http` backend has no endpoint configured
    #[error("No store endpoint configured (set store.endpoint or pass --endpoint)")]
    MissingEndpoint,

    /// The endpoint is not a usable base URL
    #[error("Invalid store endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// The credential environment variable is unset or empty
    #[error("Missing credentials: environment variable {env_var} is not set")]
    MissingCredentials { env_var: String },

    /// The `filesystem` backend has no root configured
    #[error("No store root configured (set store.root)")]
    MissingRoot,

    /// The bucket name cannot be used as a single path segment
    #[error("Invalid bucket name '{0}'")]
    InvalidBucket(String),

    /// The HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    /// The store root is unusable
    #[error("Store root {path} is not usable: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Reject bucket names that would escape their directory or URL segment
pub fn validate_bucket(bucket: &str) -> Result<(), SetupError> {
    let escapes = bucket == "." || bucket == ".." || bucket.contains(|c| c == '/' || c == '\\');
    if bucket.is_empty() || escapes {
        return Err(SetupError::InvalidBucket(bucket.to_string()));
    }
    Ok(())
}

/// Build the blob store selected by `config` for `bucket`
///
/// Credentials for the `http` backend are read from the environment
/// variable named by `config.token_env`.
pub fn build_blob_store(
    config: &StoreConfig,
    bucket: &str,
) -> Result<Arc<dyn IBlobStore>, SetupError> {
    build_blob_store_with(config, bucket, |name| std::env::var(name).ok())
}

/// Like [`build_blob_store`], with an explicit variable lookup
pub fn build_blob_store_with(
    config: &StoreConfig,
    bucket: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Arc<dyn IBlobStore>, SetupError> {
    validate_bucket(bucket)?;

    match config.backend {
        StoreBackend::Http => {
            let endpoint = config
                .endpoint
                .as_deref()
                .filter(|e| !e.is_empty())
                .ok_or(SetupError::MissingEndpoint)?;
            let token = lookup(&config.token_env)
                .filter(|t| !t.trim().is_empty())
                .ok_or_else(|| SetupError::MissingCredentials {
                    env_var: config.token_env.clone(),
                })?;
            debug!(endpoint, bucket, "building HTTP blob store");

            let store = http::HttpBlobStore::new(
                endpoint,
                bucket,
                token,
                Duration::from_secs(config.timeout_secs),
            )?;
            info!(endpoint, bucket, "HTTP blob store ready");
            Ok(Arc::new(store))
        }
        StoreBackend::Filesystem => {
            let root = config.root.as_ref().ok_or(SetupError::MissingRoot)?;
            let store = fs::FsBlobStore::open(root, bucket)?;
            info!(root = %root.display(), bucket, "filesystem blob store ready");
            Ok(Arc::new(store))
        }
    }
}
