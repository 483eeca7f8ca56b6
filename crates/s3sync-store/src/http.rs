//! HTTP blob store
//!
//! Uploads each object with a single `PUT {endpoint}/{bucket}/{key}`,
//! authenticated with a bearer token. Key segments are percent-encoded
//! individually so `/` keeps its meaning as a separator.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use s3sync_store::http::HttpBlobStore;
//!
//! # fn example() -> Result<(), s3sync_store::SetupError> {
//! let _store = HttpBlobStore::new(
//!     "https://s3.example.com",
//!     "photos",
//!     "token",
//!     Duration::from_secs(300),
//! )?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use tracing::{debug, instrument};

use s3sync_core::domain::newtypes::ObjectKey;
use s3sync_core::ports::blob_store::IBlobStore;

use crate::SetupError;

/// [`IBlobStore`] that PUTs objects to an S3-compatible HTTP endpoint
pub struct HttpBlobStore {
    /// The underlying HTTP client
    client: Client,
    /// Base URL; the bucket and key are appended as path segments
    endpoint: Url,
    bucket: String,
    /// Bearer token sent with every request
    token: String,
}

impl std::fmt::Debug for HttpBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBlobStore")
            .field("endpoint", &self.endpoint.as_str())
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl HttpBlobStore {
    /// Creates a store with its own client and per-request timeout
    ///
    /// # Errors
    /// `InvalidEndpoint` if `endpoint` is not an absolute http(s) URL,
    /// `Client` if the TLS backend cannot be initialised
    pub fn new(
        endpoint: &str,
        bucket: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SetupError> {
        let client = Client::builder().timeout(timeout).build()?;
        Self::with_client(client, endpoint, bucket, token)
    }

    /// Creates a store around an existing client (useful for testing)
    pub fn with_client(
        client: Client,
        endpoint: &str,
        bucket: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, SetupError> {
        let endpoint = parse_endpoint(endpoint)?;
        Ok(Self {
            client,
            endpoint,
            bucket: bucket.into(),
            token: token.into(),
        })
    }

    /// Full URL of the object stored under `key`
    pub fn object_url(&self, key: &ObjectKey) -> Url {
        let mut url = self.endpoint.clone();
        // parse_endpoint guarantees a base URL, so this always succeeds.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push(&self.bucket)
                .extend(key.as_str().split('/'));
        }
        url
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Url, SetupError> {
    let invalid = |reason: &str| SetupError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(endpoint).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.cannot_be_a_base() {
        return Err(invalid("not a base URL"));
    }
    Ok(url)
}

#[async_trait::async_trait]
impl IBlobStore for HttpBlobStore {
    #[instrument(skip(self), fields(bucket = %self.bucket, key = %key))]
    async fn store(&self, key: &ObjectKey, local_path: &Path) -> Result<()> {
        let data = tokio::fs::read(local_path)
            .await
            .with_context(|| format!("Failed to read {}", local_path.display()))?;
        let url = self.object_url(key);

        debug!(%url, bytes = data.len(), "uploading object");

        self.client
            .put(url)
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()
            .await
            .context("Failed to send upload request")?
            .error_for_status()
            .context("Upload returned error status")?;

        debug!("upload complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(endpoint: &str) -> HttpBlobStore {
        HttpBlobStore::with_client(Client::new(), endpoint, "photos", "token").unwrap()
    }

    #[test]
    fn test_object_url_joins_bucket_and_key() {
        let key = ObjectKey::new("backup/2026/cat.jpg").unwrap();
        assert_eq!(
            store("https://s3.example.com").object_url(&key).as_str(),
            "https://s3.example.com/photos/backup/2026/cat.jpg"
        );
    }

    #[test]
    fn test_object_url_keeps_endpoint_path() {
        let key = ObjectKey::new("a.txt").unwrap();
        assert_eq!(
            store("http://localhost:9000/gateway/").object_url(&key).as_str(),
            "http://localhost:9000/gateway/photos/a.txt"
        );
    }

    #[test]
    fn test_object_url_percent_encodes_segments() {
        let key = ObjectKey::new("my docs/report #1?.pdf").unwrap();
        assert_eq!(
            store("https://s3.example.com").object_url(&key).as_str(),
            "https://s3.example.com/photos/my%20docs/report%20%231%3F.pdf"
        );
    }

    #[test]
    fn test_rejects_non_http_endpoint() {
        let result = HttpBlobStore::with_client(Client::new(), "ftp://files", "b", "t");
        assert!(matches!(result, Err(SetupError::InvalidEndpoint { .. })));
    }

    #[test]
    fn test_debug_hides_token() {
        let rendered = format!("{:?}", store("https://s3.example.com"));
        assert!(rendered.contains("photos"));
        assert!(!rendered.contains("token"));
    }
}
