//! Shared helpers for HTTP store integration tests

use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;
use wiremock::MockServer;

use s3sync_store::http::HttpBlobStore;

pub const TEST_TOKEN: &str = "test-access-token";
pub const TEST_BUCKET: &str = "photos";

/// Starts a mock server and returns a store pointed at it
pub async fn setup_store_mock() -> (MockServer, HttpBlobStore) {
    let server = MockServer::start().await;
    let store = HttpBlobStore::new(&server.uri(), TEST_BUCKET, TEST_TOKEN, Duration::from_secs(5))
        .expect("store should build against the mock server");
    (server, store)
}

/// Writes `contents` to a file in a fresh temporary directory
pub fn local_file(name: &str, contents: &[u8]) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("create temp dir");
    let path = dir.path().join(name);
    std::fs::write(&path, contents).expect("write fixture");
    (dir, path)
}
