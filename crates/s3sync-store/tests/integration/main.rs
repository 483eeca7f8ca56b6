//! Integration tests for s3sync-store
//!
//! Uses wiremock to stand in for an S3-compatible gateway and verifies the
//! requests `HttpBlobStore` sends and how it reports failures.

mod common;

mod test_http_store;
