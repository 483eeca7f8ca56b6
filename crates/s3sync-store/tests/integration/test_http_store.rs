//! Upload behaviour of `HttpBlobStore` against a mock gateway

use std::time::Duration;

use s3sync_core::domain::newtypes::ObjectKey;
use s3sync_core::ports::blob_store::IBlobStore;
use s3sync_store::http::HttpBlobStore;
use wiremock::{
    matchers::{body_bytes, header, method, path},
    Mock, ResponseTemplate,
};

use crate::common;

#[tokio::test]
async fn test_put_sends_bytes_with_bearer_token() {
    let (server, store) = common::setup_store_mock().await;
    let (_dir, file) = common::local_file("a.txt", b"Hello, bucket!");

    Mock::given(method("PUT"))
        .and(path("/photos/backup/a.txt"))
        .and(header("authorization", "Bearer test-access-token"))
        .and(header("content-type", "application/octet-stream"))
        .and(body_bytes(b"Hello, bucket!".to_vec()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let key = ObjectKey::new("backup/a.txt").unwrap();
    store.store(&key, &file).await.expect("upload should succeed");
}

#[tokio::test]
async fn test_empty_file_is_uploaded() {
    let (server, store) = common::setup_store_mock().await;
    let (_dir, file) = common::local_file("empty", b"");

    Mock::given(method("PUT"))
        .and(path("/photos/empty"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let key = ObjectKey::new("empty").unwrap();
    store.store(&key, &file).await.expect("upload should succeed");
}

#[tokio::test]
async fn test_server_error_is_reported() {
    let (server, store) = common::setup_store_mock().await;
    let (_dir, file) = common::local_file("a.txt", b"X");

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let key = ObjectKey::new("a.txt").unwrap();
    let err = store.store(&key, &file).await.unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("Upload returned error status"), "got: {msg}");
    assert!(msg.contains("503"), "got: {msg}");
}

#[tokio::test]
async fn test_forbidden_is_reported() {
    let (server, store) = common::setup_store_mock().await;
    let (_dir, file) = common::local_file("a.txt", b"X");

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let key = ObjectKey::new("a.txt").unwrap();
    let err = store.store(&key, &file).await.unwrap_err();
    assert!(format!("{err:#}").contains("403"));
}

#[tokio::test]
async fn test_missing_local_file_sends_nothing() {
    let (server, store) = common::setup_store_mock().await;
    let (dir, _file) = common::local_file("a.txt", b"X");

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let key = ObjectKey::new("gone.txt").unwrap();
    let err = store
        .store(&key, &dir.path().join("gone.txt"))
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("Failed to read"));
}

#[tokio::test]
async fn test_timeout_is_reported() {
    let server = wiremock::MockServer::start().await;
    let store = HttpBlobStore::new(
        &server.uri(),
        common::TEST_BUCKET,
        common::TEST_TOKEN,
        Duration::from_millis(200),
    )
    .unwrap();
    let (_dir, file) = common::local_file("slow.txt", b"X");

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let key = ObjectKey::new("slow.txt").unwrap();
    assert!(store.store(&key, &file).await.is_err());
}

#[tokio::test]
async fn test_keys_with_spaces_are_encoded() {
    let (server, store) = common::setup_store_mock().await;
    let (_dir, file) = common::local_file("my file.txt", b"X");

    Mock::given(method("PUT"))
        .and(path("/photos/docs/my%20file.txt"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let key = ObjectKey::new("docs/my file.txt").unwrap();
    store.store(&key, &file).await.expect("upload should succeed");
}
