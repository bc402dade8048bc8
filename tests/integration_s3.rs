use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use bytes::Bytes;
use std::io::{Cursor, Write};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

use hotver::config::{DriverKind, RemoteConfig};
use hotver::storage::{ObjectStore, S3Store};
use hotver::{Config, ErrorKind, VersionService};

fn endpoint_url() -> String {
    std::env::var("AWS_ENDPOINT_URL").unwrap_or_else(|_| "http://localhost:4566".to_string())
}

/// Each test gets its own bucket so runs don't see each other's objects
fn unique_bucket(tag: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .subsec_nanos();
    format!("hotver-{tag}-{nanos}")
}

/// Helper function to create an S3 client pointing to localstack
async fn create_localstack_client() -> Client {
    let config = aws_config::defaults(BehaviorVersion::latest())
        .region("us-east-1")
        .credentials_provider(aws_sdk_s3::config::Credentials::new("test", "test", None, None, "test"))
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&config)
        .endpoint_url(endpoint_url())
        .force_path_style(true) // Required for LocalStack
        .build();

    Client::from_conf(s3_config)
}

async fn create_bucket(client: &Client, bucket: &str) {
    client
        .create_bucket()
        .bucket(bucket)
        .send()
        .await
        .expect("Failed to create test bucket");
}

fn localstack_config(root: &std::path::Path, bucket: &str) -> Config {
    let mut config = Config::for_root(root);
    config.driver = DriverKind::Remote;
    config.remote = RemoteConfig {
        bucket: Some(bucket.to_string()),
        region: Some("us-east-1".to_string()),
        access_key_id: Some("test".to_string()),
        secret_access_key: Some("test".to_string()),
        endpoint_url: Some(endpoint_url()),
        force_path_style: true,
        ..config.remote
    };
    config.remote.retry.base_delay = Duration::from_millis(50);
    config
}

fn create_test_zip(files: &[(&str, &str)]) -> Bytes {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in files {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(body.as_bytes()).unwrap();
    }
    Bytes::from(writer.finish().unwrap().into_inner())
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored --test-threads=1
async fn test_s3_store_round_trip() {
    let client = create_localstack_client().await;
    let bucket = unique_bucket("store");
    create_bucket(&client, &bucket).await;

    let store = S3Store::new(client, bucket);
    store
        .put_object("hotupdate/wxmini/5/index.html", Bytes::from_static(b"<html>"))
        .await
        .unwrap();
    store
        .put_object("hotupdate/wxmini/5/js/game.js", Bytes::from_static(b"run()"))
        .await
        .unwrap();

    let keys = store.list_keys("hotupdate/wxmini/5/").await.unwrap();
    assert_eq!(keys.len(), 2);

    let children = store.list_child_prefixes("hotupdate/wxmini/").await.unwrap();
    assert_eq!(children, vec!["5".to_string()]);

    store.delete_objects(&keys).await.unwrap();
    assert!(store.list_keys("hotupdate/wxmini/5/").await.unwrap().is_empty());
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored --test-threads=1
async fn test_upload_mirrors_to_bucket() {
    let client = create_localstack_client().await;
    let bucket = unique_bucket("sync");
    create_bucket(&client, &bucket).await;

    let tmp = TempDir::new().unwrap();
    let svc = VersionService::from_config(localstack_config(tmp.path(), &bucket))
        .await
        .unwrap();

    let archive = create_test_zip(&[("100/config.json", r#"{"k":1}"#)]);
    let outcome = svc.upload("wxmini", "100.zip", archive).await.unwrap();
    assert_eq!(outcome.sync.objects_uploaded, 2);

    let store: Arc<dyn ObjectStore> = Arc::new(S3Store::new(client, bucket));
    let primary = store.list_keys("hotupdate/wxmini/100/").await.unwrap();
    let legacy = store.list_keys("publish/100/").await.unwrap();
    assert_eq!(primary, vec!["hotupdate/wxmini/100/config.json".to_string()]);
    assert_eq!(legacy, vec!["publish/100/config.json".to_string()]);

    let applied = svc.publish("wxmini", "100").await.unwrap();
    assert!(!applied.already_current);
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored --test-threads=1
async fn test_missing_bucket_is_not_retried_forever() {
    let tmp = TempDir::new().unwrap();
    let svc = VersionService::from_config(localstack_config(tmp.path(), &unique_bucket("absent")))
        .await
        .unwrap();

    let err = svc.list("wxmini").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
}
