//! S3 adapter behavior against a live S3-compatible endpoint.
//!
//! Runs only when `COLDVAULT_TEST_S3_ENDPOINT` is set, together with
//! `COLDVAULT_TEST_S3_ACCESS_KEY`, `COLDVAULT_TEST_S3_SECRET_KEY` and
//! `COLDVAULT_TEST_S3_BUCKET` naming an existing bucket (e.g. a local MinIO).

mod common;

use coldvault_storage::{ProviderUploader, S3Secret, S3Uploader, StorageError};
use common::{seeded_bytes, write_chunk};
use uuid::Uuid;

fn live_secret(folder: &str) -> Option<S3Secret> {
    let Ok(endpoint) = std::env::var("COLDVAULT_TEST_S3_ENDPOINT") else {
        eprintln!("COLDVAULT_TEST_S3_ENDPOINT not set, skipping");
        return None;
    };
    let var = |name: &str| std::env::var(name).unwrap_or_else(|_| panic!("{name} must be set"));
    Some(S3Secret {
        access_key: var("COLDVAULT_TEST_S3_ACCESS_KEY"),
        secret_key: var("COLDVAULT_TEST_S3_SECRET_KEY"),
        bucket_name: var("COLDVAULT_TEST_S3_BUCKET"),
        folder: folder.to_string(),
        region: "us-east-1".to_string(),
        endpoint: Some(endpoint),
        force_path_style: true,
    })
}

#[tokio::test]
async fn test_s3_upload_download_roundtrip() {
    let folder = format!("coldvault-test-{}", Uuid::new_v4());
    let Some(secret) = live_secret(&folder) else {
        return;
    };
    let uploader = S3Uploader::new(&secret).unwrap();
    uploader.health_check().await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let body = seeded_bytes(42, 256 * 1024);
    let local = write_chunk(dir.path(), "beef-0.shas", &body).await;

    let receipt = uploader.upload(&local).await.unwrap();
    assert_eq!(receipt.remote_id, format!("{folder}/beef-0.shas"));
    assert_eq!(receipt.bytes, body.len() as u64);

    let restored = uploader
        .download(&receipt.remote_id, "beef-0.shas", &dir.path().join("restored"))
        .await
        .unwrap();
    assert_eq!(tokio::fs::read(restored).await.unwrap(), body);
}

#[tokio::test]
async fn test_s3_missing_object_is_not_found() {
    let Some(secret) = live_secret("coldvault-missing") else {
        return;
    };
    let uploader = S3Uploader::new(&secret).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let err = uploader
        .download(
            &format!("coldvault-missing/{}", Uuid::new_v4()),
            "x.shas",
            dir.path(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)), "got {err:?}");
}
