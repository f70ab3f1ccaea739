//! Provider registration and resizing.

mod common;

use common::TestVault;
use coldvault_core::ProviderKind;
use coldvault_metadata::ProviderRepo;
use coldvault_pipeline::{PipelineError, ProviderRegistry};
use coldvault_storage::StorageError;
use uuid::Uuid;

#[tokio::test]
async fn test_register_and_list() {
    let vault = TestVault::new().await;
    let registry = ProviderRegistry::new(vault.store.clone());

    let s3 = registry
        .register(
            ProviderKind::S3,
            r#"{"AccessKey":"a","SecretKey":"b","BucketName":"cold","Folder":"vault/"}"#,
            50_000_000,
            Some("archive bucket".to_string()),
        )
        .await
        .unwrap();
    let dropbox = registry
        .register(
            ProviderKind::Dropbox,
            r#"{"RefreshToken":"r","AppKey":"k","AppSecret":"s","Folder":"/cold"}"#,
            2_000_000_000,
            None,
        )
        .await
        .unwrap();

    let mut listed = registry.list().await.unwrap();
    listed.sort_by_key(|p| p.capacity_bytes);
    assert_eq!(listed, vec![s3.clone(), dropbox.clone()]);
    assert_eq!(registry.get(s3.id).await.unwrap().label.as_deref(), Some("archive bucket"));
}

#[tokio::test]
async fn test_register_rejects_bad_credentials() {
    let vault = TestVault::new().await;
    let registry = ProviderRegistry::new(vault.store.clone());

    let err = registry
        .register(ProviderKind::Dropbox, r#"{"AppKey":"k"}"#, 1_000, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Storage(StorageError::Credential { kind: ProviderKind::Dropbox, .. })
    ));
    assert!(matches!(
        registry
            .register(ProviderKind::Filesystem, r#"{"Root":"/tmp"}"#, -1, None)
            .await,
        Err(PipelineError::InvalidArgument(_))
    ));
    assert!(registry.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_resize_respects_usage() {
    let vault = TestVault::new().await;
    let provider = vault.filesystem_provider("p", 10_000, 0).await;
    assert!(vault.store.reserve_capacity(provider.id, 6_000).await.unwrap());

    let registry = ProviderRegistry::new(vault.store.clone());
    let grown = registry.resize(provider.id, 20_000).await.unwrap();
    assert_eq!(grown.capacity_bytes, 20_000);
    assert_eq!(grown.consumed_bytes, 6_000);

    assert!(matches!(
        registry.resize(provider.id, 5_000).await,
        Err(PipelineError::InvalidArgument(_))
    ));
    assert!(matches!(
        registry.resize(Uuid::new_v4(), 5_000).await,
        Err(PipelineError::NotFound(_))
    ));
    assert!(matches!(
        registry.get(Uuid::new_v4()).await,
        Err(PipelineError::NotFound(_))
    ));
}
