//! S3-compatible provider using the AWS SDK.

use crate::credentials::S3Secret;
use crate::error::{StorageError, StorageResult};
use crate::traits::{ProviderUploader, UploadReceipt, download_target, upload_name};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument};

/// Uploads chunk files into a bucket under an optional folder prefix.
pub struct S3Uploader {
    client: Client,
    bucket: String,
    folder: String,
}

impl std::fmt::Debug for S3Uploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Uploader")
            .field("bucket", &self.bucket)
            .field("folder", &self.folder)
            .finish_non_exhaustive()
    }
}

impl S3Uploader {
    /// Build a client from the provider's credential. No request is sent.
    pub fn new(secret: &S3Secret) -> StorageResult<Self> {
        if secret.bucket_name.trim().is_empty() {
            return Err(StorageError::Config("s3 bucket name is empty".to_string()));
        }

        let credentials = Credentials::new(
            secret.access_key.clone(),
            secret.secret_key.clone(),
            None,
            None,
            "coldvault-provider",
        );
        let mut builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(secret.region.clone()))
            .credentials_provider(credentials);

        if let Some(endpoint) = secret.endpoint.as_deref().map(normalize_endpoint) {
            builder = builder.endpoint_url(endpoint);
        }
        if secret.force_path_style {
            builder = builder.force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: secret.bucket_name.clone(),
            folder: secret.folder.trim_end_matches('/').to_string(),
        })
    }

    /// Object key for a file name: `folder/name`, or just `name` without a folder.
    pub fn object_key(&self, name: &str) -> String {
        if self.folder.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.folder, name)
        }
    }
}

/// Accept bare `host:port` endpoints by assuming plain HTTP.
fn normalize_endpoint(endpoint: &str) -> String {
    let lower = endpoint.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    }
}

fn map_sdk_error<E>(err: SdkError<E>, key: &str) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    match &err {
        SdkError::ServiceError(service) if service.raw().status().as_u16() == 404 => {
            StorageError::NotFound(key.to_string())
        }
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => StorageError::Connection {
            backend: "s3",
            reason: err.to_string(),
        },
        _ => StorageError::S3(Box::new(err)),
    }
}

#[async_trait]
impl ProviderUploader for S3Uploader {
    #[instrument(skip(self), fields(backend = "s3", bucket = %self.bucket))]
    async fn upload(&self, local: &Path) -> StorageResult<UploadReceipt> {
        let name = upload_name(local)?;
        let key = self.object_key(&name);
        let bytes = fs::metadata(local)
            .await
            .map_err(|e| StorageError::upload_failed("s3", StorageError::Io(e)))?
            .len();
        let body = ByteStream::from_path(local)
            .await
            .map_err(|e| StorageError::upload_failed("s3", StorageError::S3(Box::new(e))))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed("s3", map_sdk_error(e, &key)))?;

        debug!(key = %key, bytes, "stored chunk object");
        Ok(UploadReceipt {
            remote_id: key,
            bytes,
        })
    }

    #[instrument(skip(self), fields(backend = "s3", bucket = %self.bucket))]
    async fn download(
        &self,
        remote_id: &str,
        destination_name: &str,
        destination_dir: &Path,
    ) -> StorageResult<PathBuf> {
        let destination = download_target(destination_name, destination_dir).await?;
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(remote_id)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, remote_id))?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::S3(Box::new(e)))?
            .into_bytes();

        fs::write(&destination, &data).await?;
        Ok(destination)
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &self.bucket))?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(folder: &str) -> S3Secret {
        S3Secret {
            access_key: "access".to_string(),
            secret_key: "secret".to_string(),
            bucket_name: "cold".to_string(),
            folder: folder.to_string(),
            region: "us-east-1".to_string(),
            endpoint: Some("minio:9000".to_string()),
            force_path_style: true,
        }
    }

    #[test]
    fn test_object_key_trims_folder_slash() {
        let uploader = S3Uploader::new(&secret("backups/")).unwrap();
        assert_eq!(uploader.object_key("abc-0.shas"), "backups/abc-0.shas");

        let uploader = S3Uploader::new(&secret("a/b//")).unwrap();
        assert_eq!(uploader.object_key("abc-0.shas"), "a/b/abc-0.shas");
    }

    #[test]
    fn test_object_key_without_folder() {
        let uploader = S3Uploader::new(&secret("")).unwrap();
        assert_eq!(uploader.object_key("abc-3.shas"), "abc-3.shas");
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("minio:9000"), "http://minio:9000");
        assert_eq!(normalize_endpoint("https://s3.example"), "https://s3.example");
        assert_eq!(normalize_endpoint("HTTP://x"), "HTTP://x");
    }

    #[test]
    fn test_debug_hides_client_credentials() {
        let uploader = S3Uploader::new(&secret("f")).unwrap();
        let debug = format!("{uploader:?}");
        assert!(debug.contains("cold"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_rejects_blank_bucket() {
        let mut s = secret("f");
        s.bucket_name = " ".to_string();
        assert!(matches!(S3Uploader::new(&s), Err(StorageError::Config(_))));
    }
}
