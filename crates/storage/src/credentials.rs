//! Per-backend credential payloads.
//!
//! Providers store their credential as an opaque JSON blob. Decoding it is a
//! pure function of the provider kind and the blob; nothing here touches the
//! network.

use crate::error::{StorageError, StorageResult};
use coldvault_core::ProviderKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Google Drive service-account credential.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GoogleDriveSecret {
    /// Name of the service-account key file.
    pub file_name: String,
    /// Contents of the service-account key file.
    pub file_content: String,
    /// Drive folder receiving uploads.
    pub folder_id: String,
}

/// Dropbox refresh-token credential.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DropboxSecret {
    pub refresh_token: String,
    pub app_key: String,
    pub app_secret: String,
    /// Folder inside the app's space receiving uploads.
    pub folder: String,
}

/// S3-compatible object store credential.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct S3Secret {
    pub access_key: String,
    pub secret_key: String,
    pub bucket_name: String,
    /// Key prefix; trailing slashes are ignored.
    #[serde(default)]
    pub folder: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible services such as MinIO.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// Locally mounted directory, e.g. a sync client's folder.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FilesystemSecret {
    pub root: PathBuf,
}

impl fmt::Debug for GoogleDriveSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleDriveSecret")
            .field("file_name", &self.file_name)
            .field("file_content", &"<redacted>")
            .field("folder_id", &self.folder_id)
            .finish()
    }
}

impl fmt::Debug for DropboxSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DropboxSecret")
            .field("refresh_token", &"<redacted>")
            .field("app_key", &self.app_key)
            .field("app_secret", &"<redacted>")
            .field("folder", &self.folder)
            .finish()
    }
}

impl fmt::Debug for S3Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Secret")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("bucket_name", &self.bucket_name)
            .field("folder", &self.folder)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// A provider's backend together with its decoded credential.
#[derive(Clone, Debug)]
pub enum ProviderBackend {
    GoogleDrive(GoogleDriveSecret),
    Dropbox(DropboxSecret),
    S3(S3Secret),
    Filesystem(FilesystemSecret),
}

impl ProviderBackend {
    /// Decode and validate a credential blob for `kind`.
    pub fn decode(kind: ProviderKind, blob: &str) -> StorageResult<Self> {
        let backend = match kind {
            ProviderKind::GoogleDrive => ProviderBackend::GoogleDrive(parse(kind, blob)?),
            ProviderKind::Dropbox => ProviderBackend::Dropbox(parse(kind, blob)?),
            ProviderKind::S3 => ProviderBackend::S3(parse(kind, blob)?),
            ProviderKind::Filesystem => ProviderBackend::Filesystem(parse(kind, blob)?),
        };
        backend.validate()?;
        Ok(backend)
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderBackend::GoogleDrive(_) => ProviderKind::GoogleDrive,
            ProviderBackend::Dropbox(_) => ProviderKind::Dropbox,
            ProviderBackend::S3(_) => ProviderKind::S3,
            ProviderBackend::Filesystem(_) => ProviderKind::Filesystem,
        }
    }

    /// Serialize the credential back into its stored JSON form.
    pub fn to_json(&self) -> StorageResult<String> {
        let json = match self {
            ProviderBackend::GoogleDrive(s) => serde_json::to_string(s),
            ProviderBackend::Dropbox(s) => serde_json::to_string(s),
            ProviderBackend::S3(s) => serde_json::to_string(s),
            ProviderBackend::Filesystem(s) => serde_json::to_string(s),
        };
        json.map_err(|e| StorageError::Credential {
            kind: self.kind(),
            reason: e.to_string(),
        })
    }

    fn validate(&self) -> StorageResult<()> {
        let kind = self.kind();
        let required: Vec<(&str, &str)> = match self {
            ProviderBackend::GoogleDrive(s) => vec![
                ("FileName", s.file_name.as_str()),
                ("FileContent", s.file_content.as_str()),
                ("FolderId", s.folder_id.as_str()),
            ],
            ProviderBackend::Dropbox(s) => vec![
                ("RefreshToken", s.refresh_token.as_str()),
                ("AppKey", s.app_key.as_str()),
                ("AppSecret", s.app_secret.as_str()),
                ("Folder", s.folder.as_str()),
            ],
            ProviderBackend::S3(s) => vec![
                ("AccessKey", s.access_key.as_str()),
                ("SecretKey", s.secret_key.as_str()),
                ("BucketName", s.bucket_name.as_str()),
                ("Region", s.region.as_str()),
            ],
            ProviderBackend::Filesystem(s) => {
                if s.root.as_os_str().is_empty() {
                    return Err(StorageError::Credential {
                        kind,
                        reason: "Root must not be empty".to_string(),
                    });
                }
                Vec::new()
            }
        };
        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(StorageError::Credential {
                kind,
                reason: format!("{field} must not be empty"),
            }),
            None => Ok(()),
        }
    }
}

fn parse<T: serde::de::DeserializeOwned>(kind: ProviderKind, blob: &str) -> StorageResult<T> {
    serde_json::from_str(blob).map_err(|e| StorageError::Credential {
        kind,
        reason: e.to_string(),
    })
}
