//! Closed enumerations persisted as integer codes.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Encryption applied to a file before it is encoded and chunked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionScheme {
    /// No transformation.
    Plaintext,
    /// AES-256-GCM with key material supplied from the environment.
    #[default]
    Aes,
}

impl EncryptionScheme {
    /// Integer code stored in the metadata tables.
    pub fn code(self) -> i64 {
        match self {
            Self::Plaintext => 0,
            Self::Aes => 1,
        }
    }

    /// Decode a stored integer code.
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(Self::Plaintext),
            1 => Ok(Self::Aes),
            _ => Err(Error::UnknownCode {
                kind: "encryption scheme",
                code,
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plaintext => "plaintext",
            Self::Aes => "aes",
        }
    }
}

impl fmt::Display for EncryptionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncryptionScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "plaintext" | "none" => Ok(Self::Plaintext),
            "aes" => Ok(Self::Aes),
            other => Err(Error::InvalidArgument(format!(
                "unknown encryption scheme: {other}"
            ))),
        }
    }
}

/// Backend kind of a storage provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Google Drive folder reached through a service-account credential.
    GoogleDrive,
    /// Dropbox app folder reached through a refresh token.
    Dropbox,
    /// S3-compatible object store.
    S3,
    /// Locally mounted directory, typically a file-sync client's folder.
    Filesystem,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::GoogleDrive,
        ProviderKind::Dropbox,
        ProviderKind::S3,
        ProviderKind::Filesystem,
    ];

    /// Integer code stored in the metadata tables.
    pub fn code(self) -> i64 {
        match self {
            Self::GoogleDrive => 0,
            Self::Dropbox => 1,
            Self::S3 => 2,
            Self::Filesystem => 3,
        }
    }

    /// Decode a stored integer code.
    pub fn from_code(code: i64) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.code() == code)
            .ok_or(Error::UnknownCode {
                kind: "provider kind",
                code,
            })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::GoogleDrive => "googledrive",
            Self::Dropbox => "dropbox",
            Self::S3 => "s3",
            Self::Filesystem => "filesystem",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.to_ascii_lowercase().replace(['-', '_'], "");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown provider kind: {s}")))
    }
}

/// Shape of the input handed to the preparator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    /// A single regular file.
    SingleFile,
    /// Every regular file directly inside a directory (not recursive).
    Folder,
}
