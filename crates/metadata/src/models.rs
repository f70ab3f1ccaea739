//! Records persisted by coldvault.

use crate::error::{MetadataError, MetadataResult};
use crate::record::{FieldDescriptor, FieldType, FieldValue, Record, RecordRow, TableDescriptor};
use coldvault_core::{ChunkName, EncryptionScheme, ProviderKind, SerializedName};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Chunk information
// =============================================================================

/// How one prepared file was split. Written once, after its chunk files.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkInformation {
    pub file_name: String,
    pub folder_name: String,
    /// Always at least 1.
    pub total_chunks: i64,
    pub encryption: EncryptionScheme,
    pub serialized_name: SerializedName,
    /// Size of the original file before encryption.
    pub original_bytes: Option<i64>,
    pub prepared_at: OffsetDateTime,
}

impl ChunkInformation {
    /// Names of every chunk belonging to this file, in index order.
    ///
    /// Fails when `total_chunks` is outside the chunk index range.
    pub fn chunk_names(&self) -> MetadataResult<impl Iterator<Item = ChunkName> + '_> {
        let count = u32::try_from(self.total_chunks).map_err(|_| MetadataError::Decode {
            table: Self::TABLE.name,
            column: "total_chunks".to_string(),
            reason: format!("{} is not a valid chunk count", self.total_chunks),
        })?;
        Ok((0..count).map(|i| self.serialized_name.chunk(i)))
    }
}

impl Record for ChunkInformation {
    const TABLE: &'static TableDescriptor = &TableDescriptor {
        name: "chunk_information",
        fields: &[
            FieldDescriptor::required("file_name", FieldType::Text),
            FieldDescriptor::required("folder_name", FieldType::Text),
            FieldDescriptor::required("total_chunks", FieldType::Integer),
            FieldDescriptor::required("encryption", FieldType::Enum),
            FieldDescriptor::unique("serialized_name", FieldType::Text),
            FieldDescriptor::optional("original_bytes", FieldType::Integer),
            FieldDescriptor::required("prepared_at", FieldType::Timestamp),
        ],
    };

    fn to_values(&self) -> Vec<FieldValue> {
        vec![
            self.file_name.clone().into(),
            self.folder_name.clone().into(),
            self.total_chunks.into(),
            self.encryption.code().into(),
            self.serialized_name.as_str().into(),
            self.original_bytes.into(),
            self.prepared_at.into(),
        ]
    }

    fn from_row(row: &RecordRow) -> MetadataResult<Self> {
        Ok(Self {
            file_name: row.text("file_name")?,
            folder_name: row.text("folder_name")?,
            total_chunks: row.i64("total_chunks")?,
            encryption: EncryptionScheme::from_code(row.i64("encryption")?)?,
            serialized_name: SerializedName::new(row.text("serialized_name")?)?,
            original_bytes: row.opt_i64("original_bytes")?,
            prepared_at: row.timestamp("prepared_at")?,
        })
    }
}

// =============================================================================
// Placements
// =============================================================================

/// The fact that one chunk was uploaded to one provider. Never updated.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    /// `{serialized}-{index}`.
    pub chunk_name: String,
    pub provider_id: Uuid,
    /// Identifier the backend returned for the uploaded object.
    pub remote_id: Option<String>,
    pub size_bytes: i64,
    /// Base64 SHA-256 of the chunk file.
    pub checksum: Option<String>,
    pub placed_at: OffsetDateTime,
}

impl Placement {
    pub fn parsed_chunk_name(&self) -> MetadataResult<ChunkName> {
        Ok(ChunkName::parse(&self.chunk_name)?)
    }
}

impl Record for Placement {
    const TABLE: &'static TableDescriptor = &TableDescriptor {
        name: "placement",
        fields: &[
            FieldDescriptor::required("chunk_name", FieldType::Text),
            FieldDescriptor::required("provider_id", FieldType::Uuid),
            FieldDescriptor::optional("remote_id", FieldType::Text),
            FieldDescriptor::required("size_bytes", FieldType::Integer),
            FieldDescriptor::optional("checksum", FieldType::Text),
            FieldDescriptor::required("placed_at", FieldType::Timestamp),
        ],
    };

    fn to_values(&self) -> Vec<FieldValue> {
        vec![
            self.chunk_name.clone().into(),
            self.provider_id.into(),
            self.remote_id.clone().into(),
            self.size_bytes.into(),
            self.checksum.clone().into(),
            self.placed_at.into(),
        ]
    }

    fn from_row(row: &RecordRow) -> MetadataResult<Self> {
        Ok(Self {
            chunk_name: row.text("chunk_name")?,
            provider_id: row.uuid("provider_id")?,
            remote_id: row.opt_text("remote_id")?,
            size_bytes: row.i64("size_bytes")?,
            checksum: row.opt_text("checksum")?,
            placed_at: row.timestamp("placed_at")?,
        })
    }
}

// =============================================================================
// Providers
// =============================================================================

/// A configured storage backend with a capacity ceiling and usage counter.
#[derive(Clone, PartialEq)]
pub struct Provider {
    pub id: Uuid,
    pub kind: ProviderKind,
    /// Backend-specific JSON, opaque to the metadata layer.
    pub credential: String,
    pub capacity_bytes: i64,
    pub consumed_bytes: i64,
    pub label: Option<String>,
}

impl Provider {
    pub fn new(kind: ProviderKind, credential: impl Into<String>, capacity_bytes: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            credential: credential.into(),
            capacity_bytes,
            consumed_bytes: 0,
            label: None,
        }
    }

    pub fn remaining_bytes(&self) -> i64 {
        self.capacity_bytes.saturating_sub(self.consumed_bytes)
    }

    /// Whether `bytes` more would stay within capacity.
    pub fn can_fit(&self, bytes: i64) -> bool {
        self.consumed_bytes.saturating_add(bytes) <= self.capacity_bytes
    }

    /// Whether the provider clears a batch eligibility floor.
    pub fn is_eligible(&self, floor: i64) -> bool {
        self.remaining_bytes() >= floor
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("credential", &"<redacted>")
            .field("capacity_bytes", &self.capacity_bytes)
            .field("consumed_bytes", &self.consumed_bytes)
            .field("label", &self.label)
            .finish()
    }
}

impl Record for Provider {
    const TABLE: &'static TableDescriptor = &TableDescriptor {
        name: "provider",
        fields: &[
            FieldDescriptor::unique("id", FieldType::Uuid),
            FieldDescriptor::required("kind", FieldType::Enum),
            FieldDescriptor::required("credential", FieldType::Text),
            FieldDescriptor::required("capacity_bytes", FieldType::Integer),
            FieldDescriptor::required("consumed_bytes", FieldType::Integer),
            FieldDescriptor::optional("label", FieldType::Text),
        ],
    };

    fn to_values(&self) -> Vec<FieldValue> {
        vec![
            self.id.into(),
            self.kind.code().into(),
            self.credential.clone().into(),
            self.capacity_bytes.into(),
            self.consumed_bytes.into(),
            self.label.clone().into(),
        ]
    }

    fn from_row(row: &RecordRow) -> MetadataResult<Self> {
        Ok(Self {
            id: row.uuid("id")?,
            kind: ProviderKind::from_code(row.i64("kind")?)?,
            credential: row.text("credential")?,
            capacity_bytes: row.i64("capacity_bytes")?,
            consumed_bytes: row.i64("consumed_bytes")?,
            label: row.opt_text("label")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_eligibility_floor_vs_single_chunk() {
        let provider = Provider {
            consumed_bytes: 9_996_000,
            ..Provider::new(ProviderKind::S3, "{}", 10_000_000)
        };
        assert!(provider.can_fit(4_000));
        assert!(!provider.can_fit(5_000));
        assert!(!provider.is_eligible(5_000_000));
    }

    #[test]
    fn test_provider_debug_redacts_credential() {
        let provider = Provider::new(ProviderKind::Dropbox, "{\"AppSecret\":\"hunter2\"}", 1);
        let debug = format!("{provider:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_values_follow_descriptor_order() {
        let provider = Provider::new(ProviderKind::Filesystem, "{}", 10);
        let values = provider.to_values();
        assert_eq!(values.len(), Provider::TABLE.fields.len());
        assert_eq!(values[1], FieldValue::Integer(ProviderKind::Filesystem.code()));
        assert_eq!(values[5], FieldValue::Null);
    }

    #[test]
    fn test_chunk_names_cover_every_index() {
        let info = ChunkInformation {
            file_name: "a.txt".into(),
            folder_name: "a".into(),
            total_chunks: 3,
            encryption: EncryptionScheme::Plaintext,
            serialized_name: SerializedName::new("s").unwrap(),
            original_bytes: None,
            prepared_at: OffsetDateTime::UNIX_EPOCH,
        };
        let names: Vec<String> = info.chunk_names().unwrap().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["s-0", "s-1", "s-2"]);
    }

    #[test]
    fn test_chunk_names_reject_out_of_range_count() {
        let mut info = ChunkInformation {
            file_name: "a.txt".into(),
            folder_name: "a".into(),
            total_chunks: -1,
            encryption: EncryptionScheme::Plaintext,
            serialized_name: SerializedName::new("s").unwrap(),
            original_bytes: None,
            prepared_at: OffsetDateTime::UNIX_EPOCH,
        };
        assert!(matches!(info.chunk_names(), Err(MetadataError::Decode { .. })));

        info.total_chunks = i64::from(u32::MAX) + 1;
        assert!(matches!(info.chunk_names(), Err(MetadataError::Decode { .. })));
    }
}
