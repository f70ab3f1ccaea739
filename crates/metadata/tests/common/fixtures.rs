//! Record fixtures.

use coldvault_core::{EncryptionScheme, ProviderKind, SerializedName};
use coldvault_metadata::{
    ChunkInformation, FieldDescriptor, FieldType, FieldValue, MetadataResult, Placement, Provider,
    Record, RecordRow, TableDescriptor,
};
use time::OffsetDateTime;
use uuid::Uuid;

/// Current time truncated to whole seconds so it survives every backend.
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
        .replace_nanosecond(0)
        .expect("zero nanoseconds is valid")
}

pub fn chunk_information(file_name: &str, folder: &str, total_chunks: i64) -> ChunkInformation {
    ChunkInformation {
        file_name: file_name.to_string(),
        folder_name: folder.to_string(),
        total_chunks,
        encryption: EncryptionScheme::Aes,
        serialized_name: SerializedName::generate(),
        original_bytes: Some(1234),
        prepared_at: now(),
    }
}

pub fn placement(chunk_name: &str, provider_id: Uuid) -> Placement {
    Placement {
        chunk_name: chunk_name.to_string(),
        provider_id,
        remote_id: Some(format!("remote/{chunk_name}")),
        size_bytes: 1000,
        checksum: None,
        placed_at: now(),
    }
}

pub fn provider(capacity: i64, consumed: i64) -> Provider {
    Provider {
        consumed_bytes: consumed,
        ..Provider::new(ProviderKind::Filesystem, r#"{"Root":"/tmp/x"}"#, capacity)
    }
}

/// Record touching every supported column type.
#[derive(Debug, Clone, PartialEq)]
pub struct Specimen {
    pub id: Uuid,
    pub count: i64,
    pub kind: ProviderKind,
    pub name: String,
    pub active: bool,
    pub ratio: f64,
    pub seen_at: OffsetDateTime,
    pub note: Option<String>,
}

impl Specimen {
    pub fn sample() -> Self {
        Self {
            id: Uuid::new_v4(),
            count: -42,
            kind: ProviderKind::Dropbox,
            name: "it's a name".to_string(),
            active: true,
            ratio: 0.125,
            seen_at: now(),
            note: None,
        }
    }
}

impl Record for Specimen {
    const TABLE: &'static TableDescriptor = &TableDescriptor {
        name: "specimen",
        fields: &[
            FieldDescriptor::required("id", FieldType::Uuid),
            FieldDescriptor::required("count", FieldType::Integer),
            FieldDescriptor::required("kind", FieldType::Enum),
            FieldDescriptor::required("name", FieldType::Text),
            FieldDescriptor::required("active", FieldType::Boolean),
            FieldDescriptor::required("ratio", FieldType::Float),
            FieldDescriptor::required("seen_at", FieldType::Timestamp),
            FieldDescriptor::optional("note", FieldType::Text),
        ],
    };

    fn to_values(&self) -> Vec<FieldValue> {
        vec![
            self.id.into(),
            self.count.into(),
            self.kind.code().into(),
            self.name.clone().into(),
            self.active.into(),
            self.ratio.into(),
            self.seen_at.into(),
            self.note.clone().into(),
        ]
    }

    fn from_row(row: &RecordRow) -> MetadataResult<Self> {
        Ok(Self {
            id: row.uuid("id")?,
            count: row.i64("count")?,
            kind: ProviderKind::from_code(row.i64("kind")?)?,
            name: row.text("name")?,
            active: row.bool("active")?,
            ratio: row.f64("ratio")?,
            seen_at: row.timestamp("seen_at")?,
            note: row.opt_text("note")?,
        })
    }
}

/// Record with a field type the store cannot map.
pub struct Unmappable;

impl Record for Unmappable {
    const TABLE: &'static TableDescriptor = &TableDescriptor {
        name: "unmappable",
        fields: &[
            FieldDescriptor::required("id", FieldType::Integer),
            FieldDescriptor::required("tags", FieldType::Unmapped("Vec<String>")),
        ],
    };

    fn to_values(&self) -> Vec<FieldValue> {
        vec![FieldValue::Integer(1), FieldValue::Null]
    }

    fn from_row(_row: &RecordRow) -> MetadataResult<Self> {
        Ok(Self)
    }
}
