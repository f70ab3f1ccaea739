//! Static record descriptors and dynamically typed field values.
//!
//! Each persisted type declares its table once as a [`TableDescriptor`]. The
//! descriptor drives schema derivation, sparse inserts, predicate validation
//! and row decoding, so the store never inspects types at runtime.

use crate::error::{MetadataError, MetadataResult};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Logical type of a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    /// Closed enumeration persisted as its integer code.
    Enum,
    Text,
    Boolean,
    Float,
    Timestamp,
    Uuid,
    /// A field whose Rust type has no column mapping. Schema derivation fails
    /// on it, naming the type.
    Unmapped(&'static str),
}

impl FieldType {
    /// Name used in diagnostics.
    pub fn type_name(self) -> &'static str {
        match self {
            FieldType::Integer => "i64",
            FieldType::Enum => "enum",
            FieldType::Text => "String",
            FieldType::Boolean => "bool",
            FieldType::Float => "f64",
            FieldType::Timestamp => "OffsetDateTime",
            FieldType::Uuid => "Uuid",
            FieldType::Unmapped(name) => name,
        }
    }
}

/// One declared field of a record.
#[derive(Clone, Copy, Debug)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub ty: FieldType,
    /// Optional fields are left out of inserts when null or blank.
    pub optional: bool,
    /// Identifies the row: the column gets a `UNIQUE` constraint.
    pub unique: bool,
}

impl FieldDescriptor {
    pub const fn required(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            optional: false,
            unique: false,
        }
    }

    pub const fn optional(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            optional: true,
            unique: false,
        }
    }

    /// A required field no two rows may share.
    pub const fn unique(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            optional: false,
            unique: true,
        }
    }
}

/// Table name plus fields in declaration order.
#[derive(Debug)]
pub struct TableDescriptor {
    pub name: &'static str,
    pub fields: &'static [FieldDescriptor],
}

impl TableDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Look up a column, failing with [`MetadataError::UnknownColumn`].
    pub fn require_field(&self, name: &str) -> MetadataResult<&FieldDescriptor> {
        self.field(name).ok_or_else(|| MetadataError::UnknownColumn {
            table: self.name,
            column: name.to_string(),
        })
    }

    /// Fail fast on the first field without a column mapping.
    pub fn check_supported(&self) -> MetadataResult<()> {
        match self
            .fields
            .iter()
            .find(|f| matches!(f.ty, FieldType::Unmapped(_)))
        {
            Some(field) => Err(MetadataError::UnsupportedType {
                table: self.name,
                field: field.name,
                rust_type: field.ty.type_name(),
            }),
            None => Ok(()),
        }
    }

    /// Comma-separated column list in declaration order.
    pub fn column_list(&self) -> String {
        self.fields
            .iter()
            .map(|f| f.name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A single field value.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Text(String),
    Boolean(bool),
    Float(f64),
    Timestamp(OffsetDateTime),
    Uuid(Uuid),
}

impl FieldValue {
    /// Null, or text that is empty after trimming.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Whether this value can be stored in a column of type `ty`.
    pub fn fits(&self, ty: FieldType) -> bool {
        matches!(
            (self, ty),
            (FieldValue::Null, _)
                | (FieldValue::Integer(_), FieldType::Integer | FieldType::Enum)
                | (FieldValue::Text(_), FieldType::Text)
                | (FieldValue::Boolean(_), FieldType::Boolean)
                | (FieldValue::Float(_), FieldType::Float)
                | (FieldValue::Timestamp(_), FieldType::Timestamp)
                | (FieldValue::Uuid(_), FieldType::Uuid)
        )
    }

    /// Literal SQL form, used only for display and logging.
    pub fn literal(&self) -> String {
        match self {
            FieldValue::Null => "null".to_string(),
            FieldValue::Integer(v) => format!("'{v}'"),
            FieldValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
            FieldValue::Boolean(b) => format!("'{b}'"),
            FieldValue::Float(v) => format!("'{v}'"),
            FieldValue::Timestamp(ts) => format!("'{ts}'"),
            FieldValue::Uuid(id) => format!("'{id}'"),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.literal())
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Boolean(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<OffsetDateTime> for FieldValue {
    fn from(v: OffsetDateTime) -> Self {
        FieldValue::Timestamp(v)
    }
}

impl From<Uuid> for FieldValue {
    fn from(v: Uuid) -> Self {
        FieldValue::Uuid(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(FieldValue::Null, Into::into)
    }
}

/// One fetched row, values in descriptor order.
///
/// This is the cursor handed to row deserializers; accessors are by column
/// name and check the stored variant.
#[derive(Clone, Debug)]
pub struct RecordRow {
    table: &'static TableDescriptor,
    values: Vec<FieldValue>,
}

impl RecordRow {
    pub fn new(table: &'static TableDescriptor, values: Vec<FieldValue>) -> Self {
        Self { table, values }
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    pub fn get(&self, column: &str) -> MetadataResult<&FieldValue> {
        let index = self
            .table
            .position(column)
            .ok_or_else(|| MetadataError::UnknownColumn {
                table: self.table.name,
                column: column.to_string(),
            })?;
        self.values
            .get(index)
            .ok_or_else(|| self.decode_error(column, "row is shorter than its descriptor"))
    }

    pub fn i64(&self, column: &str) -> MetadataResult<i64> {
        match self.get(column)? {
            FieldValue::Integer(v) => Ok(*v),
            other => Err(self.mismatch(column, "integer", other)),
        }
    }

    pub fn text(&self, column: &str) -> MetadataResult<String> {
        match self.get(column)? {
            FieldValue::Text(v) => Ok(v.clone()),
            other => Err(self.mismatch(column, "text", other)),
        }
    }

    pub fn opt_text(&self, column: &str) -> MetadataResult<Option<String>> {
        match self.get(column)? {
            FieldValue::Null => Ok(None),
            FieldValue::Text(v) => Ok(Some(v.clone())),
            other => Err(self.mismatch(column, "text", other)),
        }
    }

    pub fn opt_i64(&self, column: &str) -> MetadataResult<Option<i64>> {
        match self.get(column)? {
            FieldValue::Null => Ok(None),
            FieldValue::Integer(v) => Ok(Some(*v)),
            other => Err(self.mismatch(column, "integer", other)),
        }
    }

    pub fn bool(&self, column: &str) -> MetadataResult<bool> {
        match self.get(column)? {
            FieldValue::Boolean(v) => Ok(*v),
            other => Err(self.mismatch(column, "boolean", other)),
        }
    }

    pub fn f64(&self, column: &str) -> MetadataResult<f64> {
        match self.get(column)? {
            FieldValue::Float(v) => Ok(*v),
            other => Err(self.mismatch(column, "float", other)),
        }
    }

    pub fn timestamp(&self, column: &str) -> MetadataResult<OffsetDateTime> {
        match self.get(column)? {
            FieldValue::Timestamp(v) => Ok(*v),
            other => Err(self.mismatch(column, "timestamp", other)),
        }
    }

    pub fn uuid(&self, column: &str) -> MetadataResult<Uuid> {
        match self.get(column)? {
            FieldValue::Uuid(v) => Ok(*v),
            other => Err(self.mismatch(column, "uuid", other)),
        }
    }

    fn mismatch(&self, column: &str, expected: &str, got: &FieldValue) -> MetadataError {
        self.decode_error(column, &format!("expected {expected}, found {got:?}"))
    }

    fn decode_error(&self, column: &str, reason: &str) -> MetadataError {
        MetadataError::Decode {
            table: self.table.name,
            column: column.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A type persisted as one row of its own table.
pub trait Record: Sized + Send + Sync {
    /// Static table declaration.
    const TABLE: &'static TableDescriptor;

    /// Field values in descriptor order.
    fn to_values(&self) -> Vec<FieldValue>;

    /// Default row deserializer.
    fn from_row(row: &RecordRow) -> MetadataResult<Self>;
}
