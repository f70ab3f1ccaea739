//! Serialized names and chunk file naming.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque, collision-resistant identifier assigned to a prepared file.
///
/// It prefixes every chunk file of that file and joins chunk metadata rows to
/// placement rows.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SerializedName(String);

impl SerializedName {
    /// Generate a fresh random name.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an existing name, rejecting blank values.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "serialized name must not be blank".to_string(),
            ));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of chunk `index` of this file.
    pub fn chunk(&self, index: u32) -> ChunkName {
        ChunkName {
            serialized: self.clone(),
            index,
        }
    }
}

impl fmt::Display for SerializedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of one chunk: `{serialized}-{index}`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChunkName {
    pub serialized: SerializedName,
    pub index: u32,
}

impl ChunkName {
    /// Parse a chunk identity, accepting a trailing file extension.
    ///
    /// The serialized part may itself contain hyphens, so the index is taken
    /// from after the last one.
    pub fn parse(s: &str) -> Result<Self> {
        let stem = match s.rsplit_once('.') {
            Some((stem, _ext)) => stem,
            None => s,
        };
        let (serialized, index) = stem
            .rsplit_once('-')
            .ok_or_else(|| Error::InvalidChunkName(s.to_string()))?;
        let index = index
            .parse::<u32>()
            .map_err(|_| Error::InvalidChunkName(s.to_string()))?;
        let serialized =
            SerializedName::new(serialized).map_err(|_| Error::InvalidChunkName(s.to_string()))?;
        Ok(Self { serialized, index })
    }

    /// File name of this chunk in a staging directory.
    pub fn file_name(&self, extension: &str) -> String {
        format!("{}.{}", self, extension)
    }
}

impl fmt::Display for ChunkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.serialized, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_names_are_unique() {
        let a = SerializedName::generate();
        let b = SerializedName::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_chunk_file_name() {
        let name = SerializedName::new("abc").unwrap();
        assert_eq!(name.chunk(3).to_string(), "abc-3");
        assert_eq!(name.chunk(0).file_name("shas"), "abc-0.shas");
    }

    #[test]
    fn test_chunk_name_parse_with_hyphenated_uuid() {
        let name = SerializedName::generate();
        let file = name.chunk(12).file_name("shas");
        let parsed = ChunkName::parse(&file).unwrap();
        assert_eq!(parsed.serialized, name);
        assert_eq!(parsed.index, 12);
    }

    #[test]
    fn test_chunk_name_parse_rejects_garbage() {
        assert!(ChunkName::parse("noindex.shas").is_err());
        assert!(ChunkName::parse("abc-x.shas").is_err());
        assert!(ChunkName::parse("-1").is_err());
    }

    #[test]
    fn test_blank_serialized_name_rejected() {
        assert!(SerializedName::new("  ").is_err());
    }
}
