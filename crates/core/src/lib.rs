//! Core domain types and shared logic for coldvault.
//!
//! This crate defines the vocabulary used across all other crates:
//! - Payload chunking
//! - Serialized names and chunk file naming
//! - Encryption schemes and provider backend kinds
//! - Configuration shared by the metadata, pipeline and CLI crates

pub mod chunk;
pub mod config;
pub mod error;
pub mod kinds;
pub mod naming;

pub use chunk::{Chunks, chunk, chunk_count};
pub use error::{Error, Result};
pub use kinds::{EncryptionScheme, InputKind, ProviderKind};
pub use naming::{ChunkName, SerializedName};

/// Default chunk size: 1,000,000 bytes of encoded payload.
pub const DEFAULT_CHUNK_SIZE: usize = 1_000_000;

/// Default minimum free space a provider needs to take part in a batch.
pub const DEFAULT_BATCH_ELIGIBILITY_FLOOR: i64 = 5_000_000;

/// Default space assumed for a single chunk when picking a provider.
pub const DEFAULT_PER_CHUNK_REQUIRED_SPACE: i64 = 1_000_000;

/// Default extension for chunk files in a staging directory.
pub const DEFAULT_CHUNK_EXTENSION: &str = "shas";
