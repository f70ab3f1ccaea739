//! The coldvault pipeline: prepare files into encrypted chunks, distribute
//! the chunks across storage providers by capacity, and restore them.

pub mod checksum;
pub mod distributor;
pub mod encryption;
pub mod error;
pub mod preparator;
pub mod providers;
pub mod restore;

pub use distributor::{BatchReport, DistributionEngine, FileOutcome};
pub use encryption::{AesGcmEncryptor, EncryptionKeys, Encryptor, PlaintextEncryptor, encryptor_for};
pub use error::{PipelineError, PipelineResult};
pub use preparator::{ColdStoragePreparator, PreparationFailure, PreparationReport};
pub use providers::ProviderRegistry;
pub use restore::Restorer;
