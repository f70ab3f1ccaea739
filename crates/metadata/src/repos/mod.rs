//! Repository traits for metadata operations.

pub mod providers;
pub mod records;

pub use providers::ProviderRepo;
pub use records::RecordRepo;
