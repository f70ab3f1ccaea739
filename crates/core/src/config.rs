//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database file (recommended for single-machine use and tests).
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
    /// PostgreSQL database.
    Postgres {
        /// Connection URL (optional if using individual fields).
        /// Takes precedence over individual fields if both are provided.
        url: Option<String>,
        /// Database host.
        host: Option<String>,
        /// Database port (default: 5432).
        #[serde(default = "default_pg_port")]
        port: Option<u16>,
        /// Database username.
        username: Option<String>,
        /// Database password.
        /// WARNING: Prefer COLDVAULT_METADATA__PASSWORD over storing it in a file.
        password: Option<String>,
        /// Database name.
        database: Option<String>,
        /// Maximum connections in the pool.
        #[serde(default = "default_max_connections")]
        max_connections: u32,
    },
}

fn default_max_connections() -> u32 {
    10
}

fn default_pg_port() -> Option<u16> {
    Some(5432)
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/coldvault.db"),
        }
    }
}

impl MetadataConfig {
    /// Validate metadata configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            MetadataConfig::Sqlite { .. } => Ok(()),
            MetadataConfig::Postgres {
                url,
                host,
                database,
                ..
            } => match (url.as_ref(), host.as_ref(), database.as_ref()) {
                (Some(_), _, _) => Ok(()),
                (None, Some(_), Some(_)) => Ok(()),
                (None, None, _) => Err(
                    "postgres config requires either 'url' or 'host' + 'database'".to_string(),
                ),
                (None, Some(_), None) => Err(
                    "postgres config requires 'database' when using individual fields".to_string(),
                ),
            },
        }
    }
}

/// Settings for turning input files into staged chunk files.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PreparationConfig {
    /// Size of each chunk of encoded payload, in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Directory under which per-batch staging directories are created.
    #[serde(default = "default_staging_root")]
    pub staging_root: PathBuf,
    /// Extension appended to chunk file names.
    #[serde(default = "default_chunk_extension")]
    pub chunk_extension: String,
    /// Files prepared concurrently. Defaults to the number of processing units.
    #[serde(default)]
    pub max_parallel_files: Option<usize>,
}

fn default_chunk_size() -> usize {
    crate::DEFAULT_CHUNK_SIZE
}

fn default_staging_root() -> PathBuf {
    PathBuf::from("./data/staging")
}

fn default_chunk_extension() -> String {
    crate::DEFAULT_CHUNK_EXTENSION.to_string()
}

impl Default for PreparationConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            staging_root: default_staging_root(),
            chunk_extension: default_chunk_extension(),
            max_parallel_files: None,
        }
    }
}

impl PreparationConfig {
    pub fn parallelism(&self) -> usize {
        self.max_parallel_files.unwrap_or_else(available_parallelism).max(1)
    }

    /// Validate preparation configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("preparation.chunk_size must be positive".to_string());
        }
        let ext = self.chunk_extension.trim();
        if ext.is_empty() || ext.contains(['.', '/', '\\']) {
            return Err(format!(
                "preparation.chunk_extension '{}' must be a bare, non-empty extension",
                self.chunk_extension
            ));
        }
        Ok(())
    }
}

/// Settings for spreading staged chunks across providers.
///
/// `batch_eligibility_floor` gates which providers take part in a batch;
/// `per_chunk_required_space` is what a chunk must fit into when one is picked.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DistributionConfig {
    /// Minimum free bytes a provider needs to be fetched for a batch.
    #[serde(default = "default_batch_eligibility_floor")]
    pub batch_eligibility_floor: i64,
    /// Free bytes a provider must have for one chunk during selection.
    #[serde(default = "default_per_chunk_required_space")]
    pub per_chunk_required_space: i64,
    /// Uploads in flight at once. Defaults to the number of processing units.
    #[serde(default)]
    pub max_parallel_uploads: Option<usize>,
    /// Attempts made to fetch eligible providers before giving up.
    #[serde(default = "default_provider_fetch_attempts")]
    pub provider_fetch_attempts: u32,
    /// Base delay of the exponential backoff between provider fetch attempts.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

fn default_batch_eligibility_floor() -> i64 {
    crate::DEFAULT_BATCH_ELIGIBILITY_FLOOR
}

fn default_per_chunk_required_space() -> i64 {
    crate::DEFAULT_PER_CHUNK_REQUIRED_SPACE
}

fn default_provider_fetch_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            batch_eligibility_floor: default_batch_eligibility_floor(),
            per_chunk_required_space: default_per_chunk_required_space(),
            max_parallel_uploads: None,
            provider_fetch_attempts: default_provider_fetch_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

impl DistributionConfig {
    pub fn parallelism(&self) -> usize {
        self.max_parallel_uploads
            .unwrap_or_else(available_parallelism)
            .max(1)
    }

    /// Delay before retry number `attempt` (1-based): base * 2^(attempt - 1).
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.retry_base_delay_ms.saturating_mul(factor))
    }

    /// Validate distribution configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_eligibility_floor < 0 {
            return Err("distribution.batch_eligibility_floor must not be negative".to_string());
        }
        if self.per_chunk_required_space < 0 {
            return Err("distribution.per_chunk_required_space must not be negative".to_string());
        }
        if self.provider_fetch_attempts == 0 {
            return Err("distribution.provider_fetch_attempts must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Where encryption key material comes from.
///
/// Only environment variable names live here; the key and nonce themselves
/// are never read from a configuration file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EncryptionConfig {
    /// Variable holding the base64 encoded 256-bit key.
    #[serde(default = "default_key_env")]
    pub key_env: String,
    /// Variable holding the base64 encoded 96-bit nonce.
    #[serde(default = "default_nonce_env")]
    pub nonce_env: String,
}

fn default_key_env() -> String {
    "COLDVAULT_ENCRYPTION_KEY".to_string()
}

fn default_nonce_env() -> String {
    "COLDVAULT_ENCRYPTION_NONCE".to_string()
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            key_env: default_key_env(),
            nonce_env: default_nonce_env(),
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Metadata store configuration.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Preparation configuration.
    #[serde(default)]
    pub preparation: PreparationConfig,
    /// Distribution configuration.
    #[serde(default)]
    pub distribution: DistributionConfig,
    /// Encryption key sources.
    #[serde(default)]
    pub encryption: EncryptionConfig,
}

impl AppConfig {
    /// Create a test configuration rooted in `dir`.
    ///
    /// **For testing only.** Uses a SQLite file, a staging directory inside
    /// `dir`, no retry delay and two workers.
    pub fn for_testing(dir: &std::path::Path) -> Self {
        Self {
            metadata: MetadataConfig::Sqlite {
                path: dir.join("coldvault.db"),
            },
            preparation: PreparationConfig {
                staging_root: dir.join("staging"),
                max_parallel_files: Some(2),
                ..PreparationConfig::default()
            },
            distribution: DistributionConfig {
                max_parallel_uploads: Some(2),
                retry_base_delay_ms: 0,
                ..DistributionConfig::default()
            },
            encryption: EncryptionConfig::default(),
        }
    }

    /// Validate every section, returning the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        self.metadata.validate()?;
        self.preparation.validate()?;
        self.distribution.validate()?;
        Ok(())
    }
}

/// Number of processing units, falling back to 4 when it cannot be queried.
pub fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
