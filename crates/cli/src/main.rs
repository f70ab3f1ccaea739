//! Command-line interface for coldvault.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use coldvault_core::config::AppConfig;
use coldvault_core::{EncryptionScheme, InputKind, ProviderKind, SerializedName};
use coldvault_metadata::{MetadataStore, TableRegistry};
use coldvault_pipeline::{
    ColdStoragePreparator, DistributionEngine, EncryptionKeys, FileOutcome, ProviderRegistry,
    Restorer,
};
use coldvault_storage::DefaultUploaderFactory;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Encrypt, chunk and spread files across storage providers.
#[derive(Parser, Debug)]
#[command(name = "coldvault")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "COLDVAULT_CONFIG",
        default_value = "config/coldvault.toml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the metadata tables if they are missing
    Init,
    /// Drop every metadata table
    Teardown {
        /// Confirm that all recorded placements should be forgotten
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
    /// Print fresh encryption key material as environment assignments
    Keygen,
    /// Storage provider management
    Provider {
        #[command(subcommand)]
        command: ProviderCommands,
    },
    /// Encrypt and chunk a file or folder into a new staging directory
    Prepare {
        /// File or folder to prepare
        path: PathBuf,
        /// Treat the path as a folder and prepare every file in it
        #[arg(long, default_value_t = false)]
        folder: bool,
        /// Encryption scheme (aes, plaintext)
        #[arg(long, default_value = "aes")]
        scheme: EncryptionScheme,
        /// Chunk size in bytes (overrides configuration)
        #[arg(long)]
        chunk_size: Option<usize>,
    },
    /// Distribute the chunk files of a staging directory across providers
    Upload {
        /// Staging directory produced by `prepare`
        staging_dir: PathBuf,
    },
    /// Download, verify and decrypt a prepared file
    Restore {
        /// Serialized name printed by `prepare`
        serialized_name: String,
        /// Directory receiving the restored file
        destination: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum ProviderCommands {
    /// Register a provider
    Add {
        /// Backend kind (googledrive, dropbox, s3, filesystem)
        #[arg(long)]
        kind: ProviderKind,
        /// Capacity in bytes
        #[arg(long)]
        capacity: i64,
        /// Credential JSON
        #[arg(long, conflicts_with = "credential_file")]
        credential: Option<String>,
        /// File holding the credential JSON
        #[arg(long)]
        credential_file: Option<PathBuf>,
        /// Human-readable label
        #[arg(long)]
        label: Option<String>,
    },
    /// List registered providers
    List,
    /// Change a provider's capacity
    Resize {
        /// Provider id
        id: Uuid,
        /// New capacity in bytes
        capacity: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,coldvault=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Commands::Keygen = cli.command {
        return handle_keygen(&AppConfig::default());
    }

    let config = load_config(&cli.config)?;
    let store = coldvault_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;

    match cli.command {
        Commands::Init => handle_init(store.as_ref()).await,
        Commands::Teardown { yes } => handle_teardown(store.as_ref(), yes).await,
        Commands::Keygen => handle_keygen(&config),
        Commands::Provider { command } => handle_provider_command(command, store).await,
        Commands::Prepare {
            path,
            folder,
            scheme,
            chunk_size,
        } => handle_prepare(&config, store, &path, folder, scheme, chunk_size).await,
        Commands::Upload { staging_dir } => handle_upload(&config, store, &staging_dir).await,
        Commands::Restore {
            serialized_name,
            destination,
        } => handle_restore(&config, store, &serialized_name, &destination).await,
    }
}

/// Load configuration from an optional TOML file, overridden by
/// `COLDVAULT_`-prefixed environment variables.
fn load_config(path: &Path) -> Result<AppConfig> {
    let mut figment = Figment::new();
    if path.exists() {
        tracing::debug!(config_path = %path.display(), "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    }

    let config: AppConfig = figment
        .merge(
            Env::prefixed("COLDVAULT_")
                .ignore(&["config", "encryption_key", "encryption_nonce"])
                .split("__"),
        )
        .extract()
        .context("failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    Ok(config)
}

fn encryption_keys(config: &AppConfig, scheme: EncryptionScheme) -> Result<Option<EncryptionKeys>> {
    match scheme {
        EncryptionScheme::Plaintext => Ok(None),
        EncryptionScheme::Aes => EncryptionKeys::from_env(&config.encryption)
            .map(Some)
            .context("AES needs key material; run `coldvault keygen`"),
    }
}

async fn handle_init(store: &dyn MetadataStore) -> Result<()> {
    TableRegistry::standard()
        .create_tables_if_not_exist(store)
        .await
        .context("failed to create tables")?;
    println!("Metadata tables ready");
    Ok(())
}

async fn handle_teardown(store: &dyn MetadataStore, yes: bool) -> Result<()> {
    if !yes {
        anyhow::bail!("teardown drops every table and forgets all placements; pass --yes to confirm");
    }
    TableRegistry::standard()
        .drop_tables_if_exist(store)
        .await
        .context("failed to drop tables")?;
    println!("Metadata tables dropped");
    Ok(())
}

fn handle_keygen(config: &AppConfig) -> Result<()> {
    let (key, nonce) = EncryptionKeys::generate().to_base64();
    println!("{}={key}", config.encryption.key_env);
    println!("{}={nonce}", config.encryption.nonce_env);
    Ok(())
}

async fn handle_provider_command(
    command: ProviderCommands,
    store: Arc<dyn MetadataStore>,
) -> Result<()> {
    let registry = ProviderRegistry::new(store);
    match command {
        ProviderCommands::Add {
            kind,
            capacity,
            credential,
            credential_file,
            label,
        } => {
            let credential = match (credential, credential_file) {
                (Some(json), _) => json,
                (None, Some(path)) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("failed to read {}", path.display()))?,
                (None, None) => anyhow::bail!("one of --credential or --credential-file is required"),
            };
            let provider = registry
                .register(kind, credential.trim(), capacity, label)
                .await
                .context("failed to register provider")?;
            println!("{}", provider.id);
        }
        ProviderCommands::List => {
            let providers = registry.list().await.context("failed to list providers")?;
            if providers.is_empty() {
                println!("No providers registered");
            }
            for p in providers {
                println!(
                    "{}\t{}\t{}/{}\t{}",
                    p.id,
                    p.kind,
                    p.consumed_bytes,
                    p.capacity_bytes,
                    p.label.as_deref().unwrap_or("-")
                );
            }
        }
        ProviderCommands::Resize { id, capacity } => {
            let provider = registry
                .resize(id, capacity)
                .await
                .context("failed to resize provider")?;
            println!(
                "{}\t{}/{}",
                provider.id, provider.consumed_bytes, provider.capacity_bytes
            );
        }
    }
    Ok(())
}

async fn handle_prepare(
    config: &AppConfig,
    store: Arc<dyn MetadataStore>,
    path: &Path,
    folder: bool,
    scheme: EncryptionScheme,
    chunk_size: Option<usize>,
) -> Result<()> {
    let kind = if folder {
        InputKind::Folder
    } else {
        InputKind::SingleFile
    };
    let mut preparator = ColdStoragePreparator::new(store, config.preparation.clone());
    if let Some(keys) = encryption_keys(config, scheme)? {
        preparator = preparator.with_keys(keys);
    }

    let report = preparator
        .prepare(path, kind, scheme, chunk_size)
        .await
        .with_context(|| format!("failed to prepare {}", path.display()))?;

    println!("staging\t{}", report.staging_dir.display());
    for info in &report.prepared {
        println!(
            "{}\t{}\t{}",
            info.serialized_name, info.total_chunks, info.file_name
        );
    }
    for failure in &report.failed {
        eprintln!("failed\t{}\t{}", failure.path.display(), failure.error);
    }
    if !report.is_complete() {
        anyhow::bail!("{} file(s) could not be prepared", report.failed.len());
    }
    Ok(())
}

async fn handle_upload(
    config: &AppConfig,
    store: Arc<dyn MetadataStore>,
    staging_dir: &Path,
) -> Result<()> {
    let engine = DistributionEngine::new(
        store,
        Arc::new(DefaultUploaderFactory::new()),
        config.distribution.clone(),
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight bookkeeping");
            on_interrupt.cancel();
        }
    });

    let report = engine
        .upload_folder(staging_dir, cancel)
        .await
        .with_context(|| format!("failed to distribute {}", staging_dir.display()))?;

    for (path, outcome) in report.outcomes() {
        match outcome {
            FileOutcome::Uploaded { provider_id, .. } => {
                println!("uploaded\t{}\t{provider_id}", path.display())
            }
            FileOutcome::Failed(e) => println!("failed\t{}\t{e}", path.display()),
            FileOutcome::NotAttempted => println!("skipped\t{}", path.display()),
        }
    }
    let missing = report.len() - report.uploaded();
    if missing > 0 {
        anyhow::bail!("{missing} of {} file(s) were not uploaded", report.len());
    }
    Ok(())
}

async fn handle_restore(
    config: &AppConfig,
    store: Arc<dyn MetadataStore>,
    serialized_name: &str,
    destination: &Path,
) -> Result<()> {
    let serialized = SerializedName::new(serialized_name).context("invalid serialized name")?;
    let mut restorer = Restorer::new(store, Arc::new(DefaultUploaderFactory::new()));
    // Key material is optional here: plaintext files restore without it.
    if let Ok(keys) = EncryptionKeys::from_env(&config.encryption) {
        restorer = restorer.with_keys(keys);
    }
    let restored = restorer
        .restore(&serialized, destination)
        .await
        .with_context(|| format!("failed to restore {serialized_name}"))?;
    println!("{}", restored.display());
    Ok(())
}
