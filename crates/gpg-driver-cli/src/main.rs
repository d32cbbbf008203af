//! gpg-driver - command-line front end
//!
//! Runs encrypt, decrypt, sign, verify and key management through the
//! `gpg-driver` library, against the keyring of a configurable gpg home
//! directory.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gpg_driver::{AbortHandle, Gpg, GpgConfig};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;

/// gpg-driver - drive GnuPG from the command line
#[derive(Parser, Debug)]
#[command(name = "gpg-driver")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// gpg home directory (overrides the configuration file)
    #[arg(long)]
    homedir: Option<PathBuf>,

    /// gpg executable (overrides the configuration file)
    #[arg(long)]
    gpg: Option<PathBuf>,

    /// Per-invocation timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    // === Data operations ===
    /// Encrypt (and optionally sign) data
    Encrypt(commands::crypto::EncryptArgs),

    /// Decrypt (and optionally verify) data
    Decrypt(commands::crypto::DecryptArgs),

    /// Sign data
    Sign(commands::crypto::SignArgs),

    /// Verify signed data
    Verify(commands::crypto::VerifyArgs),

    // === Key management ===
    /// Import keys
    Import(commands::keys::ImportArgs),

    /// Export a public or secret key
    Export(commands::keys::ExportArgs),

    /// Delete a public or secret key
    Delete(commands::keys::DeleteArgs),

    /// List keys
    #[command(alias = "ls")]
    List(commands::keys::ListArgs),

    /// Print the fingerprint of a key
    Fingerprint {
        /// Key id, fingerprint or user id
        key_id: String,
    },

    /// Generate a key pair
    Generate(commands::keys::GenerateArgs),
}

fn load_config(cli: &Cli) -> Result<GpgConfig> {
    let mut config = match &cli.config {
        Some(path) => GpgConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => GpgConfig::default(),
    };
    if let Some(homedir) = &cli.homedir {
        config = config.with_homedir(homedir.clone());
    }
    if let Some(binary) = &cli.gpg {
        config = config.with_binary(binary.clone());
    }
    if let Some(secs) = cli.timeout {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();

    let config = load_config(&cli)?;
    debug!(?config, "configuration loaded");

    let abort = AbortHandle::new();
    let gpg = Gpg::new(config)
        .context("invalid configuration")?
        .with_abort(&abort);
    let json = cli.json;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    rt.block_on(async move {
        // Ctrl-C terminates the running gpg instead of orphaning it.
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                abort.abort();
            }
        });

        match cli.command {
            Commands::Encrypt(args) => commands::crypto::encrypt(&gpg, &args).await,
            Commands::Decrypt(args) => commands::crypto::decrypt(&gpg, &args, json).await,
            Commands::Sign(args) => commands::crypto::sign(&gpg, &args).await,
            Commands::Verify(args) => commands::crypto::verify(&gpg, &args, json).await,
            Commands::Import(args) => commands::keys::import(&gpg, &args, json).await,
            Commands::Export(args) => commands::keys::export(&gpg, &args).await,
            Commands::Delete(args) => commands::keys::delete(&gpg, &args).await,
            Commands::List(args) => commands::keys::list(&gpg, &args, json).await,
            Commands::Fingerprint { key_id } => commands::keys::fingerprint(&gpg, &key_id).await,
            Commands::Generate(args) => commands::keys::generate(&gpg, &args, json).await,
        }
    })
}
