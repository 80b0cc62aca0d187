//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result};
use stacshift_core::{AckDecision, handle_event};
use stacshift_fetch::Fetcher;
use stacshift_shared::{
    ChangeSetEvent, config_file_path, init_config, load_config, validate_output_root,
};
use stacshift_store::LocalStore;
use stacshift_transform::LicenseIndex;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// stacshift — republish harvested STAC catalog entries.
#[derive(Parser)]
#[command(
    name = "stacshift",
    version,
    about = "Transform harvested STAC catalog entries for republication.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Process one change-set event against a local object store.
    Run {
        /// Path to the change-set event JSON file.
        event: PathBuf,

        /// Root directory of the local object store (buckets are
        /// subdirectories).
        #[arg(long, default_value = "var/store")]
        store_root: PathBuf,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "stacshift=info",
        1 => "stacshift=debug",
        _ => "stacshift=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run { event, store_root } => cmd_run(&event, &store_root).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

async fn cmd_run(event_path: &Path, store_root: &Path) -> Result<()> {
    let config = load_config()?;
    validate_output_root(&config)?;

    let raw = std::fs::read_to_string(event_path)
        .wrap_err_with(|| format!("reading event file {}", event_path.display()))?;
    let event: ChangeSetEvent = serde_json::from_str(&raw)
        .wrap_err_with(|| format!("parsing event file {}", event_path.display()))?;

    let store = LocalStore::new(store_root);
    let fetcher = Fetcher::new(&config.fetch)?;

    let license_index = match LicenseIndex::load(&store, &config.licenses).await {
        Ok(index) => {
            info!(licenses = index.len(), "loaded canonical license index");
            index
        }
        Err(e) => {
            warn!(error = %e, "license index unavailable, continuing without it");
            LicenseIndex::default()
        }
    };

    let outcome = handle_event(&event, &config, &store, &fetcher, license_index).await?;

    match outcome.decision {
        AckDecision::Ack => info!("event processed, message would be acknowledged"),
        AckDecision::Nack => {
            warn!("transient failures present, message would be redelivered")
        }
    }

    println!("{}", serde_json::to_string_pretty(&outcome.event)?);
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Created config file: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let path = config_file_path()?;

    println!("Config file: {}", path.display());
    if !path.exists() {
        println!("(not present — showing defaults; run `stacshift config init`)");
    }
    println!();
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
