//! hushd: one-time secret link daemon
//!
//! Usage:
//!   hushd [--config /etc/hushlink/config.toml] [serve|sweep|keygen]
//!
//! Commands:
//!   serve   - HTTP API, metrics and background reaper [default]
//!   sweep   - Remove expired and orphaned records once, then exit
//!   keygen  - Print a fresh base64 server key

mod daemon;
mod disposition;
mod http;
mod metrics;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use hush_core::config::HushConfig;
use std::path::Path;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "hushd", version, about = "One-time secret link daemon")]
struct Cli {
    /// Path to config.toml
    #[arg(
        long,
        short = 'c',
        env = "HUSH_CONFIG",
        default_value = "/etc/hushlink/config.toml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides daemon.log_level
    #[arg(long, env = "HUSH_LOG")]
    log: Option<String>,

    /// Log format; overrides daemon.log_format
    #[arg(long, env = "HUSH_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq)]
enum Command {
    /// Run the HTTP daemon (default)
    Serve,
    /// Run one reaper pass and exit
    Sweep,
    /// Print a new random server key
    Keygen,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Serve);

    if command == Command::Keygen {
        let key = hush_crypto::SecretKey::generate();
        println!("{}", hush_crypto::encode_link_key(&key));
        return Ok(());
    }

    // Config is read before logging so its log settings apply; a missing
    // file is reported once the subscriber exists.
    let (config, found) = load_config(&cli.config).await?;

    let level = cli.log.as_deref().unwrap_or(&config.daemon.log_level);
    let format = match cli.log_format {
        Some(format) => format,
        None if config.daemon.log_format == "text" => LogFormat::Text,
        None => LogFormat::Json,
    };
    init_logging(level, format);

    if !found {
        tracing::warn!(
            "config file not found: {}  (using defaults)",
            cli.config.display()
        );
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        command = ?command,
        config = %cli.config.display(),
        "hushd starting"
    );

    match command {
        Command::Serve => daemon::run(config).await,
        Command::Sweep => daemon::sweep_once(config).await.map(|_| ()),
        Command::Keygen => Ok(()),
    }
}

async fn load_config(path: &Path) -> Result<(HushConfig, bool)> {
    if !path.exists() {
        return Ok((HushConfig::default(), false));
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading config {}", path.display()))?;
    let config = HushConfig::from_toml_str(&content)
        .with_context(|| format!("parsing config {}", path.display()))?;
    Ok((config, true))
}

fn init_logging(level: &str, format: LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
        }
    }
}
