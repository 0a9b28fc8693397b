#![deny(unsafe_code)]

//! scapgate CLI: runs the gateway and inspects its configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use scapgate_config::AppConfig;

/// scapgate: a REST gateway for the OpenSCAP daemon.
#[derive(Parser)]
#[command(name = "scapgate", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "scapgate.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the OpenSCAP daemon and serve the HTTP API.
    Serve,

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.config).await?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_filter(cli.verbose, &config))),
        )
        .init();

    log_loaded(&cli.config, &config);

    match cli.command {
        Commands::Serve => cmd_serve(config).await?,
        Commands::Config { show } => cmd_config(&cli.config, &config, show)?,
    }

    Ok(())
}

/// Report the resolved settings. Overrides are applied before the
/// subscriber exists, so their outcome is logged here.
fn log_loaded(path: &Path, config: &AppConfig) {
    info!(
        path = %path.display(),
        found = path.exists(),
        bus = ?config.daemon.bus,
        service = %config.daemon.service,
        "Configuration loaded"
    );
}

/// `-v` and `-vv` take precedence over the settings file.
fn log_filter(verbose: u8, config: &AppConfig) -> &str {
    match verbose {
        0 => config.log_level(),
        1 => "debug",
        _ => "trace",
    }
}

async fn cmd_serve(config: AppConfig) -> Result<()> {
    let gateway = scapgate_core::Gateway::new(config);
    gateway
        .run()
        .await
        .context("scapgate could not start")?;
    Ok(())
}

fn cmd_config(config_path: &Path, config: &AppConfig, show: bool) -> Result<()> {
    if show {
        let toml_str = toml::to_string_pretty(config).context("cannot render configuration")?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

/// Read the settings file, or fall back to defaults when it does not exist.
/// Environment overrides apply either way.
async fn load_config(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        return AppConfig::load(path)
            .await
            .with_context(|| format!("invalid configuration in '{}'", path.display()));
    }

    let mut config = AppConfig::default();
    config.apply_env_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}
