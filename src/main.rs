//! vortex-core: supervisor for a locally-run mihomo proxy engine
//!
//! This is the main entry point for the vortex-core binary. It handles CLI
//! argument parsing, settings loading and tracing initialization, then hands
//! off to the subcommand.
//!
//! # I/O Architecture
//!
//! - **stdout**: Reserved for machine-readable output (bridge responses,
//!   events, query results)
//! - **stderr**: Diagnostic logging via `tracing`

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;
use vortex_core::{cli::Cli, cli_handler, config::SettingsLoader};

fn main() -> Result<()> {
    // Parse CLI arguments first (before any other initialization)
    let cli = Cli::parse();

    init_tracing(cli.verbose)?;

    debug!("Parsed CLI arguments: {:?}", cli);

    let settings = SettingsLoader::new()
        .load(cli.settings.as_deref())
        .context("Failed to load settings")?;

    debug!("Loaded settings: {:?}", settings);

    cli_handler::handle_command(cli.command, settings)
}

/// Initialize the tracing subscriber for diagnostic logging.
///
/// # Verbosity Levels
/// - 0 (default): `RUST_LOG` if set, otherwise warnings and errors
/// - 1 (-v): Info level
/// - 2 (-vv): Debug level
/// - 3+ (-vvv): Trace level
fn init_tracing(verbose: u8) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}
