//! Command-line interface definitions for vortex-core.
//!
//! Uses clap's derive API for type-safe argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::bridge::{DEFAULT_DELAY_TIMEOUT_MS, DEFAULT_DELAY_URL};

/// Supervisor for a locally-run mihomo proxy engine.
///
/// vortex-core launches the engine, watches it, derives live bandwidth rates
/// from its control API and exposes everything to a UI layer over a JSON
/// message bridge.
#[derive(Parser, Debug)]
#[command(name = "vortex-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to an additional settings file.
    ///
    /// Merged on top of the user settings file.
    #[arg(short = 's', long = "settings", value_name = "PATH", global = true)]
    pub settings: Option<PathBuf>,

    /// Increase log verbosity.
    ///
    /// Can be specified multiple times:
    /// -v    = info level
    /// -vv   = debug level
    /// -vvv  = trace level
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

/// Subcommands for vortex-core.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the engine in the foreground and print events as JSON lines.
    ///
    /// Stops the engine on Ctrl-C or when it dies.
    Run {
        /// Engine working directory (holds the engine binary).
        #[arg(short = 'w', long = "work-dir", value_name = "DIR")]
        work_dir: PathBuf,

        /// Engine configuration file.
        #[arg(short = 'c', long = "config", value_name = "PATH")]
        config: PathBuf,
    },

    /// Serve the bridge protocol over stdin/stdout.
    Bridge {
        /// Engine working directory (holds the engine binary).
        #[arg(short = 'w', long = "work-dir", value_name = "DIR")]
        work_dir: PathBuf,
    },

    /// One-shot query against an already running engine.
    Query {
        /// Engine configuration file used to locate the control API.
        #[arg(short = 'c', long = "config", value_name = "PATH")]
        config: Option<PathBuf>,

        /// What to query.
        #[command(subcommand)]
        kind: QueryKind,
    },
}

/// Queries available through `vortex-core query`.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum QueryKind {
    /// Engine version.
    Version,
    /// Current traffic counters.
    Traffic,
    /// Active connections (raw JSON).
    Connections,
    /// Latency of a proxy.
    Delay {
        /// Proxy name.
        name: String,

        /// URL the engine probes through the proxy.
        #[arg(long, default_value = DEFAULT_DELAY_URL)]
        url: String,

        /// Probe timeout in milliseconds.
        #[arg(long, default_value_t = DEFAULT_DELAY_TIMEOUT_MS)]
        timeout: u64,
    },
}
