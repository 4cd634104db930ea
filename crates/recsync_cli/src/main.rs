//! recsync CLI
//!
//! Command-line harness that runs the synchronizer against in-memory
//! stores.
//!
//! # Commands
//!
//! - `demo` - Bootstrap, touch a few records, run a few ticks
//! - `full` - Run one full sync and print its report
//! - `run` - Run the scheduler while records change in the background

mod commands;
mod settings;

use clap::{Parser, Subcommand, ValueEnum};
use recsync_engine::FullSyncMode;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Source → target record synchronizer.
#[derive(Parser)]
#[command(name = "recsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Page size for paginated full sync
    #[arg(global = true, long)]
    batch_size: Option<u64>,

    /// Milliseconds between scheduler ticks
    #[arg(global = true, long)]
    interval_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bootstrap a target, touch records, then run delta ticks
    Demo {
        /// Number of records in the source
        #[arg(short, long, default_value = "25")]
        records: usize,

        /// Number of records to modify after the bootstrap
        #[arg(short, long, default_value = "5")]
        touch: usize,

        /// Number of ticks to run
        #[arg(long, default_value = "2")]
        ticks: u32,
    },

    /// Run a single full sync
    Full {
        /// Full sync strategy
        #[arg(short, long, value_enum, default_value = "paginated")]
        mode: Mode,

        /// Number of records in the source
        #[arg(short, long, default_value = "1000")]
        records: usize,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Run the scheduler while records change in the background
    Run {
        /// Number of records in the source
        #[arg(short, long, default_value = "100")]
        records: usize,

        /// Stop after this many seconds (runs until Ctrl-C if omitted)
        #[arg(short, long)]
        seconds: Option<u64>,

        /// Milliseconds between background record changes
        #[arg(short, long, default_value = "500")]
        touch_every: u64,
    },
}

/// Full sync strategy.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Naive,
    Paginated,
}

impl From<Mode> for FullSyncMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Naive => FullSyncMode::Naive,
            Mode::Paginated => FullSyncMode::Paginated,
        }
    }
}

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let overrides = settings::Overrides {
        batch_size: cli.batch_size,
        interval_ms: cli.interval_ms,
    };
    let config = settings::load(cli.config.as_deref(), &overrides)?;

    match cli.command {
        Commands::Demo {
            records,
            touch,
            ticks,
        } => commands::demo::run(config, records, touch, ticks).await?,
        Commands::Full {
            mode,
            records,
            format,
        } => commands::full::run(config, mode.into(), records, format).await?,
        Commands::Run {
            records,
            seconds,
            touch_every,
        } => commands::run::run(config, records, seconds, touch_every).await?,
    }

    Ok(())
}
