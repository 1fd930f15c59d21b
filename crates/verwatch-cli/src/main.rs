//! verwatch CLI - track the version your services are running

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;
mod config;
mod error;
mod exit_codes;

use error::{CliError, Result};

#[derive(Parser)]
#[command(name = "verwatch")]
#[command(author = "verwatch Contributors")]
#[command(version)]
#[command(about = "Track the deployed version of your services", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a service file
    Check {
        /// Service file
        file: PathBuf,
    },

    /// Query the deployed version once
    Query {
        /// Service file
        file: PathBuf,

        /// Version to apply (manual lookups)
        #[arg(long)]
        set_version: Option<String>,

        /// Output the version record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Query with overrides, leaving the service untouched
    Refresh {
        /// Service file
        file: PathBuf,

        /// JSON object of deployed_version fields to override
        #[arg(long)]
        overrides: Option<String>,

        /// Semantic versioning override (true, false or null)
        #[arg(long)]
        semantic_versioning: Option<String>,
    },

    /// Track the deployed version until interrupted
    Track {
        /// Service file
        file: PathBuf,

        /// Print Prometheus metrics on exit
        #[arg(long)]
        metrics: bool,
    },

    /// Show the lookup config (secrets hidden)
    Show {
        /// Service file
        file: PathBuf,

        /// Output as JSON instead of YAML
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(debug: bool) {
    let filter = if debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .without_time(),
        )
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::internal(format!("failed to start runtime: {}", e)))?;

    match cli.command {
        Commands::Check { file } => commands::check::run(&file),

        Commands::Query {
            file,
            set_version,
            json,
        } => runtime.block_on(commands::query::run(&file, set_version.as_deref(), json)),

        Commands::Refresh {
            file,
            overrides,
            semantic_versioning,
        } => runtime.block_on(commands::refresh::run(
            &file,
            overrides.as_deref(),
            semantic_versioning.as_deref(),
        )),

        Commands::Track { file, metrics } => runtime.block_on(commands::track::run(&file, metrics)),

        Commands::Show { file, json } => commands::show::run(&file, json),
    }
}

fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Err(err) = run(cli) {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
