//! Stamp CLI - batch text and logo watermarking for image folders.
//!
//! # Usage
//!
//! ```bash
//! # Copyright line on every image in a folder
//! stamp apply ./photos --copyright "Jane Doe" -o ./out
//!
//! # Tiled proof mark plus a logo, PNG output, JSON report
//! stamp apply ./photos --text PROOF --tile --logo logo.png --format png --report report.json
//!
//! # Save and reuse settings
//! stamp profile new "Client proofs" --text PROOF --tile --opacity 0.3
//! stamp apply ./photos --profile client-proofs
//!
//! # View configuration
//! stamp config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Stamp - batch text and logo watermarking.
#[derive(Parser, Debug)]
#[command(name = "stamp")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watermark images and write copies to an output directory
    Apply(cli::apply::ApplyArgs),

    /// Create, inspect and validate saved watermark profiles
    Profile(cli::profile::ProfileArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = match stamp_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `stamp config path`."
            );
            stamp_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Stamp v{}", stamp_core::VERSION);

    match cli.command {
        Commands::Apply(args) => cli::apply::execute(args, config).await,
        Commands::Profile(args) => cli::profile::execute(args, &config),
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
