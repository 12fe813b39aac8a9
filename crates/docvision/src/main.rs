//! Docvision CLI - document classification, parsing and matching services
//! backed by vision LLMs.
//!
//! Each service accepts base64 document images or PDFs, asks the configured
//! LLM to analyze them, and returns normalized JSON.
//!
//! # Usage
//!
//! ```bash
//! # Run all three services (ports 3001, 3002, 3003)
//! docvision serve
//!
//! # Run only the parsing service on a custom port
//! docvision serve --service parsing --port 8080
//!
//! # View configuration
//! docvision config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;
mod server;

/// Docvision - document analysis services backed by vision LLMs.
#[derive(Parser, Debug)]
#[command(name = "docvision")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true, env = "DOCVISION_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP services
    Serve(cli::serve::ServeArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref().map(docvision_core::Config::expand_path);

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let config = match &config_path {
        // An explicit --config must load
        Some(path) => docvision_core::Config::load_from(path)?,
        None => match docvision_core::Config::load() {
            Ok(config) => config,
            Err(e) => {
                eprintln!(
                    "Warning: Failed to load config: {e}\n  \
                     Using default configuration. Check your config file with `docvision config path`."
                );
                docvision_core::Config::default()
            }
        },
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Docvision v{}", docvision_core::VERSION);

    match cli.command {
        Commands::Serve(args) => cli::serve::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args, config_path).await,
    }
}
