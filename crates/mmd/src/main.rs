//! mmd CLI - Mermaid diagram activation for rendered pages.
//!
//! Provides commands for:
//! - `activate`: Convert diagram sources and run the diagram library
//! - `scan`: Report diagram sources without modifying pages

mod commands;
mod error;
mod output;
mod pages;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{ActivateArgs, ScanArgs};
use error::CliError;
use output::Output;

/// Application version from Cargo.toml.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// mmd - Mermaid diagram activation.
#[derive(Parser)]
#[command(name = "mmd", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Activate diagrams in HTML pages.
    Activate(ActivateArgs),
    /// List diagram sources in HTML pages.
    Scan(ScanArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let verbose = matches!(&cli.command, Commands::Activate(args) if args.verbose);
    let filter = if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let result = match cli.command {
        Commands::Activate(args) => tokio::runtime::Runtime::new()
            .map_err(CliError::from)
            .and_then(|rt| rt.block_on(args.execute(VERSION))),
        Commands::Scan(args) => args.execute(),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
