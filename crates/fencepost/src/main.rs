//! Fencepost CLI - theme-aware diagram blocks for static documentation.
//!
//! Provides commands for:
//! - `transform`: Rewrite fenced diagram blocks into placeholder markup
//! - `render`: Prerender placeholder containers through Kroki

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{RenderArgs, TransformArgs};
use output::Output;

/// Fencepost - theme-aware diagram blocks for static documentation.
#[derive(Parser)]
#[command(name = "fencepost", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite fenced diagram blocks in markdown or HTML.
    Transform(TransformArgs),
    /// Render diagram placeholders of a transformed page.
    Render(RenderArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    let verbose = match &cli.command {
        Commands::Transform(args) => args.verbose,
        Commands::Render(args) => args.verbose,
    };

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Transform(args) => args.execute(),
        Commands::Render(args) => args.execute(),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
