mod commands;
mod progress;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mosaic", about = "Stitch a grid of overlapping microscopy tile volumes")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show tile grid metadata
    Info(commands::info::InfoArgs),
    /// Estimate pairwise shifts between adjacent tiles
    Align(commands::align::AlignArgs),
    /// Fuse positioned tiles into one output volume
    Fuse(commands::fuse::FuseArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Info(args) => commands::info::run(args),
        Commands::Align(args) => commands::align::run(args),
        Commands::Fuse(args) => commands::fuse::run(args),
    }
}
