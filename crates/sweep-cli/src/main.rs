use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    cache::{self, CacheArgs},
    export::{self, ExportArgs},
    run::{self, RunArgs},
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod surface;

#[derive(Parser, Debug)]
#[command(name = "sweep", about = "Cached parameter sweeps over a surface reconstruction proxy")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sweep a parameter space and write the report next to its artefacts.
    Run(RunArgs),
    /// Inspect or clear a result cache.
    Cache(CacheArgs),
    /// Re-export a saved report as CSV.
    Export(ExportArgs),
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    if let Err(err) = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init()
    {
        tracing::debug!(error = %err, "tracing subscriber already installed");
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.command {
        Command::Run(args) => run::run(&args),
        Command::Cache(args) => cache::run(&args),
        Command::Export(args) => export::run(&args),
    }
}
