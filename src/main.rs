use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod lock;

use cli::{Args, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config_path = commands::resolve_config_path(args.config)?;

    match args.command {
        Commands::Init { force } => commands::init(&config_path, force),
        Commands::Validate => commands::validate(&config_path),
        Commands::Status => commands::status(&config_path),
        Commands::Hint { derive } => commands::hint(derive),
        Commands::Run => commands::run(config_path),
    }
}

/// Initialize logging
fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = if verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}
