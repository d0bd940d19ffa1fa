use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Arithmetic Screen Lock
///
/// Gates device use behind generated arithmetic challenges, with a
/// time-boxed guardian override.
#[derive(Parser, Debug)]
#[command(name = "mathlock")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file (defaults to the platform config dir)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
    /// Load and validate the configuration
    Validate,
    /// Show the configuration summary and override-window status
    Status,
    /// Generate an override hint, or derive the code for a given hint
    Hint {
        /// Derive the override code for this 4-digit hint
        #[arg(long)]
        derive: Option<String>,
    },
    /// Run the enforcement engine in the foreground
    Run,
}
