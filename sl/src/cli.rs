//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// SortLine - three-stage cube sorting line coordinator
#[derive(Parser)]
#[command(
    name = "sortline",
    about = "Coordinates a pick, transfer and color-sorting line of Web of Things devices",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the line until every color quota is met or interrupted
    Run {
        /// Run against an in-process simulated line
        #[arg(long)]
        simulate: bool,

        /// Thing Directory URL (overrides config)
        #[arg(short, long)]
        directory: Option<String>,
    },

    /// List discovered devices and the roles they satisfy
    Devices {
        /// Thing Directory URL (overrides config)
        #[arg(short, long)]
        directory: Option<String>,
    },

    /// Run the red and blue light observers
    Lights {
        /// Thing Directory URL (overrides config)
        #[arg(short, long)]
        directory: Option<String>,
    },

    /// Print the effective configuration as YAML
    Config,
}
