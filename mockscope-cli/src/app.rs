use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// mockscope - inspect and preview method interception configurations
#[derive(Debug, Parser)]
#[command(name = "mockscope", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared across all subcommands.
#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Emit output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Parse a configuration file and list its targets and rules.
    Check {
        /// Path to the mock configuration (JSON).
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },

    /// Show which targets a configuration would install and remove.
    Plan {
        /// Path to the configuration to apply.
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Configuration currently active; without it every target is a fresh install.
        #[arg(long, value_name = "FILE")]
        from: Option<PathBuf>,
    },

    /// Evaluate a rule expression against sample arguments.
    Eval {
        /// Expression source, e.g. 'arg0 * 2 + 1'.
        #[arg(value_name = "EXPR")]
        expr: String,

        /// Arguments as JSON literals (bare words are taken as strings).
        #[arg(value_name = "ARG")]
        args: Vec<String>,
    },
}
