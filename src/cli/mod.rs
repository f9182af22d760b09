//! CLI module - Command-line interface definitions and handlers
//!
//! Uses clap v4 with derive macros for argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod commands;
pub mod output;

/// asset-miner - Turn complex assistant-generated SQL into reusable examples and functions
#[derive(Parser, Debug)]
#[command(name = "asset-miner")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Emit the report and logs as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file path (default: ~/.config/asset-miner/config.toml)
    #[arg(long, global = true, env = "ASSET_MINER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Mine a space's conversations and materialize complex queries
    Run(commands::run::RunArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_with_toggles() {
        let cli = Cli::parse_from([
            "asset-miner",
            "--json",
            "run",
            "--space-id",
            "space-1",
            "--catalog",
            "main",
            "--schema",
            "assets",
            "--no-functions",
            "--threshold",
            "moderate",
            "--from",
            "7d",
        ]);
        assert!(cli.json);
        let Commands::Run(args) = cli.command;
        assert_eq!(args.space_id, "space-1");
        assert!(args.no_functions);
        assert!(!args.no_examples);
        assert_eq!(args.threshold.map(|t| t.to_string()).as_deref(), Some("moderate"));
        assert_eq!(args.from.as_deref(), Some("7d"));
    }
}
