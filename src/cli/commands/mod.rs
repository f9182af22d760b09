//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - `run()` function to execute the command

use crate::cli::{Cli, Commands};
use crate::error::Result;

pub mod run;

/// How the process should exit after a command finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Success,
    Failed,
    Interrupted,
}

impl Exit {
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failed => 1,
            Self::Interrupted => 130,
        }
    }
}

pub fn dispatch(cli: &Cli) -> Result<Exit> {
    match &cli.command {
        Commands::Run(args) => run::run(cli, args),
    }
}
