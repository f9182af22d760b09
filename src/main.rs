//! asset-miner CLI
//!
//! Mine assistant conversations for complex SQL and turn it into examples
//! and catalog functions.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use asset_miner::cli::commands::dispatch;
use asset_miner::cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match dispatch(&cli) {
        Ok(exit) => ExitCode::from(exit.code()),
        Err(e) => {
            if cli.json {
                let mut error_json = serde_json::json!({
                    "success": false,
                    "error": e.to_string(),
                    "code": e.code(),
                });
                if let Some(context) = e.context() {
                    error_json["context"] = context;
                }
                println!("{}", serde_json::to_string(&error_json).unwrap_or_default());
            } else {
                eprintln!("Error: {e}");
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(cli: &Cli) {
    if cli.quiet {
        return;
    }

    let filter = match cli.verbose {
        0 => "warn,asset_miner=info",
        1 => "info,asset_miner=debug",
        _ => "debug,asset_miner=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
