pub mod cancel;
pub mod classify;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod llm;
pub mod materialize;
pub mod models;
pub mod params;
pub mod pipeline;
pub mod registry;
pub mod source;
pub mod test_utils;
pub mod timestamp;
pub mod utils;
pub mod workspace;

pub use error::{MinerError, Result};
pub use models::{Candidate, ComplexityTier, CreationOutcome, Report};
pub use pipeline::{run, RunOptions, Services, Tuning};

/// Package version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
