//! SQL execution engine seam.
//!
//! Statements are submitted with a bounded server-side wait and then polled
//! at a fixed interval up to a hard ceiling. Exceeding the ceiling is a
//! timeout failure.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MinerError, Result};

/// Where statements run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionTarget {
    pub warehouse_id: String,
    pub catalog: String,
    pub schema: String,
    #[serde(with = "humantime_serde")]
    pub wait_timeout: Duration,
}

/// Lifecycle state of a submitted statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementState {
    Pending,
    Running,
    Succeeded,
    Failed(String),
}

impl StatementState {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_))
    }
}

/// A submitted statement and its last observed state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementHandle {
    pub statement_id: String,
    pub state: StatementState,
}

/// Executes SQL statements.
pub trait SqlEngine: Send + Sync {
    fn submit(&self, statement: &str, target: &ExecutionTarget) -> Result<StatementHandle>;

    fn poll(&self, handle: &StatementHandle) -> Result<StatementState>;
}

/// Polling cadence for [`execute_and_wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_polls: u32,
}

impl PollPolicy {
    #[must_use]
    pub const fn new(interval: Duration, max_polls: u32) -> Self {
        Self {
            interval,
            max_polls,
        }
    }
}

/// Submit a statement and poll until it succeeds, fails, or the poll
/// ceiling is reached.
///
/// A failed terminal state becomes [`MinerError::StatementFailed`] carrying
/// the engine's error text.
pub fn execute_and_wait(
    engine: &dyn SqlEngine,
    statement: &str,
    target: &ExecutionTarget,
    policy: PollPolicy,
) -> Result<()> {
    let mut handle = engine.submit(statement, target)?;
    let mut polls = 0;
    loop {
        match &handle.state {
            StatementState::Succeeded => return Ok(()),
            StatementState::Failed(error) => {
                return Err(MinerError::StatementFailed(error.clone()));
            }
            StatementState::Pending | StatementState::Running => {}
        }
        if polls >= policy.max_polls {
            return Err(MinerError::StatementTimeout { attempts: polls });
        }
        if !policy.interval.is_zero() {
            std::thread::sleep(policy.interval);
        }
        polls += 1;
        handle.state = engine.poll(&handle)?;
        debug!(
            statement_id = %handle.statement_id,
            poll = polls,
            state = ?handle.state,
            "Polled statement"
        );
    }
}
