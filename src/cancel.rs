//! Cooperative cancellation.
//!
//! Setting the token stops new work from starting. Work already in flight
//! runs to completion.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{MinerError, Result};

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the token has been set.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(MinerError::Cancelled)
        } else {
            Ok(())
        }
    }
}
