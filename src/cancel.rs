//! Cooperative cancellation (spec.md §5). The teacher crate has no
//! cancellation primitive (it has no long-running synchronous pipeline);
//! this is new plumbing sized to match spec.md's "blocking, non-async core"
//! description, using the same `Arc<AtomicBool>` shape the pack's async
//! crates reach for when adapting a cancel signal to a synchronous check.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{PatchError, Result};

/// A cheaply-cloneable cancellation flag, checked at I/O suspension points.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns `Err(PatchError::Interrupted)` if cancellation has been
    /// requested. Called at every suspension point named in spec.md §5.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(PatchError::Interrupted)
        } else {
            Ok(())
        }
    }
}
