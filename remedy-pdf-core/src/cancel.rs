//! Cooperative cancellation.
//!
//! A cheaply clonable flag threaded through the pipeline and every
//! remediation step. Scanners and traversals check it at coarse
//! boundaries (per page, per structure element); providers are expected
//! to check it before starting external work.

use crate::error::{PdfError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Error out when cancellation has been requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(PdfError::OperationCancelled)
        } else {
            Ok(())
        }
    }
}
