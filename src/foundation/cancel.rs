use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::foundation::error::{RecutError, RecutResult};

const SLEEP_SLICE: Duration = Duration::from_millis(25);

/// Cooperative cancellation flag shared between a caller and a pipeline run.
///
/// Cloning yields another handle to the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Return `true` once [`CancelToken::cancel`] has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` when cancellation was requested.
    pub fn check(&self) -> RecutResult<()> {
        if self.is_cancelled() {
            Err(RecutError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleep for `dur`, waking early with `Err(Cancelled)` when cancelled.
    pub fn sleep(&self, dur: Duration) -> RecutResult<()> {
        let deadline = Instant::now() + dur;
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            std::thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/cancel.rs"]
mod tests;
