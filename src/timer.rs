// WHY: Debounce timer with arm/cancel/fire-once semantics on tokio time, so the
// scheduler can select! on it and tests can drive it with the paused clock

use std::future::pending;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{sleep_until, Instant, Sleep};

/// At most one pending deadline. Arming replaces it; firing disarms it.
#[derive(Debug, Default)]
pub struct DebounceTimer {
    pending: Option<Pin<Box<Sleep>>>,
}

impl DebounceTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel any pending deadline and start a new one `delay` from now
    pub fn arm(&mut self, delay: Duration) {
        let deadline = Instant::now() + delay;
        self.pending = Some(Box::pin(sleep_until(deadline)));
    }

    /// Returns whether a deadline was pending
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|sleep| sleep.deadline())
    }

    /// Completes once when the armed deadline passes, then disarms.
    /// Never completes while unarmed, so it is safe to poll in `select!`.
    pub async fn fired(&mut self) {
        match self.pending.as_mut() {
            Some(sleep) => {
                sleep.as_mut().await;
                self.pending = None;
            }
            None => pending::<()>().await,
        }
    }
}
