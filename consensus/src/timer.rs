//! View-change timer.
//!
//! The deadline lives in a `watch` channel. Every reset publishes a new
//! deadline; the monitor sleeps until the latest one and fires only if no
//! reset happened in between.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

pub struct ViewTimer {
    timeout: Duration,
    deadline: watch::Sender<Instant>,
}

impl ViewTimer {
    pub fn new(timeout: Duration) -> Self {
        let (deadline, _) = watch::channel(Instant::now() + timeout);
        Self { timeout, deadline }
    }

    /// Push the deadline to `now + timeout`.
    pub fn reset(&self) {
        self.deadline.send_replace(Instant::now() + self.timeout);
    }

    pub fn deadline(&self) -> Instant {
        *self.deadline.borrow()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn subscribe(&self) -> watch::Receiver<Instant> {
        self.deadline.subscribe()
    }
}
