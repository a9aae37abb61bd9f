//! Nullable infrastructure for deterministic testing.
//!
//! The consensus core reaches the outside world only through the
//! [`Network`](hotstuff_network::Network) and
//! [`ExternalProcessor`](hotstuff_messages::ExternalProcessor) traits. This
//! crate provides implementations of both that:
//! - Record what the core did instead of doing it
//! - Can be controlled programmatically
//! - Never touch a socket
//!
//! Usage: swap real implementations for nullables in tests.

pub mod network;
pub mod processor;

pub use network::NullNetwork;
pub use processor::NullProcessor;

use std::sync::{Mutex, MutexGuard};

/// Lock, recovering the data if a panicking test poisoned the mutex.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
