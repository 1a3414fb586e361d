//! # Exponential Backoff
//!
//! Requeue delays for failed reconciliation passes. Each consecutive failure
//! for the same instance doubles the delay, capped at a maximum; a successful
//! pass resets the sequence.
//!
//! This state belongs to the dispatcher. The reconciler itself stays
//! stateless between passes.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::warn;

/// Exponential backoff calculator
///
/// Sequence with `min = 5s, max = 300s`: 5s, 10s, 20s, 40s, 80s, 160s, 300s (max).
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Current backoff value
    current: Duration,
    /// Maximum backoff value
    max: Duration,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff starting at `min` and capped at `max`
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            current: min.min(max),
            max,
        }
    }

    /// Get the next backoff duration and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        result
    }
}

/// Backoff state for one failing instance key
#[derive(Debug, Clone)]
struct BackoffState {
    backoff: ExponentialBackoff,
    error_count: u32,
}

/// Per-instance backoff bookkeeping shared by the dispatcher's error policy.
#[derive(Debug)]
pub struct BackoffTracker {
    min: Duration,
    max: Duration,
    /// Backoff state per instance (namespace/name -> BackoffState)
    states: Mutex<HashMap<String, BackoffState>>,
}

impl BackoffTracker {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Record a failure for `key` and return how long to wait before retrying,
    /// together with the number of consecutive failures so far.
    pub fn next_delay(&self, key: &str) -> (Duration, u32) {
        match self.states.lock() {
            Ok(mut states) => {
                let state = states.entry(key.to_string()).or_insert_with(|| BackoffState {
                    backoff: ExponentialBackoff::new(self.min, self.max),
                    error_count: 0,
                });
                state.error_count = state.error_count.saturating_add(1);
                (state.backoff.next_backoff(), state.error_count)
            }
            Err(e) => {
                warn!("Failed to lock backoff states: {}, using minimum backoff", e);
                (self.min, 0)
            }
        }
    }

    /// Forget the failure history of `key` (on a successful pass)
    pub fn reset(&self, key: &str) {
        if let Ok(mut states) = self.states.lock() {
            states.remove(key);
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.states.lock().map(|states| states.len()).unwrap_or(0)
    }
}
