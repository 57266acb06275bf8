//! Per-pass soft deadline for mutual-match validation.
//!
//! When precision matching is enabled, each pass starts a gate. While the
//! gate is open, candidate pairs are checked in both directions. Once the
//! threshold elapses a timer thread closes the gate and the rest of the pass
//! runs with one-way matching only. Dropping the gate stops the timer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

pub struct PrecisionGate {
    enabled: bool,
    expired: Arc<AtomicBool>,
    /// Dropping the sender wakes and ends the timer thread
    _stop: Option<Sender<()>>,
}

impl PrecisionGate {
    /// Gate that never validates.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            expired: Arc::new(AtomicBool::new(true)),
            _stop: None,
        }
    }

    /// Start a gate that closes after `threshold`.
    pub fn start(enabled: bool, threshold: Duration) -> Self {
        if !enabled {
            return Self::disabled();
        }

        let expired = Arc::new(AtomicBool::new(false));
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let flag = expired.clone();

        let spawned = thread::Builder::new()
            .name("mutual-match-gate".to_string())
            .spawn(move || {
                if let Err(RecvTimeoutError::Timeout) = stop_rx.recv_timeout(threshold) {
                    flag.store(true, Ordering::SeqCst);
                    debug!(
                        threshold_ms = threshold.as_millis() as u64,
                        "Mutual match threshold elapsed"
                    );
                }
            });

        if let Err(e) = spawned {
            // Without a timer the pass would validate unbounded; fall back to one-way.
            warn!(error = %e, "Failed to start mutual match timer, skipping validation");
            expired.store(true, Ordering::SeqCst);
        }

        Self {
            enabled: true,
            expired,
            _stop: Some(stop_tx),
        }
    }

    /// Whether candidate pairs should still be checked both ways.
    pub fn is_open(&self) -> bool {
        self.enabled && !self.expired.load(Ordering::SeqCst)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl std::fmt::Debug for PrecisionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrecisionGate")
            .field("enabled", &self.enabled)
            .field("open", &self.is_open())
            .finish()
    }
}
