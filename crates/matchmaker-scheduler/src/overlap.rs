//! Non-reentrant pass guard.
//!
//! A tick that arrives while a pass is still running is skipped rather than
//! queued. Shutdown uses [`OverlapGuard::wait_idle`] to drain the pass in
//! flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Guard for tracking whether a pass is currently running.
///
/// Acquisition is lock-free; the returned [`RunGuard`] releases the flag
/// and wakes drain waiters when dropped.
#[derive(Debug, Default)]
pub struct OverlapGuard {
    is_running: Arc<AtomicBool>,
    idle: Arc<Notify>,
}

impl OverlapGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` if a pass already holds the guard.
    pub fn try_acquire(&self) -> Option<RunGuard> {
        self.is_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| RunGuard {
                flag: self.is_running.clone(),
                idle: self.idle.clone(),
            })
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Resolve once no pass holds the guard.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a release in between is not missed.
            notified.as_mut().enable();
            if !self.is_running() {
                return;
            }
            notified.await;
        }
    }
}

/// RAII guard that releases the running flag when dropped.
///
/// The flag is cleared even if the pass panics.
#[derive(Debug)]
pub struct RunGuard {
    flag: Arc<AtomicBool>,
    idle: Arc<Notify>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
        self.idle.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_overlap_skip_prevents_concurrent() {
        let guard = OverlapGuard::new();

        let run1 = guard.try_acquire();
        assert!(run1.is_some());
        assert!(guard.is_running());

        assert!(guard.try_acquire().is_none());

        drop(run1);
        assert!(!guard.is_running());

        assert!(guard.try_acquire().is_some());
    }

    #[test]
    fn test_overlap_thread_safety() {
        let guard = Arc::new(OverlapGuard::new());
        let concurrent = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let max_seen = Arc::new(std::sync::atomic::AtomicU32::new(0));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let guard = guard.clone();
                let concurrent = concurrent.clone();
                let max_seen = max_seen.clone();
                thread::spawn(move || {
                    if let Some(_run_guard) = guard.try_acquire() {
                        let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(10));
                        concurrent.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert!(!guard.is_running());
    }

    #[test]
    fn test_run_guard_releases_on_drop() {
        let guard = OverlapGuard::new();

        {
            let _run = guard.try_acquire().unwrap();
            assert!(guard.is_running());
        }

        assert!(!guard.is_running());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_wait_idle_returns_immediately_when_idle() {
        let guard = OverlapGuard::new();
        tokio::time::timeout(Duration::from_millis(100), guard.wait_idle())
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_wait_idle_drains_running_pass() {
        let guard = Arc::new(OverlapGuard::new());
        let run = guard.try_acquire().unwrap();

        let handle = tokio::task::spawn_blocking(move || {
            thread::sleep(Duration::from_millis(50));
            drop(run);
        });

        tokio::time::timeout(Duration::from_secs(2), guard.wait_idle())
            .await
            .unwrap();
        assert!(!guard.is_running());
        handle.await.unwrap();
    }
}
