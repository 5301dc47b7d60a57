// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{Tier, TierManager};
use crate::stop_signal::StopSignal;
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

/// Callback performing the actual byte movement of a migration
pub type SegmentMover = dyn Fn(&str, Tier, Tier) -> crate::Result<()> + Send + Sync;

/// Background worker for automatic tier migrations
///
/// Wakes on an interval, evaluates the lifecycle policy, and migrates every
/// flagged segment through the configured mover. Migration errors are logged
/// and never terminate the worker; the affected segment simply stays in its
/// prior tier until the next evaluation.
pub struct TierMigrationService {
    manager: Arc<TierManager>,
    interval: Duration,
    mover: Arc<SegmentMover>,
    stop: Mutex<StopSignal>,
    worker: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl TierMigrationService {
    /// Creates a service with a metadata-only mover.
    #[must_use]
    pub fn new(manager: Arc<TierManager>, interval: Duration) -> Self {
        Self::with_mover(manager, interval, Arc::new(|_: &str, _, _| Ok(())))
    }

    /// Creates a service delegating byte movement to `mover`.
    #[must_use]
    pub fn with_mover(
        manager: Arc<TierManager>,
        interval: Duration,
        mover: Arc<SegmentMover>,
    ) -> Self {
        Self {
            manager,
            interval,
            mover,
            stop: Mutex::new(StopSignal::default()),
            worker: Mutex::new(None),
        }
    }

    /// Evaluation interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the worker thread is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        #[allow(clippy::expect_used)]
        let worker = self.worker.lock().expect("lock is poisoned");
        worker.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Starts the background worker. Idempotent.
    pub fn start(&self) {
        #[allow(clippy::expect_used)]
        let mut worker = self.worker.lock().expect("lock is poisoned");
        if worker.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }

        let stop = StopSignal::default();
        #[allow(clippy::expect_used)]
        {
            *self.stop.lock().expect("lock is poisoned") = stop.clone();
        }

        let manager = self.manager.clone();
        let mover = self.mover.clone();
        let interval = self.interval;

        *worker = Some(std::thread::spawn(move || {
            log::debug!("tier migration worker started (interval: {interval:?})");

            while !stop.is_stopped() {
                run_once(&manager, mover.as_ref());

                // Sleep in short slices so stop() is observed promptly
                let mut slept = Duration::ZERO;
                while slept < interval && !stop.is_stopped() {
                    let slice = Duration::from_millis(50).min(interval - slept);
                    std::thread::sleep(slice);
                    slept += slice;
                }
            }

            log::debug!("tier migration worker stopped");
        }));
    }

    /// Signals the worker and joins it. Idempotent.
    pub fn stop(&self) {
        #[allow(clippy::expect_used)]
        {
            self.stop.lock().expect("lock is poisoned").send();
        }

        #[allow(clippy::expect_used)]
        let handle = self.worker.lock().expect("lock is poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

impl Drop for TierMigrationService {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One evaluation pass: migrate every flagged segment through the mover.
fn run_once(manager: &TierManager, mover: &SegmentMover) {
    let migrations = manager.evaluate_migrations();

    for (segment, target_tier) in migrations {
        log::debug!("migrating segment {segment:?} to {target_tier}");

        if let Err(e) = manager.migrate_with(&segment, target_tier, |name, from, to| {
            mover(name, from, to)
        }) {
            log::error!("migration of {segment:?} to {target_tier} failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{HotPhase, LifecyclePolicy};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use test_log::test;

    fn age_policy() -> LifecyclePolicy {
        LifecyclePolicy {
            hot: HotPhase {
                max_age_seconds: 0,
                max_size_bytes: i64::MAX,
                force_merge: false,
            },
            ..LifecyclePolicy::default()
        }
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let manager = Arc::new(TierManager::with_default_configs(LifecyclePolicy::default()));
        let service = TierMigrationService::new(manager, Duration::from_millis(10));

        service.start();
        service.start();
        assert!(service.is_running());

        service.stop();
        service.stop();
        assert!(!service.is_running());

        // Can be restarted after a stop
        service.start();
        assert!(service.is_running());
        service.stop();
    }

    #[test]
    fn worker_migrates_due_segments() {
        let manager = Arc::new(TierManager::with_default_configs(age_policy()));
        manager.register("seg", 1);

        let service = TierMigrationService::new(manager.clone(), Duration::from_millis(5));
        service.start();

        // hot.max_age = 0, so the first pass already moves the segment
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while manager.segment_tier("seg").unwrap() == crate::storage::Tier::Hot {
            assert!(std::time::Instant::now() < deadline, "migration never ran");
            std::thread::sleep(Duration::from_millis(5));
        }

        service.stop();
    }

    #[test]
    fn mover_failures_keep_worker_alive() {
        let manager = Arc::new(TierManager::with_default_configs(age_policy()));
        manager.register("seg_a", 1);

        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_in_mover = attempts.clone();

        let service = TierMigrationService::with_mover(
            manager.clone(),
            Duration::from_millis(5),
            Arc::new(move |_, _, _| {
                attempts_in_mover.fetch_add(1, Ordering::SeqCst);
                Err(crate::Error::Io(std::io::Error::other("mover down")))
            }),
        );
        service.start();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while attempts.load(Ordering::SeqCst) < 3 {
            assert!(std::time::Instant::now() < deadline, "worker died");
            std::thread::sleep(Duration::from_millis(5));
        }

        // Every attempt failed, so the segment never left HOT
        assert_eq!(
            crate::storage::Tier::Hot,
            manager.segment_tier("seg_a").unwrap()
        );
        assert!(service.is_running());

        service.stop();
    }
}
