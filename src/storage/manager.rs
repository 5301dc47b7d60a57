// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{LifecyclePolicy, Tier, TierConfig};
use crate::time::unix_timestamp;
use rustc_hash::FxHashMap;
use std::sync::Mutex;

/// Lifecycle metadata of one registered segment
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SegmentMeta {
    /// Current storage tier
    pub tier: Tier,

    /// Registration time (unix seconds)
    pub creation_time: u64,

    /// Last recorded access (unix seconds)
    pub last_access_time: u64,

    /// Accesses since registration
    pub access_count: i64,

    /// Segment size in bytes
    pub size_bytes: i64,
}

/// Tracks segments across storage tiers and evaluates the lifecycle policy
///
/// All operations are thread-safe behind a single mutex on the segment map.
/// `evaluate_migrations` snapshots the map under the lock and evaluates the
/// policy lock-free; `migrate_with` never holds the lock while bytes move.
pub struct TierManager {
    configs: FxHashMap<Tier, TierConfig>,
    policy: LifecyclePolicy,
    segments: Mutex<FxHashMap<String, SegmentMeta>>,
}

impl TierManager {
    /// Creates a manager with explicit per-tier configurations.
    #[must_use]
    pub fn new(configs: FxHashMap<Tier, TierConfig>, policy: LifecyclePolicy) -> Self {
        Self {
            configs,
            policy,
            segments: Mutex::new(FxHashMap::default()),
        }
    }

    /// Creates a manager with default configurations for all four tiers.
    #[must_use]
    pub fn with_default_configs(policy: LifecyclePolicy) -> Self {
        let configs = Tier::ALL
            .into_iter()
            .map(|tier| (tier, TierConfig::default_for(tier)))
            .collect();
        Self::new(configs, policy)
    }

    /// The active lifecycle policy.
    #[must_use]
    pub fn policy(&self) -> &LifecyclePolicy {
        &self.policy
    }

    /// Configuration of a tier.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the tier was not configured.
    pub fn config(&self, tier: Tier) -> crate::Result<TierConfig> {
        self.configs
            .get(&tier)
            .copied()
            .ok_or(crate::Error::InvalidConfig("tier not configured"))
    }

    /// Registers a new segment in the HOT tier.
    pub fn register(&self, name: &str, size_bytes: u64) {
        let now = unix_timestamp().as_secs();

        #[allow(clippy::expect_used)]
        self.segments.lock().expect("lock is poisoned").insert(
            name.to_string(),
            SegmentMeta {
                tier: Tier::Hot,
                creation_time: now,
                last_access_time: now,
                access_count: 0,
                #[allow(clippy::cast_possible_wrap)]
                size_bytes: size_bytes.min(i64::MAX as u64) as i64,
            },
        );
    }

    /// Records an access; no-op for unknown segments.
    pub fn record_access(&self, name: &str) {
        #[allow(clippy::expect_used)]
        let mut segments = self.segments.lock().expect("lock is poisoned");
        if let Some(meta) = segments.get_mut(name) {
            meta.last_access_time = unix_timestamp().as_secs();
            meta.access_count += 1;
        }
    }

    /// Current tier of a segment.
    ///
    /// # Errors
    ///
    /// Returns `SegmentNotFound` for unknown segments.
    pub fn segment_tier(&self, name: &str) -> crate::Result<Tier> {
        Ok(self.segment_meta(name)?.tier)
    }

    /// Full metadata of a segment.
    ///
    /// # Errors
    ///
    /// Returns `SegmentNotFound` for unknown segments.
    pub fn segment_meta(&self, name: &str) -> crate::Result<SegmentMeta> {
        #[allow(clippy::expect_used)]
        let segments = self.segments.lock().expect("lock is poisoned");
        segments
            .get(name)
            .copied()
            .ok_or_else(|| crate::Error::SegmentNotFound(name.to_string()))
    }

    /// Access count of a segment; 0 for unknown segments.
    #[must_use]
    pub fn access_count(&self, name: &str) -> i64 {
        self.segment_meta(name).map_or(0, |meta| meta.access_count)
    }

    /// Evaluates the policy over a snapshot of all segments.
    ///
    /// Returns `(segment, target_tier)` pairs sorted by segment name.
    #[must_use]
    pub fn evaluate_migrations(&self) -> Vec<(String, Tier)> {
        let now = unix_timestamp().as_secs();

        let snapshot: Vec<(String, SegmentMeta)> = {
            #[allow(clippy::expect_used)]
            let segments = self.segments.lock().expect("lock is poisoned");
            segments
                .iter()
                .map(|(name, meta)| (name.clone(), *meta))
                .collect()
        };

        let mut migrations: Vec<(String, Tier)> = snapshot
            .into_iter()
            .filter_map(|(name, meta)| {
                #[allow(clippy::cast_possible_wrap)]
                let age_seconds = now.saturating_sub(meta.creation_time) as i64;
                self.policy
                    .evaluate(meta.tier, age_seconds, meta.size_bytes, meta.access_count)
                    .map(|target| (name, target))
            })
            .collect();

        migrations.sort_by(|a, b| a.0.cmp(&b.0));
        migrations
    }

    /// Moves a segment to `target_tier`, updating metadata only.
    ///
    /// No-op when the segment is already in the target tier.
    ///
    /// # Errors
    ///
    /// Returns `SegmentNotFound` for unknown segments.
    pub fn migrate(&self, name: &str, target_tier: Tier) -> crate::Result<()> {
        self.migrate_with(name, target_tier, |_, _, _| Ok(()))
    }

    /// Moves a segment to `target_tier`, delegating byte movement to `mover`.
    ///
    /// The tier field changes only after the mover succeeds, so a failed
    /// movement leaves the segment in its prior tier. The segment mutex is
    /// not held while the mover runs.
    ///
    /// # Errors
    ///
    /// Returns `SegmentNotFound` for unknown segments, or the mover's error.
    pub fn migrate_with<F>(&self, name: &str, target_tier: Tier, mover: F) -> crate::Result<()>
    where
        F: FnOnce(&str, Tier, Tier) -> crate::Result<()>,
    {
        let source_tier = self.segment_tier(name)?;
        if source_tier == target_tier {
            return Ok(());
        }

        mover(name, source_tier, target_tier)?;

        #[allow(clippy::expect_used)]
        let mut segments = self.segments.lock().expect("lock is poisoned");
        if let Some(meta) = segments.get_mut(name) {
            meta.tier = target_tier;
        }

        Ok(())
    }

    /// Unregisters a segment (frozen retention expiry, external deletes).
    ///
    /// # Errors
    ///
    /// Returns `SegmentNotFound` for unknown segments.
    pub fn remove(&self, name: &str) -> crate::Result<()> {
        #[allow(clippy::expect_used)]
        let mut segments = self.segments.lock().expect("lock is poisoned");
        segments
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| crate::Error::SegmentNotFound(name.to_string()))
    }

    /// Names of segments currently in any of the given tiers, sorted.
    #[must_use]
    pub fn segments_in_tiers(&self, tiers: &[Tier]) -> Vec<String> {
        #[allow(clippy::expect_used)]
        let segments = self.segments.lock().expect("lock is poisoned");
        let mut names: Vec<String> = segments
            .iter()
            .filter(|(_, meta)| tiers.contains(&meta.tier))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Tiers whose configuration marks them searchable, hottest first.
    #[must_use]
    pub fn searchable_tiers(&self) -> Vec<Tier> {
        Tier::ALL
            .into_iter()
            .filter(|tier| self.configs.get(tier).is_some_and(|c| c.searchable))
            .collect()
    }

    /// All registered segment names, sorted.
    #[must_use]
    pub fn all_segments(&self) -> Vec<String> {
        #[allow(clippy::expect_used)]
        let segments = self.segments.lock().expect("lock is poisoned");
        let mut names: Vec<String> = segments.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        storage::{HotPhase, WarmPhase},
        time::set_unix_timestamp_for_test,
    };
    use std::time::Duration;
    use test_log::test;

    fn manager() -> TierManager {
        TierManager::with_default_configs(LifecyclePolicy::default())
    }

    #[test]
    fn register_starts_hot() -> crate::Result<()> {
        let manager = manager();
        manager.register("seg_a", 1024);

        assert_eq!(Tier::Hot, manager.segment_tier("seg_a")?);
        assert_eq!(0, manager.access_count("seg_a"));
        assert!(matches!(
            manager.segment_tier("missing"),
            Err(crate::Error::SegmentNotFound(_))
        ));

        Ok(())
    }

    #[test]
    fn record_access_is_noop_for_unknown() {
        let manager = manager();
        manager.record_access("ghost");
        assert_eq!(0, manager.access_count("ghost"));
    }

    #[test]
    fn migrate_is_idempotent() -> crate::Result<()> {
        let manager = manager();
        manager.register("seg", 10);

        manager.migrate("seg", Tier::Warm)?;
        let first = manager.segment_meta("seg")?;

        manager.migrate("seg", Tier::Warm)?;
        let second = manager.segment_meta("seg")?;

        assert_eq!(first, second);
        assert_eq!(Tier::Warm, second.tier);

        Ok(())
    }

    #[test]
    fn failed_mover_leaves_tier_unchanged() -> crate::Result<()> {
        let manager = manager();
        manager.register("seg", 10);

        let result = manager.migrate_with("seg", Tier::Warm, |_, _, _| {
            Err(crate::Error::Io(std::io::Error::other("disk gone")))
        });

        assert!(result.is_err());
        assert_eq!(Tier::Hot, manager.segment_tier("seg")?);

        Ok(())
    }

    #[test]
    fn concurrent_access_counts_converge() -> crate::Result<()> {
        let manager = std::sync::Arc::new(manager());
        manager.register("seg", 10);

        let threads = 8;
        let per_thread = 250;

        std::thread::scope(|scope| {
            for _ in 0..threads {
                let manager = manager.clone();
                scope.spawn(move || {
                    for _ in 0..per_thread {
                        manager.record_access("seg");
                    }
                });
            }
        });

        assert_eq!(i64::from(threads * per_thread), manager.access_count("seg"));

        Ok(())
    }

    #[test]
    fn evaluate_migrations_by_age() -> crate::Result<()> {
        let policy = LifecyclePolicy {
            hot: HotPhase {
                max_age_seconds: 60,
                max_size_bytes: i64::MAX,
                force_merge: false,
            },
            warm: WarmPhase {
                max_age_seconds: -1,
                min_access_count: 0,
                recompress: false,
            },
            ..LifecyclePolicy::default()
        };
        let manager = TierManager::with_default_configs(policy);

        set_unix_timestamp_for_test(Some(Duration::from_secs(1_000)));
        manager.register("old", 10);
        manager.register("young", 10);

        set_unix_timestamp_for_test(Some(Duration::from_secs(1_030)));
        assert!(manager.evaluate_migrations().is_empty());

        // Re-register "young" so only "old" crosses the age threshold
        manager.register("young", 10);

        set_unix_timestamp_for_test(Some(Duration::from_secs(1_070)));
        let migrations = manager.evaluate_migrations();
        assert_eq!(vec![("old".to_string(), Tier::Warm)], migrations);

        set_unix_timestamp_for_test(None);

        Ok(())
    }

    #[test]
    fn tier_queries() -> crate::Result<()> {
        let manager = manager();
        manager.register("a", 1);
        manager.register("b", 1);
        manager.migrate("b", Tier::Cold)?;

        assert_eq!(vec!["a".to_string()], manager.segments_in_tiers(&[Tier::Hot]));
        assert_eq!(
            vec!["a".to_string(), "b".to_string()],
            manager.segments_in_tiers(&[Tier::Hot, Tier::Cold])
        );
        assert_eq!(
            vec!["a".to_string(), "b".to_string()],
            manager.all_segments()
        );

        // Default configs mark frozen unsearchable
        assert_eq!(
            vec![Tier::Hot, Tier::Warm, Tier::Cold],
            manager.searchable_tiers()
        );

        assert!(manager.config(Tier::Frozen).is_ok());

        Ok(())
    }
}
