// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::Tier;

/// Hot -> warm transition thresholds
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HotPhase {
    /// Age before moving to warm (seconds); negative means never
    pub max_age_seconds: i64,

    /// Size threshold (bytes); larger segments move to warm earlier
    pub max_size_bytes: i64,

    /// Force-merge before the transition
    pub force_merge: bool,
}

impl Default for HotPhase {
    fn default() -> Self {
        Self {
            max_age_seconds: 7 * 24 * 3600,
            max_size_bytes: 50 * 1024 * 1024 * 1024,
            force_merge: true,
        }
    }
}

/// Warm -> cold transition thresholds
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WarmPhase {
    /// Age before moving to cold (seconds); negative means never
    pub max_age_seconds: i64,

    /// Segments accessed fewer times than this move to cold
    pub min_access_count: i64,

    /// Recompress with a higher ratio on migration
    pub recompress: bool,
}

impl Default for WarmPhase {
    fn default() -> Self {
        Self {
            max_age_seconds: 30 * 24 * 3600,
            min_access_count: 10,
            recompress: true,
        }
    }
}

/// Cold -> frozen transition thresholds
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ColdPhase {
    /// Age before moving to frozen (seconds); non-positive means never
    pub max_age_seconds: i64,

    /// Mark the segment read-only when entering cold
    pub readonly_on_entry: bool,
}

impl Default for ColdPhase {
    fn default() -> Self {
        Self {
            max_age_seconds: 365 * 24 * 3600,
            readonly_on_entry: true,
        }
    }
}

/// Frozen retention
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FrozenPhase {
    /// Age before deletion (seconds); negative means indefinite retention
    pub max_age_seconds: i64,
}

impl Default for FrozenPhase {
    fn default() -> Self {
        Self {
            max_age_seconds: -1,
        }
    }
}

/// Defines when segments move between tiers
///
/// Frozen is terminal: the policy never proposes a transition out of it, only
/// (optionally) deletion once the retention age passes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LifecyclePolicy {
    /// Policy name, for logs
    pub name: String,

    /// Hot phase thresholds
    pub hot: HotPhase,

    /// Warm phase thresholds
    pub warm: WarmPhase,

    /// Cold phase thresholds
    pub cold: ColdPhase,

    /// Frozen retention
    pub frozen: FrozenPhase,
}

impl LifecyclePolicy {
    /// Evaluates the transition table for one segment.
    ///
    /// Returns the target tier, or `None` when no transition fires.
    #[must_use]
    pub fn evaluate(
        &self,
        current: Tier,
        age_seconds: i64,
        size_bytes: i64,
        access_count: i64,
    ) -> Option<Tier> {
        match current {
            Tier::Hot => {
                let by_age = self.hot.max_age_seconds >= 0 && age_seconds >= self.hot.max_age_seconds;
                let by_size = size_bytes >= self.hot.max_size_bytes;
                (by_age || by_size).then_some(Tier::Warm)
            }

            Tier::Warm => {
                let by_age =
                    self.warm.max_age_seconds >= 0 && age_seconds >= self.warm.max_age_seconds;
                let by_access = access_count < self.warm.min_access_count;
                (by_age || by_access).then_some(Tier::Cold)
            }

            Tier::Cold => {
                (self.cold.max_age_seconds > 0 && age_seconds >= self.cold.max_age_seconds)
                    .then_some(Tier::Frozen)
            }

            Tier::Frozen => None,
        }
    }

    /// Whether a frozen segment has outlived its retention.
    #[must_use]
    pub fn should_delete_frozen(&self, age_seconds: i64) -> bool {
        self.frozen.max_age_seconds >= 0 && age_seconds >= self.frozen.max_age_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn policy() -> LifecyclePolicy {
        LifecyclePolicy {
            name: "test".into(),
            hot: HotPhase {
                max_age_seconds: 100,
                max_size_bytes: 1000,
                force_merge: false,
            },
            warm: WarmPhase {
                max_age_seconds: 200,
                min_access_count: 5,
                recompress: true,
            },
            cold: ColdPhase {
                max_age_seconds: 300,
                readonly_on_entry: true,
            },
            frozen: FrozenPhase {
                max_age_seconds: -1,
            },
        }
    }

    #[test]
    fn transition_table_boundaries() {
        let p = policy();

        // HOT: age or size
        assert_eq!(None, p.evaluate(Tier::Hot, 99, 0, 100));
        assert_eq!(Some(Tier::Warm), p.evaluate(Tier::Hot, 100, 0, 100));
        assert_eq!(Some(Tier::Warm), p.evaluate(Tier::Hot, 0, 1000, 100));
        assert_eq!(None, p.evaluate(Tier::Hot, 0, 999, 0));

        // WARM: age or low access count
        assert_eq!(None, p.evaluate(Tier::Warm, 199, 0, 5));
        assert_eq!(Some(Tier::Cold), p.evaluate(Tier::Warm, 200, 0, 100));
        assert_eq!(Some(Tier::Cold), p.evaluate(Tier::Warm, 0, 0, 4));
        assert_eq!(None, p.evaluate(Tier::Warm, 0, 0, 5));

        // COLD: age only, and only when positive
        assert_eq!(None, p.evaluate(Tier::Cold, 299, 0, 0));
        assert_eq!(Some(Tier::Frozen), p.evaluate(Tier::Cold, 300, 0, 0));

        // FROZEN is terminal
        assert_eq!(None, p.evaluate(Tier::Frozen, i64::MAX, i64::MAX, 0));
    }

    #[test]
    fn negative_max_age_means_never() {
        let mut p = policy();
        p.hot.max_age_seconds = -1;
        p.hot.max_size_bytes = i64::MAX;
        assert_eq!(None, p.evaluate(Tier::Hot, i64::MAX, 0, 0));

        p.cold.max_age_seconds = 0;
        assert_eq!(None, p.evaluate(Tier::Cold, i64::MAX, 0, 0));
    }

    #[test]
    fn frozen_retention() {
        let mut p = policy();
        assert!(!p.should_delete_frozen(i64::MAX));

        p.frozen.max_age_seconds = 10;
        assert!(!p.should_delete_frozen(9));
        assert!(p.should_delete_frozen(10));
    }
}
