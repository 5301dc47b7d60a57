// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Tiered-storage lifecycle control
//!
//! Segments are registered HOT and migrate through WARM, COLD, and FROZEN as
//! the [`LifecyclePolicy`] fires. The [`TierManager`] tracks per-segment
//! metadata; the [`TierMigrationService`] evaluates the policy on an interval
//! in a background worker. Byte movement is delegated to a caller-supplied
//! mover; the controller decides *when* and *to what*, never *how*.

mod manager;
mod migration;
mod policy;
mod tier;

pub use manager::{SegmentMeta, TierManager};
pub use migration::TierMigrationService;
pub use policy::{ColdPhase, FrozenPhase, HotPhase, LifecyclePolicy, WarmPhase};
pub use tier::{Tier, TierConfig};
