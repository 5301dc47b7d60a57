// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{SegmentInfo, SegmentReadState, SegmentReader};
use crate::{
    directory::{Directory, IoContext},
    storage::TierManager,
    CompressionType,
};
use rustc_hash::FxHashMap;
use std::sync::{Arc, RwLock};

/// A published segment: metadata plus the handles needed to open readers
pub struct SegmentEntry {
    info: SegmentInfo,
    directory: Arc<dyn Directory>,
    compression: CompressionType,
}

impl SegmentEntry {
    /// Published metadata.
    #[must_use]
    pub fn info(&self) -> &SegmentInfo {
        &self.info
    }

    /// Opens a fresh reader over this segment.
    ///
    /// # Errors
    ///
    /// Returns `Io`/`Decode` if segment files are missing or corrupt.
    pub fn open_reader(&self) -> crate::Result<SegmentReader> {
        SegmentReader::open(
            SegmentReadState {
                directory: self.directory.clone(),
                segment_name: self.info.name.clone(),
                segment_suffix: String::new(),
                io_context: IoContext::ReadMostly,
                field_infos: self.info.field_infos.clone(),
            },
            self.compression,
        )
    }
}

/// Registry of published segments
///
/// Publishing registers the segment with the attached tier manager (HOT);
/// queries against unknown segments return `None` rather than an error.
#[derive(Default)]
pub struct SegmentCatalog {
    segments: RwLock<FxHashMap<String, Arc<SegmentEntry>>>,
    tiers: Option<Arc<TierManager>>,
}

impl SegmentCatalog {
    /// Creates a catalog without lifecycle tracking.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog that registers and tracks segments in the given
    /// tier manager.
    #[must_use]
    pub fn with_tier_manager(tiers: Arc<TierManager>) -> Self {
        Self {
            segments: RwLock::new(FxHashMap::default()),
            tiers: Some(tiers),
        }
    }

    /// Publishes a finished segment.
    pub fn publish(
        &self,
        info: SegmentInfo,
        directory: Arc<dyn Directory>,
        compression: CompressionType,
    ) {
        if let Some(tiers) = &self.tiers {
            tiers.register(&info.name, info.size_bytes);
        }

        log::debug!("publishing segment {:?} ({} docs)", info.name, info.doc_count);

        let name = info.name.clone();
        let entry = Arc::new(SegmentEntry {
            info,
            directory,
            compression,
        });

        #[allow(clippy::expect_used)]
        self.segments
            .write()
            .expect("lock is poisoned")
            .insert(name, entry);
    }

    /// Resolves a segment; `None` when missing (not an error).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<SegmentEntry>> {
        #[allow(clippy::expect_used)]
        let segments = self.segments.read().expect("lock is poisoned");
        segments.get(name).cloned()
    }

    /// Records an access for lifecycle decisions.
    pub fn record_access(&self, name: &str) {
        if let Some(tiers) = &self.tiers {
            tiers.record_access(name);
        }
    }

    /// Removes a segment from the catalog (and the tier manager).
    pub fn remove(&self, name: &str) {
        #[allow(clippy::expect_used)]
        self.segments
            .write()
            .expect("lock is poisoned")
            .remove(name);

        if let Some(tiers) = &self.tiers {
            let _ = tiers.remove(name);
        }
    }

    /// All published segment names, sorted.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        #[allow(clippy::expect_used)]
        let segments = self.segments.read().expect("lock is poisoned");
        let mut names: Vec<String> = segments.keys().cloned().collect();
        names.sort();
        names
    }
}
