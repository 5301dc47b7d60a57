// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::CompressionType;

/// Storage tier of a segment
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum Tier {
    /// Fast storage (NVMe/RAM), recent data, full caching
    Hot,

    /// Standard storage, moderate query volume
    Warm,

    /// Archive storage, infrequent queries, on-demand loading
    Cold,

    /// Deep archive, compliance and audit only
    Frozen,
}

impl Tier {
    /// All tiers, hottest first.
    pub const ALL: [Self; 4] = [Self::Hot, Self::Warm, Self::Cold, Self::Frozen];
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Hot => "hot",
                Self::Warm => "warm",
                Self::Cold => "cold",
                Self::Frozen => "frozen",
            }
        )
    }
}

/// Per-tier storage configuration
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TierConfig {
    /// Cache budget for segments in this tier
    pub max_cache_bytes: u64,

    /// Whether segment files are mmap-backed
    pub use_mmap: bool,

    /// Whether the tier participates in queries by default
    pub searchable: bool,

    /// Whether new writes are allowed
    pub writable: bool,

    /// Codec preference applied when (re)compressing on migration
    pub compression: CompressionType,
}

impl TierConfig {
    /// A sensible default configuration for the given tier.
    #[must_use]
    pub fn default_for(tier: Tier) -> Self {
        match tier {
            Tier::Hot => Self {
                max_cache_bytes: 16 * 1024 * 1024 * 1024,
                use_mmap: true,
                searchable: true,
                writable: true,
                compression: CompressionType::Lz4,
            },
            Tier::Warm => Self {
                max_cache_bytes: 4 * 1024 * 1024 * 1024,
                use_mmap: true,
                searchable: true,
                writable: false,
                compression: CompressionType::Zstd(3),
            },
            Tier::Cold => Self {
                max_cache_bytes: 512 * 1024 * 1024,
                use_mmap: false,
                searchable: true,
                writable: false,
                compression: CompressionType::Zstd(9),
            },
            Tier::Frozen => Self {
                max_cache_bytes: 64 * 1024 * 1024,
                use_mmap: false,
                searchable: false,
                writable: false,
                compression: CompressionType::Zstd(19),
            },
        }
    }
}
