// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Columnar segment storage
//!
//! Rows are stored as per-column compressed granules (default 8192 rows)
//! with MinMax skip metadata. A range scan evaluates each granule in one of
//! three modes: skip (no I/O beyond metadata), bulk-count (no decompression),
//! or decompress-and-scan.

mod reader;
mod writer;

pub use reader::{ColumnarReader, ScanStats};
pub use writer::ColumnarWriter;

/// Default rows per granule, matching MergeTree-style granularity
pub const DEFAULT_ROWS_PER_GRANULE: u32 = 8192;

pub(crate) const DCOL_MAGIC: [u8; 4] = *b"DCOL";
pub(crate) const DCOL_VERSION: u32 = 1;
