// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Indexing and retrieval core for a search-and-analytics engine.
//!
//! ##### About
//!
//! This crate provides the storage and retrieval primitives of a
//! Lucene/ClickHouse-style engine, not a full search server: columnar
//! segments with compressed granules and MinMax skip metadata, a packed
//! finite-state transducer over a block-tree term dictionary, two
//! sparse-vector indexes, and a tiered-storage lifecycle controller.
//!
//! Rows are ingested through a [`segment::SegmentWriter`], which fans field
//! values into per-column buffers, inverted-term collectors, and sparse
//! builders. Every 8192 rows (a *granule*) each column is compressed and
//! appended to its `.col` file along with `(min, max)` skip metadata, so a
//! range scan can skip or bulk-count granules without decompressing them.
//! Closing the segment finalizes the prefix-compressed term blocks (`.tim`),
//! the FST index over them (`.tip`), the postings stream (`.doc`), and any
//! sparse indexes, then registers the segment HOT with the tier controller.
//!
//! # Example
//!
//! ```
//! use diagon::fst::FstBuilder;
//!
//! let mut builder = FstBuilder::new();
//! builder.insert(b"a", 5)?;
//! builder.insert(b"ab", 8)?;
//! let fst = builder.finish()?;
//!
//! assert_eq!(5, fst.get(b"a")?);
//! assert_eq!(8, fst.get(b"ab")?);
//! assert_eq!(diagon::fst::NO_OUTPUT, fst.get(b"abc")?);
//!
//! // Prefix lookups return the longest stored prefix and its output
//! assert_eq!(Some((2, 8)), fst.longest_prefix_match(b"abxyz")?);
//! #
//! # Ok::<(), diagon::Error>(())
//! ```

#![deny(unsafe_code)]
#![deny(clippy::all, missing_docs, clippy::cargo)]
#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![warn(clippy::multiple_crate_versions)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_lossless)]
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::indexing_slicing,
        clippy::cast_possible_wrap,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )
)]

mod binary_search;
mod bytes;
mod checksum;

#[doc(hidden)]
pub mod coding;

mod column;

pub mod columnar;

mod compress;

pub mod directory;

mod error;
mod field;

pub mod fst;

mod granule;

pub mod postings;

pub mod segment;

pub mod sparse;

pub mod storage;

#[doc(hidden)]
pub mod stop_signal;

pub mod termdict;

mod time;

pub use {
    bytes::Bytes,
    checksum::Checksum,
    coding::{Decode, DecodeError, Encode, EncodeError},
    column::{Column, SharedColumn},
    compress::CompressionType,
    error::{Error, Result},
    field::{FieldType, FieldValue},
    granule::{GranuleIndex, GranuleInfo, GranuleMark},
    sparse::{SearchResult, SparseVector},
    storage::{LifecyclePolicy, Tier, TierConfig, TierManager, TierMigrationService},
};
