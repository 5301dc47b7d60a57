// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Block-tree term dictionary
//!
//! Terms are written as prefix-compressed blocks into a `.tim` stream, with
//! an FST in the `.tip` stream mapping each block's first term to its file
//! pointer. Sequential iteration walks blocks in order; random access seeks
//! through the FST.

mod reader;
mod writer;

pub use reader::{BlockTreeTermsReader, TermsCursor};
pub use writer::BlockTreeTermsWriter;

/// Default minimum terms per block
pub const DEFAULT_MIN_ITEMS_IN_BLOCK: usize = 25;

/// Default maximum terms per block
pub const DEFAULT_MAX_ITEMS_IN_BLOCK: usize = 48;

/// Block sizing policy
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BlockTreeConfig {
    /// Minimum terms per block (a field with fewer total terms still writes
    /// a single undersized block)
    pub min_items_in_block: usize,

    /// Maximum terms per block; a full pending buffer triggers a block write
    pub max_items_in_block: usize,
}

impl Default for BlockTreeConfig {
    fn default() -> Self {
        Self {
            min_items_in_block: DEFAULT_MIN_ITEMS_IN_BLOCK,
            max_items_in_block: DEFAULT_MAX_ITEMS_IN_BLOCK,
        }
    }
}

impl BlockTreeConfig {
    pub(crate) fn validate(self) -> crate::Result<()> {
        if self.min_items_in_block == 0 {
            return Err(crate::Error::InvalidConfig("min_items_in_block must be > 0"));
        }
        if self.min_items_in_block > self.max_items_in_block {
            return Err(crate::Error::InvalidConfig(
                "min_items_in_block must not exceed max_items_in_block",
            ));
        }
        Ok(())
    }
}

/// Per-term postings statistics
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct TermStats {
    /// Unique documents containing the term
    pub doc_freq: u32,

    /// Sum of in-document occurrences
    pub total_term_freq: u64,

    /// File pointer into the postings stream
    pub postings_fp: u64,
}

impl TermStats {
    /// Convenience constructor.
    #[must_use]
    pub fn new(doc_freq: u32, total_term_freq: u64, postings_fp: u64) -> Self {
        Self {
            doc_freq,
            total_term_freq,
            postings_fp,
        }
    }
}

/// Result of a [`TermsCursor::seek_ceil`]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SeekStatus {
    /// Exact term found; cursor positioned on it
    Found,

    /// Term absent; cursor positioned on the smallest greater term
    NotFound,

    /// Term is beyond the last term; cursor unpositioned
    End,
}
