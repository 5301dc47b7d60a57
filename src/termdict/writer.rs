// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{BlockTreeConfig, TermStats};
use crate::{directory::IndexOutput, fst::FstBuilder, Bytes};
use std::io::Write;
use varint_rs::VarintWriter;

/// Writes terms in block-tree format with an FST prefix index
///
/// Terms must be added in strictly ascending byte order. Blocks are emitted
/// whenever `max_items_in_block` terms are pending (and once more on
/// `finish` for the partial tail).
pub struct BlockTreeTermsWriter {
    tim: Box<dyn IndexOutput>,
    config: BlockTreeConfig,
    pending: Vec<(Bytes, TermStats)>,
    last_term: Option<Bytes>,
    fst_builder: FstBuilder,
    num_terms: u64,
}

impl BlockTreeTermsWriter {
    /// Creates a writer emitting blocks into the `.tim` output.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a bad block sizing policy.
    pub fn new(tim: Box<dyn IndexOutput>, config: BlockTreeConfig) -> crate::Result<Self> {
        config.validate()?;

        Ok(Self {
            tim,
            config,
            pending: Vec::new(),
            last_term: None,
            fst_builder: FstBuilder::new(),
            num_terms: 0,
        })
    }

    /// Adds a term with its statistics.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for empty, duplicate, or out-of-order terms.
    pub fn add_term(&mut self, term: &[u8], stats: TermStats) -> crate::Result<()> {
        if term.is_empty() {
            return Err(crate::Error::InvalidInput("terms must be non-empty"));
        }

        if let Some(last) = &self.last_term {
            if term <= last.as_ref() {
                return Err(crate::Error::InvalidInput(
                    "terms must be added in strictly ascending order",
                ));
            }
        }

        self.last_term = Some(Bytes::from(term));
        self.pending.push((Bytes::from(term), stats));
        self.num_terms += 1;

        if self.pending.len() >= self.config.max_items_in_block {
            self.write_block()?;
        }

        Ok(())
    }

    /// Terms added so far.
    #[must_use]
    pub fn num_terms(&self) -> u64 {
        self.num_terms
    }

    fn write_block(&mut self) -> crate::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let block_fp = self.tim.file_pointer();

        let first = self.pending[0].0.clone();

        let mut prefix_len = first.len();
        for (term, _) in &self.pending[1..] {
            prefix_len = prefix_len.min(first.common_prefix_len(term));
        }

        self.tim.write_u64_varint(prefix_len as u64)?;
        self.tim.write_all(&first[..prefix_len])?;
        self.tim.write_u64_varint(self.pending.len() as u64)?;

        for (term, stats) in &self.pending {
            let suffix = &term[prefix_len..];
            self.tim.write_u64_varint(suffix.len() as u64)?;
            self.tim.write_all(suffix)?;
            self.tim.write_u32_varint(stats.doc_freq)?;
            self.tim.write_u64_varint(stats.total_term_freq)?;
            self.tim.write_u64_varint(stats.postings_fp)?;
        }

        #[allow(clippy::cast_possible_wrap)]
        self.fst_builder.insert(&first, block_fp as i64)?;

        self.pending.clear();

        Ok(())
    }

    /// Flushes the last (possibly undersized) block, syncs the `.tim`
    /// stream, and serializes the FST into the `.tip` output.
    ///
    /// Returns the total number of terms written.
    ///
    /// # Errors
    ///
    /// Returns `Io`/`Encode` on failure.
    pub fn finish(mut self, tip: &mut dyn IndexOutput) -> crate::Result<u64> {
        self.write_block()?;
        self.tim.finish()?;

        let fst = self.fst_builder.finish()?;
        tip.write_all(&fst.serialize())?;
        tip.finish()?;

        Ok(self.num_terms)
    }
}
