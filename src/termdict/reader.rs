// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{SeekStatus, TermStats};
use crate::{
    binary_search::partition_point,
    directory::IndexInput,
    fst::Fst,
    postings::PostingsEnum,
    Bytes,
};
use std::{io::Read, sync::Arc};
use varint_rs::VarintReader;

/// Reads a block-tree term dictionary
///
/// Holds the FST deserialized from `.tip` plus input templates; every cursor
/// works on independent input clones so concurrent cursors never race on a
/// shared file pointer.
pub struct BlockTreeTermsReader {
    tim: Box<dyn IndexInput>,
    fst: Arc<Fst>,
    block_index: Vec<(Bytes, u64)>,
    postings: Option<Box<dyn IndexInput>>,
}

impl BlockTreeTermsReader {
    /// Opens a dictionary from its `.tim` and `.tip` inputs.
    ///
    /// # Errors
    ///
    /// Returns `Decode` if the FST stream is corrupt.
    pub fn open(tim: Box<dyn IndexInput>, mut tip: Box<dyn IndexInput>) -> crate::Result<Self> {
        let tip_bytes = tip.read_to_end_vec()?;
        let fst = Fst::deserialize(&tip_bytes)?;

        #[allow(clippy::cast_sign_loss)]
        let block_index = fst
            .entries()?
            .iter()
            .map(|(term, fp)| (term.clone(), *fp as u64))
            .collect();

        Ok(Self {
            tim,
            fst: Arc::new(fst),
            block_index,
            postings: None,
        })
    }

    /// Attaches a postings (`.doc`) input so cursors can open postings enums.
    #[must_use]
    pub fn with_postings(mut self, postings: Box<dyn IndexInput>) -> Self {
        self.postings = Some(postings);
        self
    }

    /// The FST mapping block first-terms to block file pointers.
    #[must_use]
    pub fn fst(&self) -> &Arc<Fst> {
        &self.fst
    }

    /// Number of term blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.block_index.len()
    }

    /// Creates a cursor with its own input clone.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the input cannot be cloned.
    pub fn cursor(&self) -> crate::Result<TermsCursor<'_>> {
        Ok(TermsCursor {
            reader: self,
            input: self.tim.clone_input()?,
            terms: Vec::new(),
            stats: Vec::new(),
            idx: 0,
            positioned: false,
        })
    }
}

/// Cursor over the terms of one field
///
/// Supports sequential iteration plus FST-guided `seek_exact`/`seek_ceil`.
pub struct TermsCursor<'a> {
    reader: &'a BlockTreeTermsReader,
    input: Box<dyn IndexInput>,
    terms: Vec<Bytes>,
    stats: Vec<TermStats>,
    idx: usize,
    positioned: bool,
}

impl TermsCursor<'_> {
    /// Advances to the next term; loads the next block when the current one
    /// is exhausted.
    ///
    /// Returns `false` at the end of the dictionary.
    ///
    /// # Errors
    ///
    /// Returns `Io`/`Decode` on a corrupt block.
    pub fn next(&mut self) -> crate::Result<bool> {
        if self.positioned && self.idx + 1 < self.terms.len() {
            self.idx += 1;
            return Ok(true);
        }

        if self.positioned {
            // Current block exhausted; the input is already positioned at
            // the next block start
            if self.input.position() >= self.input.length() {
                self.positioned = false;
                return Ok(false);
            }
            self.load_block_at_position()?;
            self.idx = 0;
            return Ok(true);
        }

        // Unpositioned: start from the first block
        if self.input.length() == 0 {
            return Ok(false);
        }
        self.input.seek(0)?;
        self.load_block_at_position()?;
        self.idx = 0;
        self.positioned = true;
        Ok(true)
    }

    /// Seeks to the smallest term `>=` target.
    ///
    /// # Errors
    ///
    /// Returns `Io`/`Decode` on a corrupt block.
    pub fn seek_ceil(&mut self, target: &[u8]) -> crate::Result<SeekStatus> {
        let index = &self.reader.block_index;
        if index.is_empty() {
            self.positioned = false;
            return Ok(SeekStatus::End);
        }

        // Last block whose first term <= target
        let pos = partition_point(index, |(first, _)| first.as_ref() <= target);

        let block = pos.saturating_sub(1);
        self.load_block(index[block].1)?;

        let ceil = partition_point(&self.terms, |term| term.as_ref() < target);

        if ceil < self.terms.len() {
            self.idx = ceil;
            self.positioned = true;
            if self.terms[ceil].as_ref() == target {
                return Ok(SeekStatus::Found);
            }
            return Ok(SeekStatus::NotFound);
        }

        // Target is greater than every term of this block; the ceil (if any)
        // is the first term of the following block
        if block + 1 < index.len() {
            self.load_block(index[block + 1].1)?;
            self.idx = 0;
            self.positioned = true;
            return Ok(SeekStatus::NotFound);
        }

        self.positioned = false;
        Ok(SeekStatus::End)
    }

    /// Whether `target` is exactly a stored term; positions the cursor on it.
    ///
    /// # Errors
    ///
    /// Returns `Io`/`Decode` on a corrupt block.
    pub fn seek_exact(&mut self, target: &[u8]) -> crate::Result<bool> {
        Ok(matches!(self.seek_ceil(target)?, SeekStatus::Found))
    }

    /// Bytes of the current term.
    #[must_use]
    pub fn term(&self) -> Option<&Bytes> {
        if self.positioned {
            self.terms.get(self.idx)
        } else {
            None
        }
    }

    /// Document frequency of the current term.
    #[must_use]
    pub fn doc_freq(&self) -> Option<u32> {
        self.current_stats().map(|s| s.doc_freq)
    }

    /// Total term frequency of the current term.
    #[must_use]
    pub fn total_term_freq(&self) -> Option<u64> {
        self.current_stats().map(|s| s.total_term_freq)
    }

    /// Statistics of the current term.
    #[must_use]
    pub fn current_stats(&self) -> Option<&TermStats> {
        if self.positioned {
            self.stats.get(self.idx)
        } else {
            None
        }
    }

    /// Lazily opens a postings enum for the current term.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the cursor is unpositioned or the reader has
    /// no postings input attached.
    pub fn postings(&self) -> crate::Result<PostingsEnum> {
        let stats = self
            .current_stats()
            .ok_or(crate::Error::InvalidInput("cursor is not positioned"))?;

        let template = self
            .reader
            .postings
            .as_ref()
            .ok_or(crate::Error::InvalidInput("no postings input attached"))?;

        PostingsEnum::open(template.clone_input()?, stats.postings_fp, stats.doc_freq)
    }

    fn load_block(&mut self, fp: u64) -> crate::Result<()> {
        self.input.seek(fp)?;
        self.load_block_at_position()
    }

    fn load_block_at_position(&mut self) -> crate::Result<()> {
        let prefix_len = self.input.read_u64_varint()? as usize;
        let mut prefix = vec![0u8; prefix_len];
        self.input.read_exact(&mut prefix)?;

        let count = self.input.read_u64_varint()? as usize;

        self.terms.clear();
        self.stats.clear();

        for _ in 0..count {
            let suffix_len = self.input.read_u64_varint()? as usize;
            let mut term = Vec::with_capacity(prefix_len + suffix_len);
            term.extend_from_slice(&prefix);
            term.resize(prefix_len + suffix_len, 0);
            self.input.read_exact(&mut term[prefix_len..])?;

            let doc_freq = self.input.read_u32_varint()?;
            let total_term_freq = self.input.read_u64_varint()?;
            let postings_fp = self.input.read_u64_varint()?;

            self.terms.push(Bytes::from(term));
            self.stats.push(TermStats {
                doc_freq,
                total_term_freq,
                postings_fp,
            });
        }

        Ok(())
    }
}
