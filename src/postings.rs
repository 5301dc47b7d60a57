// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Postings stream (`.doc`)
//!
//! Per term: a run of `(doc-id delta, freq)` variable-byte pairs. The term's
//! start file pointer is recorded in its [`crate::termdict::TermStats`].

use crate::directory::{IndexInput, IndexOutput};
use varint_rs::{VarintReader, VarintWriter};

/// Appends per-term postings to a `.doc` output
pub struct PostingsWriter {
    out: Box<dyn IndexOutput>,
    last_doc: u32,
    in_term: bool,
}

impl PostingsWriter {
    /// Wraps an output stream.
    #[must_use]
    pub fn new(out: Box<dyn IndexOutput>) -> Self {
        Self {
            out,
            last_doc: 0,
            in_term: false,
        }
    }

    /// Starts a term and returns its postings file pointer.
    pub fn start_term(&mut self) -> u64 {
        self.last_doc = 0;
        self.in_term = true;
        self.out.file_pointer()
    }

    /// Adds one document with its in-document frequency.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if called outside a term or with doc ids out of
    /// order, `Io` on write failure.
    pub fn add_doc(&mut self, doc_id: u32, freq: u32) -> crate::Result<()> {
        if !self.in_term {
            return Err(crate::Error::InvalidInput("add_doc outside of a term"));
        }
        if self.last_doc > 0 && doc_id <= self.last_doc - 1 {
            return Err(crate::Error::InvalidInput("postings doc ids must ascend"));
        }

        let delta = if self.last_doc == 0 {
            doc_id
        } else {
            doc_id - (self.last_doc - 1) - 1
        };

        self.out.write_u32_varint(delta)?;
        self.out.write_u32_varint(freq)?;
        self.last_doc = doc_id + 1;

        Ok(())
    }

    /// Ends the current term.
    pub fn finish_term(&mut self) {
        self.in_term = false;
    }

    /// Flushes and syncs the postings stream.
    ///
    /// # Errors
    ///
    /// Returns `Io` on failure.
    pub fn finish(mut self) -> crate::Result<()> {
        self.out.finish()
    }
}

/// Lazy cursor over one term's postings
pub struct PostingsEnum {
    input: Box<dyn IndexInput>,
    remaining: u32,
    last_doc: Option<u32>,
}

impl PostingsEnum {
    /// Positions a cloned input at `fp` and reads `doc_freq` entries.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the seek fails.
    pub fn open(mut input: Box<dyn IndexInput>, fp: u64, doc_freq: u32) -> crate::Result<Self> {
        input.seek(fp)?;
        Ok(Self {
            input,
            remaining: doc_freq,
            last_doc: None,
        })
    }

    /// Advances to the next `(doc_id, freq)` pair.
    ///
    /// # Errors
    ///
    /// Returns `Io`/`Decode` on a truncated stream.
    pub fn next(&mut self) -> crate::Result<Option<(u32, u32)>> {
        if self.remaining == 0 {
            return Ok(None);
        }

        let delta = self.input.read_u32_varint()?;
        let freq = self.input.read_u32_varint()?;

        let doc = match self.last_doc {
            None => delta,
            Some(prev) => prev + 1 + delta,
        };

        self.last_doc = Some(doc);
        self.remaining -= 1;

        Ok(Some((doc, freq)))
    }

    /// Postings left to read.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{Directory, IoContext, MemoryDirectory};
    use test_log::test;

    #[test]
    fn postings_roundtrip_with_deltas() -> crate::Result<()> {
        let dir = MemoryDirectory::default();

        let term_a = vec![(0u32, 2u32), (1, 1), (5, 3), (1000, 1)];
        let term_b = vec![(3u32, 7u32)];

        let (fp_a, fp_b) = {
            let out = dir.create_output("seg.doc", IoContext::Default)?;
            let mut writer = PostingsWriter::new(out);

            let fp_a = writer.start_term();
            for &(doc, freq) in &term_a {
                writer.add_doc(doc, freq)?;
            }
            writer.finish_term();

            let fp_b = writer.start_term();
            for &(doc, freq) in &term_b {
                writer.add_doc(doc, freq)?;
            }
            writer.finish_term();
            writer.finish()?;

            (fp_a, fp_b)
        };

        let input = dir.open_input("seg.doc", IoContext::ReadMostly)?;

        let mut postings = PostingsEnum::open(input.clone_input()?, fp_a, term_a.len() as u32)?;
        let mut collected = vec![];
        while let Some(pair) = postings.next()? {
            collected.push(pair);
        }
        assert_eq!(term_a, collected);

        let mut postings = PostingsEnum::open(input.clone_input()?, fp_b, term_b.len() as u32)?;
        assert_eq!(Some((3, 7)), postings.next()?);
        assert_eq!(None, postings.next()?);

        Ok(())
    }

    #[test]
    fn postings_doc_order_enforced() -> crate::Result<()> {
        let dir = MemoryDirectory::default();
        let out = dir.create_output("seg.doc", IoContext::Default)?;
        let mut writer = PostingsWriter::new(out);

        writer.start_term();
        writer.add_doc(10, 1)?;
        assert!(matches!(
            writer.add_doc(10, 1),
            Err(crate::Error::InvalidInput(_))
        ));
        assert!(matches!(
            writer.add_doc(4, 1),
            Err(crate::Error::InvalidInput(_))
        ));

        Ok(())
    }
}
