// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::SparseVector;
use crate::coding::{Decode, DecodeError, Encode, EncodeError};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// CSR forward index: `get_document` in O(1)
///
/// `indptr` has one entry per document plus a trailing end offset; `indices`
/// and `values` hold the concatenated term ids and weights. Only terms with
/// index below the vocabulary size are stored.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ForwardIndex {
    indptr: Vec<u64>,
    indices: Vec<u32>,
    values: Vec<f32>,
}

impl ForwardIndex {
    /// Builds the index from documents, dropping terms with index `>=
    /// num_dimensions` and non-positive weights.
    #[must_use]
    pub fn build(documents: &[SparseVector], num_dimensions: u32) -> Self {
        let mut indptr = Vec::with_capacity(documents.len() + 1);
        let mut indices = Vec::new();
        let mut values = Vec::new();

        indptr.push(0);
        for document in documents {
            for (index, value) in document.iter() {
                if index < num_dimensions && value > 0.0 {
                    indices.push(index);
                    values.push(value);
                }
            }
            indptr.push(indices.len() as u64);
        }

        Self {
            indptr,
            indices,
            values,
        }
    }

    /// Number of documents.
    #[must_use]
    pub fn num_documents(&self) -> u32 {
        #[allow(clippy::cast_possible_truncation)]
        {
            (self.indptr.len().saturating_sub(1)) as u32
        }
    }

    /// Total stored postings.
    #[must_use]
    pub fn num_postings(&self) -> u64 {
        self.indices.len() as u64
    }

    /// Reconstructs the sparse vector stored at `doc_id`.
    #[must_use]
    pub fn get_document(&self, doc_id: u32) -> Option<SparseVector> {
        let doc = doc_id as usize;
        if doc + 1 >= self.indptr.len() {
            return None;
        }

        let start = self.indptr[doc] as usize;
        let end = self.indptr[doc + 1] as usize;

        Some(SparseVector::from_pairs(
            self.indices[start..end]
                .iter()
                .copied()
                .zip(self.values[start..end].iter().copied())
                .collect(),
        ))
    }
}

impl Encode for ForwardIndex {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_u64::<LittleEndian>(self.indptr.len() as u64)?;
        for &offset in &self.indptr {
            writer.write_u64::<LittleEndian>(offset)?;
        }

        writer.write_u64::<LittleEndian>(self.indices.len() as u64)?;
        for &index in &self.indices {
            writer.write_u32::<LittleEndian>(index)?;
        }
        for &value in &self.values {
            writer.write_f32::<LittleEndian>(value)?;
        }

        Ok(())
    }
}

impl Decode for ForwardIndex {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let indptr_len = usize::try_from(reader.read_u64::<LittleEndian>()?)
            .map_err(|_| DecodeError::InvalidHeader("indptr length"))?;
        if indptr_len == 0 {
            return Err(DecodeError::InvalidHeader("indptr must not be empty"));
        }

        let mut indptr = Vec::with_capacity(indptr_len);
        for _ in 0..indptr_len {
            indptr.push(reader.read_u64::<LittleEndian>()?);
        }

        let postings_len = usize::try_from(reader.read_u64::<LittleEndian>()?)
            .map_err(|_| DecodeError::InvalidHeader("postings length"))?;

        if indptr.last().copied() != Some(postings_len as u64) {
            return Err(DecodeError::LengthMismatch((
                postings_len,
                indptr.last().copied().unwrap_or(0) as usize,
            )));
        }

        let mut indices = Vec::with_capacity(postings_len);
        for _ in 0..postings_len {
            indices.push(reader.read_u32::<LittleEndian>()?);
        }

        let mut values = Vec::with_capacity(postings_len);
        for _ in 0..postings_len {
            values.push(reader.read_f32::<LittleEndian>()?);
        }

        Ok(Self {
            indptr,
            indices,
            values,
        })
    }
}
