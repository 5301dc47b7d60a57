// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{
    accumulate_scores, top_k_from_scores, ForwardIndex, SearchResult, SparseVector, TopKHeap,
};
use crate::{
    coding::{Decode, DecodeError, Encode},
    columnar::{ColumnarReader, ColumnarWriter, DEFAULT_ROWS_PER_GRANULE},
    directory::{Directory, IoContext},
    Column, CompressionType, FieldType, FieldValue, SharedColumn,
};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

const SINDI_MAGIC: [u8; 4] = *b"DSNI";
const SINDI_VERSION: u8 = 1;

/// Codec for the persisted posting-list columns
const SPARSE_COLUMN_COMPRESSION: CompressionType = CompressionType::Lz4;

/// SINDI index configuration
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SindiConfig {
    /// Postings per block (smaller blocks prune better, more metadata)
    pub block_size: usize,

    /// Enable block-max pruning during search
    pub use_block_max: bool,

    /// Use the 8-lane accumulation kernel
    pub use_simd: bool,

    /// Emit software prefetch hints
    pub use_prefetch: bool,

    /// Mapped-chunk size exponent, `2^chunk_power` bytes, valid 20..=40
    pub chunk_power: u8,

    /// Vocabulary size; 0 derives it from the documents at build time
    pub num_dimensions: u32,
}

impl Default for SindiConfig {
    fn default() -> Self {
        Self {
            block_size: 128,
            use_block_max: true,
            use_simd: true,
            use_prefetch: true,
            chunk_power: 30,
            num_dimensions: 0,
        }
    }
}

impl SindiConfig {
    fn validate(&self) -> crate::Result<()> {
        if self.block_size == 0 {
            return Err(crate::Error::InvalidConfig("block_size must be > 0"));
        }
        if !(20..=40).contains(&self.chunk_power) {
            return Err(crate::Error::InvalidConfig("chunk_power must be in [20, 40]"));
        }
        Ok(())
    }
}

/// Metadata for one posting-list block
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BlockMeta {
    /// Offset into the term's posting arrays
    pub offset: u32,

    /// Postings in this block
    pub count: u32,

    /// Maximum weight inside the block (pruning upper bound)
    pub max_weight: f32,
}

/// Sparse inverted index with block-max pruning
///
/// Posting lists are stored as two parallel numeric columns per term
/// (doc ids and weights) partitioned into fixed-size blocks; each block
/// carries its maximum weight so search can skip blocks that cannot improve
/// the current top-k.
pub struct SindiIndex {
    config: SindiConfig,
    num_documents: u32,
    num_postings: u64,
    term_doc_ids: Vec<SharedColumn>,
    term_weights: Vec<SharedColumn>,
    term_blocks: Vec<Vec<BlockMeta>>,
    max_term_weights: Vec<f32>,
    forward: ForwardIndex,
}

impl SindiIndex {
    /// Builds the index from document sparse vectors.
    ///
    /// Vocabulary size is `1 + max term index` unless fixed by the config;
    /// terms at or above it are dropped, as are non-positive weights.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a bad configuration.
    pub fn build(config: SindiConfig, documents: &[SparseVector]) -> crate::Result<Self> {
        config.validate()?;

        let derived = documents
            .iter()
            .map(SparseVector::max_dimension)
            .max()
            .unwrap_or(0);
        let num_dimensions = if config.num_dimensions > 0 {
            config.num_dimensions
        } else {
            derived
        };

        let mut postings: Vec<Vec<(u32, f32)>> = vec![Vec::new(); num_dimensions as usize];
        for (doc_id, document) in documents.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let doc_id = doc_id as u32;
            for (index, weight) in document.iter() {
                if index < num_dimensions && weight > 0.0 {
                    postings[index as usize].push((doc_id, weight));
                }
            }
        }

        let mut term_doc_ids = Vec::with_capacity(postings.len());
        let mut term_weights = Vec::with_capacity(postings.len());
        let mut term_blocks = Vec::with_capacity(postings.len());
        let mut max_term_weights = Vec::with_capacity(postings.len());
        let mut num_postings = 0u64;

        for mut list in postings {
            list.sort_by_key(|(doc_id, _)| *doc_id);
            num_postings += list.len() as u64;

            let mut blocks = Vec::with_capacity(list.len().div_ceil(config.block_size));
            let mut term_max = 0f32;

            for (block_idx, chunk) in list.chunks(config.block_size).enumerate() {
                let max_weight = chunk.iter().fold(0f32, |acc, (_, w)| acc.max(*w));
                term_max = term_max.max(max_weight);

                #[allow(clippy::cast_possible_truncation)]
                blocks.push(BlockMeta {
                    offset: (block_idx * config.block_size) as u32,
                    count: chunk.len() as u32,
                    max_weight,
                });
            }

            let ids = Column::UInt32(list.iter().map(|(doc_id, _)| *doc_id).collect());
            let weights = Column::Float32(list.iter().map(|(_, weight)| *weight).collect());

            term_doc_ids.push(SharedColumn::new(ids));
            term_weights.push(SharedColumn::new(weights));
            term_blocks.push(blocks);
            max_term_weights.push(term_max);
        }

        #[allow(clippy::cast_possible_truncation)]
        Ok(Self {
            config: SindiConfig {
                num_dimensions,
                ..config
            },
            num_documents: documents.len() as u32,
            num_postings,
            term_doc_ids,
            term_weights,
            term_blocks,
            max_term_weights,
            forward: ForwardIndex::build(documents, num_dimensions),
        })
    }

    /// Index configuration (with the resolved vocabulary size).
    #[must_use]
    pub fn config(&self) -> &SindiConfig {
        &self.config
    }

    /// Vocabulary size.
    #[must_use]
    pub fn num_terms(&self) -> u32 {
        self.config.num_dimensions
    }

    /// Indexed documents.
    #[must_use]
    pub fn num_documents(&self) -> u32 {
        self.num_documents
    }

    /// Total postings across all terms.
    #[must_use]
    pub fn num_postings(&self) -> u64 {
        self.num_postings
    }

    /// Block metadata of one term (for inspection and tests).
    #[must_use]
    pub fn term_blocks(&self, term: u32) -> Option<&[BlockMeta]> {
        self.term_blocks.get(term as usize).map(Vec::as_slice)
    }

    /// Reconstructs the sparse vector inserted at `doc_id`.
    #[must_use]
    pub fn get_document(&self, doc_id: u32) -> Option<SparseVector> {
        self.forward.get_document(doc_id)
    }

    /// Ranks documents by `sum(query_weight * doc_weight)` and returns the
    /// top `k`, scores descending, ties by ascending doc id.
    ///
    /// Query terms outside the vocabulary contribute zero. With block-max
    /// pruning enabled, blocks whose best possible contribution cannot beat
    /// the current k-th score are skipped.
    #[must_use]
    pub fn search(&self, query: &SparseVector, k: usize) -> Vec<SearchResult> {
        if k == 0 || self.num_documents == 0 {
            return Vec::new();
        }

        let mut scores = vec![0f32; self.num_documents as usize];

        if self.config.use_block_max {
            self.search_block_max(query, k, &mut scores);
        } else {
            for (index, query_weight) in query.iter() {
                let Some(term) = self.term_arrays(index) else {
                    continue;
                };
                accumulate_scores(
                    term.0,
                    term.1,
                    query_weight,
                    &mut scores,
                    self.config.use_simd,
                    self.config.use_prefetch,
                );
            }
        }

        top_k_from_scores(&scores, k)
    }

    fn term_arrays(&self, term: u32) -> Option<(&[u32], &[f32])> {
        let ids = self.term_doc_ids.get(term as usize)?.as_u32_slice()?;
        let weights = self.term_weights.get(term as usize)?.as_f32_slice()?;
        Some((ids, weights))
    }

    fn search_block_max(&self, query: &SparseVector, k: usize, scores: &mut [f32]) {
        // Process terms in decreasing upper-bound order so the heap
        // threshold tightens early
        let mut terms: Vec<(u32, f32, f32)> = query
            .iter()
            .filter_map(|(index, query_weight)| {
                let max = *self.max_term_weights.get(index as usize)?;
                Some((index, query_weight, query_weight * max))
            })
            .collect();
        terms.sort_by(|a, b| b.2.total_cmp(&a.2));

        let mut heap = TopKHeap::new(k);

        for (index, query_weight, _) in terms {
            let Some((doc_ids, weights)) = self.term_arrays(index) else {
                continue;
            };
            let Some(blocks) = self.term_blocks.get(index as usize) else {
                continue;
            };

            for block in blocks {
                let upper_bound = query_weight * block.max_weight;
                if let Some(threshold) = heap.threshold() {
                    if threshold > upper_bound {
                        continue;
                    }
                }

                let start = block.offset as usize;
                let end = start + block.count as usize;

                accumulate_scores(
                    &doc_ids[start..end],
                    &weights[start..end],
                    query_weight,
                    scores,
                    self.config.use_simd,
                    self.config.use_prefetch,
                );

                for &doc_id in &doc_ids[start..end] {
                    if let Some(&score) = scores.get(doc_id as usize) {
                        heap.offer(score, doc_id);
                    }
                }
            }
        }
    }

    /// Persists the index: per-term `.col` posting columns, `.bin` block and
    /// forward tables, and a `.idx` metadata file.
    ///
    /// # Errors
    ///
    /// Returns `Io`/`Encode` on failure.
    pub fn save(&self, directory: &dyn Directory, segment: &str) -> crate::Result<()> {
        let mut files = Vec::new();

        {
            let name = format!("{segment}_sindi.idx");
            let mut out = directory.create_output(&name, IoContext::Default)?;
            let mut meta = Vec::new();
            meta.extend_from_slice(&SINDI_MAGIC);
            meta.push(SINDI_VERSION);
            meta.write_u32::<LittleEndian>(self.config.block_size as u32)?;
            meta.push(u8::from(self.config.use_block_max));
            meta.push(u8::from(self.config.use_simd));
            meta.push(u8::from(self.config.use_prefetch));
            meta.push(self.config.chunk_power);
            meta.write_u32::<LittleEndian>(self.config.num_dimensions)?;
            meta.write_u32::<LittleEndian>(self.num_documents)?;
            meta.write_u64::<LittleEndian>(self.num_postings)?;
            out.write_all(&meta)?;
            out.finish()?;
            files.push(name);
        }

        {
            let name = format!("{segment}_sindi_blocks.bin");
            let mut out = directory.create_output(&name, IoContext::Default)?;
            let mut table = Vec::new();
            for blocks in &self.term_blocks {
                table.write_u32::<LittleEndian>(blocks.len() as u32)?;
                for block in blocks {
                    table.write_u32::<LittleEndian>(block.offset)?;
                    table.write_u32::<LittleEndian>(block.count)?;
                    table.write_f32::<LittleEndian>(block.max_weight)?;
                }
            }
            for &max in &self.max_term_weights {
                table.write_f32::<LittleEndian>(max)?;
            }
            out.write_all(&table)?;
            out.finish()?;
            files.push(name);
        }

        {
            let name = format!("{segment}_sindi_fwd.bin");
            let mut out = directory.create_output(&name, IoContext::Default)?;
            out.write_all(&self.forward.encode_into_vec())?;
            out.finish()?;
            files.push(name);
        }

        for term in 0..self.config.num_dimensions {
            let Some((doc_ids, weights)) = self.term_arrays(term) else {
                continue;
            };
            if doc_ids.is_empty() {
                continue;
            }

            let ids_name = format!("{segment}_sindi_{term}_ids.col");
            let mut out = directory.create_output(&ids_name, IoContext::Default)?;
            let mut writer = ColumnarWriter::new(
                FieldType::UInt32,
                SPARSE_COLUMN_COMPRESSION,
                DEFAULT_ROWS_PER_GRANULE,
            )?;
            for &doc_id in doc_ids {
                writer.push(FieldValue::UInt64(u64::from(doc_id)))?;
            }
            writer.finish(out.as_mut())?;
            files.push(ids_name);

            let wts_name = format!("{segment}_sindi_{term}_wts.col");
            let mut out = directory.create_output(&wts_name, IoContext::Default)?;
            let mut writer = ColumnarWriter::new(
                FieldType::Float32,
                SPARSE_COLUMN_COMPRESSION,
                DEFAULT_ROWS_PER_GRANULE,
            )?;
            for &weight in weights {
                writer.push(FieldValue::Float32(weight))?;
            }
            writer.finish(out.as_mut())?;
            files.push(wts_name);
        }

        let names: Vec<&str> = files.iter().map(String::as_str).collect();
        directory.sync(&names)?;
        directory.sync_metadata()?;

        Ok(())
    }

    /// Loads an index saved by [`SindiIndex::save`], rebuilding every derived
    /// structure. The document count always comes from the metadata file and
    /// is cross-checked against the forward index.
    ///
    /// # Errors
    ///
    /// Returns `Decode` on corrupt or inconsistent files.
    pub fn load(directory: &dyn Directory, segment: &str) -> crate::Result<Self> {
        let (config, num_documents, num_postings) = {
            let mut input =
                directory.open_input(&format!("{segment}_sindi.idx"), IoContext::ReadMostly)?;

            let mut magic = [0u8; SINDI_MAGIC.len()];
            input.read_exact(&mut magic)?;
            if magic != SINDI_MAGIC {
                return Err(DecodeError::InvalidHeader("SindiIndex").into());
            }
            let version = input.read_u8()?;
            if version != SINDI_VERSION {
                return Err(DecodeError::InvalidVersion(u32::from(version)).into());
            }

            let block_size = input.read_u32::<LittleEndian>()? as usize;
            let use_block_max = input.read_u8()? != 0;
            let use_simd = input.read_u8()? != 0;
            let use_prefetch = input.read_u8()? != 0;
            let chunk_power = input.read_u8()?;
            let num_dimensions = input.read_u32::<LittleEndian>()?;
            let num_documents = input.read_u32::<LittleEndian>()?;
            let num_postings = input.read_u64::<LittleEndian>()?;

            let config = SindiConfig {
                block_size,
                use_block_max,
                use_simd,
                use_prefetch,
                chunk_power,
                num_dimensions,
            };
            config.validate()?;

            (config, num_documents, num_postings)
        };

        let (term_blocks, max_term_weights) = {
            let mut input = directory.open_input(
                &format!("{segment}_sindi_blocks.bin"),
                IoContext::ReadMostly,
            )?;

            let mut term_blocks = Vec::with_capacity(config.num_dimensions as usize);
            for _ in 0..config.num_dimensions {
                let count = input.read_u32::<LittleEndian>()?;
                let mut blocks = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    blocks.push(BlockMeta {
                        offset: input.read_u32::<LittleEndian>()?,
                        count: input.read_u32::<LittleEndian>()?,
                        max_weight: input.read_f32::<LittleEndian>()?,
                    });
                }
                term_blocks.push(blocks);
            }

            let mut max_term_weights = Vec::with_capacity(config.num_dimensions as usize);
            for _ in 0..config.num_dimensions {
                max_term_weights.push(input.read_f32::<LittleEndian>()?);
            }

            (term_blocks, max_term_weights)
        };

        let forward = {
            let mut input =
                directory.open_input(&format!("{segment}_sindi_fwd.bin"), IoContext::ReadMostly)?;
            ForwardIndex::decode_from(&mut input)?
        };

        if forward.num_documents() != num_documents {
            return Err(DecodeError::LengthMismatch((
                num_documents as usize,
                forward.num_documents() as usize,
            ))
            .into());
        }

        let mut term_doc_ids = Vec::with_capacity(config.num_dimensions as usize);
        let mut term_weights = Vec::with_capacity(config.num_dimensions as usize);

        for term in 0..config.num_dimensions {
            let has_postings = term_blocks
                .get(term as usize)
                .is_some_and(|blocks| !blocks.is_empty());

            if has_postings {
                let input = directory.open_input(
                    &format!("{segment}_sindi_{term}_ids.col"),
                    IoContext::ReadMostly,
                )?;
                let mut reader =
                    ColumnarReader::open(input, FieldType::UInt32, SPARSE_COLUMN_COMPRESSION)?;
                term_doc_ids.push(SharedColumn::new(reader.read_all()?));

                let input = directory.open_input(
                    &format!("{segment}_sindi_{term}_wts.col"),
                    IoContext::ReadMostly,
                )?;
                let mut reader =
                    ColumnarReader::open(input, FieldType::Float32, SPARSE_COLUMN_COMPRESSION)?;
                term_weights.push(SharedColumn::new(reader.read_all()?));
            } else {
                term_doc_ids.push(SharedColumn::new(Column::UInt32(Vec::new())));
                term_weights.push(SharedColumn::new(Column::Float32(Vec::new())));
            }
        }

        Ok(Self {
            config,
            num_documents,
            num_postings,
            term_doc_ids,
            term_weights,
            term_blocks,
            max_term_weights,
            forward,
        })
    }
}
