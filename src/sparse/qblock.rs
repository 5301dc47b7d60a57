// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{scorer::prefetch_read, top_k_from_scores, ForwardIndex, SearchResult, SparseVector};
use crate::{
    coding::{Decode, DecodeError, Encode},
    columnar::{ColumnarReader, ColumnarWriter, DEFAULT_ROWS_PER_GRANULE},
    directory::{Directory, IoContext},
    CompressionType, FieldType, FieldValue,
};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

const QBLOCK_MAGIC: [u8; 4] = *b"DQBK";
const QBLOCK_VERSION: u8 = 1;

const QBLOCK_COLUMN_COMPRESSION: CompressionType = CompressionType::Lz4;

/// Postings scanned ahead of the scatter-add position for prefetching
const SCATTER_PREFETCH_DISTANCE: usize = 48;

/// Block selection policy during search
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum SelectionMode {
    /// Select highest-gain blocks until `alpha` of the total mass is covered
    #[default]
    AlphaMass,

    /// Select a fixed number of top-gain blocks
    TopK,

    /// Select all blocks with `gain >= alpha * max_gain`
    MaxRatio,
}

impl SelectionMode {
    fn as_u8(self) -> u8 {
        match self {
            Self::AlphaMass => 0,
            Self::TopK => 1,
            Self::MaxRatio => 2,
        }
    }

    fn from_u8(tag: u8) -> Result<Self, DecodeError> {
        match tag {
            0 => Ok(Self::AlphaMass),
            1 => Ok(Self::TopK),
            2 => Ok(Self::MaxRatio),
            tag => Err(DecodeError::InvalidTag(("SelectionMode", tag))),
        }
    }
}

/// QBlock index configuration
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct QBlockConfig {
    /// Quantization bins, valid 1..=256
    pub num_bins: u32,

    /// Documents per window (cache-locality partition)
    pub window_size: u32,

    /// Mass / ratio parameter for block selection, in [0, 1]
    pub alpha: f32,

    /// Block selection policy
    pub selection_mode: SelectionMode,

    /// Budget for [`SelectionMode::TopK`]
    pub fixed_top_k: usize,

    /// Emit software prefetch hints during scatter-add
    pub use_prefetch: bool,

    /// Mapped-chunk size exponent, `2^chunk_power` bytes, valid 20..=40
    pub chunk_power: u8,

    /// Vocabulary size; 0 derives it from the documents at build time
    pub num_dimensions: u32,
}

impl Default for QBlockConfig {
    fn default() -> Self {
        Self {
            num_bins: 16,
            window_size: 8192,
            alpha: 0.75,
            selection_mode: SelectionMode::AlphaMass,
            fixed_top_k: 100,
            use_prefetch: true,
            chunk_power: 30,
            num_dimensions: 0,
        }
    }
}

impl QBlockConfig {
    fn validate(&self) -> crate::Result<()> {
        if !(1..=256).contains(&self.num_bins) {
            return Err(crate::Error::InvalidConfig("num_bins must be in [1, 256]"));
        }
        if self.window_size == 0 {
            return Err(crate::Error::InvalidConfig("window_size must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(crate::Error::InvalidConfig("alpha must be in [0, 1]"));
        }
        if !(20..=40).contains(&self.chunk_power) {
            return Err(crate::Error::InvalidConfig("chunk_power must be in [20, 40]"));
        }
        Ok(())
    }
}

/// Quantized block-organized sparse index
///
/// Weights are quantized into equal-frequency bins; posting lists are
/// organized as `[term][bin][window]` cells of window-local doc ids.
/// Search selects cells by gain and scatter-adds the bin representative
/// times the query weight. Approximate, but smaller and faster than
/// [`super::SindiIndex`].
pub struct QBlockIndex {
    config: QBlockConfig,
    num_documents: u32,
    num_windows: u32,
    num_postings: u64,
    max_weight: f32,
    quant_map: Vec<u8>,
    quant_val: Vec<f32>,
    blocks: Vec<Vec<Vec<Vec<u32>>>>,
    block_sizes: Vec<Vec<u32>>,
    forward: ForwardIndex,
}

impl QBlockIndex {
    /// Builds the quantized index from document sparse vectors.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a bad configuration.
    pub fn build(config: QBlockConfig, documents: &[SparseVector]) -> crate::Result<Self> {
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

        #[allow(clippy::cast_possible_truncation)]
        let num_documents = documents.len() as u32;
        let num_windows = num_documents.div_ceil(config.window_size);

        let (quant_map, quant_val, max_weight) =
            build_quantization(documents, num_dimensions, config.num_bins as usize);

        let bins = config.num_bins as usize;
        let mut blocks: Vec<Vec<Vec<Vec<u32>>>> =
            vec![vec![vec![Vec::new(); num_windows as usize]; bins]; num_dimensions as usize];
        let mut block_sizes: Vec<Vec<u32>> = vec![vec![0; bins]; num_dimensions as usize];
        let mut num_postings = 0u64;

        for (doc_id, document) in documents.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let doc_id = doc_id as u32;
            let window_id = (doc_id / config.window_size) as usize;
            let local_id = doc_id % config.window_size;

            for (index, weight) in document.iter() {
                if index >= num_dimensions || weight <= 0.0 {
                    continue;
                }

                let bin = quant_map[quantize_u8(weight, max_weight) as usize] as usize;
                blocks[index as usize][bin][window_id].push(local_id);
                block_sizes[index as usize][bin] += 1;
                num_postings += 1;
            }
        }

        // Doc ids arrive in order, but keep the cell invariant explicit
        for term in &mut blocks {
            for bin in term {
                for cell in bin {
                    cell.sort_unstable();
                }
            }
        }

        Ok(Self {
            config: QBlockConfig {
                num_dimensions,
                ..config
            },
            num_documents,
            num_windows,
            num_postings,
            max_weight,
            quant_map,
            quant_val,
            blocks,
            block_sizes,
            forward: ForwardIndex::build(documents, num_dimensions),
        })
    }

    /// Index configuration (with the resolved vocabulary size).
    #[must_use]
    pub fn config(&self) -> &QBlockConfig {
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

    /// Number of doc-id windows.
    #[must_use]
    pub fn num_windows(&self) -> u32 {
        self.num_windows
    }

    /// Total postings across all cells.
    #[must_use]
    pub fn num_postings(&self) -> u64 {
        self.num_postings
    }

    /// Reconstructs the sparse vector inserted at `doc_id`.
    #[must_use]
    pub fn get_document(&self, doc_id: u32) -> Option<SparseVector> {
        self.forward.get_document(doc_id)
    }

    /// Approximate top-k search via gain-based block selection and
    /// scatter-add. An empty vocabulary yields empty results without error.
    #[must_use]
    pub fn search(&self, query: &SparseVector, k: usize) -> Vec<SearchResult> {
        if k == 0 || self.num_documents == 0 || self.config.num_dimensions == 0 {
            return Vec::new();
        }

        let selected = self.select_blocks(query);
        if selected.is_empty() {
            return Vec::new();
        }

        let mut scores = vec![0f32; self.num_documents as usize];

        for window in 0..self.num_windows as usize {
            let base = window * self.config.window_size as usize;

            for &(term, bin, gain) in &selected {
                let cell = &self.blocks[term][bin][window];

                for (i, &local_id) in cell.iter().enumerate() {
                    if self.config.use_prefetch {
                        prefetch_read(cell, i + SCATTER_PREFETCH_DISTANCE);
                    }

                    let doc = base + local_id as usize;
                    if let Some(slot) = scores.get_mut(doc) {
                        *slot += gain;
                    }
                }
            }
        }

        top_k_from_scores(&scores, k)
    }

    /// Candidate cells `(term, bin, gain)` chosen by the selection mode.
    fn select_blocks(&self, query: &SparseVector) -> Vec<(usize, usize, f32)> {
        let mut candidates: Vec<(usize, usize, f32)> = Vec::new();

        for (index, query_weight) in query.iter() {
            if index >= self.config.num_dimensions {
                continue;
            }
            let term = index as usize;

            for (bin, &size) in self.block_sizes[term].iter().enumerate() {
                if size == 0 {
                    continue;
                }
                let gain = self.quant_val[bin] * query_weight;
                if gain > 0.0 {
                    candidates.push((term, bin, gain));
                }
            }
        }

        if candidates.is_empty() {
            return candidates;
        }

        match self.config.selection_mode {
            SelectionMode::AlphaMass => {
                candidates.sort_by(|a, b| b.2.total_cmp(&a.2));
                let total: f32 = candidates.iter().map(|(_, _, gain)| gain).sum();
                let target = self.config.alpha * total;

                let mut cumulative = 0.0;
                let mut keep = 0;
                while keep < candidates.len() && cumulative < target {
                    cumulative += candidates[keep].2;
                    keep += 1;
                }
                candidates.truncate(keep.max(1));
                candidates
            }

            SelectionMode::TopK => {
                candidates.sort_by(|a, b| b.2.total_cmp(&a.2));
                candidates.truncate(self.config.fixed_top_k.max(1));
                candidates
            }

            SelectionMode::MaxRatio => {
                let max_gain = candidates
                    .iter()
                    .map(|(_, _, gain)| *gain)
                    .fold(0f32, f32::max);
                let threshold = self.config.alpha * max_gain;
                candidates
                    .into_iter()
                    .filter(|(_, _, gain)| *gain >= threshold)
                    .collect()
            }
        }
    }

    /// Persists the index: per-`(term, bin)` `.col` files of concatenated
    /// window-local doc ids, quantization/window tables in `.bin` files, and
    /// a `.idx` metadata file.
    ///
    /// # Errors
    ///
    /// Returns `Io`/`Encode` on failure.
    pub fn save(&self, directory: &dyn Directory, segment: &str) -> crate::Result<()> {
        let mut files = Vec::new();

        {
            let name = format!("{segment}_qblock.idx");
            let mut out = directory.create_output(&name, IoContext::Default)?;
            let mut meta = Vec::new();
            meta.extend_from_slice(&QBLOCK_MAGIC);
            meta.push(QBLOCK_VERSION);
            meta.write_u32::<LittleEndian>(self.config.num_bins)?;
            meta.write_u32::<LittleEndian>(self.config.window_size)?;
            meta.write_f32::<LittleEndian>(self.config.alpha)?;
            meta.push(self.config.selection_mode.as_u8());
            meta.write_u64::<LittleEndian>(self.config.fixed_top_k as u64)?;
            meta.push(u8::from(self.config.use_prefetch));
            meta.push(self.config.chunk_power);
            meta.write_u32::<LittleEndian>(self.config.num_dimensions)?;
            meta.write_u32::<LittleEndian>(self.num_documents)?;
            meta.write_u64::<LittleEndian>(self.num_postings)?;
            meta.write_f32::<LittleEndian>(self.max_weight)?;
            out.write_all(&meta)?;
            out.finish()?;
            files.push(name);
        }

        {
            // Quantization tables plus per-cell window counts
            let name = format!("{segment}_qblock_quant.bin");
            let mut out = directory.create_output(&name, IoContext::Default)?;
            let mut table = Vec::new();

            table.extend_from_slice(&self.quant_map);
            for &value in &self.quant_val {
                table.write_f32::<LittleEndian>(value)?;
            }
            for term in &self.block_sizes {
                for &size in term {
                    table.write_u32::<LittleEndian>(size)?;
                }
            }
            for term in &self.blocks {
                for bin in term {
                    for cell in bin {
                        table.write_u32::<LittleEndian>(cell.len() as u32)?;
                    }
                }
            }

            out.write_all(&table)?;
            out.finish()?;
            files.push(name);
        }

        {
            let name = format!("{segment}_qblock_fwd.bin");
            let mut out = directory.create_output(&name, IoContext::Default)?;
            out.write_all(&self.forward.encode_into_vec())?;
            out.finish()?;
            files.push(name);
        }

        for (term, bins) in self.blocks.iter().enumerate() {
            for (bin, windows) in bins.iter().enumerate() {
                if self.block_sizes[term][bin] == 0 {
                    continue;
                }

                let name = format!("{segment}_qblock_{term}_{bin}.col");
                let mut out = directory.create_output(&name, IoContext::Default)?;
                let mut writer = ColumnarWriter::new(
                    FieldType::UInt32,
                    QBLOCK_COLUMN_COMPRESSION,
                    DEFAULT_ROWS_PER_GRANULE,
                )?;
                for cell in windows {
                    for &local_id in cell {
                        writer.push(FieldValue::UInt64(u64::from(local_id)))?;
                    }
                }
                writer.finish(out.as_mut())?;
                files.push(name);
            }
        }

        let names: Vec<&str> = files.iter().map(String::as_str).collect();
        directory.sync(&names)?;
        directory.sync_metadata()?;

        Ok(())
    }

    /// Loads an index saved by [`QBlockIndex::save`].
    ///
    /// The document count always comes from the metadata file; a missing or
    /// inconsistent count fails with `Decode` instead of leaving the score
    /// buffer dimension undefined.
    ///
    /// # Errors
    ///
    /// Returns `Decode` on corrupt or inconsistent files.
    pub fn load(directory: &dyn Directory, segment: &str) -> crate::Result<Self> {
        let (config, num_documents, num_postings, max_weight) = {
            let mut input =
                directory.open_input(&format!("{segment}_qblock.idx"), IoContext::ReadMostly)?;

            let mut magic = [0u8; QBLOCK_MAGIC.len()];
            input.read_exact(&mut magic)?;
            if magic != QBLOCK_MAGIC {
                return Err(DecodeError::InvalidHeader("QBlockIndex").into());
            }
            let version = input.read_u8()?;
            if version != QBLOCK_VERSION {
                return Err(DecodeError::InvalidVersion(u32::from(version)).into());
            }

            let num_bins = input.read_u32::<LittleEndian>()?;
            let window_size = input.read_u32::<LittleEndian>()?;
            let alpha = input.read_f32::<LittleEndian>()?;
            let selection_mode = SelectionMode::from_u8(input.read_u8()?)?;
            let fixed_top_k = usize::try_from(input.read_u64::<LittleEndian>()?)
                .map_err(|_| DecodeError::InvalidHeader("fixed_top_k"))?;
            let use_prefetch = input.read_u8()? != 0;
            let chunk_power = input.read_u8()?;
            let num_dimensions = input.read_u32::<LittleEndian>()?;
            let num_documents = input.read_u32::<LittleEndian>()?;
            let num_postings = input.read_u64::<LittleEndian>()?;
            let max_weight = input.read_f32::<LittleEndian>()?;

            let config = QBlockConfig {
                num_bins,
                window_size,
                alpha,
                selection_mode,
                fixed_top_k,
                use_prefetch,
                chunk_power,
                num_dimensions,
            };
            config.validate()?;

            (config, num_documents, num_postings, max_weight)
        };

        let num_windows = num_documents.div_ceil(config.window_size);
        let bins = config.num_bins as usize;
        let terms = config.num_dimensions as usize;

        let (quant_map, quant_val, block_sizes, cell_counts) = {
            let mut input = directory.open_input(
                &format!("{segment}_qblock_quant.bin"),
                IoContext::ReadMostly,
            )?;

            let mut quant_map = vec![0u8; 256];
            input.read_exact(&mut quant_map)?;

            let mut quant_val = Vec::with_capacity(bins);
            for _ in 0..bins {
                quant_val.push(input.read_f32::<LittleEndian>()?);
            }

            let mut block_sizes = Vec::with_capacity(terms);
            for _ in 0..terms {
                let mut sizes = Vec::with_capacity(bins);
                for _ in 0..bins {
                    sizes.push(input.read_u32::<LittleEndian>()?);
                }
                block_sizes.push(sizes);
            }

            let mut cell_counts = Vec::with_capacity(terms);
            for _ in 0..terms {
                let mut term_counts = Vec::with_capacity(bins);
                for _ in 0..bins {
                    let mut window_counts = Vec::with_capacity(num_windows as usize);
                    for _ in 0..num_windows {
                        window_counts.push(input.read_u32::<LittleEndian>()?);
                    }
                    term_counts.push(window_counts);
                }
                cell_counts.push(term_counts);
            }

            (quant_map, quant_val, block_sizes, cell_counts)
        };

        let mut blocks: Vec<Vec<Vec<Vec<u32>>>> =
            vec![vec![vec![Vec::new(); num_windows as usize]; bins]; terms];

        for term in 0..terms {
            for bin in 0..bins {
                if block_sizes[term][bin] == 0 {
                    continue;
                }

                let input = directory.open_input(
                    &format!("{segment}_qblock_{term}_{bin}.col"),
                    IoContext::ReadMostly,
                )?;
                let mut reader =
                    ColumnarReader::open(input, FieldType::UInt32, QBLOCK_COLUMN_COMPRESSION)?;
                let column = reader.read_all()?;
                let ids = column
                    .as_u32_slice()
                    .ok_or(DecodeError::InvalidHeader("qblock cell column type"))?;

                let mut cursor = 0usize;
                for (window, &count) in cell_counts[term][bin].iter().enumerate() {
                    let end = cursor + count as usize;
                    let slice = ids
                        .get(cursor..end)
                        .ok_or(DecodeError::UnexpectedEof)?;
                    blocks[term][bin][window] = slice.to_vec();
                    cursor = end;
                }

                if cursor != ids.len() {
                    return Err(DecodeError::LengthMismatch((ids.len(), cursor)).into());
                }
            }
        }

        let forward = {
            let mut input = directory
                .open_input(&format!("{segment}_qblock_fwd.bin"), IoContext::ReadMostly)?;
            ForwardIndex::decode_from(&mut input)?
        };

        if forward.num_documents() != num_documents {
            return Err(DecodeError::LengthMismatch((
                num_documents as usize,
                forward.num_documents() as usize,
            ))
            .into());
        }

        Ok(Self {
            config,
            num_documents,
            num_windows,
            num_postings,
            max_weight,
            quant_map,
            quant_val,
            blocks,
            block_sizes,
            forward,
        })
    }
}

/// Scales a weight into the u8 quantization domain.
fn quantize_u8(weight: f32, max_weight: f32) -> u8 {
    if max_weight <= 0.0 {
        return 0;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        (weight / max_weight * 255.0).clamp(0.0, 255.0) as u8
    }
}

/// Equal-frequency quantization over all positive weights.
///
/// Returns the `u8 -> bin` map, the per-bin representative table, and the
/// global maximum weight.
fn build_quantization(
    documents: &[SparseVector],
    num_dimensions: u32,
    num_bins: usize,
) -> (Vec<u8>, Vec<f32>, f32) {
    let mut weights: Vec<f32> = documents
        .iter()
        .flat_map(|document| {
            document
                .iter()
                .filter(|(index, weight)| *index < num_dimensions && *weight > 0.0)
                .map(|(_, weight)| weight)
        })
        .collect();

    if weights.is_empty() {
        return (vec![0u8; 256], vec![0f32; num_bins], 0.0);
    }

    weights.sort_by(f32::total_cmp);
    let max_weight = *weights.last().unwrap_or(&0.0);
    let n = weights.len();

    // Per-bin upper boundary and mean representative
    let mut boundaries = Vec::with_capacity(num_bins);
    let mut quant_val = Vec::with_capacity(num_bins);
    let mut previous_boundary = 0f32;

    for bin in 0..num_bins {
        let start = bin * n / num_bins;
        let end = (bin + 1) * n / num_bins;

        if start >= end {
            boundaries.push(previous_boundary);
            quant_val.push(previous_boundary);
            continue;
        }

        let slice = &weights[start..end];
        let boundary = slice[slice.len() - 1];
        #[allow(clippy::cast_precision_loss)]
        let mean = slice.iter().sum::<f32>() / slice.len() as f32;

        boundaries.push(boundary);
        quant_val.push(mean);
        previous_boundary = boundary;
    }

    let mut quant_map = vec![0u8; 256];
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    for (code, slot) in quant_map.iter_mut().enumerate() {
        let weight = code as f32 / 255.0 * max_weight;
        let bin = boundaries
            .iter()
            .position(|&boundary| weight <= boundary)
            .unwrap_or(num_bins - 1);
        *slot = bin as u8;
    }

    (quant_map, quant_val, max_weight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::MemoryDirectory;
    use test_log::test;

    fn corpus() -> Vec<SparseVector> {
        vec![
            SparseVector::from_pairs(vec![(0, 0.2), (1, 1.0)]),
            SparseVector::from_pairs(vec![(0, 0.9), (2, 0.1)]),
            SparseVector::from_pairs(vec![(0, 0.5), (2, 2.0)]),
            SparseVector::from_pairs(vec![(1, 0.4), (2, 0.3)]),
            SparseVector::from_pairs(vec![(0, 0.7), (1, 0.1)]),
        ]
    }

    #[test]
    fn invalid_configs_rejected() {
        let docs = corpus();

        for config in [
            QBlockConfig {
                num_bins: 0,
                ..QBlockConfig::default()
            },
            QBlockConfig {
                num_bins: 300,
                ..QBlockConfig::default()
            },
            QBlockConfig {
                window_size: 0,
                ..QBlockConfig::default()
            },
            QBlockConfig {
                alpha: 1.5,
                ..QBlockConfig::default()
            },
            QBlockConfig {
                chunk_power: 10,
                ..QBlockConfig::default()
            },
        ] {
            assert!(matches!(
                QBlockIndex::build(config, &docs),
                Err(crate::Error::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn empty_vocabulary_returns_no_results() -> crate::Result<()> {
        let index = QBlockIndex::build(QBlockConfig::default(), &[])?;
        let query = SparseVector::from_pairs(vec![(0, 1.0)]);
        assert!(index.search(&query, 10).is_empty());
        Ok(())
    }

    #[test]
    fn alpha_one_ranks_like_exhaustive_scatter() -> crate::Result<()> {
        // With alpha = 1.0 every candidate block is selected, so ranking
        // follows the quantized scores exactly
        let config = QBlockConfig {
            alpha: 1.0,
            window_size: 2,
            ..QBlockConfig::default()
        };
        let index = QBlockIndex::build(config, &corpus())?;

        let query = SparseVector::from_pairs(vec![(0, 1.0)]);
        let results = index.search(&query, 10);

        // Docs containing term 0: 0, 1, 2, 4 ranked by weight 0.9, 0.7, 0.5, 0.2
        let ranked: Vec<u32> = results.iter().map(|r| r.doc_id).collect();
        assert_eq!(vec![1, 4, 2, 0], ranked);

        Ok(())
    }

    #[test]
    fn selection_modes_bound_candidates() -> crate::Result<()> {
        let docs = corpus();

        let top_k = QBlockIndex::build(
            QBlockConfig {
                selection_mode: SelectionMode::TopK,
                fixed_top_k: 1,
                window_size: 4,
                ..QBlockConfig::default()
            },
            &docs,
        )?;

        let query = SparseVector::from_pairs(vec![(0, 1.0), (1, 1.0), (2, 1.0)]);
        assert_eq!(1, top_k.select_blocks(&query).len());

        let max_ratio = QBlockIndex::build(
            QBlockConfig {
                selection_mode: SelectionMode::MaxRatio,
                alpha: 0.0,
                window_size: 4,
                ..QBlockConfig::default()
            },
            &docs,
        )?;
        let all = max_ratio.select_blocks(&query);

        let tight = QBlockIndex::build(
            QBlockConfig {
                selection_mode: SelectionMode::MaxRatio,
                alpha: 1.0,
                window_size: 4,
                ..QBlockConfig::default()
            },
            &docs,
        )?;
        assert!(tight.select_blocks(&query).len() <= all.len());

        Ok(())
    }

    #[test]
    fn get_document_roundtrips() -> crate::Result<()> {
        let docs = corpus();
        let index = QBlockIndex::build(QBlockConfig::default(), &docs)?;

        for (doc_id, doc) in docs.iter().enumerate() {
            assert_eq!(Some(doc.clone()), index.get_document(doc_id as u32));
        }
        assert_eq!(None, index.get_document(docs.len() as u32));

        Ok(())
    }

    #[test]
    fn save_load_preserves_results() -> crate::Result<()> {
        let docs = corpus();
        let config = QBlockConfig {
            window_size: 2,
            ..QBlockConfig::default()
        };
        let index = QBlockIndex::build(config, &docs)?;

        let dir = MemoryDirectory::default();
        index.save(&dir, "seg0")?;

        let loaded = QBlockIndex::load(&dir, "seg0")?;
        assert_eq!(index.num_documents(), loaded.num_documents());
        assert_eq!(index.num_windows(), loaded.num_windows());
        assert_eq!(index.num_postings(), loaded.num_postings());

        let query = SparseVector::from_pairs(vec![(0, 1.0), (2, 0.5)]);
        assert_eq!(index.search(&query, 5), loaded.search(&query, 5));

        Ok(())
    }
}
