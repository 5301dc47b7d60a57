// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{segment_base_name, SegmentInfo, SegmentWriteState};
use crate::{
    coding::Encode,
    columnar::{ColumnarWriter, DEFAULT_ROWS_PER_GRANULE},
    postings::PostingsWriter,
    sparse::{QBlockConfig, QBlockIndex, SindiConfig, SindiIndex, SparseVector},
    termdict::{BlockTreeConfig, BlockTreeTermsWriter, TermStats},
    Bytes, CompressionType, FieldType, FieldValue, GranuleIndex,
};
use std::collections::BTreeMap;
use std::io::Write;

/// One document handed to the segment writer
#[derive(Clone, Debug, Default)]
pub struct Document {
    fields: Vec<(String, FieldValue)>,
    sparse: Option<SparseVector>,
}

impl Document {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field value.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Attaches a sparse vector.
    #[must_use]
    pub fn sparse(mut self, vector: SparseVector) -> Self {
        self.sparse = Some(vector);
        self
    }

    /// Value of a field, if set.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// The attached sparse vector, if any.
    #[must_use]
    pub fn sparse_vector(&self) -> Option<&SparseVector> {
        self.sparse.as_ref()
    }
}

/// Segment writer configuration
#[derive(Clone, Debug)]
pub struct SegmentWriterConfig {
    /// Rows per columnar granule
    pub rows_per_granule: u32,

    /// Codec for columnar granules
    pub compression: CompressionType,

    /// Term dictionary block sizing
    pub block_tree: BlockTreeConfig,

    /// Build a SINDI index over attached sparse vectors
    pub sindi: Option<SindiConfig>,

    /// Build a QBlock index over attached sparse vectors
    pub qblock: Option<QBlockConfig>,
}

impl Default for SegmentWriterConfig {
    fn default() -> Self {
        Self {
            rows_per_granule: DEFAULT_ROWS_PER_GRANULE,
            compression: CompressionType::Lz4,
            block_tree: BlockTreeConfig::default(),
            sindi: None,
            qblock: None,
        }
    }
}

/// Per-term postings accumulator of one text field
type InvertedCollector = BTreeMap<Bytes, Vec<(u32, u32)>>;

/// Fans documents into columns, postings collectors, and sparse builders
///
/// Writes are single-threaded by contract: the writer owns all of its
/// outputs. `finish` makes every file durable before the segment becomes
/// visible anywhere; on error the partial files are never published.
pub struct SegmentWriter {
    state: SegmentWriteState,
    config: SegmentWriterConfig,
    columns: Vec<ColumnarWriter>,
    inverted: Vec<Option<InvertedCollector>>,
    norms: Vec<Option<ColumnarWriter>>,
    sparse_docs: Vec<SparseVector>,
    doc_count: u32,
}

impl SegmentWriter {
    /// Creates a writer for the fields declared in the write state.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for bad granule or block settings.
    pub fn new(state: SegmentWriteState, config: SegmentWriterConfig) -> crate::Result<Self> {
        config.block_tree.validate()?;

        let mut columns = Vec::with_capacity(state.field_infos.len());
        let mut inverted = Vec::with_capacity(state.field_infos.len());
        let mut norms = Vec::with_capacity(state.field_infos.len());

        for field in state.field_infos.fields() {
            columns.push(ColumnarWriter::new(
                field.field_type,
                config.compression,
                config.rows_per_granule,
            )?);
            inverted.push((field.field_type == FieldType::Text).then(InvertedCollector::new));
            norms.push(if field.field_type == FieldType::Text {
                Some(ColumnarWriter::new(
                    FieldType::UInt32,
                    config.compression,
                    config.rows_per_granule,
                )?)
            } else {
                None
            });
        }

        Ok(Self {
            state,
            config,
            columns,
            inverted,
            norms,
            sparse_docs: Vec::new(),
            doc_count: 0,
        })
    }

    /// Documents added so far.
    #[must_use]
    pub fn doc_count(&self) -> u32 {
        self.doc_count
    }

    /// Adds one document; missing fields store the type default.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` on a field type mismatch.
    pub fn add_document(&mut self, document: &Document) -> crate::Result<()> {
        let doc_id = self.doc_count;

        for (i, field) in self.state.field_infos.fields().iter().enumerate() {
            let value = document.get(&field.name).cloned().unwrap_or(FieldValue::Null);

            let mut token_count = 0u32;
            if let Some(collector) = &mut self.inverted[i] {
                if let FieldValue::Bytes(text) = &value {
                    token_count = collect_terms(collector, text, doc_id);
                }
            }

            // Norms: token count per doc, the length primitive scorers need
            if let Some(norms) = &mut self.norms[i] {
                norms.push(FieldValue::UInt64(u64::from(token_count)))?;
            }

            self.columns[i].push(value)?;
        }

        if self.config.sindi.is_some() || self.config.qblock.is_some() {
            self.sparse_docs
                .push(document.sparse_vector().cloned().unwrap_or_default());
        }

        self.doc_count += 1;
        Ok(())
    }

    /// Finalizes all files, fsyncs them, and returns the segment info.
    ///
    /// The caller publishes the returned info to the catalog; until then the
    /// segment is invisible, so a failed finish leaves no published trace.
    ///
    /// # Errors
    ///
    /// Returns any codec, encode, or I/O error from finalization.
    pub fn finish(self) -> crate::Result<SegmentInfo> {
        let directory = self.state.directory.clone();
        let ctx = self.state.io_context;
        let base = segment_base_name(&self.state.segment_name, &self.state.segment_suffix);

        let mut marks: Option<GranuleIndex> = None;

        for (field, writer) in self
            .state
            .field_infos
            .fields()
            .iter()
            .zip(self.columns.into_iter())
        {
            let name = format!("{base}_{}.col", field.name);
            let mut out = directory.create_output(&name, ctx)?;
            let field_marks = writer.finish(out.as_mut())?;
            marks.get_or_insert(field_marks);
        }

        {
            let name = format!("{base}.cmk");
            let mut out = directory.create_output(&name, ctx)?;
            out.write_all(&marks.unwrap_or_default().encode_into_vec())?;
            out.finish()?;
        }

        for (field, writer) in self
            .state
            .field_infos
            .fields()
            .iter()
            .zip(self.norms.into_iter())
        {
            if let Some(writer) = writer {
                let name = format!("{base}_{}_norms.col", field.name);
                let mut out = directory.create_output(&name, ctx)?;
                writer.finish(out.as_mut())?;
            }
        }

        // One postings stream shared by all text fields; one term dictionary
        // (.tim/.tip pair) per text field
        let text_fields: Vec<(usize, String)> = self
            .state
            .field_infos
            .fields()
            .iter()
            .enumerate()
            .filter(|(_, field)| field.field_type == FieldType::Text)
            .map(|(i, field)| (i, field.name.clone()))
            .collect();

        if !text_fields.is_empty() {
            let doc_out = directory.create_output(&format!("{base}.doc"), ctx)?;
            let mut postings = PostingsWriter::new(doc_out);

            for (i, field_name) in text_fields {
                let tim = directory.create_output(&format!("{base}_{field_name}.tim"), ctx)?;
                let mut tip = directory.create_output(&format!("{base}_{field_name}.tip"), ctx)?;

                let mut terms = BlockTreeTermsWriter::new(tim, self.config.block_tree)?;

                if let Some(collector) = &self.inverted[i] {
                    for (term, docs) in collector {
                        let fp = postings.start_term();
                        let mut total_term_freq = 0u64;
                        for &(doc, freq) in docs {
                            postings.add_doc(doc, freq)?;
                            total_term_freq += u64::from(freq);
                        }
                        postings.finish_term();

                        terms.add_term(
                            term,
                            TermStats::new(docs.len() as u32, total_term_freq, fp),
                        )?;
                    }
                }

                terms.finish(tip.as_mut())?;
            }

            postings.finish()?;
        }

        if let Some(config) = self.config.sindi {
            SindiIndex::build(config, &self.sparse_docs)?.save(directory.as_ref(), &base)?;
        }
        if let Some(config) = self.config.qblock {
            QBlockIndex::build(config, &self.sparse_docs)?.save(directory.as_ref(), &base)?;
        }

        let files: Vec<String> = directory
            .list()?
            .into_iter()
            .filter(|name| name.starts_with(&base))
            .collect();

        let names: Vec<&str> = files.iter().map(String::as_str).collect();
        directory.sync(&names)?;
        directory.sync_metadata()?;

        let mut size_bytes = 0;
        for name in &files {
            size_bytes += directory.file_length(name)?;
        }

        log::debug!(
            "finished segment {base:?}: {} docs, {} files, {size_bytes} bytes",
            self.doc_count,
            files.len(),
        );

        Ok(SegmentInfo {
            name: base,
            doc_count: self.doc_count,
            field_infos: self.state.field_infos.clone(),
            files,
            size_bytes,
        })
    }
}

/// Whitespace-splits `text` and records per-document term frequencies.
///
/// Returns the token count (the document's length in this field).
fn collect_terms(collector: &mut InvertedCollector, text: &Bytes, doc_id: u32) -> u32 {
    let mut freqs: BTreeMap<Bytes, u32> = BTreeMap::new();
    let mut token_count = 0u32;

    for token in text
        .split(|b| b.is_ascii_whitespace())
        .filter(|token| !token.is_empty())
    {
        *freqs.entry(Bytes::from(token)).or_insert(0) += 1;
        token_count += 1;
    }

    for (term, freq) in freqs {
        collector.entry(term).or_default().push((doc_id, freq));
    }

    token_count
}
