// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{segment_base_name, SegmentReadState};
use crate::{
    coding::Decode,
    columnar::ColumnarReader,
    termdict::BlockTreeTermsReader,
    CompressionType, FieldType, GranuleIndex,
};

/// Read-side handle over one published segment
///
/// Opens columns and term dictionaries on demand; every returned reader or
/// cursor works on independent input clones, so one `SegmentReader` serves
/// unbounded concurrent callers.
pub struct SegmentReader {
    state: SegmentReadState,
    base: String,
    compression: CompressionType,
    marks: GranuleIndex,
}

impl SegmentReader {
    /// Opens a segment, reading its granule-index (`.cmk`) file.
    ///
    /// # Errors
    ///
    /// Returns `Io`/`Decode` if the marks file is missing or corrupt.
    pub fn open(state: SegmentReadState, compression: CompressionType) -> crate::Result<Self> {
        let base = segment_base_name(&state.segment_name, &state.segment_suffix);

        let mut input = state
            .directory
            .open_input(&format!("{base}.cmk"), state.io_context)?;
        let marks = GranuleIndex::decode_from(&mut input)?;

        Ok(Self {
            state,
            base,
            compression,
            marks,
        })
    }

    /// The granule index shared by all columns of the segment.
    #[must_use]
    pub fn granule_index(&self) -> &GranuleIndex {
        &self.marks
    }

    /// Documents in the segment.
    #[must_use]
    pub fn doc_count(&self) -> u64 {
        self.marks.total_rows()
    }

    /// Opens the column of a field.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for unknown fields, `Decode` on corrupt files.
    pub fn column(&self, field: &str) -> crate::Result<ColumnarReader> {
        let info = self
            .state
            .field_infos
            .get(field)
            .ok_or(crate::Error::InvalidInput("unknown field"))?;

        let storage_type = match info.field_type {
            FieldType::Text => FieldType::Str,
            other => other,
        };

        let input = self
            .state
            .directory
            .open_input(&format!("{}_{field}.col", self.base), self.state.io_context)?;

        ColumnarReader::open(input, storage_type, self.compression)
    }

    /// Opens the norms column of a text field (token count per document).
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for non-text fields, `Decode` on corrupt files.
    pub fn norms(&self, field: &str) -> crate::Result<ColumnarReader> {
        let info = self
            .state
            .field_infos
            .get(field)
            .ok_or(crate::Error::InvalidInput("unknown field"))?;

        if info.field_type != FieldType::Text {
            return Err(crate::Error::InvalidInput("field is not indexed as text"));
        }

        let input = self.state.directory.open_input(
            &format!("{}_{field}_norms.col", self.base),
            self.state.io_context,
        )?;

        ColumnarReader::open(input, FieldType::UInt32, self.compression)
    }

    /// Opens the term dictionary of a text field, wired to the postings
    /// stream.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for non-text fields, `Decode` on corrupt files.
    pub fn terms(&self, field: &str) -> crate::Result<BlockTreeTermsReader> {
        let info = self
            .state
            .field_infos
            .get(field)
            .ok_or(crate::Error::InvalidInput("unknown field"))?;

        if info.field_type != FieldType::Text {
            return Err(crate::Error::InvalidInput("field is not indexed as text"));
        }

        let tim = self
            .state
            .directory
            .open_input(&format!("{}_{field}.tim", self.base), self.state.io_context)?;
        let tip = self
            .state
            .directory
            .open_input(&format!("{}_{field}.tip", self.base), self.state.io_context)?;

        let doc = self
            .state
            .directory
            .open_input(&format!("{}.doc", self.base), self.state.io_context)?;

        Ok(BlockTreeTermsReader::open(tim, tip)?.with_postings(doc))
    }
}
