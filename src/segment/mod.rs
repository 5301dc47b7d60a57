// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Segments: immutable, independently-searchable index units
//!
//! A segment writer fans document values into columnar buffers, inverted
//! collectors, and sparse-vector builders, then finalizes the on-disk files
//! (`.col`, `.cmk`, `.doc`, `.tim`, `.tip`, sparse `.bin`/`.idx`) and
//! publishes the segment. A failed write publishes nothing.

mod catalog;
mod reader;
mod writer;

pub use catalog::{SegmentCatalog, SegmentEntry};
pub use reader::SegmentReader;
pub use writer::{Document, SegmentWriter, SegmentWriterConfig};

use crate::{
    directory::{Directory, IoContext},
    FieldType,
};
use std::sync::Arc;

/// Metadata of one field
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldInfo {
    /// Field name (also the column file suffix)
    pub name: String,

    /// Logical type
    pub field_type: FieldType,
}

impl FieldInfo {
    /// Convenience constructor.
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// Ordered collection of field metadata
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FieldInfos {
    fields: Vec<FieldInfo>,
}

impl FieldInfos {
    /// Builds from a field list.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` on duplicate field names.
    pub fn new(fields: Vec<FieldInfo>) -> crate::Result<Self> {
        for (i, field) in fields.iter().enumerate() {
            if fields[..i].iter().any(|other| other.name == field.name) {
                return Err(crate::Error::InvalidInput("duplicate field name"));
            }
        }
        Ok(Self { fields })
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no fields are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// State handed to the segment writer
#[derive(Clone)]
pub struct SegmentWriteState {
    /// Target directory
    pub directory: Arc<dyn Directory>,

    /// Segment name
    pub segment_name: String,

    /// Optional name suffix (empty for none)
    pub segment_suffix: String,

    /// I/O context for created outputs
    pub io_context: IoContext,

    /// Field metadata
    pub field_infos: Arc<FieldInfos>,
}

/// State handed to segment readers
#[derive(Clone)]
pub struct SegmentReadState {
    /// Source directory
    pub directory: Arc<dyn Directory>,

    /// Segment name
    pub segment_name: String,

    /// Optional name suffix (empty for none)
    pub segment_suffix: String,

    /// I/O context for opened inputs
    pub io_context: IoContext,

    /// Field metadata
    pub field_infos: Arc<FieldInfos>,
}

/// Builds `<segment>[_<suffix>]` (the base of every segment file name).
#[must_use]
pub fn segment_base_name(segment: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        segment.to_string()
    } else {
        format!("{segment}_{suffix}")
    }
}

/// Builds `<segment>[_<suffix>].<ext>`.
#[must_use]
pub fn segment_file_name(segment: &str, suffix: &str, ext: &str) -> String {
    format!("{}.{ext}", segment_base_name(segment, suffix))
}

/// Published metadata of a finished segment
#[derive(Clone, Debug)]
pub struct SegmentInfo {
    /// Segment base name
    pub name: String,

    /// Documents in the segment
    pub doc_count: u32,

    /// Field metadata
    pub field_infos: Arc<FieldInfos>,

    /// All files belonging to the segment
    pub files: Vec<String>,

    /// Total size of all files
    pub size_bytes: u64,
}
