// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{DCOL_MAGIC, DCOL_VERSION};
use crate::{
    coding::Encode,
    directory::IndexOutput,
    granule::{GranuleIndex, GranuleMark},
    Checksum, Column, CompressionType, FieldType, FieldValue, GranuleInfo,
};
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;

/// Writes one column as compressed granules with skip metadata
///
/// Values are buffered until a granule is full, then compressed and appended
/// to the in-memory data section; `finish` writes the self-describing `.col`
/// stream (header, granule entries, data).
pub struct ColumnarWriter {
    field_type: FieldType,
    compression: CompressionType,
    rows_per_granule: u32,
    pending: Column,
    granules: Vec<GranuleInfo>,
    data: Vec<u8>,
    next_doc_id: u32,
}

impl ColumnarWriter {
    /// Creates a writer for a column of the given type.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `rows_per_granule` is zero.
    pub fn new(
        field_type: FieldType,
        compression: CompressionType,
        rows_per_granule: u32,
    ) -> crate::Result<Self> {
        if rows_per_granule == 0 {
            return Err(crate::Error::InvalidConfig("rows_per_granule must be > 0"));
        }

        Ok(Self {
            field_type,
            compression,
            rows_per_granule,
            pending: Column::new(field_type),
            granules: Vec::new(),
            data: Vec::new(),
            next_doc_id: 0,
        })
    }

    /// Appends one value; flushes a granule when it is full.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` on a type mismatch, or a codec error from the
    /// granule flush.
    pub fn push(&mut self, value: FieldValue) -> crate::Result<()> {
        self.pending.push(value)?;

        if self.pending.len() as u32 == self.rows_per_granule {
            self.flush_granule()?;
        }

        Ok(())
    }

    /// Rows accepted so far.
    #[must_use]
    pub fn rows_written(&self) -> u64 {
        u64::from(self.next_doc_id) + self.pending.len() as u64
    }

    fn flush_granule(&mut self) -> crate::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let num_rows = self.pending.len() as u32;

        // Strings get the full range so they are never skipped or bulk-counted
        let (min_value, max_value) = self
            .pending
            .min_max_i64()
            .unwrap_or((i64::MIN, i64::MAX));

        let mut raw = Vec::with_capacity(self.pending.byte_size());
        self.pending.serialize_into(&mut raw);

        let checksum = Checksum::of(&raw);
        let compressed = self.compression.compress(&raw)?;

        self.granules.push(GranuleInfo {
            num_rows,
            file_offset: self.data.len() as u64,
            compressed_size: compressed.len() as u32,
            uncompressed_size: raw.len() as u32,
            min_value,
            max_value,
            start_doc_id: self.next_doc_id,
            checksum: checksum.into_u64(),
        });

        self.data.extend_from_slice(&compressed);
        self.next_doc_id += num_rows;
        self.pending = Column::new(self.field_type);

        Ok(())
    }

    /// Flushes the partial granule and writes the `.col` stream.
    ///
    /// Returns the granule index (marks) for the segment's `.cmk` file.
    ///
    /// # Errors
    ///
    /// Returns an error on codec or I/O failure.
    pub fn finish(mut self, out: &mut dyn IndexOutput) -> crate::Result<GranuleIndex> {
        self.flush_granule()?;

        let mut header = Vec::new();
        header.extend_from_slice(&DCOL_MAGIC);
        header.write_u32::<LittleEndian>(DCOL_VERSION)?;
        header.write_u32::<LittleEndian>(self.rows_per_granule)?;
        self.compression.encode_into(&mut header)?;

        header.write_u32::<LittleEndian>(self.granules.len() as u32)?;
        for granule in &self.granules {
            granule.encode_into(&mut header)?;
        }

        out.write_all(&header)?;
        out.write_all(&self.data)?;
        out.finish()?;

        let mut marks = GranuleIndex::default();
        for granule in &self.granules {
            marks.push(GranuleMark {
                row_count: granule.num_rows,
                data_offset: granule.file_offset,
                first_doc_id: granule.start_doc_id,
            });
        }

        Ok(marks)
    }
}
