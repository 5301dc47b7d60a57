// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    binary_search::partition_point,
    coding::{Decode, DecodeError, Encode, EncodeError},
};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

const MARKS_MAGIC: [u8; 4] = *b"DCMK";
const MARKS_VERSION: u32 = 1;

/// Skip metadata for one compressed granule
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct GranuleInfo {
    /// Rows stored in this granule
    pub num_rows: u32,

    /// Offset of the compressed bytes within the data section
    pub file_offset: u64,

    /// Compressed byte length
    pub compressed_size: u32,

    /// Raw byte length before compression
    pub uncompressed_size: u32,

    /// Minimum value (conservative `i64` mapping)
    pub min_value: i64,

    /// Maximum value (conservative `i64` mapping)
    pub max_value: i64,

    /// Doc id of the first row
    pub start_doc_id: u32,

    /// xxh3 checksum of the uncompressed bytes
    pub checksum: u64,
}

impl Encode for GranuleInfo {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_u32::<LittleEndian>(self.num_rows)?;
        writer.write_u64::<LittleEndian>(self.file_offset)?;
        writer.write_u32::<LittleEndian>(self.compressed_size)?;
        writer.write_u32::<LittleEndian>(self.uncompressed_size)?;
        writer.write_i64::<LittleEndian>(self.min_value)?;
        writer.write_i64::<LittleEndian>(self.max_value)?;
        writer.write_u32::<LittleEndian>(self.start_doc_id)?;
        writer.write_u64::<LittleEndian>(self.checksum)?;
        Ok(())
    }
}

impl Decode for GranuleInfo {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        Ok(Self {
            num_rows: reader.read_u32::<LittleEndian>()?,
            file_offset: reader.read_u64::<LittleEndian>()?,
            compressed_size: reader.read_u32::<LittleEndian>()?,
            uncompressed_size: reader.read_u32::<LittleEndian>()?,
            min_value: reader.read_i64::<LittleEndian>()?,
            max_value: reader.read_i64::<LittleEndian>()?,
            start_doc_id: reader.read_u32::<LittleEndian>()?,
            checksum: reader.read_u64::<LittleEndian>()?,
        })
    }
}

/// One mark per granule in the `.cmk` file
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct GranuleMark {
    /// Rows in this granule
    pub row_count: u32,

    /// Offset of the granule in the column data section
    pub data_offset: u64,

    /// Doc id of the first row
    pub first_doc_id: u32,
}

/// Ordered sequence of granule marks
///
/// The prefix sum of row counts is the row address space; binary search
/// translates a doc id to a granule id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GranuleIndex {
    marks: Vec<GranuleMark>,
}

impl GranuleIndex {
    /// Appends a mark; marks must be pushed in granule order.
    pub fn push(&mut self, mark: GranuleMark) {
        self.marks.push(mark);
    }

    /// All marks in order.
    #[must_use]
    pub fn marks(&self) -> &[GranuleMark] {
        &self.marks
    }

    /// Number of granules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.marks.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    /// Total rows covered by all granules.
    #[must_use]
    pub fn total_rows(&self) -> u64 {
        self.marks.iter().map(|m| u64::from(m.row_count)).sum()
    }

    /// Translates a doc id to the granule containing it.
    #[must_use]
    pub fn locate(&self, doc_id: u32) -> Option<usize> {
        if self.marks.is_empty() {
            return None;
        }

        let idx = partition_point(&self.marks, |m| m.first_doc_id <= doc_id);
        let idx = idx.checked_sub(1)?;

        let mark = &self.marks[idx];
        if doc_id < mark.first_doc_id + mark.row_count {
            Some(idx)
        } else {
            None
        }
    }
}

impl Encode for GranuleIndex {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_all(&MARKS_MAGIC)?;
        writer.write_u32::<LittleEndian>(MARKS_VERSION)?;
        writer.write_u32::<LittleEndian>(self.marks.len() as u32)?;

        for mark in &self.marks {
            writer.write_u32::<LittleEndian>(mark.row_count)?;
            writer.write_u64::<LittleEndian>(mark.data_offset)?;
            writer.write_u32::<LittleEndian>(mark.first_doc_id)?;
        }

        Ok(())
    }
}

impl Decode for GranuleIndex {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let mut magic = [0u8; MARKS_MAGIC.len()];
        reader.read_exact(&mut magic)?;
        if magic != MARKS_MAGIC {
            return Err(DecodeError::InvalidHeader("GranuleIndex"));
        }

        let version = reader.read_u32::<LittleEndian>()?;
        if version != MARKS_VERSION {
            return Err(DecodeError::InvalidVersion(version));
        }

        let count = reader.read_u32::<LittleEndian>()?;
        let mut marks = Vec::with_capacity(count as usize);
        for _ in 0..count {
            marks.push(GranuleMark {
                row_count: reader.read_u32::<LittleEndian>()?,
                data_offset: reader.read_u64::<LittleEndian>()?,
                first_doc_id: reader.read_u32::<LittleEndian>()?,
            });
        }

        Ok(Self { marks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn index_of(rows: &[u32]) -> GranuleIndex {
        let mut index = GranuleIndex::default();
        let mut doc = 0;
        for (i, &rows) in rows.iter().enumerate() {
            index.push(GranuleMark {
                row_count: rows,
                data_offset: i as u64 * 1000,
                first_doc_id: doc,
            });
            doc += rows;
        }
        index
    }

    #[test]
    fn locate_translates_doc_ids() {
        let index = index_of(&[100, 50, 200]);

        assert_eq!(Some(0), index.locate(0));
        assert_eq!(Some(0), index.locate(99));
        assert_eq!(Some(1), index.locate(100));
        assert_eq!(Some(1), index.locate(149));
        assert_eq!(Some(2), index.locate(150));
        assert_eq!(Some(2), index.locate(349));
        assert_eq!(None, index.locate(350));

        assert_eq!(350, index.total_rows());
    }

    #[test]
    fn locate_on_empty_index() {
        assert_eq!(None, GranuleIndex::default().locate(0));
    }

    #[test]
    fn granule_index_roundtrip() -> crate::Result<()> {
        let index = index_of(&[8192, 8192, 17]);

        let bytes = index.encode_into_vec();
        let restored = GranuleIndex::decode_from(&mut &bytes[..])?;

        assert_eq!(index, restored);

        Ok(())
    }

    #[test]
    fn granule_index_rejects_bad_magic() {
        let index = index_of(&[10]);
        let mut bytes = index.encode_into_vec();
        bytes[0] = b'X';

        assert!(GranuleIndex::decode_from(&mut &bytes[..]).is_err());
    }
}
