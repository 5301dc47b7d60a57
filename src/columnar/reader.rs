// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{DCOL_MAGIC, DCOL_VERSION};
use crate::{
    coding::{Decode, DecodeError},
    directory::IndexInput,
    Checksum, Column, CompressionType, FieldType, GranuleInfo,
};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Read;

/// Per-mode granule counters from a range scan
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ScanStats {
    /// Granules rejected by MinMax metadata alone
    pub skipped: usize,

    /// Granules fully contained in the range (counted without decompression)
    pub bulk_counted: usize,

    /// Granules decompressed and scanned row by row
    pub scanned: usize,
}

/// Reads a `.col` stream written by [`super::ColumnarWriter`]
pub struct ColumnarReader {
    input: Box<dyn IndexInput>,
    field_type: FieldType,
    granules: Vec<GranuleInfo>,
    compression: CompressionType,
    rows_per_granule: u32,
    data_start: u64,
}

impl ColumnarReader {
    /// Opens a column, validating magic, version, and codec.
    ///
    /// # Errors
    ///
    /// Returns `Decode` on bad magic, version, or a codec mismatch between
    /// writer metadata and reader configuration.
    pub fn open(
        mut input: Box<dyn IndexInput>,
        field_type: FieldType,
        expected_compression: CompressionType,
    ) -> crate::Result<Self> {
        let mut magic = [0u8; DCOL_MAGIC.len()];
        input.read_exact(&mut magic)?;
        if magic != DCOL_MAGIC {
            return Err(DecodeError::InvalidHeader("ColumnFile").into());
        }

        let version = input.read_u32::<LittleEndian>()?;
        if version != DCOL_VERSION {
            return Err(DecodeError::InvalidVersion(version).into());
        }

        let rows_per_granule = input.read_u32::<LittleEndian>()?;
        if rows_per_granule == 0 {
            return Err(DecodeError::InvalidHeader("rows_per_granule").into());
        }

        let compression = CompressionType::decode_from(&mut input)?;
        if compression != expected_compression {
            return Err(DecodeError::InvalidHeader("codec mismatch").into());
        }

        let granule_count = input.read_u32::<LittleEndian>()?;
        let mut granules = Vec::with_capacity(granule_count as usize);
        for _ in 0..granule_count {
            granules.push(GranuleInfo::decode_from(&mut input)?);
        }

        let data_start = input.position();

        Ok(Self {
            input,
            field_type,
            granules,
            compression,
            rows_per_granule,
            data_start,
        })
    }

    /// Granule skip metadata in order.
    #[must_use]
    pub fn granules(&self) -> &[GranuleInfo] {
        &self.granules
    }

    /// Rows per full granule as recorded by the writer.
    #[must_use]
    pub fn rows_per_granule(&self) -> u32 {
        self.rows_per_granule
    }

    /// Total rows across all granules.
    #[must_use]
    pub fn total_rows(&self) -> u64 {
        self.granules.iter().map(|g| u64::from(g.num_rows)).sum()
    }

    /// Decompresses one granule into a column.
    ///
    /// # Errors
    ///
    /// Returns `Decode` on checksum or length mismatch, `Decompress` on codec
    /// failure.
    pub fn read_granule(&mut self, index: usize) -> crate::Result<Column> {
        let info = *self
            .granules
            .get(index)
            .ok_or(crate::Error::InvalidInput("granule index out of range"))?;

        self.input.seek(self.data_start + info.file_offset)?;

        let mut compressed = vec![0u8; info.compressed_size as usize];
        self.input.read_exact(&mut compressed)?;

        let raw = self
            .compression
            .decompress(&compressed, info.uncompressed_size as usize)?;

        Checksum::of(&raw).check(Checksum::from_raw(info.checksum))?;

        Ok(Column::deserialize(
            self.field_type,
            info.num_rows as usize,
            &raw,
        )?)
    }

    /// Counts rows satisfying `low <= v <= high` using three-mode granule
    /// evaluation.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for string columns, or any granule read error.
    pub fn range_count(&mut self, low: i64, high: i64) -> crate::Result<(u64, ScanStats)> {
        if !self.field_type.is_numeric() {
            return Err(crate::Error::InvalidInput(
                "range scans require a numeric column",
            ));
        }

        let mut count = 0u64;
        let mut stats = ScanStats::default();

        for index in 0..self.granules.len() {
            let info = self.granules[index];

            if info.max_value < low || info.min_value > high {
                stats.skipped += 1;
            } else if info.min_value >= low && info.max_value <= high {
                stats.bulk_counted += 1;
                count += u64::from(info.num_rows);
            } else {
                stats.scanned += 1;
                let column = self.read_granule(index)?;
                count += column.count_in_range(low, high);
            }
        }

        Ok((count, stats))
    }

    /// Reads the entire column back (all granules concatenated).
    ///
    /// # Errors
    ///
    /// Returns any granule read error.
    pub fn read_all(&mut self) -> crate::Result<Column> {
        let mut all = Column::new(self.field_type);

        for index in 0..self.granules.len() {
            let column = self.read_granule(index)?;
            for row in 0..column.len() {
                #[allow(clippy::expect_used)]
                all.push(column.get(row).expect("row in range"))?;
            }
        }

        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        columnar::ColumnarWriter,
        directory::{Directory, IoContext, MemoryDirectory},
        FieldValue,
    };
    use test_log::test;

    fn write_column(
        dir: &MemoryDirectory,
        name: &str,
        values: &[i64],
        rows_per_granule: u32,
        compression: CompressionType,
    ) -> crate::Result<()> {
        let mut out = dir.create_output(name, IoContext::Default)?;
        let mut writer = ColumnarWriter::new(FieldType::Int64, compression, rows_per_granule)?;
        for &v in values {
            writer.push(FieldValue::Int64(v))?;
        }
        writer.finish(out.as_mut())?;
        Ok(())
    }

    #[test]
    fn roundtrip_matches_written_rows() -> crate::Result<()> {
        let dir = MemoryDirectory::default();
        let values: Vec<i64> = (0..1000).map(|i| i * 7 - 350).collect();
        write_column(&dir, "x.col", &values, 128, CompressionType::Lz4)?;

        let input = dir.open_input("x.col", IoContext::ReadMostly)?;
        let mut reader = ColumnarReader::open(input, FieldType::Int64, CompressionType::Lz4)?;

        assert_eq!(1000, reader.total_rows());

        let column = reader.read_all()?;
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(Some(FieldValue::Int64(v)), column.get(i));
        }

        Ok(())
    }

    #[test]
    fn codec_mismatch_is_corrupt() -> crate::Result<()> {
        let dir = MemoryDirectory::default();
        write_column(&dir, "x.col", &[1, 2, 3], 8, CompressionType::Lz4)?;

        let input = dir.open_input("x.col", IoContext::ReadMostly)?;
        assert!(matches!(
            ColumnarReader::open(input, FieldType::Int64, CompressionType::None),
            Err(crate::Error::Decode(_))
        ));

        Ok(())
    }

    #[test]
    fn bad_magic_is_corrupt() -> crate::Result<()> {
        let dir = MemoryDirectory::default();
        {
            let mut out = dir.create_output("bogus.col", IoContext::Default)?;
            std::io::Write::write_all(&mut out, b"NOPE not a column file")?;
            out.finish()?;
        }

        let input = dir.open_input("bogus.col", IoContext::ReadMostly)?;
        assert!(matches!(
            ColumnarReader::open(input, FieldType::Int64, CompressionType::None),
            Err(crate::Error::Decode(DecodeError::InvalidHeader(_)))
        ));

        Ok(())
    }

    #[test]
    fn range_scan_uses_three_modes() -> crate::Result<()> {
        let dir = MemoryDirectory::default();

        // Three granules of 4 rows: [0..3], [200..203], [400..403]
        let values: Vec<i64> = vec![0, 1, 2, 3, 200, 201, 202, 203, 400, 401, 402, 403];
        write_column(&dir, "x.col", &values, 4, CompressionType::Lz4)?;

        let input = dir.open_input("x.col", IoContext::ReadMostly)?;
        let mut reader = ColumnarReader::open(input, FieldType::Int64, CompressionType::Lz4)?;

        // Partial overlap with the middle granule only
        let (count, stats) = reader.range_count(201, 260)?;
        assert_eq!(3, count);
        assert_eq!(2, stats.skipped);
        assert_eq!(0, stats.bulk_counted);
        assert_eq!(1, stats.scanned);

        // Full containment bulk-counts without decompressing
        let (count, stats) = reader.range_count(0, 250)?;
        assert_eq!(8, count);
        assert_eq!(1, stats.skipped);
        assert_eq!(2, stats.bulk_counted);
        assert_eq!(0, stats.scanned);

        Ok(())
    }

    #[test]
    fn scan_agrees_with_naive_filter() -> crate::Result<()> {
        let dir = MemoryDirectory::default();
        let values: Vec<i64> = (0..500).map(|i| (i * 37) % 1000).collect();
        write_column(&dir, "x.col", &values, 64, CompressionType::Zstd(3))?;

        let input = dir.open_input("x.col", IoContext::ReadMostly)?;
        let mut reader = ColumnarReader::open(input, FieldType::Int64, CompressionType::Zstd(3))?;

        for (low, high) in [(0, 999), (100, 300), (950, 20_000), (-5, -1)] {
            let expected = values.iter().filter(|&&v| v >= low && v <= high).count() as u64;
            let (count, _) = reader.range_count(low, high)?;
            assert_eq!(expected, count, "range [{low}, {high}]");
        }

        Ok(())
    }
}
