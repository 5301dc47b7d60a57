// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use diagon::{
    columnar::{ColumnarReader, ColumnarWriter},
    directory::{Directory, IoContext, MemoryDirectory},
    CompressionType, FieldType, FieldValue,
};
use test_log::test;

fn write_i64_column(
    dir: &MemoryDirectory,
    name: &str,
    values: &[i64],
    rows_per_granule: u32,
) -> diagon::Result<()> {
    let mut out = dir.create_output(name, IoContext::Default)?;
    let mut writer = ColumnarWriter::new(FieldType::Int64, CompressionType::Lz4, rows_per_granule)?;
    for &v in values {
        writer.push(FieldValue::Int64(v))?;
    }
    writer.finish(out.as_mut())?;
    Ok(())
}

fn open_i64_column(dir: &MemoryDirectory, name: &str) -> diagon::Result<ColumnarReader> {
    let input = dir.open_input(name, IoContext::ReadMostly)?;
    ColumnarReader::open(input, FieldType::Int64, CompressionType::Lz4)
}

#[test]
fn three_granule_skip_scenario() -> diagon::Result<()> {
    // Granule value ranges: 0..100, 200..300, 400..500
    let mut values = Vec::new();
    for base in [0i64, 200, 400] {
        for i in 0..=100 {
            values.push(base + i);
        }
    }

    let dir = MemoryDirectory::default();
    write_i64_column(&dir, "x.col", &values, 101)?;

    let mut reader = open_i64_column(&dir, "x.col")?;
    assert_eq!(3, reader.granules().len());

    // 250 <= x <= 260: granules 0 and 2 are skipped, granule 1 is
    // decompressed and scanned
    let (count, stats) = reader.range_count(250, 260)?;
    assert_eq!(11, count);
    assert_eq!(2, stats.skipped);
    assert_eq!(0, stats.bulk_counted);
    assert_eq!(1, stats.scanned);

    Ok(())
}

#[test]
fn skip_modes_union_equals_full_scan() -> diagon::Result<()> {
    let values: Vec<i64> = (0..10_000).map(|i| (i * 131) % 4096).collect();

    let dir = MemoryDirectory::default();
    write_i64_column(&dir, "x.col", &values, 512)?;

    let mut reader = open_i64_column(&dir, "x.col")?;

    // Total rows invariant
    assert_eq!(values.len() as u64, reader.total_rows());
    assert_eq!(
        values.len() as u64,
        reader
            .granules()
            .iter()
            .map(|g| u64::from(g.num_rows))
            .sum::<u64>()
    );

    for (low, high) in [
        (0, 4095),
        (100, 200),
        (2000, 2100),
        (4000, 9999),
        (-100, -1),
        (500, 500),
    ] {
        let expected = values.iter().filter(|&&v| v >= low && v <= high).count() as u64;
        let (count, stats) = reader.range_count(low, high)?;
        assert_eq!(expected, count, "range [{low}, {high}]");
        assert_eq!(
            reader.granules().len(),
            stats.skipped + stats.bulk_counted + stats.scanned
        );
    }

    Ok(())
}

#[test]
fn multi_column_roundtrip_is_byte_exact() -> diagon::Result<()> {
    let dir = MemoryDirectory::default();

    let ints: Vec<i64> = (0..3000).map(|i| i * 17 - 999).collect();
    let strings: Vec<String> = (0..3000).map(|i| format!("row-{i}-payload")).collect();

    write_i64_column(&dir, "ints.col", &ints, 256)?;

    {
        let mut out = dir.create_output("strs.col", IoContext::Default)?;
        let mut writer =
            ColumnarWriter::new(FieldType::Str, CompressionType::Zstd(3), 256)?;
        for s in &strings {
            writer.push(FieldValue::from(s.as_str()))?;
        }
        writer.finish(out.as_mut())?;
    }

    let mut ints_reader = open_i64_column(&dir, "ints.col")?;
    let restored_ints = ints_reader.read_all()?;
    for (i, &v) in ints.iter().enumerate() {
        assert_eq!(Some(FieldValue::Int64(v)), restored_ints.get(i));
    }

    let input = dir.open_input("strs.col", IoContext::ReadMostly)?;
    let mut strs_reader = ColumnarReader::open(input, FieldType::Str, CompressionType::Zstd(3))?;
    let restored_strs = strs_reader.read_all()?;
    for (i, s) in strings.iter().enumerate() {
        assert_eq!(Some(FieldValue::from(s.as_str())), restored_strs.get(i));
    }

    Ok(())
}
