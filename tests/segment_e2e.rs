// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use diagon::{
    directory::{Directory, FsDirectory, IoContext},
    segment::{
        Document, FieldInfo, FieldInfos, SegmentCatalog, SegmentWriteState, SegmentWriter,
        SegmentWriterConfig,
    },
    sparse::{SindiConfig, SparseVector},
    storage::{LifecyclePolicy, TierManager},
    CompressionType, FieldType, FieldValue, Tier,
};
use std::sync::Arc;
use test_log::test;

fn field_infos() -> Arc<FieldInfos> {
    Arc::new(
        FieldInfos::new(vec![
            FieldInfo::new("id", FieldType::Int64),
            FieldInfo::new("title", FieldType::Str),
            FieldInfo::new("body", FieldType::Text),
        ])
        .unwrap(),
    )
}

fn write_state(directory: Arc<dyn Directory>) -> SegmentWriteState {
    SegmentWriteState {
        directory,
        segment_name: "seg0".into(),
        segment_suffix: String::new(),
        io_context: IoContext::Default,
        field_infos: field_infos(),
    }
}

#[test]
fn write_read_columns_terms_and_postings() -> diagon::Result<()> {
    let folder = tempfile::tempdir()?;
    let directory: Arc<dyn Directory> = Arc::new(FsDirectory::open(folder.path())?);

    let config = SegmentWriterConfig {
        rows_per_granule: 4,
        sindi: Some(SindiConfig::default()),
        ..SegmentWriterConfig::default()
    };

    let mut writer = SegmentWriter::new(write_state(directory.clone()), config)?;

    let bodies = [
        "the quick brown fox",
        "jumped over the lazy dog",
        "the dog barked",
        "quick quick slow",
        "a fox in the henhouse",
        "dogs and foxes",
    ];

    for (i, body) in bodies.iter().enumerate() {
        writer.add_document(
            &Document::new()
                .field("id", i as i64 * 10)
                .field("title", format!("doc {i}").as_str())
                .field("body", *body)
                .sparse(SparseVector::from_pairs(vec![(i as u32 % 3, 1.0 + i as f32)])),
        )?;
    }
    assert_eq!(6, writer.doc_count());

    let info = writer.finish()?;
    assert_eq!(6, info.doc_count);
    assert!(info.size_bytes > 0);

    // Publish only after a fully successful finish
    let tiers = Arc::new(TierManager::with_default_configs(LifecyclePolicy::default()));
    let catalog = SegmentCatalog::with_tier_manager(tiers.clone());
    catalog.publish(info, directory, CompressionType::Lz4);
    assert_eq!(Tier::Hot, tiers.segment_tier("seg0")?);

    let entry = catalog.get("seg0").expect("published segment resolves");
    let reader = entry.open_reader()?;
    assert_eq!(6, reader.doc_count());

    // Columns round-trip
    let mut ids = reader.column("id")?;
    let restored = ids.read_all()?;
    for i in 0..6 {
        assert_eq!(Some(FieldValue::Int64(i as i64 * 10)), restored.get(i));
    }

    let mut titles = reader.column("title")?;
    let restored = titles.read_all()?;
    assert_eq!(Some(FieldValue::from("doc 3")), restored.get(3));

    // Range scan over the id column
    let (count, _) = ids.range_count(10, 30)?;
    assert_eq!(3, count);

    // Norms carry the per-document token count
    let mut norms = reader.norms("body")?;
    let norms = norms.read_all()?;
    let expected_lengths = [4u64, 5, 3, 3, 5, 3];
    for (i, &len) in expected_lengths.iter().enumerate() {
        assert_eq!(Some(FieldValue::UInt64(len)), norms.get(i));
    }

    // Term dictionary and postings
    let terms = reader.terms("body")?;
    let mut cursor = terms.cursor()?;

    assert!(cursor.seek_exact(b"dog")?);
    assert_eq!(Some(2), cursor.doc_freq());

    let mut postings = cursor.postings()?;
    assert_eq!(Some((1, 1)), postings.next()?);
    assert_eq!(Some((2, 1)), postings.next()?);
    assert_eq!(None, postings.next()?);

    assert!(cursor.seek_exact(b"quick")?);
    assert_eq!(Some(2), cursor.doc_freq());
    assert_eq!(Some(3), cursor.total_term_freq());

    let mut postings = cursor.postings()?;
    assert_eq!(Some((0, 1)), postings.next()?);
    assert_eq!(Some((3, 2)), postings.next()?);
    assert_eq!(None, postings.next()?);

    assert!(!cursor.seek_exact(b"wolf")?);

    // Terms iterate in sorted order
    let mut cursor = terms.cursor()?;
    let mut previous: Option<Vec<u8>> = None;
    let mut term_count = 0;
    while cursor.next()? {
        let current = cursor.term().unwrap().to_vec();
        if let Some(previous) = &previous {
            assert!(*previous < current);
        }
        previous = Some(current);
        term_count += 1;
    }
    assert_eq!(16, term_count);

    Ok(())
}

#[test]
fn sparse_index_is_loadable_from_segment_files() -> diagon::Result<()> {
    let folder = tempfile::tempdir()?;
    let directory: Arc<dyn Directory> = Arc::new(FsDirectory::open(folder.path())?);

    let config = SegmentWriterConfig {
        sindi: Some(SindiConfig::default()),
        ..SegmentWriterConfig::default()
    };

    let mut writer = SegmentWriter::new(write_state(directory.clone()), config)?;
    for i in 0..10u32 {
        writer.add_document(
            &Document::new()
                .field("id", i as i64)
                .sparse(SparseVector::from_pairs(vec![(0, 10.0 - i as f32), (i % 4, 1.0)])),
        )?;
    }
    writer.finish()?;

    let index = diagon::sparse::SindiIndex::load(directory.as_ref(), "seg0")?;
    assert_eq!(10, index.num_documents());

    let results = index.search(&SparseVector::from_pairs(vec![(0, 1.0)]), 3);
    assert_eq!(3, results.len());
    assert_eq!(0, results[0].doc_id);

    Ok(())
}

#[test]
fn missing_fields_store_defaults() -> diagon::Result<()> {
    let folder = tempfile::tempdir()?;
    let directory: Arc<dyn Directory> = Arc::new(FsDirectory::open(folder.path())?);

    let mut writer = SegmentWriter::new(
        write_state(directory.clone()),
        SegmentWriterConfig::default(),
    )?;
    writer.add_document(&Document::new().field("id", 7i64))?;
    let info = writer.finish()?;

    let catalog = SegmentCatalog::new();
    catalog.publish(info, directory, CompressionType::Lz4);

    let entry = catalog.get("seg0").unwrap();
    let reader = entry.open_reader()?;

    let mut titles = reader.column("title")?;
    assert_eq!(Some(FieldValue::from("")), titles.read_all()?.get(0));

    Ok(())
}
