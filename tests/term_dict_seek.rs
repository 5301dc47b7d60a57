// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use diagon::{
    directory::{Directory, IoContext, MemoryDirectory},
    termdict::{BlockTreeConfig, BlockTreeTermsReader, BlockTreeTermsWriter, SeekStatus, TermStats},
    Bytes,
};
use test_log::test;

fn build(dir: &MemoryDirectory, terms: &[&str]) -> diagon::Result<()> {
    let tim = dir.create_output("field.tim", IoContext::Default)?;
    let mut tip = dir.create_output("field.tip", IoContext::Default)?;

    let mut writer = BlockTreeTermsWriter::new(tim, BlockTreeConfig::default())?;
    for (i, term) in terms.iter().enumerate() {
        writer.add_term(term.as_bytes(), TermStats::new(i as u32 + 1, i as u64 + 1, 0))?;
    }
    writer.finish(tip.as_mut())?;
    Ok(())
}

fn open(dir: &MemoryDirectory) -> diagon::Result<BlockTreeTermsReader> {
    let tim = dir.open_input("field.tim", IoContext::ReadMostly)?;
    let tip = dir.open_input("field.tip", IoContext::ReadMostly)?;
    BlockTreeTermsReader::open(tim, tip)
}

#[test]
fn seek_ceil_positions_on_next_greater_term() -> diagon::Result<()> {
    let dir = MemoryDirectory::default();
    build(&dir, &["apple", "cherry", "elderberry"])?;

    let reader = open(&dir)?;
    let mut cursor = reader.cursor()?;

    assert_eq!(SeekStatus::NotFound, cursor.seek_ceil(b"banana")?);
    assert_eq!(Some(&Bytes::from("cherry")), cursor.term());

    assert_eq!(SeekStatus::End, cursor.seek_ceil(b"zebra")?);

    Ok(())
}

#[test]
fn seek_exact_only_matches_stored_terms() -> diagon::Result<()> {
    let dir = MemoryDirectory::default();
    let corpus = ["apple", "cherry", "elderberry"];
    build(&dir, &corpus)?;

    let reader = open(&dir)?;
    let mut cursor = reader.cursor()?;

    for term in corpus {
        assert!(cursor.seek_exact(term.as_bytes())?, "{term}");
    }
    for term in ["app", "applee", "banana", "zzz"] {
        assert!(!cursor.seek_exact(term.as_bytes())?, "{term}");
    }

    Ok(())
}

#[test]
fn out_of_order_add_is_rejected() -> diagon::Result<()> {
    let dir = MemoryDirectory::default();
    let tim = dir.create_output("field.tim", IoContext::Default)?;

    let mut writer = BlockTreeTermsWriter::new(tim, BlockTreeConfig::default())?;
    writer.add_term(b"m", TermStats::default())?;

    assert!(matches!(
        writer.add_term(b"a", TermStats::default()),
        Err(diagon::Error::InvalidInput(_))
    ));
    assert!(matches!(
        writer.add_term(b"m", TermStats::default()),
        Err(diagon::Error::InvalidInput(_))
    ));

    Ok(())
}

#[test]
fn min_max_block_config_is_validated() {
    let dir = MemoryDirectory::default();
    let tim = dir.create_output("field.tim", IoContext::Default).unwrap();

    assert!(matches!(
        BlockTreeTermsWriter::new(
            tim,
            BlockTreeConfig {
                min_items_in_block: 10,
                max_items_in_block: 5,
            },
        ),
        Err(diagon::Error::InvalidConfig(_))
    ));
}

#[test]
fn full_iteration_matches_corpus() -> diagon::Result<()> {
    let dir = MemoryDirectory::default();
    let mut terms: Vec<String> = (0..300).map(|i| format!("prefix{i:06}")).collect();
    terms.sort();
    let refs: Vec<&str> = terms.iter().map(String::as_str).collect();
    build(&dir, &refs)?;

    let reader = open(&dir)?;
    let mut cursor = reader.cursor()?;

    let mut count = 0usize;
    while cursor.next()? {
        assert_eq!(terms[count].as_bytes(), cursor.term().unwrap().as_ref());
        assert_eq!(Some(count as u32 + 1), cursor.doc_freq());
        count += 1;
    }
    assert_eq!(terms.len(), count);

    Ok(())
}
