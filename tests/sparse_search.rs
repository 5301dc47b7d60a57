// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use diagon::sparse::{SindiConfig, SindiIndex, SparseVector};
use rand::{rngs::StdRng, Rng, SeedableRng};
use test_log::test;

fn random_corpus(rng: &mut StdRng, docs: usize, dims: u32, terms_per_doc: usize) -> Vec<SparseVector> {
    (0..docs)
        .map(|_| {
            let pairs: Vec<(u32, f32)> = (0..terms_per_doc)
                .map(|_| (rng.random_range(0..dims), rng.random_range(0.01f32..1.0)))
                .collect();
            SparseVector::from_pairs(pairs)
        })
        .collect()
}

fn brute_force_top_k(docs: &[SparseVector], query: &SparseVector, k: usize) -> Vec<(u32, f32)> {
    let mut scored: Vec<(u32, f32)> = docs
        .iter()
        .enumerate()
        .map(|(doc, vec)| (doc as u32, vec.dot(query)))
        .filter(|(_, score)| *score > 0.0)
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    scored.truncate(k);
    scored
}

#[test]
fn five_doc_single_term_ranking() -> diagon::Result<()> {
    // Corpus of 5 docs over 3 terms; query {t0: 1.0} ranks docs exactly by
    // their t0 weight, descending
    let docs = vec![
        SparseVector::from_pairs(vec![(0, 0.3), (1, 9.0)]),
        SparseVector::from_pairs(vec![(0, 0.8), (2, 1.0)]),
        SparseVector::from_pairs(vec![(1, 4.0)]),
        SparseVector::from_pairs(vec![(0, 0.5)]),
        SparseVector::from_pairs(vec![(0, 1.0), (2, 0.1)]),
    ];

    let index = SindiIndex::build(SindiConfig::default(), &docs)?;
    let results = index.search(&SparseVector::from_pairs(vec![(0, 1.0)]), 10);

    let ranked: Vec<u32> = results.iter().map(|r| r.doc_id).collect();
    assert_eq!(vec![4, 1, 3, 0], ranked);

    Ok(())
}

#[test]
fn full_accumulation_matches_brute_force() -> diagon::Result<()> {
    let mut rng = StdRng::seed_from_u64(7);
    let docs = random_corpus(&mut rng, 400, 64, 10);

    let config = SindiConfig {
        use_block_max: false,
        block_size: 32,
        ..SindiConfig::default()
    };
    let index = SindiIndex::build(config, &docs)?;

    for _ in 0..20 {
        let query = SparseVector::from_pairs(
            (0..6)
                .map(|_| (rng.random_range(0..64u32), rng.random_range(0.1f32..2.0)))
                .collect(),
        );

        let results = index.search(&query, 25);
        let expected = brute_force_top_k(&docs, &query, 25);

        assert_eq!(expected.len(), results.len());
        for (result, (doc, score)) in results.iter().zip(&expected) {
            assert_eq!(*doc, result.doc_id);
            assert!((score - result.score).abs() < 1e-5);
        }
    }

    Ok(())
}

#[test]
fn simd_and_scalar_searches_agree() -> diagon::Result<()> {
    let mut rng = StdRng::seed_from_u64(11);
    let docs = random_corpus(&mut rng, 300, 48, 8);

    let simd = SindiIndex::build(
        SindiConfig {
            use_simd: true,
            use_prefetch: true,
            use_block_max: false,
            ..SindiConfig::default()
        },
        &docs,
    )?;
    let scalar = SindiIndex::build(
        SindiConfig {
            use_simd: false,
            use_prefetch: false,
            use_block_max: false,
            ..SindiConfig::default()
        },
        &docs,
    )?;

    for seed in 0..10u64 {
        let mut qrng = StdRng::seed_from_u64(seed);
        let query = SparseVector::from_pairs(
            (0..5)
                .map(|_| (qrng.random_range(0..48u32), qrng.random_range(0.1f32..1.5)))
                .collect(),
        );

        let a = simd.search(&query, 20);
        let b = scalar.search(&query, 20);

        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.doc_id, y.doc_id);
            // Same accumulation order, so scores are bit-identical
            assert_eq!(x.score.to_bits(), y.score.to_bits());
        }
    }

    Ok(())
}

#[test]
fn wand_is_exact_for_single_term_queries() -> diagon::Result<()> {
    // A skipped block can only drop postings of the term being processed, so
    // for single-term queries block-max pruning never changes the top-k
    let mut rng = StdRng::seed_from_u64(23);
    let docs = random_corpus(&mut rng, 500, 32, 6);

    let pruned = SindiIndex::build(
        SindiConfig {
            use_block_max: true,
            block_size: 16,
            ..SindiConfig::default()
        },
        &docs,
    )?;

    for term in 0..32u32 {
        let query = SparseVector::from_pairs(vec![(term, 0.8)]);

        let results = pruned.search(&query, 10);
        let expected = brute_force_top_k(&docs, &query, 10);

        assert_eq!(expected.len(), results.len(), "term {term}");
        for (result, (doc, score)) in results.iter().zip(&expected) {
            assert_eq!(*doc, result.doc_id);
            assert!((score - result.score).abs() < 1e-5);
        }
    }

    Ok(())
}

#[test]
fn wand_scores_never_exceed_true_scores() -> diagon::Result<()> {
    // Multi-term pruning may drop low-impact contributions but must never
    // invent score mass
    let mut rng = StdRng::seed_from_u64(29);
    let docs = random_corpus(&mut rng, 500, 32, 6);

    let pruned = SindiIndex::build(
        SindiConfig {
            use_block_max: true,
            block_size: 16,
            ..SindiConfig::default()
        },
        &docs,
    )?;

    for seed in 0..10u64 {
        let mut qrng = StdRng::seed_from_u64(100 + seed);
        let query = SparseVector::from_pairs(
            (0..4)
                .map(|_| (qrng.random_range(0..32u32), qrng.random_range(0.2f32..1.0)))
                .collect(),
        );

        let results = pruned.search(&query, 10);
        assert!(!results.is_empty());

        for result in &results {
            let truth = docs[result.doc_id as usize].dot(&query);
            assert!(result.score <= truth + 1e-5);
        }
    }

    Ok(())
}

#[test]
fn forward_index_returns_inserted_vectors() -> diagon::Result<()> {
    let mut rng = StdRng::seed_from_u64(31);
    let docs = random_corpus(&mut rng, 100, 40, 5);

    let index = SindiIndex::build(SindiConfig::default(), &docs)?;

    for (doc_id, doc) in docs.iter().enumerate() {
        let stored = index.get_document(doc_id as u32).unwrap();
        assert_eq!(doc, &stored);
    }
    assert_eq!(None, index.get_document(docs.len() as u32));

    Ok(())
}

#[test]
fn vocabulary_cap_filters_documents_and_queries() -> diagon::Result<()> {
    let docs = vec![SparseVector::from_pairs(vec![(1, 1.0), (50, 2.0)])];

    let index = SindiIndex::build(
        SindiConfig {
            num_dimensions: 10,
            ..SindiConfig::default()
        },
        &docs,
    )?;

    // Term 50 was dropped at build time
    let stored = index.get_document(0).unwrap();
    assert_eq!(&[1], stored.indices());

    // Query terms beyond the vocabulary are silently skipped
    let results = index.search(&SparseVector::from_pairs(vec![(50, 1.0)]), 5);
    assert!(results.is_empty());

    Ok(())
}
