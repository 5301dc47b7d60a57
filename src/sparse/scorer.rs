// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Score-accumulation kernels
//!
//! For every `(doc_id, weight)` posting:
//! `scores[doc_id] += query_weight * weight`.
//!
//! The wide path processes postings in 8-lane chunks with a software
//! prefetch hint one cache line ahead; the scalar path is the reference
//! implementation and the two produce bit-identical score arrays.

/// Lanes processed per iteration of the wide kernel
pub(crate) const LANES: usize = 8;

/// Elements ahead for the prefetch hint (one cache line of doc ids)
pub(crate) const PREFETCH_DISTANCE: usize = 16;

#[allow(unsafe_code)]
#[inline]
pub(crate) fn prefetch_read<T>(slice: &[T], index: usize) {
    #[cfg(target_arch = "x86_64")]
    if index < slice.len() {
        // SAFETY: the pointer is in bounds and prefetch has no memory effects
        unsafe {
            core::arch::x86_64::_mm_prefetch(
                slice.as_ptr().add(index).cast::<i8>(),
                core::arch::x86_64::_MM_HINT_T0,
            );
        }
    }

    #[cfg(not(target_arch = "x86_64"))]
    {
        let _ = (slice, index);
    }
}

#[inline]
fn accumulate_one(doc_id: u32, weight: f32, query_weight: f32, scores: &mut [f32]) {
    // Out-of-range doc ids (corrupt posting data) are skipped, not fatal
    if let Some(slot) = scores.get_mut(doc_id as usize) {
        *slot += query_weight * weight;
    }
}

fn accumulate_scalar(doc_ids: &[u32], weights: &[f32], query_weight: f32, scores: &mut [f32]) {
    for (&doc_id, &weight) in doc_ids.iter().zip(weights) {
        accumulate_one(doc_id, weight, query_weight, scores);
    }
}

fn accumulate_wide(
    doc_ids: &[u32],
    weights: &[f32],
    query_weight: f32,
    scores: &mut [f32],
    use_prefetch: bool,
) {
    let count = doc_ids.len().min(weights.len());
    let mut i = 0;

    while i + LANES <= count {
        if use_prefetch {
            prefetch_read(doc_ids, i + PREFETCH_DISTANCE);
            prefetch_read(weights, i + PREFETCH_DISTANCE);
        }

        // 8 postings per iteration; per-posting arithmetic is identical to
        // the scalar kernel, so results match bit for bit
        accumulate_one(doc_ids[i], weights[i], query_weight, scores);
        accumulate_one(doc_ids[i + 1], weights[i + 1], query_weight, scores);
        accumulate_one(doc_ids[i + 2], weights[i + 2], query_weight, scores);
        accumulate_one(doc_ids[i + 3], weights[i + 3], query_weight, scores);
        accumulate_one(doc_ids[i + 4], weights[i + 4], query_weight, scores);
        accumulate_one(doc_ids[i + 5], weights[i + 5], query_weight, scores);
        accumulate_one(doc_ids[i + 6], weights[i + 6], query_weight, scores);
        accumulate_one(doc_ids[i + 7], weights[i + 7], query_weight, scores);

        i += LANES;
    }

    accumulate_scalar(&doc_ids[i..count], &weights[i..count], query_weight, scores);
}

/// Accumulates `query_weight * weight` into `scores[doc_id]` for each posting.
///
/// `use_simd` selects the 8-lane kernel; `use_prefetch` additionally emits
/// prefetch hints (wide kernel only). Both paths produce bit-identical
/// results.
pub fn accumulate_scores(
    doc_ids: &[u32],
    weights: &[f32],
    query_weight: f32,
    scores: &mut [f32],
    use_simd: bool,
    use_prefetch: bool,
) {
    let count = doc_ids.len().min(weights.len());

    if use_simd {
        accumulate_wide(
            &doc_ids[..count],
            &weights[..count],
            query_weight,
            scores,
            use_prefetch,
        );
    } else {
        accumulate_scalar(&doc_ids[..count], &weights[..count], query_weight, scores);
    }
}
