//! Scoring functions shared by both indices

use ndarray::Axis;
use std::collections::HashSet;
use std::hash::Hash;

use crate::error::{Error, Result};

use super::MultiVector;

/// Cosine similarity of two equal-length vectors; 0.0 when either is zero
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Late-interaction score of a page for a query
///
/// For every query vector, the best dot product over the page's vectors;
/// summed across query vectors.
pub fn max_sim(query: &MultiVector, page: &MultiVector) -> Result<f32> {
    if query.dim() != page.dim() {
        return Err(Error::encoding(format!(
            "query vectors have {} dimensions but page vectors have {}",
            query.dim(),
            page.dim()
        )));
    }

    let q = query.view()?;
    let d = page.view()?;

    // [n_query, n_patches]
    let scores = q.dot(&d.t());
    let best = scores.map_axis(Axis(1), |row| {
        row.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    });

    Ok(best.sum())
}

/// Order `(position, score)` pairs best-first and keep `top_k` distinct keys
///
/// Positions sharing a key collapse into the best-scoring one, so `top_k`
/// counts distinct pages even when a page was indexed more than once.
/// Equal scores keep log order. NaN scores are dropped.
pub fn rank<K, F>(mut scored: Vec<(usize, f32)>, top_k: usize, key: F) -> Vec<(usize, f32)>
where
    K: Eq + Hash,
    F: Fn(usize) -> K,
{
    scored.retain(|(_, score)| !score.is_nan());
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut seen = HashSet::new();
    scored
        .into_iter()
        .filter(|(position, _)| seen.insert(key(*position)))
        .take(top_k)
        .collect()
}
