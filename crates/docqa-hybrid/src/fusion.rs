use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use docqa_core::types::SearchResult;
use docqa_core::{Error, Result};

use crate::keywords::{keyword_score, normalize_keywords};

/// Linear fusion weights. They need not sum to one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub vector: f32,
    pub keyword: f32,
}

impl FusionWeights {
    pub fn new(vector: f32, keyword: f32) -> Result<Self> {
        for (name, w) in [("vector_weight", vector), ("keyword_weight", keyword)] {
            if !w.is_finite() || w < 0.0 {
                return Err(Error::Validation(format!("{name} must be a finite, non-negative number (got {w})")));
            }
        }
        Ok(Self { vector, keyword })
    }

    pub fn combine(&self, vector_score: f32, keyword_score: f32) -> f32 {
        self.vector * vector_score + self.keyword * keyword_score
    }
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self { vector: 0.7, keyword: 0.3 }
    }
}

/// Re-rank vector candidates by fused score and keep the best `limit`.
///
/// Each candidate's incoming `score` is taken as its vector score. Both
/// component scores are recorded on the result.
pub fn fuse<S: AsRef<str>>(
    candidates: Vec<SearchResult>,
    keywords: &[S],
    weights: FusionWeights,
    limit: usize,
) -> Vec<SearchResult> {
    let keywords = normalize_keywords(keywords);
    let mut fused: Vec<SearchResult> = candidates
        .into_iter()
        .map(|mut r| {
            let vector_score = r.score;
            let kw = keyword_score(&r.content, &keywords);
            r.vector_score = Some(vector_score);
            r.keyword_score = Some(kw);
            r.score = weights.combine(vector_score, kw);
            r
        })
        .collect();
    sort_results(&mut fused);
    fused.truncate(limit);
    fused
}

/// Score descending, then id ascending. NaN scores sort last.
pub fn sort_results(results: &mut [SearchResult]) {
    results.sort_by(|a, b| match (a.score.is_nan(), b.score.is_nan()) {
        (true, true) => a.id.cmp(&b.id),
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b
            .score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id)),
    });
}
