use docqa_core::types::DistanceMetric;

/// Lower bound on exploration breadth for small result sets.
pub const MIN_SEARCH_EF: usize = 64;

/// Exploration breadth for a query of `limit` results: ten candidates per
/// result, at least [`MIN_SEARCH_EF`], at most `cap`, and never below `limit`.
pub fn search_ef(limit: usize, cap: usize) -> usize {
    limit
        .saturating_mul(10)
        .max(MIN_SEARCH_EF.min(cap))
        .min(cap)
        .max(limit)
}

/// Exact similarity between two vectors, higher is better.
pub fn similarity(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        DistanceMetric::Cosine => {
            let (mut dot, mut na, mut nb) = (0f32, 0f32, 0f32);
            for (x, y) in a.iter().zip(b) {
                dot += x * y;
                na += x * x;
                nb += y * y;
            }
            let denom = na.sqrt() * nb.sqrt();
            if denom > 0.0 {
                dot / denom
            } else {
                0.0
            }
        }
        DistanceMetric::Dot => a.iter().zip(b).map(|(x, y)| x * y).sum(),
        DistanceMetric::Euclidean => {
            let d = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt();
            1.0 / (1.0 + d)
        }
    }
}

/// Convert a LanceDB `_distance` into a similarity score.
///
/// Lance reports `1 - cos` for cosine, `1 - a·b` for dot and the squared
/// euclidean distance for L2.
pub fn score_from_distance(metric: DistanceMetric, distance: f32) -> f32 {
    match metric {
        DistanceMetric::Cosine | DistanceMetric::Dot => 1.0 - distance,
        DistanceMetric::Euclidean => 1.0 / (1.0 + distance.max(0.0).sqrt()),
    }
}
