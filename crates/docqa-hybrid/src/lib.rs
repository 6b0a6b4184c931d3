//! Hybrid ranking: fuses vector similarity with keyword coverage.

mod fusion;
mod keywords;

pub use fusion::{fuse, sort_results, FusionWeights};
pub use keywords::{keyword_score, normalize_keywords};
