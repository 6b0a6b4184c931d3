//! Embedding helpers for the retrieval pipeline.
//!
//! The real embedding model lives outside this workspace and is reached
//! through [`docqa_core::traits::Embedder`]. This crate provides a
//! deterministic hashing embedder for tests and offline runs, and the batch
//! driver that checks whatever embedder is plugged in.

use std::hash::{Hash, Hasher};

use anyhow::Result;
use tracing::{debug, warn};
use twox_hash::XxHash64;

use docqa_core::traits::Embedder;
use docqa_core::Error;

/// Token-bucket embedding: each whitespace token is hashed into one of `dim`
/// buckets and the vector is L2-normalised. Texts sharing words land close
/// together under cosine similarity.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = ((h >> 32) as u32) as f32 / u32::MAX as f32;
            v[idx] += 0.5 + val + (i as f32 % 3.0) * 0.01;
        }
        l2_normalize(&mut v);
        v
    }
}

impl Embedder for HashEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        usize::MAX
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Scale `v` to unit length. Zero vectors are left unchanged.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-12 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Embed `texts` in batches of `batch_size`, one vector per text, in order.
///
/// Texts longer than [`Embedder::max_len`] characters are cut to that length
/// before they reach the embedder. Embedder failures and malformed output (wrong count, wrong dimension,
/// non-finite values) surface as [`Error::Upstream`].
pub fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: &[String],
    batch_size: usize,
) -> docqa_core::Result<Vec<Vec<f32>>> {
    let batch_size = batch_size.max(1);
    let max_len = embedder.max_len();
    let mut out = Vec::with_capacity(texts.len());
    for (n, batch) in texts.chunks(batch_size).enumerate() {
        let long = batch.iter().filter(|t| clip(t, max_len).len() < t.len()).count();
        let embedded = if long > 0 {
            warn!(target: "docqa::embed", batch = n, long, max_len, "truncating texts longer than the embedder accepts");
            let clipped: Vec<String> = batch.iter().map(|t| clip(t, max_len).to_string()).collect();
            embedder.embed_batch(&clipped)
        } else {
            embedder.embed_batch(batch)
        };
        let vectors = embedded.map_err(|source| Error::Upstream { stage: "embedding", source })?;
        if vectors.len() != batch.len() {
            return Err(Error::Upstream {
                stage: "embedding",
                source: anyhow::anyhow!("expected {} vectors, got {}", batch.len(), vectors.len()),
            });
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != embedder.dim() || v.iter().any(|x| !x.is_finite())) {
            return Err(Error::Upstream {
                stage: "embedding",
                source: anyhow::anyhow!(
                    "malformed vector of length {} (embedder dim {})",
                    bad.len(),
                    embedder.dim()
                ),
            });
        }
        debug!(target: "docqa::embed", batch = n, size = batch.len(), "embedded batch");
        out.extend(vectors);
    }
    Ok(out)
}

/// The first `max_chars` characters of `text`.
fn clip(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
