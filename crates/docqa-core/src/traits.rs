/// Boundary to the external embedding model.
///
/// Implementations may block; async callers should run them on a blocking pool.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    /// Longest input, in characters, the model accepts. The batch driver
    /// truncates longer texts before calling [`embed_batch`](Self::embed_batch).
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}
