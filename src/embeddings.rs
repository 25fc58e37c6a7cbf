//! Embedding model wrapper using mistralrs
//!
//! Chunk and query vectors are L2-normalized on the way out so the
//! retrieval index can treat inner product as cosine similarity.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use anyhow::{Context, Result};
use mistralrs::{EmbeddingModelBuilder, EmbeddingRequest, Model};

/// Wrapper around a mistralrs embedding model
pub struct Embedder {
    model: Option<Arc<Model>>,
    /// Vector dimensions produced by this model
    pub dimensions: usize,
}

impl Embedder {
    /// Load an embedding model from HuggingFace
    ///
    /// # Arguments
    /// * `hf_repo_id` - HuggingFace repository ID (e.g., "Qwen/Qwen3-Embedding-0.6B")
    /// * `dimensions` - Expected output dimensions for this model
    pub async fn new(hf_repo_id: &str, dimensions: usize) -> Result<Self> {
        tracing::info!("Loading embedding model: {}", hf_repo_id);

        let model = EmbeddingModelBuilder::new(hf_repo_id)
            .with_logging()
            .build()
            .await
            .context("Failed to load embedding model")?;

        tracing::info!("Embedding model loaded: {} ({}D)", hf_repo_id, dimensions);

        Ok(Self {
            model: Some(Arc::new(model)),
            dimensions,
        })
    }

    /// Create a mock embedder for testing.
    ///
    /// Instead of calling a model it hashes whitespace-separated words
    /// into a bag-of-words vector, so identical texts embed identically
    /// and similarity comparisons remain meaningful.
    pub fn mock(dimensions: usize) -> Self {
        Self {
            model: None,
            dimensions,
        }
    }

    /// Embed a single text (for queries)
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let text = text.trim();
        if text.is_empty() {
            tracing::debug!("Empty text, returning zero vector");
            return Ok(vec![0.0; self.dimensions]);
        }

        let Some(ref model) = self.model else {
            return Ok(mock_vector(text, self.dimensions));
        };

        tracing::debug!(text_len = text.len(), "Embedding single text");

        let start = std::time::Instant::now();
        let vector = model
            .generate_embedding(text)
            .await
            .context("Failed to generate embedding")?;

        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis(),
            "Embedding complete"
        );

        Ok(l2_normalize(vector))
    }

    /// Batch embed multiple texts
    ///
    /// One request for the whole batch; more efficient than calling
    /// `embed()` per text.
    pub async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            tracing::debug!("Empty batch, returning empty vec");
            return Ok(vec![]);
        }

        let Some(ref model) = self.model else {
            return Ok(texts
                .iter()
                .map(|t| mock_vector(t, self.dimensions))
                .collect());
        };

        tracing::debug!(batch_size = texts.len(), "Embedding batch");

        let start = std::time::Instant::now();

        let request = EmbeddingRequest::builder().add_prompts(texts.iter().map(|s| s.to_string()));

        let vectors = model
            .generate_embeddings(request)
            .await
            .context("Failed to generate batch embeddings")?;

        tracing::debug!(
            batch_size = texts.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Batch embedding complete"
        );

        Ok(vectors.into_iter().map(l2_normalize).collect())
    }
}

/// Scale a vector to unit length. Zero vectors pass through unchanged.
fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

/// Deterministic hashed bag-of-words vector for mock mode.
fn mock_vector(text: &str, dimensions: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; dimensions.max(1)];
    for word in text.split_whitespace() {
        let mut hasher = DefaultHasher::new();
        word.to_lowercase().hash(&mut hasher);
        let bucket = (hasher.finish() as usize) % v.len();
        v[bucket] += 1.0;
    }
    l2_normalize(v)
}
