//! Chunking and exact vector retrieval.
//!
//! Documents are cleaned, split into overlapping word windows, embedded,
//! and held in a flat in-memory index. Search is an exhaustive inner
//! product scan; with a few hundred resumes per job there is nothing to
//! gain from an ANN structure.

use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::Result;
use regex::Regex;

use crate::config::Config;
use crate::embeddings::Embedder;
use crate::extract::ExtractedDocument;

/// One retrievable window of a source document.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Base filename of the source document
    pub filename: String,
    /// Cleaned chunk text
    pub content: String,
    /// Full path of the source document inside the job workspace
    pub path: PathBuf,
}

/// A chunk returned from search, with its similarity score.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub score: f32,
    pub chunk: Chunk,
}

/// Flat exact-search vector index over document chunks.
///
/// `vectors[i]` is the embedding of `chunks[i]`; both vectors and
/// queries are unit length so the dot product is cosine similarity.
pub struct ChunkIndex {
    vectors: Vec<Vec<f32>>,
    chunks: Vec<Chunk>,
}

/// Normalize OCR output before chunking.
///
/// Characters outside the resume alphabet (letters, digits, whitespace
/// and `.,:/()-`) become spaces, then runs of whitespace collapse to a
/// single space. Strips the stray glyphs OCR produces on scanned input.
pub fn clean_ocr_text(text: &str) -> String {
    static NON_ALPHABET: OnceLock<Regex> = OnceLock::new();
    static MULTI_SPACE: OnceLock<Regex> = OnceLock::new();

    let non_alphabet =
        NON_ALPHABET.get_or_init(|| Regex::new(r"[^a-zA-Z0-9\s.,:/()-]").unwrap());
    let multi_space = MULTI_SPACE.get_or_init(|| Regex::new(r"\s{2,}").unwrap());

    let replaced = non_alphabet.replace_all(text, " ");
    multi_space.replace_all(&replaced, " ").trim().to_string()
}

/// Split text into overlapping word windows.
///
/// Windows are `chunk_size` words long and successive windows share
/// `overlap` words, so the stride is `chunk_size - overlap`. The final
/// window may be shorter. Empty input produces no chunks.
pub fn chunk_words(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return vec![];
    }

    let stride = chunk_size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut i = 0;
    while i < words.len() {
        let end = (i + chunk_size).min(words.len());
        chunks.push(words[i..end].join(" "));
        i += stride;
    }
    chunks
}

impl ChunkIndex {
    /// Chunk, embed, and index a set of extracted documents.
    ///
    /// Documents whose cleaned text is empty contribute no chunks. An
    /// input set with no chunks at all yields an empty (searchable)
    /// index.
    pub async fn build(
        embedder: &Embedder,
        documents: &[ExtractedDocument],
        config: &Config,
    ) -> Result<Self> {
        let mut chunks = Vec::new();

        for doc in documents {
            let cleaned = clean_ocr_text(&doc.text);
            for content in chunk_words(&cleaned, config.chunk_size, config.chunk_overlap) {
                chunks.push(Chunk {
                    filename: doc.filename.clone(),
                    content,
                    path: doc.path.clone(),
                });
            }
        }

        if chunks.is_empty() {
            tracing::warn!("No chunks produced from {} documents", documents.len());
            return Ok(Self {
                vectors: vec![],
                chunks: vec![],
            });
        }

        tracing::info!(
            documents = documents.len(),
            chunks = chunks.len(),
            "Embedding chunks for index"
        );

        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let vectors = embedder.embed_batch(&texts).await?;

        Ok(Self { vectors, chunks })
    }

    /// Return the `k` chunks most similar to `query`, best first.
    pub async fn search(
        &self,
        embedder: &Embedder,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        if self.chunks.is_empty() || k == 0 {
            return Ok(vec![]);
        }

        let query_vec = embedder.embed(query).await?;

        let mut scored: Vec<RetrievedChunk> = self
            .vectors
            .iter()
            .zip(self.chunks.iter())
            .map(|(v, chunk)| RetrievedChunk {
                score: dot(v, &query_vec),
                chunk: chunk.clone(),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);

        Ok(scored)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(filename: &str, text: &str) -> ExtractedDocument {
        ExtractedDocument {
            filename: filename.to_string(),
            text: text.to_string(),
            path: PathBuf::from(filename),
        }
    }

    #[test]
    fn test_clean_strips_stray_glyphs() {
        let cleaned = clean_ocr_text("Née: résumé | skills* & tools");
        assert_eq!(cleaned, "N e: r sum skills tools");
    }

    #[test]
    fn test_clean_keeps_resume_punctuation() {
        let cleaned = clean_ocr_text("2019-2023: Engineer (backend), https://x.dev");
        assert_eq!(cleaned, "2019-2023: Engineer (backend), https://x.dev");
    }

    #[test]
    fn test_clean_collapses_whitespace() {
        assert_eq!(clean_ocr_text("a   b\n\n  c\t\td"), "a b c d");
    }

    #[test]
    fn test_chunk_count_follows_stride() {
        // 10 words, window 4, overlap 1 -> stride 3 -> windows at 0,3,6,9
        let words = (0..10).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let chunks = chunk_words(&words, 4, 1);

        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0], "w0 w1 w2 w3");
        assert_eq!(chunks[3], "w9");
    }

    #[test]
    fn test_chunks_share_overlap_words() {
        let words = (0..8).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let chunks = chunk_words(&words, 4, 2);

        assert_eq!(chunks[0], "w0 w1 w2 w3");
        assert_eq!(chunks[1], "w2 w3 w4 w5");
    }

    #[test]
    fn test_chunk_empty_text() {
        assert!(chunk_words("   ", 300, 50).is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_words("only three words", 300, 50);
        assert_eq!(chunks, vec!["only three words".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_index_search() {
        let embedder = Embedder::mock(32);
        let config = test_config();
        let index = ChunkIndex::build(&embedder, &[], &config).await.unwrap();

        assert!(index.is_empty());
        let hits = index.search(&embedder, "anything", 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_search_finds_matching_chunk() {
        let embedder = Embedder::mock(64);
        let config = test_config();
        let docs = vec![
            doc("rust.pdf", "rust tokio async systems engineer"),
            doc("chef.pdf", "pastry baking kitchen management"),
        ];
        let index = ChunkIndex::build(&embedder, &docs, &config).await.unwrap();
        assert_eq!(index.len(), 2);

        let hits = index
            .search(&embedder, "rust tokio async systems engineer", 1)
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.filename, "rust.pdf");
        assert!(hits[0].score > 0.99, "identical text should score ~1.0");
    }

    #[tokio::test]
    async fn test_search_respects_k() {
        let embedder = Embedder::mock(64);
        let config = test_config();
        let docs = vec![
            doc("a.pdf", "alpha one"),
            doc("b.pdf", "beta two"),
            doc("c.pdf", "gamma three"),
        ];
        let index = ChunkIndex::build(&embedder, &docs, &config).await.unwrap();

        let hits = index.search(&embedder, "alpha", 2).await.unwrap();
        assert_eq!(hits.len(), 2);

        let hits = index.search(&embedder, "alpha", 0).await.unwrap();
        assert!(hits.is_empty());
    }

    fn test_config() -> Config {
        Config::load_or_default()
    }
}
