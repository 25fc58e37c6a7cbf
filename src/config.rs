use std::path::PathBuf;
use std::time::Duration;

/// Pipeline configuration.
///
/// Every limit the pipeline depends on lives here so the serving layer
/// can override them in one place. Defaults match the values the
/// ranking protocol was tuned against.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory for per-job workspaces
    pub uploads_dir: PathBuf,

    /// Maximum number of entries allowed inside an uploaded archive
    pub max_archive_entries: usize,
    /// Maximum cumulative uncompressed size of the archive contents
    pub max_extracted_bytes: u64,
    /// Maximum uncompressed:compressed ratio for a single entry
    pub max_compression_ratio: f64,

    /// Rasterization resolution for paginated documents
    pub ocr_dpi: f32,
    /// Upscale factor applied to every image before OCR
    pub ocr_upscale: f32,
    /// Minimum trimmed length for extracted text to survive the quality gate
    pub min_text_chars: usize,
    /// Minimum alphanumeric fraction for extracted text
    pub min_alnum_ratio: f32,

    /// Words per retrieval chunk
    pub chunk_size: usize,
    /// Word overlap between consecutive chunks
    pub chunk_overlap: usize,
    /// Chunks retrieved per requested result
    pub retrieval_multiplier: usize,

    /// Characters of full-document text prepended as header context
    pub header_context_chars: usize,
    /// Concurrent per-candidate extraction calls
    pub stage1_concurrency: usize,
    /// Token budget for one per-candidate extraction call
    pub stage1_max_tokens: usize,
    /// Token budget for the comparative ranking call
    pub stage2_max_tokens: usize,

    /// Hard deadline for a whole ranking job
    pub job_timeout: Duration,

    /// HuggingFace repository ID of the embedding model
    pub embedding_model_id: String,
    /// Vector dimensions produced by the embedding model
    pub embedding_dimensions: usize,
    /// HuggingFace repository ID of the vision model used for OCR
    pub vision_model_id: String,
    /// Local generation model used for both ranking stages
    pub generation_model: GenerationModelInfo,
}

/// Where to find the GGUF generation model on disk.
#[derive(Debug, Clone)]
pub struct GenerationModelInfo {
    /// Directory holding the GGUF file
    pub model_dir: PathBuf,
    /// GGUF filename inside `model_dir`
    pub gguf_file: String,
    /// Repository ID the tokenizer is pulled from
    pub tokenizer_repo_id: String,
}

impl Config {
    /// Build a configuration with platform-appropriate directories and
    /// default limits.
    pub fn load_or_default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shortlist");

        let models_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shortlist")
            .join("models");

        Self {
            uploads_dir: data_dir.join("uploads"),

            max_archive_entries: 500,
            max_extracted_bytes: 500 * 1024 * 1024,
            max_compression_ratio: 100.0,

            ocr_dpi: 300.0,
            ocr_upscale: 2.0,
            min_text_chars: 50,
            min_alnum_ratio: 0.4,

            chunk_size: 300,
            chunk_overlap: 50,
            retrieval_multiplier: 5,

            header_context_chars: 800,
            stage1_concurrency: 4,
            stage1_max_tokens: 500,
            stage2_max_tokens: 2048,

            job_timeout: Duration::from_secs(300),

            embedding_model_id: "Qwen/Qwen3-Embedding-0.6B".to_string(),
            embedding_dimensions: 1024,
            vision_model_id: "Qwen/Qwen2.5-VL-3B-Instruct".to_string(),
            generation_model: GenerationModelInfo {
                model_dir: models_dir.join("qwen3-0.6b"),
                gguf_file: "Qwen3-0.6B-Q4_K_M.gguf".to_string(),
                tokenizer_repo_id: "Qwen/Qwen3-0.6B".to_string(),
            },
        }
    }

    /// Ensure the uploads directory exists.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.uploads_dir)?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::load_or_default()
    }
}
