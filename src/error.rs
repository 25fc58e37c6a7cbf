//! Error types for the ranking pipeline.
//!
//! Archive violations and storage failures are terminal for the job and
//! roll the per-job workspace back before surfacing. Per-file problems
//! during text extraction never show up here; they are logged and the
//! file is skipped.

use thiserror::Error;

/// Terminal errors a ranking job can surface.
#[derive(Debug, Error)]
pub enum RankError {
    /// The upload is not a structurally valid zip archive.
    #[error("uploaded file is not a valid zip archive: {0}")]
    InvalidArchive(String),

    /// The archive holds more entries than the configured limit.
    #[error("too many files in archive: {count} (limit: {limit})")]
    TooManyEntries { count: usize, limit: usize },

    /// The cumulative uncompressed size crossed the configured limit.
    #[error("total extracted size exceeds limit of {limit} bytes")]
    ArchiveTooLarge { limit: u64 },

    /// A single entry expands suspiciously far beyond its compressed size.
    #[error("suspicious compression ratio {ratio:.2} for entry '{entry}'")]
    SuspiciousCompressionRatio { entry: String, ratio: f64 },

    /// Persisting the upload or extracting it to disk failed.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Every document in the archive was unreadable or failed the
    /// quality gate.
    #[error("no readable text found in the uploaded documents")]
    NoReadableContent,

    /// The job ran past its deadline.
    #[error("job timed out after {0} seconds")]
    Timeout(u64),

    /// The job was cancelled by the caller.
    #[error("job was cancelled")]
    Cancelled,

    /// An embedding or generation collaborator failed outright
    /// (distinct from malformed output, which degrades in place).
    #[error("model error: {0}")]
    Model(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RankError>;
