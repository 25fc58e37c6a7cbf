//! End-to-end ranking pipeline.
//!
//! One call takes a job description plus an uploaded archive and runs
//! ingest, OCR extraction, indexing, retrieval, and the two ranking
//! stages under a single deadline. The job workspace is removed on
//! every exit path, including timeout and cancellation.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::Config;
use crate::embeddings::Embedder;
use crate::error::{RankError, Result};
use crate::extract;
use crate::index::ChunkIndex;
use crate::ingest;
use crate::llm::Generator;
use crate::ocr::OcrEngine;
use crate::rank::{self, RankedCandidate};

/// Metadata for one ranking job.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub top_k: usize,
}

impl Job {
    fn new(top_k: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            top_k,
        }
    }
}

/// The ranking pipeline with its model collaborators.
///
/// Models load once; the pipeline itself is cheap to clone handles of
/// and safe to share across concurrent jobs.
pub struct Pipeline {
    config: Config,
    ocr: Arc<dyn OcrEngine>,
    embedder: Arc<Embedder>,
    generator: Arc<dyn Generator>,
}

impl Pipeline {
    pub fn new(
        config: Config,
        ocr: Arc<dyn OcrEngine>,
        embedder: Arc<Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            config,
            ocr,
            embedder,
            generator,
        }
    }

    /// Rank the resumes in `archive_bytes` against `job_description`
    /// and return the best `top_k`, best first.
    pub async fn rank(
        &self,
        job_description: &str,
        archive_bytes: &[u8],
        top_k: usize,
    ) -> Result<Vec<RankedCandidate>> {
        self.rank_with_cancel(job_description, archive_bytes, top_k, CancellationToken::new())
            .await
    }

    /// Like [`rank`](Self::rank), but abortable through `cancel`.
    ///
    /// Dropping the in-flight future at the timeout or cancellation
    /// point drops the job workspace with it, so no per-job files
    /// outlive the job.
    pub async fn rank_with_cancel(
        &self,
        job_description: &str,
        archive_bytes: &[u8],
        top_k: usize,
        cancel: CancellationToken,
    ) -> Result<Vec<RankedCandidate>> {
        let job = Job::new(top_k);
        tracing::info!(
            job_id = %job.id,
            created_at = %job.created_at,
            archive_bytes = archive_bytes.len(),
            top_k,
            "Ranking job started"
        );

        let started = std::time::Instant::now();
        let result = tokio::select! {
            // Check cancellation first so an already-cancelled token
            // never starts the job.
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!(job_id = %job.id, "Ranking job cancelled");
                Err(RankError::Cancelled)
            }
            outcome = tokio::time::timeout(
                self.config.job_timeout,
                self.run_job(&job, job_description, archive_bytes),
            ) => match outcome {
                Ok(result) => result,
                Err(_) => {
                    let secs = self.config.job_timeout.as_secs();
                    tracing::warn!(job_id = %job.id, timeout_secs = secs, "Ranking job timed out");
                    Err(RankError::Timeout(secs))
                }
            }
        };

        match &result {
            Ok(candidates) => tracing::info!(
                job_id = %job.id,
                candidates = candidates.len(),
                elapsed_ms = started.elapsed().as_millis(),
                "Ranking job complete"
            ),
            Err(e) => tracing::warn!(
                job_id = %job.id,
                error = %e,
                elapsed_ms = started.elapsed().as_millis(),
                "Ranking job failed"
            ),
        }
        result
    }

    async fn run_job(
        &self,
        job: &Job,
        job_description: &str,
        archive_bytes: &[u8],
    ) -> Result<Vec<RankedCandidate>> {
        self.config.ensure_dirs()?;

        // Workspace removal rides on Drop; keep the guard alive until
        // ranking finishes.
        let workspace = ingest::ingest(&self.config, &job.id, archive_bytes)?;

        let documents = extract::extract_all(&*self.ocr, &self.config, workspace.extracted_dir()).await;
        if documents.is_empty() {
            return Err(RankError::NoReadableContent);
        }
        tracing::info!(job_id = %job.id, documents = documents.len(), "Extraction complete");

        let full_docs: HashMap<String, String> = documents
            .iter()
            .map(|d| (d.filename.clone(), d.text.clone()))
            .collect();

        let index = ChunkIndex::build(&self.embedder, &documents, &self.config).await?;
        if index.is_empty() {
            return Err(RankError::NoReadableContent);
        }

        // Over-retrieve so every plausible candidate contributes chunks,
        // then let the ranker decide the final cut.
        let k = job.top_k.saturating_mul(self.config.retrieval_multiplier);
        let retrieved = index.search(&self.embedder, job_description, k).await?;
        tracing::info!(job_id = %job.id, retrieved = retrieved.len(), "Retrieval complete");

        let mut ranked = rank::rank(
            &*self.generator,
            &self.config,
            job_description,
            &retrieved,
            &full_docs,
        )
        .await?;

        ranked.truncate(job.top_k);
        Ok(ranked)
    }
}
