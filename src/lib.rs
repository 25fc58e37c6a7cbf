//! Shortlist Core: a local-first resume ranking pipeline.
//!
//! Give it a job description and a zip of resume scans; it OCRs every
//! document with a local vision model, indexes the text for semantic
//! retrieval, and runs a two-stage LLM ranking (per-candidate
//! extraction, then one comparative judging pass) to produce a scored
//! and justified shortlist. Everything runs on-device; no resume ever
//! leaves the machine.

pub mod config;
pub mod embeddings;
pub mod error;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod ocr;
pub mod pipeline;
pub mod rank;

pub use config::Config;
pub use embeddings::Embedder;
pub use error::{RankError, Result};
pub use pipeline::Pipeline;
pub use rank::RankedCandidate;
