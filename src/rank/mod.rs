//! Two-stage candidate ranking.
//!
//! Stage 1 runs one structured-extraction call per candidate over the
//! retrieved evidence, with bounded concurrency. Stage 2 sends the
//! whole roster back in a single comparative call and rescores it.
//! Model failures degrade rather than abort: an unparseable extraction
//! leaves a placeholder profile, and an unusable tournament response
//! keeps the Stage-1 scores.

mod prompts;
mod repair;

pub use repair::parse_lenient;

use std::collections::HashMap;

use anyhow::Result;
use futures::{stream, StreamExt};
use serde::Serialize;
use serde_json::Value;

use crate::config::Config;
use crate::index::RetrievedChunk;
use crate::llm::Generator;

/// Per-candidate profile produced by Stage 1 and rescored by Stage 2.
///
/// Candidates are keyed by base filename, so two files with the same
/// name in different archive subdirectories merge into one profile.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateProfile {
    pub filename: String,
    pub skills: Vec<String>,
    pub experience: Vec<String>,
    pub score: f64,
    pub reasoning: String,
}

/// One entry of the final shortlist.
#[derive(Debug, Clone, Serialize)]
pub struct RankedCandidate {
    pub rank: usize,
    pub filename: String,
    pub score: f64,
    pub reasoning: String,
    pub skills: Vec<String>,
    pub experience: Vec<String>,
}

/// Rank every candidate present in the retrieved chunks.
///
/// `full_docs` maps filename to full document text and feeds the header
/// portion of each Stage-1 context. Returns candidates best first;
/// equal scores order by filename so results are stable across runs.
pub async fn rank(
    generator: &dyn Generator,
    config: &Config,
    job_description: &str,
    retrieved: &[RetrievedChunk],
    full_docs: &HashMap<String, String>,
) -> Result<Vec<RankedCandidate>> {
    // Group retrieved chunks by candidate, preserving first-seen order
    // (which is relevance order, since retrieval returns best first).
    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Vec<&str>> = HashMap::new();
    for item in retrieved {
        let filename = &item.chunk.filename;
        grouped
            .entry(filename.clone())
            .or_insert_with(|| {
                order.push(filename.clone());
                Vec::new()
            })
            .push(item.chunk.content.as_str());
    }

    tracing::info!(candidates = order.len(), "Stage 1: extracting candidate profiles");

    let extractions = order.iter().map(|filename| {
        let context = build_context(config, filename, &grouped[filename], full_docs);
        async move {
            let messages = prompts::extraction_messages(job_description, &context);
            let payload = match generator
                .generate(&messages, config.stage1_max_tokens)
                .await
            {
                Ok(text) => parse_lenient(&text),
                Err(e) => {
                    tracing::warn!(candidate = %filename, error = %e, "Extraction call failed");
                    Value::Object(Default::default())
                }
            };
            profile_from_payload(filename, &payload)
        }
    });

    let mut profiles: Vec<CandidateProfile> = stream::iter(extractions)
        .buffered(config.stage1_concurrency)
        .collect()
        .await;

    if profiles.len() > 1 {
        tracing::info!("Stage 2: comparative judging");
        run_tournament(generator, config, job_description, &mut profiles).await;
    }

    profiles.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.filename.cmp(&b.filename))
    });

    Ok(profiles
        .into_iter()
        .enumerate()
        .map(|(i, p)| RankedCandidate {
            rank: i + 1,
            filename: p.filename,
            score: p.score,
            reasoning: p.reasoning,
            skills: p.skills,
            experience: p.experience,
        })
        .collect())
}

/// Assemble the Stage-1 context for one candidate: the head of the full
/// document (name, title, contact block) plus the best retrieved
/// chunks as experience evidence.
fn build_context(
    config: &Config,
    filename: &str,
    chunks: &[&str],
    full_docs: &HashMap<String, String>,
) -> String {
    let header: String = full_docs
        .get(filename)
        .map(|text| text.chars().take(config.header_context_chars).collect())
        .unwrap_or_default();

    let experience = chunks
        .iter()
        .take(3)
        .copied()
        .collect::<Vec<_>>()
        .join("\n... ");

    format!("--- HEADER ---\n{header}\n\n--- EXPERIENCE ---\n{experience}")
}

/// Build a profile from a Stage-1 payload. Missing or malformed fields
/// fall back to empty lists and a placeholder reason; the score stays
/// zero until Stage 2 assigns one.
fn profile_from_payload(filename: &str, payload: &Value) -> CandidateProfile {
    CandidateProfile {
        filename: filename.to_string(),
        skills: string_list(&payload["skills"]),
        experience: string_list(&payload["experience"]),
        score: 0.0,
        reasoning: payload["reasoning"]
            .as_str()
            .unwrap_or("Analysis failed")
            .to_string(),
    }
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Stage 2: ask the model to rescore the whole roster comparatively and
/// apply the result in place.
///
/// Accepts either the documented `{"rankings": [...]}` shape or a bare
/// list. Any other shape leaves all profiles untouched. Candidates the
/// response does not mention keep their Stage-1 score.
async fn run_tournament(
    generator: &dyn Generator,
    config: &Config,
    job_description: &str,
    profiles: &mut [CandidateProfile],
) {
    let messages = prompts::tournament_messages(job_description, profiles);
    let text = match generator.generate(&messages, config.stage2_max_tokens).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "Tournament call failed, keeping extraction scores");
            return;
        }
    };

    let payload = parse_lenient(&text);
    let rankings = match payload {
        Value::Array(items) => items,
        Value::Object(ref map) => match map.get("rankings").and_then(|r| r.as_array()) {
            Some(items) => items.clone(),
            None => {
                tracing::warn!("Tournament returned unknown schema, keeping extraction scores");
                return;
            }
        },
        _ => {
            tracing::warn!("Tournament returned unknown schema, keeping extraction scores");
            return;
        }
    };

    let by_filename: HashMap<&str, &Value> = rankings
        .iter()
        .filter_map(|r| r["filename"].as_str().map(|f| (f, r)))
        .collect();

    for profile in profiles.iter_mut() {
        if let Some(entry) = by_filename.get(profile.filename.as_str()) {
            profile.score = entry["final_score"].as_f64().unwrap_or(0.0) / 100.0;
            if let Some(reason) = entry["reason"].as_str() {
                profile.reasoning = reason.to_string();
            }
        } else {
            tracing::warn!(candidate = %profile.filename, "Tournament response omitted candidate");
        }
    }
}
