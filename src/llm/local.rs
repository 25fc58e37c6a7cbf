//! Local GGUF generation backend.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use mistralrs::{
    GgufModelBuilder, Model, RequestBuilder, SamplingParams, TextMessageRole,
};

use super::{ChatMessage, Generator, Role};
use crate::config::GenerationModelInfo;

/// Generation via a local GGUF model loaded with mistralrs.
pub struct LocalGenerator {
    model: Arc<Model>,
}

impl LocalGenerator {
    /// Load the GGUF model described by `info`.
    pub async fn load(info: &GenerationModelInfo) -> Result<Self> {
        tracing::info!(
            dir = %info.model_dir.display(),
            file = %info.gguf_file,
            "Loading generation model"
        );

        let model = GgufModelBuilder::new(
            info.model_dir.to_string_lossy().to_string(),
            vec![info.gguf_file.clone()],
        )
        .with_tok_model_id(&info.tokenizer_repo_id)
        .with_logging()
        .build()
        .await
        .context("Failed to load generation model")?;

        tracing::info!("Generation model loaded");

        Ok(Self {
            model: Arc::new(model),
        })
    }
}

#[async_trait]
impl Generator for LocalGenerator {
    async fn generate(&self, messages: &[ChatMessage], max_tokens: usize) -> Result<String> {
        let mut request = RequestBuilder::new().enable_thinking(false);
        for message in messages {
            let role = match message.role {
                Role::System => TextMessageRole::System,
                Role::User => TextMessageRole::User,
            };
            request = request.add_message(role, message.content.clone());
        }

        // Greedy decoding; ranking must be reproducible for a given
        // candidate set.
        let mut sampling = SamplingParams::deterministic();
        sampling.max_len = Some(max_tokens);
        request = request.set_sampling(sampling);

        let start = std::time::Instant::now();
        let response = self
            .model
            .send_chat_request(request)
            .await
            .context("Generation request failed")?;

        let text = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        tracing::debug!(
            chars = text.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Generation complete"
        );

        Ok(text)
    }
}
