//! Vision-model OCR backend.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::DynamicImage;
use mistralrs::{Model, MultimodalMessages, MultimodalModelBuilder, TextMessageRole};

use super::OcrEngine;

const OCR_PROMPT: &str = "Transcribe all text in this document image. \
Output only the text content, preserving the reading order. \
Do not describe the image or add commentary.";

/// OCR via a local mistralrs vision model.
pub struct VisionOcr {
    model: Arc<Model>,
    model_id: String,
}

impl VisionOcr {
    /// Load a vision model from HuggingFace.
    pub async fn load(model_id: &str) -> Result<Self> {
        tracing::info!("Loading vision model: {}", model_id);

        let model = MultimodalModelBuilder::new(model_id)
            .with_logging()
            .build()
            .await
            .context("Failed to load vision model")?;

        tracing::info!("Vision model loaded: {}", model_id);

        Ok(Self {
            model: Arc::new(model),
            model_id: model_id.to_string(),
        })
    }
}

#[async_trait]
impl OcrEngine for VisionOcr {
    async fn extract_text(&self, image: &DynamicImage) -> Result<String> {
        let start = std::time::Instant::now();

        let messages = MultimodalMessages::new().add_image_message(
            TextMessageRole::User,
            OCR_PROMPT,
            vec![image.clone()],
        );

        let response = self
            .model
            .send_chat_request(messages)
            .await
            .context("Vision OCR request failed")?;

        let text = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        tracing::debug!(
            model = %self.model_id,
            chars = text.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "OCR page complete"
        );

        Ok(text)
    }
}
