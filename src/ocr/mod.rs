//! OCR engine abstraction.
//!
//! The extraction stage only needs "image in, text out"; the trait
//! keeps the vision model swappable and lets tests run without model
//! weights.

mod vision;

pub use vision::VisionOcr;

use async_trait::async_trait;
use image::DynamicImage;

/// Reads text out of a single document image.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn extract_text(&self, image: &DynamicImage) -> anyhow::Result<String>;
}

/// Test double returning canned text keyed on the image's top-left
/// pixel luminance. Grayscale-uniform test images survive preprocessing
/// unchanged, so the key is stable through the real extraction path.
pub struct FixtureOcr {
    responses: std::collections::HashMap<u8, String>,
    fallback: String,
}

impl FixtureOcr {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            responses: std::collections::HashMap::new(),
            fallback: fallback.into(),
        }
    }

    /// Map images whose top-left pixel has luminance `key` to `text`.
    pub fn respond_for(mut self, key: u8, text: impl Into<String>) -> Self {
        self.responses.insert(key, text.into());
        self
    }
}

#[async_trait]
impl OcrEngine for FixtureOcr {
    async fn extract_text(&self, image: &DynamicImage) -> anyhow::Result<String> {
        let key = image.to_luma8().get_pixel(0, 0)[0];
        Ok(self
            .responses
            .get(&key)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}
