//! Document text extraction.
//!
//! Walks the extracted archive tree and OCRs every supported document.
//! PDFs are rasterized page by page; images are fed through directly.
//! Per-file failures are logged and skipped so one corrupt upload never
//! sinks the job. Extracted text must pass a quality gate before it is
//! kept.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{imageops::FilterType, DynamicImage};
use walkdir::WalkDir;

use crate::config::Config;
use crate::ocr::OcrEngine;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff"];

/// Text recovered from one document in the job workspace.
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    /// Base filename, used as the candidate key downstream
    pub filename: String,
    /// Raw OCR output (cleaning happens at indexing time)
    pub text: String,
    /// Full path inside the job workspace
    pub path: PathBuf,
}

/// OCR every supported document under `dir`.
///
/// Hidden files and unsupported extensions are ignored. Documents whose
/// text fails the quality gate are dropped with a warning. Returns
/// whatever survived; an empty result means nothing was readable.
pub async fn extract_all(
    ocr: &dyn OcrEngine,
    config: &Config,
    dir: &Path,
) -> Vec<ExtractedDocument> {
    let mut documents = Vec::new();

    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let filename = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };
        if filename.starts_with('.') {
            continue;
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        let extracted = if ext == "pdf" {
            ocr_pdf(ocr, config, path).await
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            ocr_image_file(ocr, config, path).await
        } else {
            tracing::debug!(file = %filename, "Skipping unsupported file type");
            continue;
        };

        let text = match extracted {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(file = %filename, error = %e, "Skipping unreadable document");
                continue;
            }
        };

        if !passes_quality_gate(&text, config) {
            tracing::warn!(
                file = %filename,
                chars = text.trim().chars().count(),
                "Dropping document that failed the text quality gate"
            );
            continue;
        }

        tracing::info!(file = %filename, chars = text.len(), "Document extracted");
        documents.push(ExtractedDocument {
            filename,
            text,
            path: path.to_path_buf(),
        });
    }

    documents
}

/// Rasterize a PDF at the configured DPI and OCR each page.
///
/// Any page failure abandons the whole file; partial documents would
/// rank on incomplete evidence.
async fn ocr_pdf(ocr: &dyn OcrEngine, config: &Config, path: &Path) -> Result<String> {
    let pages = rasterize_pdf(path, config.ocr_dpi)
        .with_context(|| format!("Failed to rasterize {}", path.display()))?;

    tracing::debug!(file = %path.display(), pages = pages.len(), "PDF rasterized");

    let mut page_texts = Vec::with_capacity(pages.len());
    for (i, page) in pages.iter().enumerate() {
        let prepared = preprocess(page, config.ocr_upscale);
        let text = ocr
            .extract_text(&prepared)
            .await
            .with_context(|| format!("OCR failed on page {}", i + 1))?;
        page_texts.push(text);
    }

    Ok(page_texts.join("\n"))
}

async fn ocr_image_file(ocr: &dyn OcrEngine, config: &Config, path: &Path) -> Result<String> {
    let img = image::open(path).with_context(|| format!("Failed to decode {}", path.display()))?;
    let prepared = preprocess(&img, config.ocr_upscale);
    ocr.extract_text(&prepared).await
}

/// Render every page of a PDF to an RGB image.
fn rasterize_pdf(path: &Path, dpi: f32) -> Result<Vec<DynamicImage>> {
    let doc = mupdf::Document::open(
        path.to_str()
            .context("PDF path is not valid UTF-8")?,
    )
    .context("Failed to open PDF")?;

    let zoom = dpi / 72.0;
    let matrix = mupdf::Matrix::new_scale(zoom, zoom);

    let mut images = Vec::new();
    for (i, page) in doc.pages().context("Failed to read PDF pages")?.enumerate() {
        let page = page.with_context(|| format!("Failed to load page {}", i + 1))?;
        let pixmap = page
            .to_pixmap(&matrix, &mupdf::Colorspace::device_rgb(), false, true)
            .with_context(|| format!("Failed to render page {}", i + 1))?;

        let (w, h) = (pixmap.width() as u32, pixmap.height() as u32);
        let rgb = image::RgbImage::from_raw(w, h, pixmap.samples().to_vec())
            .context("Pixmap buffer did not match its declared dimensions")?;
        images.push(DynamicImage::ImageRgb8(rgb));
    }

    Ok(images)
}

/// Upscale then grayscale an image ahead of OCR.
///
/// Small scans resolve noticeably better after a cubic 2x upscale, and
/// the vision model does not need color for text.
fn preprocess(img: &DynamicImage, upscale: f32) -> DynamicImage {
    let w = (img.width() as f32 * upscale).round().max(1.0) as u32;
    let h = (img.height() as f32 * upscale).round().max(1.0) as u32;
    let scaled = img.resize_exact(w, h, FilterType::CatmullRom);
    DynamicImage::ImageLuma8(scaled.to_luma8())
}

/// Reject OCR output that is too short or mostly non-alphanumeric.
///
/// Blank pages and OCR garbage both fail here; either would poison the
/// retrieval index with meaningless chunks.
fn passes_quality_gate(text: &str, config: &Config) -> bool {
    let trimmed = text.trim();
    let total = trimmed.chars().count();
    if total < config.min_text_chars {
        return false;
    }

    let alnum = trimmed.chars().filter(|c| c.is_alphanumeric()).count();
    (alnum as f32 / total as f32) >= config.min_alnum_ratio
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::FixtureOcr;
    use image::{ImageBuffer, Luma};

    fn test_config() -> Config {
        Config::load_or_default()
    }

    fn write_gray_png(dir: &Path, name: &str, luminance: u8) {
        let img: ImageBuffer<Luma<u8>, Vec<u8>> =
            ImageBuffer::from_pixel(8, 8, Luma([luminance]));
        img.save(dir.join(name)).unwrap();
    }

    const GOOD_TEXT: &str =
        "Senior backend engineer with eight years of Rust and Postgres experience.";

    #[test]
    fn test_quality_gate_rejects_short_text() {
        let config = test_config();
        assert!(!passes_quality_gate("too short", &config));
        assert!(passes_quality_gate(GOOD_TEXT, &config));
    }

    #[test]
    fn test_quality_gate_rejects_garbage() {
        let config = test_config();
        let garbage = "~~~ ### |||| .... ---- %%%% ((( ))) ### ~~~ |||| .... ----";
        assert!(!passes_quality_gate(garbage, &config));
    }

    #[test]
    fn test_quality_gate_counts_trimmed_chars() {
        let config = test_config();
        let padded = format!("{}{}{}", " ".repeat(100), "short text", " ".repeat(100));
        assert!(!passes_quality_gate(&padded, &config));
    }

    #[test]
    fn test_preprocess_scales_and_grayscales() {
        let img = DynamicImage::ImageLuma8(ImageBuffer::from_pixel(10, 6, Luma([42u8])));
        let out = preprocess(&img, 2.0);

        assert_eq!(out.width(), 20);
        assert_eq!(out.height(), 12);
        // Uniform gray input stays uniform through the resize.
        assert_eq!(out.to_luma8().get_pixel(0, 0)[0], 42);
    }

    #[tokio::test]
    async fn test_extract_all_walks_and_gates() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config();

        write_gray_png(dir.path(), "alice.png", 10);
        write_gray_png(dir.path(), "garbage.png", 20);
        write_gray_png(dir.path(), ".hidden.png", 10);
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        write_gray_png(&dir.path().join("sub"), "bob.png", 30);
        std::fs::write(dir.path().join("notes.txt"), "not a document").unwrap();
        std::fs::write(dir.path().join("corrupt.png"), b"not a real png").unwrap();

        let ocr = FixtureOcr::new("???")
            .respond_for(10, GOOD_TEXT)
            .respond_for(30, GOOD_TEXT)
            .respond_for(20, "###");

        let docs = extract_all(&ocr, &config, dir.path()).await;

        let mut names: Vec<&str> = docs.iter().map(|d| d.filename.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["alice.png", "bob.png"]);
        assert!(docs.iter().all(|d| d.text == GOOD_TEXT));
    }

    #[tokio::test]
    async fn test_extract_all_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config();
        let ocr = FixtureOcr::new("");

        let docs = extract_all(&ocr, &config, dir.path()).await;
        assert!(docs.is_empty());
    }
}
