//! Multi-format text extraction for submitted documents.
//!
//! The caller supplies bytes plus a declared [`Format`]; this module returns
//! plain UTF-8 text. [`Extractor::extract`] reports every failure as an
//! [`ExtractionFailure`] so callers can tell "nothing there" from "broken
//! upload". [`Extractor::extract_or_empty`] is what the scoring pipeline
//! uses: it logs the failure and degrades to empty text, leaving the
//! "is this usable" decision to the quality gate.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{Format, ImageKind};

/// Why a payload produced no text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionFailure {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("payload of {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: usize, limit: usize },
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("image decoding failed: {0}")]
    Image(String),
    #[error("no OCR engine configured")]
    OcrUnavailable,
    #[error("OCR failed: {0}")]
    Ocr(String),
    #[error("OCR timed out after {0}s")]
    OcrTimeout(u64),
}

/// Bounds applied before any parser sees a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionLimits {
    pub max_input_bytes: usize,
    pub max_pdf_pages: usize,
    pub max_image_pixels: u64,
}

impl Default for ExtractionLimits {
    fn default() -> Self {
        Self {
            max_input_bytes: 50 * 1024 * 1024,
            max_pdf_pages: 500,
            max_image_pixels: 40_000_000,
        }
    }
}

/// Optical character recognition over an encoded raster image.
///
/// Implementations must not block the calling task and must bound their
/// own runtime.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: &[u8]) -> Result<String, ExtractionFailure>;
}

/// Format dispatcher. Cheap to clone.
#[derive(Clone, Default)]
pub struct Extractor {
    limits: ExtractionLimits,
    ocr: Option<Arc<dyn OcrEngine>>,
}

impl Extractor {
    pub fn new(limits: ExtractionLimits) -> Self {
        Self { limits, ocr: None }
    }

    pub fn with_ocr(mut self, ocr: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    pub fn limits(&self) -> &ExtractionLimits {
        &self.limits
    }

    /// Extract text from `bytes` according to `format`.
    ///
    /// PDF parsing runs on tokio's blocking pool and OCR is awaited, so the
    /// calling task never stalls on a slow payload.
    pub async fn extract(&self, bytes: &[u8], format: &Format) -> Result<String, ExtractionFailure> {
        if bytes.len() > self.limits.max_input_bytes {
            return Err(ExtractionFailure::TooLarge {
                size: bytes.len(),
                limit: self.limits.max_input_bytes,
            });
        }

        match format {
            Format::PlainText => Ok(decode_utf8_dropping_invalid(bytes)),
            Format::Pdf => self.extract_pdf(bytes).await,
            Format::Image(kind) => self.extract_image(bytes, *kind).await,
            Format::Unknown(label) => Err(ExtractionFailure::UnsupportedFormat(label.clone())),
        }
    }

    /// Like [`extract`](Self::extract), but every failure becomes `""`.
    pub async fn extract_or_empty(&self, bytes: &[u8], format: &Format) -> String {
        match self.extract(bytes, format).await {
            Ok(text) => text,
            Err(e) => {
                warn!(format = %format, error = %e, "extraction degraded to empty text");
                String::new()
            }
        }
    }

    async fn extract_pdf(&self, bytes: &[u8]) -> Result<String, ExtractionFailure> {
        let max_pages = self.limits.max_pdf_pages;
        let bytes = bytes.to_vec();
        // A panic inside lopdf surfaces as a JoinError, same as a parse error.
        tokio::task::spawn_blocking(move || pdf_pages_text(&bytes, max_pages))
            .await
            .unwrap_or_else(|e| Err(ExtractionFailure::Pdf(format!("parser task failed: {}", e))))
    }

    async fn extract_image(
        &self,
        bytes: &[u8],
        kind: ImageKind,
    ) -> Result<String, ExtractionFailure> {
        let format = match kind {
            ImageKind::Png => image::ImageFormat::Png,
            ImageKind::Jpeg => image::ImageFormat::Jpeg,
        };
        let (width, height) = image::ImageReader::with_format(Cursor::new(bytes), format)
            .into_dimensions()
            .map_err(|e| ExtractionFailure::Image(e.to_string()))?;

        let pixels = u64::from(width) * u64::from(height);
        if pixels == 0 {
            return Err(ExtractionFailure::Image("zero-sized image".to_string()));
        }
        if pixels > self.limits.max_image_pixels {
            return Err(ExtractionFailure::Image(format!(
                "{}x{} exceeds pixel limit of {}",
                width, height, self.limits.max_image_pixels
            )));
        }

        let ocr = self.ocr.as_ref().ok_or(ExtractionFailure::OcrUnavailable)?;
        debug!(width, height, "running OCR");
        ocr.recognize(bytes).await
    }
}

/// Decode UTF-8, silently dropping byte sequences that are not valid.
fn decode_utf8_dropping_invalid(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}

/// Concatenate the text of the first `max_pages` pages, one space apart.
/// Pages that yield no text are skipped.
fn pdf_pages_text(bytes: &[u8], max_pages: usize) -> Result<String, ExtractionFailure> {
    let doc =
        lopdf::Document::load_mem(bytes).map_err(|e| ExtractionFailure::Pdf(e.to_string()))?;

    let pages = doc.get_pages();
    if pages.len() > max_pages {
        debug!(pages = pages.len(), max_pages, "truncating PDF page walk");
    }

    let mut parts: Vec<String> = Vec::new();
    for page_num in pages.keys().take(max_pages) {
        match doc.extract_text(&[*page_num]) {
            Ok(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    parts.push(trimmed.to_string());
                }
            }
            Err(e) => debug!(page = page_num, error = %e, "skipping unreadable PDF page"),
        }
    }

    Ok(parts.join(" "))
}
