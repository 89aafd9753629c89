//! OCR Types
//!
//! Word-level recognition results for rasterized pages.

use serde::{Deserialize, Serialize};

use crate::geometry::PixelRect;

/// OCR provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OcrProvider {
    /// Tesseract OCR (local command line)
    #[default]
    Tesseract,
    /// Recognizer supplied by the embedding application
    Custom,
}

/// OCR result for one image
#[derive(Debug, Clone, Serialize)]
pub struct OcrResult {
    /// Recognized text, words joined by spaces
    pub text: String,
    /// Mean word confidence (0-1)
    pub confidence: f32,
    /// Provider used
    pub provider: OcrProvider,
    /// Individual words in reading order
    pub words: Vec<OcrWord>,
}

impl OcrResult {
    /// Build a result from words, deriving text and mean confidence
    pub fn from_words(provider: OcrProvider, words: Vec<OcrWord>) -> Self {
        let text = words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let confidence = if words.is_empty() {
            0.0
        } else {
            words.iter().map(|w| w.confidence).sum::<f32>() / words.len() as f32
        };
        Self {
            text,
            confidence,
            provider,
            words,
        }
    }
}

/// Single word OCR result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrWord {
    /// Word text
    pub text: String,
    /// Confidence for this word (0-1)
    pub confidence: f32,
    /// Bounding box in the pixels of the recognized image
    pub bounds: PixelRect,
}

/// OCR error types
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("OCR provider not available: {0}")]
    ProviderNotAvailable(String),

    #[error("Failed to prepare page image: {0}")]
    ImageExtractionError(String),

    #[error("OCR processing failed: {0}")]
    ProcessingError(String),

    #[error("OCR timed out after {0} seconds")]
    Timeout(u64),
}
