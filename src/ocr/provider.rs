//! OCR Providers
//!
//! Defines the recognizer trait and the tesseract command-line backend.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::geometry::PixelRect;

use super::types::{OcrError, OcrProvider, OcrResult, OcrWord};

/// Text recognizer backend
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Get the provider type
    fn provider_type(&self) -> OcrProvider;

    /// Check if the provider is available
    async fn is_available(&self) -> bool;

    /// Recognize words in a PNG-encoded image
    async fn recognize(&self, image_data: &[u8], language: Option<&str>) -> Result<OcrResult, OcrError>;
}

/// Tesseract OCR provider
///
/// Runs the `tesseract` executable with TSV output to get word boxes.
/// The child process is killed if the recognition future is dropped,
/// which is how cancellation reaches an in-flight page.
pub struct TesseractProvider {
    executable: String,
    default_language: String,
    page_segmentation_mode: u8,
}

impl TesseractProvider {
    pub fn new(executable: &str, default_language: &str, page_segmentation_mode: u8) -> Self {
        Self {
            executable: executable.to_string(),
            default_language: default_language.to_string(),
            page_segmentation_mode,
        }
    }
}

#[async_trait]
impl TextRecognizer for TesseractProvider {
    fn provider_type(&self) -> OcrProvider {
        OcrProvider::Tesseract
    }

    async fn is_available(&self) -> bool {
        Command::new(&self.executable)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    async fn recognize(&self, image_data: &[u8], language: Option<&str>) -> Result<OcrResult, OcrError> {
        let lang = language.unwrap_or(&self.default_language);

        let input_path =
            std::env::temp_dir().join(format!("ocr_input_{}.png", uuid::Uuid::new_v4()));
        tokio::fs::write(&input_path, image_data)
            .await
            .map_err(|e| OcrError::ProcessingError(format!("Failed to write temp file: {}", e)))?;

        let output = Command::new(&self.executable)
            .arg(&input_path)
            .arg("stdout")
            .arg("-l")
            .arg(lang)
            .arg("--oem")
            .arg("3")
            .arg("--psm")
            .arg(self.page_segmentation_mode.to_string())
            .arg("tsv")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        let _ = tokio::fs::remove_file(&input_path).await;

        let output =
            output.map_err(|e| OcrError::ProcessingError(format!("Failed to run tesseract: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::ProcessingError(format!(
                "Tesseract failed: {}",
                stderr.trim()
            )));
        }

        let tsv = String::from_utf8_lossy(&output.stdout);
        Ok(OcrResult::from_words(OcrProvider::Tesseract, parse_tsv(&tsv)))
    }
}

/// Parse tesseract TSV output into word entries
///
/// Columns: level page block par line word left top width height conf text.
/// Only level-5 rows (words) with text and a non-negative confidence are kept.
pub fn parse_tsv(tsv: &str) -> Vec<OcrWord> {
    let mut words = Vec::new();

    for line in tsv.lines() {
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }

        let text = cols[11..].join("\t").trim().to_string();
        if text.is_empty() {
            continue;
        }

        let parse_u32 = |s: &str| s.trim().parse::<u32>().ok();
        let (Some(left), Some(top), Some(width), Some(height)) = (
            parse_u32(cols[6]),
            parse_u32(cols[7]),
            parse_u32(cols[8]),
            parse_u32(cols[9]),
        ) else {
            continue;
        };

        let confidence = match cols[10].trim().parse::<f32>() {
            Ok(c) if c >= 0.0 => (c / 100.0).clamp(0.0, 1.0),
            _ => continue,
        };

        words.push(OcrWord {
            text,
            confidence,
            bounds: PixelRect::new(left, top, width, height),
        });
    }

    words
}

/// Mock provider for testing
#[cfg(test)]
pub struct MockProvider {
    pub response: OcrResult,
    pub available: bool,
    pub fail: bool,
    pub delay: Option<std::time::Duration>,
}

#[cfg(test)]
impl MockProvider {
    pub fn with_words(words: Vec<OcrWord>) -> Self {
        Self {
            response: OcrResult::from_words(OcrProvider::Custom, words),
            available: true,
            fail: false,
            delay: None,
        }
    }
}

#[cfg(test)]
#[async_trait]
impl TextRecognizer for MockProvider {
    fn provider_type(&self) -> OcrProvider {
        self.response.provider
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn recognize(&self, _image_data: &[u8], _language: Option<&str>) -> Result<OcrResult, OcrError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(OcrError::ProcessingError("mock failure".to_string()));
        }
        Ok(self.response.clone())
    }
}
