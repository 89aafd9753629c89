//! OCR Service
//!
//! Orchestrates OCR providers and turns rendered pages into page-level
//! recognized text.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use image::{ImageFormat, RgbaImage};

use crate::config::OcrConfig;
use crate::detection::RecognizedText;
use crate::document::RasterPage;

use super::{
    provider::{TesseractProvider, TextRecognizer},
    types::{OcrError, OcrProvider, OcrResult},
};

/// OCR service for rendered form pages
pub struct OcrService {
    config: OcrConfig,
    providers: Vec<Arc<dyn TextRecognizer>>,
}

impl OcrService {
    /// Create a service backed by the tesseract executable from `config`
    pub fn new(config: OcrConfig) -> Self {
        let tesseract = TesseractProvider::new(
            &config.tesseract_path,
            &config.language,
            config.page_segmentation_mode,
        );
        let providers: Vec<Arc<dyn TextRecognizer>> = vec![Arc::new(tesseract)];
        Self { config, providers }
    }

    /// Create a service with an explicit provider list, tried in order
    pub fn with_providers(config: OcrConfig, providers: Vec<Arc<dyn TextRecognizer>>) -> Self {
        Self { config, providers }
    }

    /// Get available providers
    pub async fn available_providers(&self) -> Vec<OcrProvider> {
        let mut available = Vec::new();
        for provider in &self.providers {
            if provider.is_available().await {
                available.push(provider.provider_type());
            }
        }
        available
    }

    /// Perform OCR on a PNG image
    pub async fn recognize(
        &self,
        image_data: &[u8],
        preferred_provider: Option<OcrProvider>,
        language: Option<&str>,
    ) -> Result<OcrResult, OcrError> {
        let lang = language.unwrap_or(&self.config.language);

        // If a specific provider is requested, only that one is tried
        if let Some(preferred) = preferred_provider {
            for provider in &self.providers {
                if provider.provider_type() == preferred {
                    if provider.is_available().await {
                        return provider.recognize(image_data, Some(lang)).await;
                    } else {
                        return Err(OcrError::ProviderNotAvailable(format!(
                            "{:?} provider is not available",
                            preferred
                        )));
                    }
                }
            }
            return Err(OcrError::ProviderNotAvailable(format!(
                "{:?} provider is not configured",
                preferred
            )));
        }

        // Try providers in order
        for provider in &self.providers {
            if provider.is_available().await {
                match provider.recognize(image_data, Some(lang)).await {
                    Ok(result) => return Ok(result),
                    Err(e) => {
                        tracing::warn!(
                            "OCR provider {:?} failed: {}, trying next",
                            provider.provider_type(),
                            e
                        );
                        continue;
                    }
                }
            }
        }

        Err(OcrError::ProviderNotAvailable(
            "No OCR providers available".to_string(),
        ))
    }

    /// Recognize the words of a rendered page
    ///
    /// Word boxes come back in the page's raster space.
    pub async fn recognize_page(&self, page: &RasterPage) -> Result<Vec<RecognizedText>, OcrError> {
        let image = page.image.clone();
        let png = tokio::task::spawn_blocking(move || encode_png(&image))
            .await
            .map_err(|e| OcrError::ImageExtractionError(format!("Task join error: {}", e)))??;

        let timeout_secs = self.config.timeout_secs;
        let result = tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            self.recognize(&png, None, None),
        )
        .await
        .map_err(|_| OcrError::Timeout(timeout_secs))??;

        tracing::debug!(
            "OCR page {}: {} words via {:?}",
            page.page,
            result.words.len(),
            result.provider
        );

        Ok(result
            .words
            .into_iter()
            .map(|word| RecognizedText {
                page: page.page,
                text: word.text,
                x: word.bounds.x,
                y: word.bounds.y,
                width: word.bounds.width,
                height: word.bounds.height,
                confidence: word.confidence,
            })
            .collect())
    }
}

/// Encode an RGBA buffer as PNG
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, OcrError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| OcrError::ImageExtractionError(e.to_string()))?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{PageSize, PixelRect};
    use crate::ocr::provider::MockProvider;
    use crate::ocr::types::OcrWord;

    fn word(text: &str, x: u32, y: u32) -> OcrWord {
        OcrWord {
            text: text.to_string(),
            confidence: 0.9,
            bounds: PixelRect::new(x, y, 40, 12),
        }
    }

    fn blank_page() -> RasterPage {
        RasterPage {
            page: 3,
            image: RgbaImage::from_pixel(20, 20, image::Rgba([255, 255, 255, 255])),
            page_size: PageSize::new(10.0, 10.0),
            scale: 2.0,
        }
    }

    #[tokio::test]
    async fn test_falls_back_to_next_provider() {
        let mut failing = MockProvider::with_words(vec![word("zle", 0, 0)]);
        failing.fail = true;
        let working = MockProvider::with_words(vec![word("Imie", 5, 6)]);

        let service = OcrService::with_providers(
            OcrConfig::default(),
            vec![Arc::new(failing), Arc::new(working)],
        );

        let texts = service.recognize_page(&blank_page()).await.unwrap();
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].text, "Imie");
        assert_eq!(texts[0].page, 3);
        assert_eq!((texts[0].x, texts[0].y), (5, 6));
    }

    #[tokio::test]
    async fn test_no_available_provider() {
        let mut offline = MockProvider::with_words(Vec::new());
        offline.available = false;
        let service = OcrService::with_providers(OcrConfig::default(), vec![Arc::new(offline)]);

        assert!(service.available_providers().await.is_empty());
        let err = service.recognize(b"png", None, None).await.unwrap_err();
        assert!(matches!(err, OcrError::ProviderNotAvailable(_)));
    }

    #[tokio::test]
    async fn test_preferred_provider_not_configured() {
        let service = OcrService::with_providers(
            OcrConfig::default(),
            vec![Arc::new(MockProvider::with_words(Vec::new()))],
        );
        let err = service
            .recognize(b"png", Some(OcrProvider::Tesseract), None)
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::ProviderNotAvailable(_)));
    }

    #[tokio::test]
    async fn test_page_timeout() {
        let mut slow = MockProvider::with_words(Vec::new());
        slow.delay = Some(Duration::from_secs(5));
        let config = OcrConfig {
            timeout_secs: 0,
            ..OcrConfig::default()
        };
        let service = OcrService::with_providers(config, vec![Arc::new(slow)]);

        let err = service.recognize_page(&blank_page()).await.unwrap_err();
        assert!(matches!(err, OcrError::Timeout(0)));
    }

    #[test]
    fn test_encode_png_signature() {
        let png = encode_png(&RgbaImage::new(4, 4)).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
