//! Field detection
//!
//! Locates fillable regions in a PDF that has no form layer:
//!
//! ```text
//!   bytes ─► page sizes ─► per page (bounded, ordered):
//!                            render @2x ─► boxes ─┐
//!                                    └─► OCR ─────┴► match ─► fields
//! ```
//!
//! Pages run independently; results are concatenated in page order. A page
//! that fails to render is skipped and reported, an OCR failure leaves the
//! page's fields unlabeled, and cancellation abandons unfinished pages while
//! keeping what is already done.

mod boxes;
mod matcher;
mod types;

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time::timeout;

use crate::cancel::CancellationToken;
use crate::config::{DetectionConfig, EngineConfig};
use crate::document::{DocumentError, MupdfRasterizer, PageRasterizer};
use crate::geometry::{PageSize, PixelRect};
use crate::ocr::OcrService;

pub use boxes::{detect_boxes, find_rectangles, EdgeMap};
pub use matcher::{assign_unique_names, classify_field, match_fields};
pub use types::{
    DetectedField, DetectionError, DetectionResult, FieldType, PageError, RecognizedText,
    Rectangle,
};

/// Timeout for rendering and box detection of one page
const RENDER_TIMEOUT_SECS: u64 = 30;
/// Timeout for reading the page list
const OPEN_TIMEOUT_SECS: u64 = 30;
/// Timeout for downloading a remote document
const FETCH_TIMEOUT_SECS: u64 = 60;

enum PageOutcome {
    Done {
        rectangles: Vec<Rectangle>,
        texts: Vec<RecognizedText>,
        fields: Vec<DetectedField>,
        warning: Option<String>,
    },
    Failed(String),
    Cancelled,
}

/// Detects form fields in PDF documents
pub struct FieldDetector {
    config: DetectionConfig,
    rasterizer: Arc<dyn PageRasterizer>,
    ocr: Arc<OcrService>,
}

impl FieldDetector {
    /// MuPDF rendering and tesseract OCR configured from `config`
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            config: config.detection.clone(),
            rasterizer: Arc::new(MupdfRasterizer::new()),
            ocr: Arc::new(OcrService::new(config.ocr.clone())),
        }
    }

    pub fn with_backends(
        config: DetectionConfig,
        rasterizer: Arc<dyn PageRasterizer>,
        ocr: Arc<OcrService>,
    ) -> Self {
        Self {
            config,
            rasterizer,
            ocr,
        }
    }

    /// Detect fields on every page
    pub async fn detect_fields(&self, data: &[u8]) -> Result<DetectionResult, DetectionError> {
        self.detect_fields_with_cancel(data, &CancellationToken::new()).await
    }

    /// Download a document and detect its fields
    pub async fn detect_fields_from_url(&self, url: &str) -> Result<DetectionResult, DetectionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()?;
        let response = client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        tracing::info!("Fetched {} bytes from {}", bytes.len(), url);
        self.detect_fields(&bytes).await
    }

    /// Detect fields, abandoning unfinished pages once `cancel` fires
    pub async fn detect_fields_with_cancel(
        &self,
        data: &[u8],
        cancel: &CancellationToken,
    ) -> Result<DetectionResult, DetectionError> {
        let data: Arc<[u8]> = Arc::from(data);

        let rasterizer = Arc::clone(&self.rasterizer);
        let sizes_data = Arc::clone(&data);
        let page_sizes = timeout(
            Duration::from_secs(OPEN_TIMEOUT_SECS),
            tokio::task::spawn_blocking(move || rasterizer.page_sizes(&sizes_data)),
        )
        .await
        .map_err(|_| DetectionError::Timeout(OPEN_TIMEOUT_SECS))?
        .map_err(|e| DetectionError::Task(format!("Task join error: {}", e)))??;

        let page_count = page_sizes.len();
        let workers = self.config.workers.max(1);
        tracing::info!("Detecting fields on {} pages ({} workers)", page_count, workers);

        let outcomes: Vec<PageOutcome> = stream::iter(0..page_count)
            .map(|index| self.process_page(Arc::clone(&data), index, cancel))
            .buffered(workers)
            .collect()
            .await;

        let mut result = DetectionResult {
            fields: Vec::new(),
            rectangles: Vec::new(),
            texts: Vec::new(),
            page_count,
            page_size: page_sizes.first().copied().unwrap_or_default(),
            scale: self.config.render_scale,
            warnings: Vec::new(),
            page_errors: Vec::new(),
            cancelled_pages: Vec::new(),
        };

        for (index, outcome) in outcomes.into_iter().enumerate() {
            let page = index + 1;
            match outcome {
                PageOutcome::Done {
                    rectangles,
                    texts,
                    fields,
                    warning,
                } => {
                    result.rectangles.extend(rectangles);
                    result.texts.extend(texts);
                    result.fields.extend(fields);
                    result.warnings.extend(warning);
                }
                PageOutcome::Failed(message) => {
                    result.page_errors.push(PageError { page, message });
                }
                PageOutcome::Cancelled => result.cancelled_pages.push(page),
            }
        }

        assign_unique_names(&mut result.fields);

        tracing::info!(
            "Detection finished: {} fields, {} rectangles, {} failed pages, {} cancelled pages",
            result.fields.len(),
            result.rectangles.len(),
            result.page_errors.len(),
            result.cancelled_pages.len()
        );

        Ok(result)
    }

    async fn process_page(&self, data: Arc<[u8]>, index: usize, cancel: &CancellationToken) -> PageOutcome {
        let page = index + 1;
        if cancel.is_cancelled() {
            return PageOutcome::Cancelled;
        }

        let rasterizer = Arc::clone(&self.rasterizer);
        let config = self.config.clone();
        let render = timeout(
            Duration::from_secs(RENDER_TIMEOUT_SECS),
            tokio::task::spawn_blocking(move || {
                let raster = rasterizer.render_page(&data, index, config.render_scale)?;
                let boxes = detect_boxes(&raster.image, &config);
                Ok::<_, DocumentError>((raster, boxes))
            }),
        )
        .await;

        let (raster, boxes): (_, Vec<PixelRect>) = match render {
            Ok(Ok(Ok(rendered))) => rendered,
            Ok(Ok(Err(e))) => {
                tracing::warn!("Skipping page {}: {}", page, e);
                return PageOutcome::Failed(e.to_string());
            }
            Ok(Err(e)) => {
                tracing::warn!("Skipping page {}: task join error: {}", page, e);
                return PageOutcome::Failed(format!("Task join error: {}", e));
            }
            Err(_) => {
                tracing::warn!("Skipping page {}: render timed out", page);
                return PageOutcome::Failed(DocumentError::Timeout(RENDER_TIMEOUT_SECS).to_string());
            }
        };

        let rectangles: Vec<Rectangle> = boxes
            .into_iter()
            .map(|bounds| Rectangle::from_bounds(page, bounds))
            .collect();
        tracing::debug!("Page {}: {} rectangles", page, rectangles.len());

        // Dropping the OCR future kills the recognizer process
        let recognized = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Page {} cancelled during OCR", page);
                return PageOutcome::Cancelled;
            }
            recognized = self.ocr.recognize_page(&raster) => recognized,
        };

        let (texts, warning) = match recognized {
            Ok(texts) => (texts, None),
            Err(e) => {
                tracing::warn!("OCR failed on page {}: {}", page, e);
                (Vec::new(), Some(format!("Page {}: text recognition failed: {}", page, e)))
            }
        };

        let fields = match_fields(&rectangles, &texts, &raster.transform(), &self.config);

        PageOutcome::Done {
            rectangles,
            texts,
            fields,
            warning,
        }
    }
}

impl Default for DetectionResult {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            rectangles: Vec::new(),
            texts: Vec::new(),
            page_count: 0,
            page_size: PageSize::default(),
            scale: crate::document::DEFAULT_RENDER_SCALE,
            warnings: Vec::new(),
            page_errors: Vec::new(),
            cancelled_pages: Vec::new(),
        }
    }
}
