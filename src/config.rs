//! Engine configuration
//!
//! Defaults carry the detection constants the heuristics were tuned with.
//! `EngineConfig::from_env` overrides selected values from `FORM_ENGINE_*`
//! environment variables (a `.env` file is honored).

use std::env;
use std::path::PathBuf;

use serde::Deserialize;

use crate::filler::FillOptions;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub detection: DetectionConfig,
    pub ocr: OcrConfig,
    pub templates: TemplateConfig,
    /// Options used by the template service when drawing values
    pub fill: FillOptions,
}

/// Box detection and label matching parameters
///
/// Pixel values are in raster space (page rendered at `render_scale`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Up-scale factor applied when rasterizing pages
    pub render_scale: f32,
    /// Gradient magnitude (0-255) above which a pixel is an edge
    pub edge_threshold: f32,
    /// Stride of the corner scan grid
    pub grid_stride: u32,
    pub min_width: u32,
    pub min_height: u32,
    /// Fraction of a run that must be edge pixels to count as a line
    pub line_coverage: f32,
    /// Growth step when extending a rectangle
    pub grow_step: u32,
    /// Maximum rectangle width as a fraction of the page width
    pub max_width_ratio: f32,
    pub max_height: u32,
    /// Maximum label distance from its box
    pub label_max_distance: f32,
    /// Vertical tolerance for labels left of a box
    pub label_left_tolerance: f32,
    /// Labels at or below this OCR confidence are ignored
    pub min_label_confidence: f32,
    /// Confidence of fields without a label
    pub unlabeled_confidence: f32,
    /// Words that mark a signature field (matched without diacritics)
    pub signature_keywords: Vec<String>,
    /// Pages processed concurrently
    pub workers: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            render_scale: 2.0,
            edge_threshold: 50.0,
            grid_stride: 10,
            min_width: 50,
            min_height: 15,
            line_coverage: 0.3,
            grow_step: 10,
            max_width_ratio: 0.8,
            max_height: 100,
            label_max_distance: 100.0,
            label_left_tolerance: 30.0,
            min_label_confidence: 0.5,
            unlabeled_confidence: 0.5,
            signature_keywords: vec!["podpis".to_string(), "signature".to_string()],
            workers: default_workers(),
        }
    }
}

/// OCR backend settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Tesseract language code
    pub language: String,
    /// Path to the tesseract executable
    pub tesseract_path: String,
    /// Tesseract page segmentation mode (11 = sparse text, suits forms)
    pub page_segmentation_mode: u8,
    /// Timeout for a single page
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: "pol".to_string(),
            tesseract_path: "tesseract".to_string(),
            page_segmentation_mode: 11,
            timeout_secs: 60,
        }
    }
}

/// Template store layout
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Root directory holding `{formType}/{version}/{formType}_{version}.pdf`
    pub root: PathBuf,
    /// Concurrent fills in `fill_batch`
    pub batch_workers: usize,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./templates"),
            batch_workers: 4,
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        .clamp(1, 8)
}

impl EngineConfig {
    /// Build configuration from the environment, falling back to defaults
    /// for every variable that is unset or unparsable.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = EngineConfig::default();

        if let Ok(root) = env::var("FORM_ENGINE_TEMPLATE_ROOT") {
            config.templates.root = PathBuf::from(root);
        }
        if let Some(workers) = parse_var::<usize>("FORM_ENGINE_BATCH_WORKERS") {
            config.templates.batch_workers = workers.max(1);
        }
        if let Some(workers) = parse_var::<usize>("FORM_ENGINE_DETECTION_WORKERS") {
            config.detection.workers = workers.max(1);
        }
        if let Ok(language) = env::var("FORM_ENGINE_OCR_LANGUAGE") {
            config.ocr.language = language;
        }
        if let Ok(path) = env::var("FORM_ENGINE_TESSERACT_PATH") {
            config.ocr.tesseract_path = path;
        }
        if let Some(secs) = parse_var::<u64>("FORM_ENGINE_OCR_TIMEOUT_SECS") {
            config.ocr.timeout_secs = secs;
        }

        config
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring unparsable {}={:?}", name, raw);
            None
        }
    }
}
