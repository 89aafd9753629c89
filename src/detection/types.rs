//! Detection types

use serde::{Deserialize, Serialize};

use crate::document::DocumentError;
use crate::geometry::{PageSize, PixelRect};

/// Box found on a rendered page (raster pixels, top-left origin)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rectangle {
    /// Page number (1-indexed)
    pub page: usize,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rectangle {
    pub fn from_bounds(page: usize, bounds: PixelRect) -> Self {
        Self {
            page,
            x: bounds.x,
            y: bounds.y,
            width: bounds.width,
            height: bounds.height,
        }
    }

    pub fn bounds(&self) -> PixelRect {
        PixelRect::new(self.x, self.y, self.width, self.height)
    }
}

/// Word recognized on a rendered page (raster pixels, top-left origin)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedText {
    /// Page number (1-indexed)
    pub page: usize,
    pub text: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Recognition confidence (0-1)
    pub confidence: f32,
}

impl RecognizedText {
    pub fn bounds(&self) -> PixelRect {
        PixelRect::new(self.x, self.y, self.width, self.height)
    }
}

/// Kind of a detected field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Checkbox,
    Signature,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Checkbox => "checkbox",
            FieldType::Signature => "signature",
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fillable region found by detection, in document points (bottom-left origin)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedField {
    /// Unique slug
    pub name: String,
    /// Label text, empty when no label qualified
    pub label: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Page number (1-indexed)
    pub page: usize,
    pub confidence: f32,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

/// Page that could not be processed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageError {
    pub page: usize,
    pub message: String,
}

/// Aggregated detection output, page order preserved
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub fields: Vec<DetectedField>,
    pub rectangles: Vec<Rectangle>,
    pub texts: Vec<RecognizedText>,
    pub page_count: usize,
    /// Size of the first page in points
    pub page_size: PageSize,
    /// Raster up-scale the rectangles and texts were measured at
    pub scale: f32,
    /// Non-fatal problems (OCR failures)
    pub warnings: Vec<String>,
    /// Pages skipped because they failed to render
    pub page_errors: Vec<PageError>,
    /// Pages abandoned after cancellation
    pub cancelled_pages: Vec<usize>,
}

impl DetectionResult {
    /// True when every page was processed to completion
    pub fn is_complete(&self) -> bool {
        self.page_errors.is_empty() && self.cancelled_pages.is_empty()
    }
}

/// Fatal detection failures
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("Document could not be loaded: {0}")]
    Unreadable(#[from] DocumentError),

    #[error("Failed to fetch document: {0}")]
    Fetch(String),

    #[error("Detection task failed: {0}")]
    Task(String),

    #[error("Detection timed out after {0} seconds")]
    Timeout(u64),
}

impl From<reqwest::Error> for DetectionError {
    fn from(err: reqwest::Error) -> Self {
        DetectionError::Fetch(err.to_string())
    }
}
