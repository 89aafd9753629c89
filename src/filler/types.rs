//! Form filler types

use serde::{Deserialize, Serialize};

use crate::document::DocumentError;
use crate::geometry::PageSize;

/// Flat data record; key order is the order keys were inserted
pub type FormData = serde_json::Map<String, serde_json::Value>;

/// MIME type of filled output
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Per-call filling options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FillOptions {
    /// Replace accented letters with base letters before writing
    pub sanitize_diacritics: bool,
    pub font_size: f32,
    /// RGB, each 0-1
    pub font_color: [f32; 3],
    /// Balance auto-layout across both columns
    pub smart_positioning: bool,
    /// Match record keys to field names ignoring case, accents and separators
    pub fuzzy_matching: bool,
    /// Reject values that break MaxLen or dropdown options
    pub validate_fields: bool,
    /// Keep native fields interactive instead of flattening them
    pub keep_fields_editable: bool,
}

impl Default for FillOptions {
    fn default() -> Self {
        Self {
            sanitize_diacritics: true,
            font_size: 10.0,
            font_color: [0.0, 0.0, 0.0],
            smart_positioning: true,
            fuzzy_matching: true,
            validate_fields: true,
            keep_fields_editable: false,
        }
    }
}

/// How a document was filled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FillMethod {
    NativeFields,
    Coordinate,
}

/// Outcome of one fill call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FillingResult {
    pub method: FillMethod,
    pub fields_detected: usize,
    pub fields_filled: usize,
    pub fields_skipped: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl FillingResult {
    pub fn new(method: FillMethod) -> Self {
        Self {
            method,
            fields_detected: 0,
            fields_filled: 0,
            fields_skipped: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub(crate) fn filled(&mut self) {
        self.fields_filled += 1;
    }

    pub(crate) fn skip(&mut self, warning: String) {
        self.fields_skipped += 1;
        self.warnings.push(warning);
    }

    pub(crate) fn error(&mut self, error: String) {
        self.errors.push(error);
    }

    pub(crate) fn warn(&mut self, warning: String) {
        self.warnings.push(warning);
    }
}

/// Filled document bytes with the fill summary
#[derive(Debug, Clone)]
pub struct FilledDocument {
    pub bytes: Vec<u8>,
    pub result: FillingResult,
}

/// Filled document ready to hand out as a download
#[derive(Debug, Clone)]
pub struct PdfBlob {
    pub data: Vec<u8>,
    pub content_type: &'static str,
    pub result: FillingResult,
}

/// Native field summary for [`PdfAnalysis`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzedField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
}

/// Structure of a document as seen by the filler
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfAnalysis {
    pub page_count: usize,
    /// Size of the first page
    pub page_size: PageSize,
    pub has_native_form: bool,
    pub field_count: usize,
    pub fields: Vec<AnalyzedField>,
}

/// Filling session stages, logged as a fill progresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillStage {
    Idle,
    DetectingMode,
    Filling,
    Saved,
}

/// Whole-document filling failures
#[derive(Debug, thiserror::Error)]
pub enum FillError {
    #[error("Document could not be loaded: {0}")]
    Unreadable(#[source] DocumentError),

    #[error("Failed to write filled document: {0}")]
    Save(#[source] DocumentError),
}
