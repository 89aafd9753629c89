//! Mapping document types

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::FieldType;
use crate::document::DocumentError;
use crate::geometry::PageSize;

/// Detection data kept next to a mapped field for round-trip editing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionInfo {
    pub label: String,
    pub confidence: f32,
    pub field_type: FieldType,
    pub width: f32,
    pub height: f32,
}

/// Where one named field is drawn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    /// Target field identifier, also used as a data key fallback
    pub pdf_field: String,
    /// 1-indexed
    #[serde(default = "first_page")]
    pub page: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection: Option<DetectionInfo>,
}

fn first_page() -> usize {
    1
}

impl FieldMapping {
    /// Entry with a position and no detection data
    pub fn at(pdf_field: impl Into<String>, page: usize, x: f32, y: f32) -> Self {
        Self {
            pdf_field: pdf_field.into(),
            page,
            x: Some(x),
            y: Some(y),
            detection: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingMetadata {
    pub generated_by: String,
    pub generated_at: DateTime<Utc>,
    pub page_count: usize,
    pub page_size: PageSize,
}

/// Versioned field mapping for one form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormMapping {
    pub version: String,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldMapping>,
    /// Named derived-value expressions; informational, evaluated by
    /// registered calculators rather than parsed
    #[serde(default)]
    pub calculations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MappingMetadata>,
}

impl FormMapping {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            fields: BTreeMap::new(),
            calculations: BTreeMap::new(),
            metadata: None,
        }
    }

    pub fn from_json(json: &str) -> MappingResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> MappingResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a mapping file
    pub async fn load_from_path(path: impl AsRef<Path>) -> MappingResult<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| MappingError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json(&json)
    }
}

/// Mapping import and validation failures
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("Invalid mapping document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to read mapping {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Document could not be loaded: {0}")]
    Document(#[from] DocumentError),
}

pub type MappingResult<T> = std::result::Result<T, MappingError>;

/// Options for [`merge_with_existing_mapping`](super::merge_with_existing_mapping)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MergeOptions {
    /// Replace positions of fields already in the mapping
    pub overwrite_existing: bool,
    /// Only add new names, never touch existing ones
    pub only_add_new: bool,
    /// Detected fields below this confidence are ignored
    pub min_confidence: f32,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            overwrite_existing: false,
            only_add_new: false,
            min_confidence: 0.5,
        }
    }
}

/// Merged mapping plus what happened to each detected field
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub mapping: FormMapping,
    pub added: Vec<String>,
    pub updated: Vec<String>,
    /// Below the confidence threshold
    pub ignored: Vec<String>,
}

/// Change of one property between two versions of a field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "property", rename_all = "lowercase")]
pub enum FieldChange {
    Page { before: usize, after: usize },
    X { before: Option<f32>, after: Option<f32> },
    Y { before: Option<f32>, after: Option<f32> },
}

/// Difference between two mappings
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MappingDiff {
    /// In the second mapping only
    pub added: Vec<String>,
    /// In the first mapping only
    pub removed: Vec<String>,
    pub changed: BTreeMap<String, Vec<FieldChange>>,
}

impl MappingDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingIssue {
    pub field: String,
    pub message: String,
}

/// Mapping entries checked against a document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub page_count: usize,
    pub issues: Vec<MappingIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}
