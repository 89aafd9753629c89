//! Template service types

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filler::{FillError, FormData};
use crate::mapping::MappingError;

/// One document of a batch fill
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRequest {
    pub form_type: String,
    pub version: String,
    pub data: FormData,
}

/// Mapping cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Template service errors
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error(
        "Template not found for {form_type} {version}: install the official form at {}",
        join_paths(attempted)
    )]
    TemplateNotFound {
        form_type: String,
        version: String,
        attempted: Vec<PathBuf>,
    },

    #[error("Mapping not found for {form_type} {version}: expected {}", join_paths(attempted))]
    MappingNotFound {
        form_type: String,
        version: String,
        attempted: Vec<PathBuf>,
    },

    #[error("Invalid form type or version: {0:?}")]
    InvalidKey(String),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Fill(#[from] FillError),

    #[error("Fill task failed: {0}")]
    Task(String),

    #[error("Fill timed out after {0} seconds")]
    Timeout(u64),
}

pub type TemplateResult<T> = std::result::Result<T, TemplateError>;
