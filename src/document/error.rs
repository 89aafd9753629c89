//! Document error types
//!
//! Errors raised while loading, rendering or rewriting a PDF.

use thiserror::Error;

/// Document-level error
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Page index outside the document
    #[error("Page not found: index {0}")]
    ItemNotFound(usize),

    /// Failed to parse document
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to render a page
    #[error("Render error: {0}")]
    RenderError(String),

    /// Input is not a PDF
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// MuPDF context error
    #[error("MuPDF context error: {0}")]
    ContextError(String),

    /// PDF object model error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// Malformed object structure (missing catalog, bad field dictionary)
    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    /// IO error (std::io::Error)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Timeout error
    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    /// Image processing error
    #[error("Image error: {0}")]
    ImageError(String),
}

/// Result type alias for document operations
pub type DocumentResult<T> = std::result::Result<T, DocumentError>;

impl From<mupdf::Error> for DocumentError {
    fn from(err: mupdf::Error) -> Self {
        DocumentError::ContextError(err.to_string())
    }
}

impl From<image::ImageError> for DocumentError {
    fn from(err: image::ImageError) -> Self {
        DocumentError::ImageError(err.to_string())
    }
}
