//! PDF Form Engine
//!
//! Finds fillable regions in PDFs that have no form layer, and fills any PDF
//! from a flat data record.
//!
//! # Modules
//!
//! - `detection`: Rasterize, find boxes, OCR, pair labels with boxes
//! - `filler`: Native-field or coordinate filling with a result summary
//! - `mapping`: Mapping documents (generate, merge, compare, validate)
//! - `template`: Official forms by type and version, with derived values
//! - `document`: MuPDF rasterization
//! - `pdf`: lopdf object model (form fields, drawing, flattening)
//! - `ocr`: Text recognition providers
//!
//! # Example
//!
//! ```rust,ignore
//! use pdf_form_engine::config::EngineConfig;
//! use pdf_form_engine::detection::FieldDetector;
//! use pdf_form_engine::filler::{FillOptions, FormFiller};
//!
//! let config = EngineConfig::from_env();
//! let detected = FieldDetector::new(&config).detect_fields(&bytes).await?;
//! let mapping = detected.to_mapping("2023");
//!
//! let filled = FormFiller::new().fill_with_mapping(&bytes, &mapping, &data, &FillOptions::default())?;
//! ```

pub mod cancel;
pub mod config;
pub mod detection;
pub mod document;
pub mod filler;
pub mod geometry;
pub mod logging;
pub mod mapping;
pub mod ocr;
pub mod pdf;
pub mod template;
pub mod text;

pub use cancel::CancellationToken;
pub use config::EngineConfig;
pub use detection::{DetectedField, DetectionResult, FieldDetector};
pub use filler::{FillOptions, FillingResult, FormData, FormFiller};
pub use mapping::FormMapping;
pub use template::TemplateFormService;
