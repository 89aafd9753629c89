//! OCR Module
//!
//! Word-level text recognition for rendered form pages.
//!
//! Backends implement [`TextRecognizer`]; the bundled one shells out to the
//! `tesseract` executable. [`OcrService`] tries providers in order and
//! falls back when one fails.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pdf_form_engine::config::OcrConfig;
//! use pdf_form_engine::ocr::OcrService;
//!
//! let service = OcrService::new(OcrConfig::default());
//! let providers = service.available_providers().await;
//! let texts = service.recognize_page(&raster_page).await?;
//! ```

mod provider;
mod service;
mod types;

#[cfg(test)]
pub(crate) use provider::MockProvider;
pub use provider::{parse_tsv, TesseractProvider, TextRecognizer};
pub use service::{encode_png, OcrService};
pub use types::{OcrError, OcrProvider, OcrResult, OcrWord};
