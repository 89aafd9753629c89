//! Template forms
//!
//! Official forms filled by `(formType, version)`:
//!
//! ```text
//!   store ──► template bytes ─────────────┐
//!   cache ──► mapping (loaded once) ──────┼──► FormFiller::fill_with_mapping ──► bytes
//!   calculators ──► data + derived values ┘
//! ```

mod cache;
mod calculations;
mod service;
mod store;
mod types;

pub use cache::MappingCache;
pub use calculations::{amount, round_cents, CalculatorRegistry, FormCalculator, Pit37Calculator, PIT37_TAX_RATE};
pub use service::{format_value, TemplateFill, TemplateFormService, CALCULATED_FIELDS_KEY};
pub use store::{FsTemplateStore, TemplateStore};
pub use types::{CacheStats, TemplateError, TemplateRequest, TemplateResult};
