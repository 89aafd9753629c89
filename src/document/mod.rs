//! Document loading and rasterization
//!
//! ```text
//!   PDF bytes ──► PageRasterizer ──► RasterPage (RGBA @ 2x, page size in pt)
//!                  (MuPDF, fresh document per operation)
//! ```
//!
//! Form-layer access and content drawing live in [`crate::pdf`].

mod error;
mod raster;

pub use error::{DocumentError, DocumentResult};
pub use raster::{looks_like_pdf, MupdfRasterizer, PageRasterizer, RasterPage, DEFAULT_RENDER_SCALE};
