//! Page rasterization
//!
//! Renders PDF pages to RGBA pixel buffers for box detection and OCR.
//! The MuPDF backend opens a fresh document for every operation: MuPDF
//! documents are not thread-safe, and pages are rendered from several
//! blocking workers at once.

use image::RgbaImage;
use mupdf::{Colorspace, Document, Matrix};

use crate::geometry::{PageSize, PageTransform};

use super::error::{DocumentError, DocumentResult};

/// Up-scale factor used for detection renders
pub const DEFAULT_RENDER_SCALE: f32 = 2.0;

const PDF_MIME: &str = "application/pdf";

/// A rendered page
#[derive(Debug, Clone)]
pub struct RasterPage {
    /// Page number (1-indexed)
    pub page: usize,
    /// RGBA pixels at `scale` times the point size
    pub image: RgbaImage,
    /// Native page size in points
    pub page_size: PageSize,
    pub scale: f32,
}

impl RasterPage {
    /// Raster ↔ document conversion for this page
    pub fn transform(&self) -> PageTransform {
        PageTransform::new(self.page_size, self.scale)
    }
}

/// Renders pages of a document held in memory
pub trait PageRasterizer: Send + Sync {
    /// Size of every page in points, in page order
    ///
    /// Fails if the document cannot be opened at all.
    fn page_sizes(&self, data: &[u8]) -> DocumentResult<Vec<PageSize>>;

    /// Render one page (0-indexed) at `scale`
    fn render_page(&self, data: &[u8], page_index: usize, scale: f32) -> DocumentResult<RasterPage>;
}

/// MuPDF-backed rasterizer
#[derive(Debug, Default, Clone, Copy)]
pub struct MupdfRasterizer;

impl MupdfRasterizer {
    pub fn new() -> Self {
        Self
    }

    fn open(data: &[u8]) -> DocumentResult<Document> {
        if !looks_like_pdf(data) {
            return Err(DocumentError::UnsupportedFormat(
                "missing %PDF header".to_string(),
            ));
        }
        Document::from_bytes(data, PDF_MIME).map_err(Into::into)
    }
}

impl PageRasterizer for MupdfRasterizer {
    fn page_sizes(&self, data: &[u8]) -> DocumentResult<Vec<PageSize>> {
        let doc = Self::open(data)?;
        let count = doc.page_count()?;

        let mut sizes = Vec::with_capacity(count.max(0) as usize);
        for index in 0..count {
            let page = doc.load_page(index)?;
            let bounds = page.bounds()?;
            sizes.push(PageSize::new(
                (bounds.x1 - bounds.x0).abs(),
                (bounds.y1 - bounds.y0).abs(),
            ));
        }
        Ok(sizes)
    }

    fn render_page(&self, data: &[u8], page_index: usize, scale: f32) -> DocumentResult<RasterPage> {
        let doc = Self::open(data)?;
        let count = doc.page_count()? as usize;
        if page_index >= count {
            return Err(DocumentError::ItemNotFound(page_index));
        }

        let page = doc
            .load_page(page_index as i32)
            .map_err(|e| DocumentError::RenderError(format!("page {}: {}", page_index + 1, e)))?;
        let bounds = page.bounds()?;
        let page_size = PageSize::new(
            (bounds.x1 - bounds.x0).abs(),
            (bounds.y1 - bounds.y0).abs(),
        );

        // No alpha: transparent backgrounds would read as black after grayscale
        let matrix = Matrix::new_scale(scale, scale);
        let colorspace = Colorspace::device_rgb();
        let pixmap = page
            .to_pixmap(&matrix, &colorspace, false, true)
            .map_err(|e| DocumentError::RenderError(format!("page {}: {}", page_index + 1, e)))?;

        let image = pixmap_to_rgba(&pixmap)?;
        tracing::debug!(
            "Rendered page {} at {}x ({}x{} px)",
            page_index + 1,
            scale,
            image.width(),
            image.height()
        );

        Ok(RasterPage {
            page: page_index + 1,
            image,
            page_size,
            scale,
        })
    }
}

/// Header check tolerating leading garbage, as PDF readers do
pub fn looks_like_pdf(data: &[u8]) -> bool {
    let window = &data[..data.len().min(1024)];
    window.windows(4).any(|w| w == b"%PDF")
}

/// Byte length of an RGBA buffer, computed in `usize`
fn rgba_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

fn pixmap_to_rgba(pixmap: &mupdf::Pixmap) -> DocumentResult<RgbaImage> {
    let width = pixmap.width() as u32;
    let height = pixmap.height() as u32;
    let samples = pixmap.samples();
    let n = pixmap.n() as usize;

    let mut rgba = Vec::with_capacity(rgba_len(width, height));
    for y in 0..height as usize {
        for x in 0..width as usize {
            let offset = (y * width as usize + x) * n;
            let r = samples.get(offset).copied().unwrap_or(255);
            let g = samples.get(offset + 1).copied().unwrap_or(r);
            let b = samples.get(offset + 2).copied().unwrap_or(r);
            let a = if n >= 4 {
                samples.get(offset + 3).copied().unwrap_or(255)
            } else {
                255
            };
            rgba.extend_from_slice(&[r, g, b, a]);
        }
    }

    RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| DocumentError::ImageError("Failed to create image buffer".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_looks_like_pdf() {
        assert!(looks_like_pdf(b"%PDF-1.7\n..."));
        assert!(looks_like_pdf(b"\xEF\xBB\xBF%PDF-1.4"));
        assert!(!looks_like_pdf(b"PK\x03\x04"));
        assert!(!looks_like_pdf(b""));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_rgba_len_does_not_wrap() {
        assert_eq!(rgba_len(1190, 1684), 1190 * 1684 * 4);
        // 40000 * 40000 * 4 exceeds u32::MAX
        assert_eq!(rgba_len(40_000, 40_000), 6_400_000_000);
    }

    #[test]
    fn test_rejects_non_pdf_input() {
        let result = MupdfRasterizer::new().page_sizes(b"not a pdf");
        assert!(matches!(result, Err(DocumentError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_raster_page_transform_uses_scale() {
        let page = RasterPage {
            page: 1,
            image: RgbaImage::new(10, 10),
            page_size: PageSize::new(5.0, 5.0),
            scale: 2.0,
        };
        assert_eq!(page.transform().raster_dimensions(), (10, 10));
    }
}
