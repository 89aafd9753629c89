//! Coordinate spaces
//!
//! Detection works in raster space: pixels of a page rendered at `scale`
//! times its point size, origin top-left, y growing downwards. Mappings and
//! filling work in document space: PDF points, origin bottom-left, y growing
//! upwards.
//!
//! Every conversion between the two spaces goes through [`PageTransform`].

use serde::{Deserialize, Serialize};

/// Page size in PDF points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    /// ISO A4 portrait
    pub const A4: PageSize = PageSize {
        width: 595.0,
        height: 842.0,
    };

    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Whether a point lies on the page (edges inclusive)
    pub fn contains(&self, x: f32, y: f32) -> bool {
        (0.0..=self.width).contains(&x) && (0.0..=self.height).contains(&y)
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::A4
    }
}

/// Axis-aligned box in raster space (top-left origin, pixels)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Non-empty axis-aligned intersection
    pub fn intersects(&self, other: &PixelRect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Euclidean distance between the closest points of two boxes (0 when they touch)
    pub fn gap_distance(&self, other: &PixelRect) -> f32 {
        let dx = axis_gap(self.x, self.right(), other.x, other.right());
        let dy = axis_gap(self.y, self.bottom(), other.y, other.bottom());
        (dx * dx + dy * dy).sqrt()
    }
}

fn axis_gap(a0: u32, a1: u32, b0: u32, b1: u32) -> f32 {
    if a1 <= b0 {
        (b0 - a1) as f32
    } else if b1 <= a0 {
        (a0 - b1) as f32
    } else {
        0.0
    }
}

/// Box in document space (bottom-left origin, points)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Conversion between raster space and document space for one page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageTransform {
    page: PageSize,
    scale: f32,
}

impl PageTransform {
    /// Non-positive scales fall back to 1.0
    pub fn new(page: PageSize, scale: f32) -> Self {
        let scale = if scale > 0.0 { scale } else { 1.0 };
        Self { page, scale }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn page_size(&self) -> PageSize {
        self.page
    }

    /// Raster dimensions of the page in pixels
    pub fn raster_dimensions(&self) -> (u32, u32) {
        (
            (self.page.width * self.scale).round().max(1.0) as u32,
            (self.page.height * self.scale).round().max(1.0) as u32,
        )
    }

    pub fn raster_len_to_points(&self, pixels: f32) -> f32 {
        pixels / self.scale
    }

    pub fn points_len_to_raster(&self, points: f32) -> f32 {
        points * self.scale
    }

    /// Raster box to document box: `pdfY = pageHeight - (rectY + rectHeight) / scale`
    pub fn raster_to_points_rect(&self, rect: PixelRect) -> PointRect {
        let x = self.raster_len_to_points(rect.x as f32);
        let width = self.raster_len_to_points(rect.width as f32);
        let height = self.raster_len_to_points(rect.height as f32);
        let y = self.page.height - self.raster_len_to_points(rect.bottom() as f32);
        PointRect {
            x,
            y,
            width,
            height,
        }
    }

    /// Document box back to raster space, rounded to whole pixels
    pub fn points_to_raster_rect(&self, rect: PointRect) -> PixelRect {
        let top = (self.page.height - rect.y - rect.height).max(0.0);
        PixelRect {
            x: self.points_len_to_raster(rect.x.max(0.0)).round() as u32,
            y: self.points_len_to_raster(top).round() as u32,
            width: self.points_len_to_raster(rect.width).round() as u32,
            height: self.points_len_to_raster(rect.height).round() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_to_points_flips_and_downscales() {
        let transform = PageTransform::new(PageSize::new(600.0, 800.0), 2.0);
        let rect = transform.raster_to_points_rect(PixelRect::new(100, 200, 60, 40));

        assert_eq!(rect.x, 50.0);
        assert_eq!(rect.width, 30.0);
        assert_eq!(rect.height, 20.0);
        // 800 - (200 + 40) / 2
        assert_eq!(rect.y, 680.0);
    }

    #[test]
    fn test_points_to_raster_inverts_conversion() {
        let transform = PageTransform::new(PageSize::A4, 2.0);
        let original = PixelRect::new(120, 340, 200, 30);
        let back = transform.points_to_raster_rect(transform.raster_to_points_rect(original));
        assert_eq!(back, original);
    }

    #[test]
    fn test_non_positive_scale_defaults_to_identity() {
        let transform = PageTransform::new(PageSize::A4, 0.0);
        assert_eq!(transform.scale(), 1.0);
        assert_eq!(transform.raster_dimensions(), (595, 842));
    }

    #[test]
    fn test_intersection_and_gap() {
        let a = PixelRect::new(0, 0, 10, 10);
        let b = PixelRect::new(10, 0, 10, 10);
        let c = PixelRect::new(5, 5, 10, 10);

        assert!(!a.intersects(&b), "touching edges do not overlap");
        assert!(a.intersects(&c));
        assert_eq!(a.gap_distance(&b), 0.0);
        assert_eq!(PixelRect::new(0, 0, 10, 10).gap_distance(&PixelRect::new(13, 14, 5, 5)), 5.0);
    }
}
