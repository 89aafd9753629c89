//! Box detection
//!
//! Finds underline and box style form fields on a rendered page:
//!
//! 1. grayscale, forward-difference gradient, threshold into an edge map
//! 2. scan candidate top-left corners cell by cell on a coarse grid
//! 3. a corner qualifies when a horizontal run of `min_width` and a vertical
//!    run of `min_height` starting there are both covered by edge pixels
//! 4. grow the rectangle step by step while the lines continue
//! 5. drop candidates overlapping an accepted rectangle
//!
//! Dashed or hand-drawn boxes are often missed. That is a known limitation.

use image::{imageops, GrayImage, RgbaImage};

use crate::config::DetectionConfig;
use crate::geometry::PixelRect;

/// Binary edge map with per-row and per-column prefix counts
pub struct EdgeMap {
    width: u32,
    height: u32,
    /// `(width + 1)` entries per row
    row_prefix: Vec<u32>,
    /// `(height + 1)` entries per column
    col_prefix: Vec<u32>,
}

impl EdgeMap {
    pub fn from_gray(gray: &GrayImage, threshold: f32) -> Self {
        let (width, height) = gray.dimensions();
        let (w, h) = (width as usize, height as usize);

        let mut edges = vec![false; w * h];
        for y in 0..height {
            for x in 0..width {
                let g = gray.get_pixel(x, y)[0] as f32;
                let gx = if x + 1 < width {
                    gray.get_pixel(x + 1, y)[0] as f32 - g
                } else {
                    0.0
                };
                let gy = if y + 1 < height {
                    gray.get_pixel(x, y + 1)[0] as f32 - g
                } else {
                    0.0
                };
                edges[y as usize * w + x as usize] = (gx * gx + gy * gy).sqrt() > threshold;
            }
        }

        let mut row_prefix = vec![0u32; (w + 1) * h];
        for y in 0..h {
            let base = y * (w + 1);
            for x in 0..w {
                row_prefix[base + x + 1] = row_prefix[base + x] + edges[y * w + x] as u32;
            }
        }

        let mut col_prefix = vec![0u32; (h + 1) * w];
        for x in 0..w {
            let base = x * (h + 1);
            for y in 0..h {
                col_prefix[base + y + 1] = col_prefix[base + y] + edges[y * w + x] as u32;
            }
        }

        Self {
            width,
            height,
            row_prefix,
            col_prefix,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Fraction of `len` pixels from `(x, y)` rightwards that are edges.
    /// Pixels past the image border count as non-edges.
    pub fn h_coverage(&self, x: u32, y: u32, len: u32) -> f32 {
        if len == 0 || y >= self.height || x >= self.width {
            return 0.0;
        }
        let end = x.saturating_add(len).min(self.width) as usize;
        let base = y as usize * (self.width as usize + 1);
        let count = self.row_prefix[base + end] - self.row_prefix[base + x as usize];
        count as f32 / len as f32
    }

    /// Fraction of `len` pixels from `(x, y)` downwards that are edges
    pub fn v_coverage(&self, x: u32, y: u32, len: u32) -> f32 {
        if len == 0 || x >= self.width || y >= self.height {
            return 0.0;
        }
        let end = y.saturating_add(len).min(self.height) as usize;
        let base = x as usize * (self.height as usize + 1);
        let count = self.col_prefix[base + end] - self.col_prefix[base + y as usize];
        count as f32 / len as f32
    }
}

/// Detect rectangles on a rendered page, in scan order
pub fn detect_boxes(image: &RgbaImage, config: &DetectionConfig) -> Vec<PixelRect> {
    let gray = imageops::grayscale(image);
    let edges = EdgeMap::from_gray(&gray, config.edge_threshold);
    find_rectangles(&edges, config)
}

/// Corner scan and growth over a prepared edge map
pub fn find_rectangles(edges: &EdgeMap, config: &DetectionConfig) -> Vec<PixelRect> {
    let (width, height) = (edges.width(), edges.height());
    let max_width = (width as f32 * config.max_width_ratio).floor() as u32;
    let max_height = config.max_height;
    let stride = config.grid_stride.max(1);
    let step = config.grow_step.max(1);

    if config.min_width == 0
        || config.min_height == 0
        || config.min_width > max_width
        || config.min_height > max_height
    {
        return Vec::new();
    }

    let mut accepted: Vec<PixelRect> = Vec::new();

    for cell_y in (0..height).step_by(stride as usize) {
        for cell_x in (0..width).step_by(stride as usize) {
            if let Some(rect) = scan_cell(edges, config, cell_x, cell_y, stride, step, max_width, &accepted) {
                accepted.push(rect);
            }
        }
    }

    tracing::debug!("Box detection: {} rectangles on {}x{} page", accepted.len(), width, height);
    accepted
}

#[allow(clippy::too_many_arguments)]
fn scan_cell(
    edges: &EdgeMap,
    config: &DetectionConfig,
    cell_x: u32,
    cell_y: u32,
    stride: u32,
    step: u32,
    max_width: u32,
    accepted: &[PixelRect],
) -> Option<PixelRect> {
    let y_end = cell_y.saturating_add(stride).min(edges.height());
    let x_end = cell_x.saturating_add(stride).min(edges.width());

    for y0 in cell_y..y_end {
        for x0 in cell_x..x_end {
            // A rectangle grown from a corner inside an accepted one always overlaps it
            let corner = PixelRect::new(x0, y0, 1, 1);
            if accepted.iter().any(|r| r.intersects(&corner)) {
                continue;
            }

            if edges.h_coverage(x0, y0, config.min_width) < config.line_coverage
                || edges.v_coverage(x0, y0, config.min_height) < config.line_coverage
            {
                continue;
            }

            let rect = grow(edges, config, x0, y0, step, max_width);
            if !accepted.iter().any(|r| r.intersects(&rect)) {
                return Some(rect);
            }
        }
    }
    None
}

fn grow(edges: &EdgeMap, config: &DetectionConfig, x0: u32, y0: u32, step: u32, max_width: u32) -> PixelRect {
    let mut width = config.min_width;
    while width + step <= max_width && edges.h_coverage(x0 + width, y0, step) >= config.line_coverage {
        width += step;
    }

    let mut height = config.min_height;
    while height + step <= config.max_height
        && edges.v_coverage(x0, y0 + height, step) >= config.line_coverage
    {
        height += step;
    }

    PixelRect::new(
        x0,
        y0,
        width.min(edges.width() - x0),
        height.min(edges.height() - y0),
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::Rgba;

    pub(crate) fn white_page(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]))
    }

    /// 1px black outline with inclusive corners
    pub(crate) fn draw_outline(image: &mut RgbaImage, x0: u32, y0: u32, x1: u32, y1: u32) {
        let black = Rgba([0, 0, 0, 255]);
        for x in x0..=x1 {
            image.put_pixel(x, y0, black);
            image.put_pixel(x, y1, black);
        }
        for y in y0..=y1 {
            image.put_pixel(x0, y, black);
            image.put_pixel(x1, y, black);
        }
    }

    #[test]
    fn test_single_box() {
        let mut page = white_page(600, 400);
        draw_outline(&mut page, 100, 100, 300, 130);

        let rects = detect_boxes(&page, &DetectionConfig::default());
        assert_eq!(rects, vec![PixelRect::new(99, 99, 200, 35)]);
    }

    #[test]
    fn test_boxes_in_scan_order_without_overlap() {
        let mut page = white_page(600, 400);
        draw_outline(&mut page, 100, 200, 250, 240);
        draw_outline(&mut page, 100, 100, 300, 130);

        let rects = detect_boxes(&page, &DetectionConfig::default());
        assert_eq!(
            rects,
            vec![PixelRect::new(99, 99, 200, 35), PixelRect::new(99, 199, 150, 45)]
        );
        assert!(!rects[0].intersects(&rects[1]));
    }

    #[test]
    fn test_blank_page_has_no_boxes() {
        let rects = detect_boxes(&white_page(300, 200), &DetectionConfig::default());
        assert!(rects.is_empty());
    }

    #[test]
    fn test_small_box_below_minimum_is_ignored() {
        let mut page = white_page(300, 200);
        draw_outline(&mut page, 50, 50, 60, 55);
        assert!(detect_boxes(&page, &DetectionConfig::default()).is_empty());
    }

    #[test]
    fn test_page_narrower_than_minimum_width() {
        // 80% of 60px is below the 50px minimum
        let mut page = white_page(60, 100);
        draw_outline(&mut page, 2, 10, 57, 40);
        assert!(detect_boxes(&page, &DetectionConfig::default()).is_empty());
    }

    #[test]
    fn test_growth_is_capped() {
        let mut page = white_page(400, 400);
        draw_outline(&mut page, 10, 10, 390, 300);

        let config = DetectionConfig::default();
        let rects = detect_boxes(&page, &config);
        assert!(!rects.is_empty());
        for rect in rects {
            assert!(rect.width <= 320, "width {} over 80% of page", rect.width);
            assert!(rect.height <= config.max_height);
        }
    }

    #[test]
    fn test_coverage_counts_off_page_pixels_as_missing() {
        let mut gray = GrayImage::from_pixel(20, 20, image::Luma([255]));
        for x in 0..20 {
            gray.put_pixel(x, 5, image::Luma([0]));
        }
        let edges = EdgeMap::from_gray(&gray, 50.0);
        // row 4 sees the step down into the black line
        assert_eq!(edges.h_coverage(0, 4, 20), 1.0);
        assert_eq!(edges.h_coverage(10, 4, 20), 0.5);
        assert_eq!(edges.h_coverage(0, 10, 20), 0.0);
    }
}
