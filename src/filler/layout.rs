//! Coordinate-mode placement
//!
//! Values either carry their own position (`{x, y, page?, value|text}`, in
//! document points) or are laid out automatically in two columns running
//! top-down from the top margin of the first page.

use serde_json::Value;

use crate::geometry::PageSize;

use super::matching::scalar_text;

/// Distance from the page edges to the layout area
pub const PAGE_MARGIN: f32 = 50.0;

/// A value with an explicit position
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedValue {
    /// 1-indexed; `Err` holds a `page` entry that is not a page number
    pub page: Result<usize, String>,
    pub x: f32,
    pub y: f32,
    pub text: Option<String>,
}

/// Read a coordinate object; `None` when `value` is not one
pub fn placed_value(value: &Value) -> Option<PlacedValue> {
    let object = value.as_object()?;
    let x = object.get("x")?.as_f64()? as f32;
    let y = object.get("y")?.as_f64()? as f32;
    let page = match object.get("page") {
        None | Some(Value::Null) => Ok(1),
        Some(raw) => page_number(raw).ok_or_else(|| raw.to_string()),
    };
    let text = object
        .get("value")
        .filter(|v| !v.is_null())
        .or_else(|| object.get("text").filter(|v| !v.is_null()))
        .and_then(scalar_text);

    Some(PlacedValue { page, x, y, text })
}

/// Whole page numbers, given as integers, integral floats or numeric strings
fn page_number(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => match n.as_u64() {
            Some(p) => Some(p as usize),
            None => n
                .as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as usize),
        },
        Value::String(s) => s.trim().parse::<usize>().ok(),
        _ => None,
    }
}

/// Auto-layout slot: baseline origin on the first page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    pub column: usize,
    pub row: usize,
    pub x: f32,
    pub y: f32,
}

/// Slot geometry for a page
#[derive(Debug, Clone, Copy)]
pub struct ColumnLayout {
    page: PageSize,
    line_height: f32,
    font_size: f32,
    rows_per_column: usize,
    column_width: f32,
}

impl ColumnLayout {
    pub fn new(page: PageSize, font_size: f32) -> Self {
        let font_size = font_size.max(1.0);
        let line_height = (font_size * 2.0).max(14.0);
        let usable_height = (page.height - 2.0 * PAGE_MARGIN).max(0.0);
        Self {
            page,
            line_height,
            font_size,
            rows_per_column: (usable_height / line_height).floor() as usize,
            column_width: ((page.width - 2.0 * PAGE_MARGIN) / 2.0).max(0.0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.rows_per_column * 2
    }

    pub fn column_width(&self) -> f32 {
        self.column_width
    }

    fn slot(&self, column: usize, row: usize) -> Slot {
        Slot {
            column,
            row,
            x: PAGE_MARGIN + column as f32 * self.column_width,
            y: self.page.height - PAGE_MARGIN - row as f32 * self.line_height - self.font_size,
        }
    }

    /// Slots for `count` values in record order; `None` where the page is full
    ///
    /// Basic layout fills the left column and only moves to the right column
    /// once the left one is exhausted. Smart layout balances the values
    /// across both columns.
    pub fn slots(&self, count: usize, smart: bool) -> Vec<Option<Slot>> {
        let rows = self.rows_per_column;
        if rows == 0 {
            return vec![None; count];
        }

        let per_column = if smart {
            count.div_ceil(2).clamp(1, rows)
        } else {
            rows
        };

        (0..count)
            .map(|index| {
                let column = index / per_column;
                let row = index % per_column;
                (column < 2).then(|| self.slot(column, row))
            })
            .collect()
    }
}
