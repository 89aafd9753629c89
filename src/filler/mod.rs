//! Universal form filler
//!
//! Fills any PDF from a flat data record:
//!
//! - **native-fields** when the document has an interactive form: record
//!   keys are matched to field names (exact, then fuzzy) and the field
//!   objects are set, then flattened unless `keepFieldsEditable` is set
//! - **coordinate** otherwise: values are drawn onto page content at their
//!   own coordinates or at auto-layout slots
//!
//! Per-field problems end up in [`FillingResult`]; only an unreadable
//! document or a failed save is an error.

mod layout;
mod matching;
mod types;

use serde_json::Value;

use crate::document::DocumentError;
use crate::mapping::FormMapping;
use crate::pdf::{FormField, NativeFieldKind, PdfDocument, TextPainter};
use crate::text::{normalize_key, sanitize_for_pdf};

pub use layout::{placed_value, ColumnLayout, PlacedValue, Slot, PAGE_MARGIN};
pub use matching::{resolve_value, scalar_text, truthiness, MatchKind, ResolvedValue};
pub use types::{
    AnalyzedField, FillError, FillMethod, FillOptions, FillStage, FilledDocument, FillingResult,
    FormData, PdfAnalysis, PdfBlob, PDF_CONTENT_TYPE,
};

/// Stage tracking for one fill call
struct FillSession {
    stage: FillStage,
}

impl FillSession {
    fn new() -> Self {
        Self {
            stage: FillStage::Idle,
        }
    }

    fn advance(&mut self, next: FillStage) {
        tracing::debug!("Fill stage {:?} -> {:?}", self.stage, next);
        self.stage = next;
    }
}

/// Fills PDF documents from data records
#[derive(Debug, Default, Clone, Copy)]
pub struct FormFiller;

impl FormFiller {
    pub fn new() -> Self {
        Self
    }

    /// Fill a document, choosing native-field or coordinate mode
    pub fn fill_form(
        &self,
        bytes: &[u8],
        data: &FormData,
        options: &FillOptions,
    ) -> Result<FilledDocument, FillError> {
        let mut session = FillSession::new();
        let mut doc = PdfDocument::load(bytes).map_err(FillError::Unreadable)?;

        session.advance(FillStage::DetectingMode);
        let fields = doc.form_fields();

        session.advance(FillStage::Filling);
        let result = if fields.is_empty() {
            tracing::info!("No native form fields, filling by coordinates");
            fill_coordinates(&mut doc, data, options)?
        } else {
            tracing::info!("Filling {} native form fields", fields.len());
            fill_native(&mut doc, &fields, data, options)?
        };

        let bytes = doc.save().map_err(FillError::Save)?;
        session.advance(FillStage::Saved);

        tracing::info!(
            "Filled document ({:?}): {} filled, {} skipped, {} errors",
            result.method,
            result.fields_filled,
            result.fields_skipped,
            result.errors.len()
        );
        Ok(FilledDocument { bytes, result })
    }

    /// [`fill_form`](Self::fill_form) packaged for download
    pub fn fill_form_as_blob(
        &self,
        bytes: &[u8],
        data: &FormData,
        options: &FillOptions,
    ) -> Result<PdfBlob, FillError> {
        let filled = self.fill_form(bytes, data, options)?;
        Ok(PdfBlob {
            data: filled.bytes,
            content_type: PDF_CONTENT_TYPE,
            result: filled.result,
        })
    }

    /// Page and native-form summary of a document
    pub fn analyze_pdf(&self, bytes: &[u8]) -> Result<PdfAnalysis, FillError> {
        let doc = PdfDocument::load(bytes).map_err(FillError::Unreadable)?;
        let fields = doc.form_fields();

        Ok(PdfAnalysis {
            page_count: doc.page_count(),
            page_size: doc.page_size(1).map_err(FillError::Unreadable)?,
            has_native_form: !fields.is_empty(),
            field_count: fields.len(),
            fields: fields
                .iter()
                .map(|f| AnalyzedField {
                    name: f.name.clone(),
                    field_type: f.kind.as_str().to_string(),
                })
                .collect(),
        })
    }

    /// Draw record values at the positions of a mapping
    ///
    /// Values are looked up by mapping key first, then by the entry's
    /// `pdfField`.
    pub fn fill_with_mapping(
        &self,
        bytes: &[u8],
        mapping: &FormMapping,
        data: &FormData,
        options: &FillOptions,
    ) -> Result<FilledDocument, FillError> {
        let mut session = FillSession::new();
        let mut doc = PdfDocument::load(bytes).map_err(FillError::Unreadable)?;
        session.advance(FillStage::DetectingMode);
        session.advance(FillStage::Filling);

        let mut result = FillingResult::new(FillMethod::Coordinate);
        result.fields_detected = mapping.fields.len();
        let mut painter = TextPainter::new(options.font_color);

        for (name, entry) in &mapping.fields {
            let value = data
                .get(name)
                .filter(|v| !v.is_null())
                .or_else(|| data.get(&entry.pdf_field).filter(|v| !v.is_null()));
            let Some(value) = value else {
                result.skip(format!("No data for mapped field '{}'", name));
                continue;
            };
            let (Some(x), Some(y)) = (entry.x, entry.y) else {
                result.skip(format!("Mapped field '{}' has no coordinates", name));
                continue;
            };
            let Some(text) = scalar_text(value) else {
                result.error(format!("Value for '{}' is not a scalar", name));
                continue;
            };

            draw_value(&doc, &mut painter, &mut result, name, entry.page, x, y, &text, options);
        }

        painter.commit(&mut doc).map_err(FillError::Save)?;
        let bytes = doc.save().map_err(FillError::Save)?;
        session.advance(FillStage::Saved);

        Ok(FilledDocument { bytes, result })
    }
}

fn fill_native(
    doc: &mut PdfDocument,
    fields: &[FormField],
    data: &FormData,
    options: &FillOptions,
) -> Result<FillingResult, FillError> {
    let mut result = FillingResult::new(FillMethod::NativeFields);
    result.fields_detected = fields.len();

    for field in fields {
        let Some(resolved) = resolve_value(&field.name, &field.partial_name, data, options.fuzzy_matching)
        else {
            result.skip(format!("No data for field '{}'", field.name));
            continue;
        };
        if resolved.kind != MatchKind::Exact {
            tracing::debug!("Field '{}' matched key '{}' ({:?})", field.name, resolved.key, resolved.kind);
        }

        if field.read_only {
            result.skip(format!("Field '{}' is read-only", field.name));
            continue;
        }

        match set_native_value(doc, field, resolved.value, options) {
            Ok(()) => result.filled(),
            Err(FieldWrite::Unsupported) => result.skip(format!(
                "Field '{}' has unsupported type '{}'",
                field.name,
                field.kind.as_str()
            )),
            Err(FieldWrite::Failed(message)) => result.error(format!("Field '{}': {}", field.name, message)),
        }
    }

    if options.keep_fields_editable {
        doc.set_need_appearances().map_err(FillError::Save)?;
    } else {
        let report = doc
            .flatten_form(options.font_size, options.font_color)
            .map_err(FillError::Save)?;
        for name in report.lossy {
            result.warn(format!(
                "Field '{}' has characters the standard font cannot show; they were replaced",
                name
            ));
        }
        for name in report.unplaced {
            result.warn(format!(
                "Field '{}' has no widget position; its value is missing from the flattened page",
                name
            ));
        }
    }

    Ok(result)
}

enum FieldWrite {
    Unsupported,
    Failed(String),
}

impl From<DocumentError> for FieldWrite {
    fn from(err: DocumentError) -> Self {
        FieldWrite::Failed(err.to_string())
    }
}

fn set_native_value(
    doc: &mut PdfDocument,
    field: &FormField,
    value: &Value,
    options: &FillOptions,
) -> Result<(), FieldWrite> {
    let text = || {
        scalar_text(value)
            .map(|t| sanitize_for_pdf(&t, options.sanitize_diacritics))
            .ok_or_else(|| FieldWrite::Failed("expected a text, number or boolean value".to_string()))
    };

    match field.kind {
        NativeFieldKind::Text => {
            let text = text()?;
            if options.validate_fields {
                if let Some(max_len) = field.max_len {
                    let length = text.chars().count();
                    if length > max_len {
                        return Err(FieldWrite::Failed(format!(
                            "value has {} characters, MaxLen is {}",
                            length, max_len
                        )));
                    }
                }
            }
            doc.set_text_field(field, &text)?;
        }
        NativeFieldKind::Checkbox => {
            let checked = truthiness(value)
                .ok_or_else(|| FieldWrite::Failed("expected a boolean value".to_string()))?;
            doc.set_checkbox(field, checked)?;
        }
        NativeFieldKind::Radio => {
            doc.set_radio(field, &text()?)?;
        }
        NativeFieldKind::Dropdown => {
            let text = text()?;
            let wanted = normalize_key(&text);
            let option = field
                .options
                .iter()
                .find(|o| **o == text)
                .or_else(|| field.options.iter().find(|o| normalize_key(o) == wanted));
            match option {
                Some(option) => doc.set_choice(field, option)?,
                None if options.validate_fields && !field.options.is_empty() => {
                    return Err(FieldWrite::Failed(format!(
                        "'{}' is not one of the options ({})",
                        text,
                        field.options.join(", ")
                    )));
                }
                None => doc.set_choice(field, &text)?,
            }
        }
        NativeFieldKind::Button | NativeFieldKind::Signature | NativeFieldKind::Unknown => {
            return Err(FieldWrite::Unsupported);
        }
    }
    Ok(())
}

fn fill_coordinates(
    doc: &mut PdfDocument,
    data: &FormData,
    options: &FillOptions,
) -> Result<FillingResult, FillError> {
    let mut result = FillingResult::new(FillMethod::Coordinate);
    result.fields_detected = data.len();
    let mut painter = TextPainter::new(options.font_color);

    let pre_mapped = data.values().any(|v| placed_value(v).is_some());

    if pre_mapped {
        for (key, value) in data {
            let Some(placed) = placed_value(value) else {
                result.skip(format!("Value for '{}' has no coordinates", key));
                continue;
            };
            let page = match placed.page {
                Ok(page) => page,
                Err(raw) => {
                    result.error(format!("Field '{}': page {} is not a page number", key, raw));
                    continue;
                }
            };
            let Some(text) = placed.text else {
                result.skip(format!("No value to draw for '{}'", key));
                continue;
            };
            draw_value(doc, &mut painter, &mut result, key, page, placed.x, placed.y, &text, options);
        }
    } else {
        let entries: Vec<(&String, &Value)> = data.iter().filter(|(_, v)| !v.is_null()).collect();
        for key in data.iter().filter(|(_, v)| v.is_null()).map(|(k, _)| k) {
            result.skip(format!("No data for '{}'", key));
        }

        let page = doc.page_size(1).map_err(FillError::Unreadable)?;
        let layout = ColumnLayout::new(page, options.font_size);
        let slots = layout.slots(entries.len(), options.smart_positioning);

        for ((key, value), slot) in entries.into_iter().zip(slots) {
            let Some(slot) = slot else {
                result.error(format!("No room left on page 1 for '{}'", key));
                continue;
            };
            let Some(text) = scalar_text(value) else {
                result.skip(format!("Value for '{}' is not a scalar", key));
                continue;
            };
            draw_value(doc, &mut painter, &mut result, key, 1, slot.x, slot.y, &text, options);
        }
    }

    painter.commit(doc).map_err(FillError::Save)?;
    Ok(result)
}

/// Queue one value after range checks and sanitization
#[allow(clippy::too_many_arguments)]
fn draw_value(
    doc: &PdfDocument,
    painter: &mut TextPainter,
    result: &mut FillingResult,
    name: &str,
    page: usize,
    x: f32,
    y: f32,
    text: &str,
    options: &FillOptions,
) {
    let page_count = doc.page_count();
    if page == 0 || page > page_count {
        result.error(format!(
            "Field '{}': page {} is outside the document (1-{})",
            name, page, page_count
        ));
        return;
    }

    let size = match doc.page_size(page) {
        Ok(size) => size,
        Err(e) => {
            result.error(format!("Field '{}': {}", name, e));
            return;
        }
    };
    if !size.contains(x, y) {
        result.error(format!(
            "Field '{}': position ({}, {}) is outside page {} ({}x{})",
            name, x, y, page, size.width, size.height
        ));
        return;
    }

    let text = sanitize_for_pdf(text, options.sanitize_diacritics);
    if painter.draw_text(page, x, y, options.font_size, &text) {
        result.warn(format!(
            "Value for '{}' has characters the standard font cannot show; they were replaced",
            name
        ));
    }
    result.filled();
}
