//! Native form fields (AcroForm)
//!
//! Fields are read depth-first from the AcroForm `Fields` array, so the
//! returned order is the document's declaration order. Names are fully
//! qualified (`parent.child`); `FT`, `Ff` and `V` are inherited from parents.

use std::collections::{HashMap, HashSet};

use lopdf::{Object, ObjectId};
use serde::Serialize;

use crate::document::{DocumentError, DocumentResult};
use crate::text::normalize_key;

use super::draw::TextPainter;
use super::{decode_text_string, encode_text_string, number, resolve, PdfDocument};

const MAX_FIELD_DEPTH: usize = 32;

const FLAG_READ_ONLY: i64 = 1;
const FLAG_RADIO: i64 = 1 << 15;
const FLAG_PUSH_BUTTON: i64 = 1 << 16;

/// Kind of a native form field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NativeFieldKind {
    Text,
    Checkbox,
    Radio,
    Dropdown,
    Button,
    Signature,
    Unknown,
}

impl NativeFieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NativeFieldKind::Text => "text",
            NativeFieldKind::Checkbox => "checkbox",
            NativeFieldKind::Radio => "radio",
            NativeFieldKind::Dropdown => "dropdown",
            NativeFieldKind::Button => "button",
            NativeFieldKind::Signature => "signature",
            NativeFieldKind::Unknown => "unknown",
        }
    }

    fn from_entries(field_type: Option<&[u8]>, flags: i64) -> Self {
        match field_type {
            Some(b"Tx") => NativeFieldKind::Text,
            Some(b"Btn") if flags & FLAG_PUSH_BUTTON != 0 => NativeFieldKind::Button,
            Some(b"Btn") if flags & FLAG_RADIO != 0 => NativeFieldKind::Radio,
            Some(b"Btn") => NativeFieldKind::Checkbox,
            Some(b"Ch") => NativeFieldKind::Dropdown,
            Some(b"Sig") => NativeFieldKind::Signature,
            _ => NativeFieldKind::Unknown,
        }
    }
}

/// Widget annotation of a field
#[derive(Debug, Clone, PartialEq)]
pub struct Widget {
    pub id: ObjectId,
    /// Appearance state name other than `Off`, for buttons
    pub on_state: Option<String>,
}

/// A terminal form field
#[derive(Debug, Clone)]
pub struct FormField {
    /// Fully qualified name
    pub name: String,
    /// Last name component
    pub partial_name: String,
    pub kind: NativeFieldKind,
    pub id: ObjectId,
    pub widgets: Vec<Widget>,
    pub value: Option<String>,
    /// Export values of a choice field
    pub options: Vec<String>,
    pub read_only: bool,
    pub max_len: Option<usize>,
}

impl FormField {
    /// Distinct on-states of the widgets, in widget order
    pub fn on_states(&self) -> Vec<String> {
        let mut states: Vec<String> = Vec::new();
        for state in self.widgets.iter().filter_map(|w| w.on_state.clone()) {
            if !states.contains(&state) {
                states.push(state);
            }
        }
        states
    }
}

#[derive(Debug, Clone, Default)]
struct Inherited {
    field_type: Option<Vec<u8>>,
    flags: i64,
    value: Option<String>,
    max_len: Option<usize>,
}

/// Values drawn while flattening
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlattenReport {
    pub fields: usize,
    pub drawn: usize,
    /// Fields whose value had characters the standard font cannot show
    pub lossy: Vec<String>,
    /// Fields with a value but no widget that has both a page and a Rect
    pub unplaced: Vec<String>,
}

impl PdfDocument {
    fn acroform_ref(&self) -> Option<&Object> {
        let catalog = self.doc.get_dictionary(self.catalog_id().ok()?).ok()?;
        catalog.get(b"AcroForm").ok()
    }

    /// Terminal fields in declaration order
    pub fn form_fields(&self) -> Vec<FormField> {
        let Some(acroform) = self.acroform_ref() else {
            return Vec::new();
        };
        let Ok(acroform) = resolve(&self.doc, acroform).as_dict() else {
            return Vec::new();
        };
        let Ok(roots) = acroform
            .get(b"Fields")
            .map(|fields| resolve(&self.doc, fields))
            .and_then(Object::as_array)
        else {
            return Vec::new();
        };

        let mut fields = Vec::new();
        let mut visited = HashSet::new();
        for root in roots {
            if let Object::Reference(id) = root {
                self.collect_field(*id, None, &Inherited::default(), 0, &mut visited, &mut fields);
            }
        }
        fields
    }

    pub fn has_form_fields(&self) -> bool {
        !self.form_fields().is_empty()
    }

    fn collect_field(
        &self,
        id: ObjectId,
        parent_name: Option<&str>,
        inherited: &Inherited,
        depth: usize,
        visited: &mut HashSet<ObjectId>,
        out: &mut Vec<FormField>,
    ) {
        if depth > MAX_FIELD_DEPTH || !visited.insert(id) {
            return;
        }
        let Ok(dict) = self.doc.get_dictionary(id) else {
            return;
        };

        let partial_name = dict
            .get(b"T")
            .ok()
            .and_then(|t| resolve(&self.doc, t).as_str().ok())
            .map(decode_text_string);
        let name = match (parent_name, &partial_name) {
            (Some(parent), Some(partial)) if !parent.is_empty() => format!("{}.{}", parent, partial),
            (_, Some(partial)) => partial.clone(),
            (Some(parent), None) => parent.to_string(),
            (None, None) => String::new(),
        };

        let inherited = Inherited {
            field_type: dict
                .get(b"FT")
                .and_then(Object::as_name)
                .map(|n| n.to_vec())
                .ok()
                .or_else(|| inherited.field_type.clone()),
            flags: dict
                .get(b"Ff")
                .ok()
                .and_then(|f| number(resolve(&self.doc, f)))
                .map(|f| f as i64)
                .unwrap_or(inherited.flags),
            value: dict
                .get(b"V")
                .ok()
                .and_then(|v| value_string(&self.doc, v))
                .or_else(|| inherited.value.clone()),
            max_len: dict
                .get(b"MaxLen")
                .ok()
                .and_then(|m| number(resolve(&self.doc, m)))
                .map(|m| m.max(0.0) as usize)
                .or(inherited.max_len),
        };

        let kids: Vec<ObjectId> = dict
            .get(b"Kids")
            .map(|kids| resolve(&self.doc, kids))
            .and_then(Object::as_array)
            .map(|kids| kids.iter().filter_map(|k| k.as_reference().ok()).collect())
            .unwrap_or_default();

        let child_fields: Vec<ObjectId> = kids
            .iter()
            .copied()
            .filter(|kid| {
                self.doc
                    .get_dictionary(*kid)
                    .map(|d| d.has(b"T"))
                    .unwrap_or(false)
            })
            .collect();

        if !child_fields.is_empty() {
            for kid in child_fields {
                self.collect_field(kid, Some(&name), &inherited, depth + 1, visited, out);
            }
            return;
        }

        if name.is_empty() {
            return;
        }

        let widget_ids = if kids.is_empty() { vec![id] } else { kids };
        let widgets = widget_ids
            .into_iter()
            .map(|widget_id| Widget {
                id: widget_id,
                on_state: self.on_state(widget_id),
            })
            .collect();

        let options = dict
            .get(b"Opt")
            .map(|opt| resolve(&self.doc, opt))
            .and_then(Object::as_array)
            .map(|items| items.iter().filter_map(|item| option_value(&self.doc, item)).collect())
            .unwrap_or_default();

        out.push(FormField {
            partial_name: partial_name.unwrap_or_else(|| name.clone()),
            name,
            kind: NativeFieldKind::from_entries(inherited.field_type.as_deref(), inherited.flags),
            id,
            widgets,
            value: inherited.value,
            options,
            read_only: inherited.flags & FLAG_READ_ONLY != 0,
            max_len: inherited.max_len,
        });
    }

    fn on_state(&self, widget_id: ObjectId) -> Option<String> {
        let widget = self.doc.get_dictionary(widget_id).ok()?;
        let appearance = resolve(&self.doc, widget.get(b"AP").ok()?).as_dict().ok()?;
        let normal = resolve(&self.doc, appearance.get(b"N").ok()?).as_dict().ok()?;
        normal
            .iter()
            .map(|(key, _)| key)
            .find(|key| key.as_slice() != b"Off")
            .map(|key| String::from_utf8_lossy(key).into_owned())
    }

    /// Set a text field's value
    pub fn set_text_field(&mut self, field: &FormField, value: &str) -> DocumentResult<()> {
        self.dictionary_mut(field.id)?.set("V", encode_text_string(value));
        self.drop_appearances(field)
    }

    /// Check or uncheck a checkbox
    pub fn set_checkbox(&mut self, field: &FormField, checked: bool) -> DocumentResult<()> {
        let default_on = field
            .widgets
            .iter()
            .find_map(|w| w.on_state.clone())
            .unwrap_or_else(|| "Yes".to_string());

        let value = if checked { default_on.clone() } else { "Off".to_string() };
        self.dictionary_mut(field.id)?
            .set("V", Object::Name(value.into_bytes()));

        for widget in &field.widgets {
            let state = if checked {
                widget.on_state.clone().unwrap_or_else(|| default_on.clone())
            } else {
                "Off".to_string()
            };
            self.dictionary_mut(widget.id)?
                .set("AS", Object::Name(state.into_bytes()));
        }
        Ok(())
    }

    /// Select the radio button whose state matches `value`
    pub fn set_radio(&mut self, field: &FormField, value: &str) -> DocumentResult<()> {
        let wanted = normalize_key(value);
        let selected = field
            .widgets
            .iter()
            .filter_map(|w| w.on_state.as_deref())
            .find(|state| *state == value || normalize_key(state) == wanted)
            .map(str::to_string)
            .ok_or_else(|| {
                DocumentError::InvalidStructure(format!(
                    "'{}' is not an option of radio group '{}' (options: {})",
                    value,
                    field.name,
                    field.on_states().join(", ")
                ))
            })?;

        self.dictionary_mut(field.id)?
            .set("V", Object::Name(selected.clone().into_bytes()));
        for widget in &field.widgets {
            let state = match &widget.on_state {
                Some(state) if *state == selected => selected.clone(),
                _ => "Off".to_string(),
            };
            self.dictionary_mut(widget.id)?
                .set("AS", Object::Name(state.into_bytes()));
        }
        Ok(())
    }

    /// Select a dropdown or list value
    pub fn set_choice(&mut self, field: &FormField, value: &str) -> DocumentResult<()> {
        let dict = self.dictionary_mut(field.id)?;
        dict.set("V", encode_text_string(value));
        dict.remove(b"I");
        self.drop_appearances(field)
    }

    /// Stale appearances would show the old value; viewers regenerate them
    fn drop_appearances(&mut self, field: &FormField) -> DocumentResult<()> {
        for widget in &field.widgets {
            self.dictionary_mut(widget.id)?.remove(b"AP");
        }
        Ok(())
    }

    /// Ask viewers to regenerate field appearances
    pub fn set_need_appearances(&mut self) -> DocumentResult<()> {
        match self.acroform_ref().cloned() {
            Some(Object::Reference(id)) => {
                self.dictionary_mut(id)?.set("NeedAppearances", true);
            }
            Some(Object::Dictionary(_)) => {
                let catalog_id = self.catalog_id()?;
                if let Ok(Object::Dictionary(acroform)) =
                    self.dictionary_mut(catalog_id)?.get_mut(b"AcroForm")
                {
                    acroform.set("NeedAppearances", true);
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Draw field values as page content and remove the form layer
    pub fn flatten_form(&mut self, font_size: f32, color: [f32; 3]) -> DocumentResult<FlattenReport> {
        let fields = self.form_fields();
        let pages = self.widget_pages();
        let mut painter = TextPainter::new(color);
        let mut report = FlattenReport {
            fields: fields.len(),
            ..FlattenReport::default()
        };

        for field in &fields {
            let mut lossy = false;
            let mut drawn = false;
            let mut unplaced = false;

            for widget in &field.widgets {
                let (Some(page), Some(rect)) = (pages.get(&widget.id).copied(), self.widget_rect(widget.id))
                else {
                    if self.widget_shows_value(field, widget.id) {
                        tracing::warn!(
                            "Widget {:?} of field '{}' has no page or Rect; its value is not drawn",
                            widget.id,
                            field.name
                        );
                        unplaced = true;
                    }
                    continue;
                };
                let [x0, y0, x1, y1] = rect;
                let height = y1 - y0;
                let size = font_size.min((height - 2.0).max(4.0));

                match field.kind {
                    NativeFieldKind::Text | NativeFieldKind::Dropdown => {
                        let Some(value) = field.value.as_deref().filter(|v| !v.is_empty()) else {
                            continue;
                        };
                        let baseline = y0 + (height - size) / 2.0 + size * 0.2;
                        lossy |= painter.draw_text(page, x0 + 2.0, baseline, size, value);
                        drawn = true;
                        // One drawing per field even when it has several widgets
                        break;
                    }
                    NativeFieldKind::Checkbox | NativeFieldKind::Radio => {
                        if !self.widget_is_on(widget.id) {
                            continue;
                        }
                        let x = x0 + ((x1 - x0) - size * 0.6) / 2.0;
                        let baseline = y0 + (height - size) / 2.0 + size * 0.2;
                        painter.draw_text(page, x, baseline, size, "X");
                        drawn = true;
                    }
                    _ => {}
                }
            }

            if drawn {
                report.drawn += 1;
            }
            if lossy {
                report.lossy.push(field.name.clone());
            }
            if unplaced && !drawn {
                report.unplaced.push(field.name.clone());
            }
        }

        painter.commit(self)?;

        let widget_ids: HashSet<ObjectId> = fields
            .iter()
            .flat_map(|f| f.widgets.iter().map(|w| w.id))
            .collect();
        self.remove_annotations(&widget_ids)?;

        let catalog_id = self.catalog_id()?;
        self.dictionary_mut(catalog_id)?.remove(b"AcroForm");
        self.doc.prune_objects();

        tracing::debug!("Flattened {} fields ({} drawn)", report.fields, report.drawn);
        Ok(report)
    }

    fn widget_shows_value(&self, field: &FormField, widget_id: ObjectId) -> bool {
        match field.kind {
            NativeFieldKind::Text | NativeFieldKind::Dropdown => {
                field.value.as_deref().is_some_and(|v| !v.is_empty())
            }
            NativeFieldKind::Checkbox | NativeFieldKind::Radio => self.widget_is_on(widget_id),
            _ => false,
        }
    }

    fn widget_is_on(&self, widget_id: ObjectId) -> bool {
        self.doc
            .get_dictionary(widget_id)
            .and_then(|w| w.get(b"AS"))
            .and_then(Object::as_name)
            .map(|state| state != b"Off")
            .unwrap_or(false)
    }

    fn widget_rect(&self, widget_id: ObjectId) -> Option<[f32; 4]> {
        let widget = self.doc.get_dictionary(widget_id).ok()?;
        let rect = resolve(&self.doc, widget.get(b"Rect").ok()?).as_array().ok()?;
        if rect.len() != 4 {
            return None;
        }
        let v: Vec<f32> = rect
            .iter()
            .filter_map(|n| number(resolve(&self.doc, n)))
            .collect();
        if v.len() != 4 {
            return None;
        }
        Some([v[0].min(v[2]), v[1].min(v[3]), v[0].max(v[2]), v[1].max(v[3])])
    }

    /// Page number of every annotation listed in a page's `Annots`, with the
    /// widget's `P` entry as fallback
    fn widget_pages(&self) -> HashMap<ObjectId, usize> {
        let mut pages = HashMap::new();
        let page_ids = self.page_ids();

        for (index, page_id) in page_ids.iter().enumerate() {
            let Ok(page) = self.doc.get_dictionary(*page_id) else {
                continue;
            };
            let Ok(annots) = page
                .get(b"Annots")
                .map(|a| resolve(&self.doc, a))
                .and_then(Object::as_array)
            else {
                continue;
            };
            for annot in annots {
                if let Object::Reference(id) = annot {
                    pages.entry(*id).or_insert(index + 1);
                }
            }
        }

        for field in self.form_fields() {
            for widget in field.widgets {
                if pages.contains_key(&widget.id) {
                    continue;
                }
                let page = self
                    .doc
                    .get_dictionary(widget.id)
                    .and_then(|w| w.get(b"P"))
                    .and_then(Object::as_reference)
                    .ok()
                    .and_then(|p| page_ids.iter().position(|id| *id == p));
                if let Some(index) = page {
                    pages.insert(widget.id, index + 1);
                }
            }
        }
        pages
    }

    fn remove_annotations(&mut self, ids: &HashSet<ObjectId>) -> DocumentResult<()> {
        for page_id in self.page_ids() {
            let annots = match self.doc.get_dictionary(page_id)?.get(b"Annots") {
                Ok(annots) => annots.clone(),
                Err(_) => continue,
            };

            let keep = |items: &[Object]| -> Vec<Object> {
                items
                    .iter()
                    .filter(|item| !matches!(item, Object::Reference(id) if ids.contains(id)))
                    .cloned()
                    .collect()
            };

            match annots {
                Object::Array(items) => {
                    let remaining = keep(&items);
                    let page = self.dictionary_mut(page_id)?;
                    if remaining.is_empty() {
                        page.remove(b"Annots");
                    } else {
                        page.set("Annots", remaining);
                    }
                }
                Object::Reference(array_id) => {
                    let remaining = match self.doc.get_object(array_id) {
                        Ok(Object::Array(items)) => keep(items),
                        _ => continue,
                    };
                    if let Ok(Object::Array(items)) = self.doc.get_object_mut(array_id) {
                        *items = remaining;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn value_string(doc: &lopdf::Document, value: &Object) -> Option<String> {
    match resolve(doc, value) {
        Object::String(bytes, _) => Some(decode_text_string(bytes)),
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        Object::Array(items) => items.first().and_then(|first| value_string(doc, first)),
        _ => None,
    }
}

fn option_value(doc: &lopdf::Document, item: &Object) -> Option<String> {
    match resolve(doc, item) {
        Object::String(bytes, _) => Some(decode_text_string(bytes)),
        Object::Array(pair) => pair.first().and_then(|export| option_value(doc, export)),
        _ => None,
    }
}
