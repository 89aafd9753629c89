//! PDF object-model access
//!
//! Loads documents with lopdf for everything that rewrites them: reading and
//! setting native form fields, drawing text into page content, flattening,
//! saving. Rendering for detection goes through [`crate::document`] instead.

mod acroform;
mod draw;

use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};

use crate::document::{DocumentError, DocumentResult};
use crate::geometry::PageSize;

pub use acroform::{FlattenReport, FormField, NativeFieldKind, Widget};
pub use draw::{TextPainter, FILL_FONT_RESOURCE};

/// Parents followed when resolving inherited page attributes
const MAX_INHERITANCE_DEPTH: usize = 32;

/// A PDF document loaded for modification
pub struct PdfDocument {
    doc: Document,
}

impl PdfDocument {
    /// Parse a document held in memory
    pub fn load(data: &[u8]) -> DocumentResult<Self> {
        if !crate::document::looks_like_pdf(data) {
            return Err(DocumentError::UnsupportedFormat(
                "missing %PDF header".to_string(),
            ));
        }
        let doc = Document::load_mem(data).map_err(|e| DocumentError::ParseError(e.to_string()))?;
        if doc.get_pages().is_empty() {
            return Err(DocumentError::InvalidStructure("document has no pages".to_string()));
        }
        Ok(Self { doc })
    }

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    /// Object id of a page (1-indexed)
    pub fn page_id(&self, page: usize) -> Option<ObjectId> {
        self.doc.get_pages().get(&(page as u32)).copied()
    }

    /// Page object ids in page order
    pub fn page_ids(&self) -> Vec<ObjectId> {
        self.doc.get_pages().into_values().collect()
    }

    /// Size of a page (1-indexed) from its MediaBox, inherited through the
    /// page tree; A4 when none is found
    pub fn page_size(&self, page: usize) -> DocumentResult<PageSize> {
        let page_id = self
            .page_id(page)
            .ok_or_else(|| DocumentError::ItemNotFound(page.saturating_sub(1)))?;
        Ok(self.media_box_size(page_id).unwrap_or_default())
    }

    /// Sizes of all pages in order
    pub fn page_sizes(&self) -> Vec<PageSize> {
        self.page_ids()
            .into_iter()
            .map(|id| self.media_box_size(id).unwrap_or_default())
            .collect()
    }

    fn media_box_size(&self, page_id: ObjectId) -> Option<PageSize> {
        let media_box = self.inherited_attribute(page_id, b"MediaBox")?;
        let values = resolve(&self.doc, media_box).as_array().ok()?;
        if values.len() != 4 {
            return None;
        }
        let llx = number(resolve(&self.doc, &values[0]))?;
        let lly = number(resolve(&self.doc, &values[1]))?;
        let urx = number(resolve(&self.doc, &values[2]))?;
        let ury = number(resolve(&self.doc, &values[3]))?;
        Some(PageSize::new((urx - llx).abs(), (ury - lly).abs()))
    }

    /// Attribute of a page dictionary or its nearest ancestor
    pub(crate) fn inherited_attribute(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut current = Some(page_id);
        for _ in 0..MAX_INHERITANCE_DEPTH {
            let id = current?;
            let dict = self.doc.get_dictionary(id).ok()?;
            if let Ok(value) = dict.get(key) {
                return Some(value);
            }
            current = dict.get(b"Parent").and_then(Object::as_reference).ok();
        }
        None
    }

    /// Document catalog
    pub(crate) fn catalog_id(&self) -> DocumentResult<ObjectId> {
        self.doc
            .trailer
            .get(b"Root")
            .and_then(Object::as_reference)
            .map_err(|_| DocumentError::InvalidStructure("trailer has no Root".to_string()))
    }

    pub(crate) fn dictionary_mut(&mut self, id: ObjectId) -> DocumentResult<&mut Dictionary> {
        self.doc
            .get_object_mut(id)
            .and_then(Object::as_dict_mut)
            .map_err(|_| DocumentError::InvalidStructure(format!("object {} {} is not a dictionary", id.0, id.1)))
    }

    pub fn inner(&self) -> &Document {
        &self.doc
    }

    pub fn inner_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// Serialize the document
    pub fn save(&mut self) -> DocumentResult<Vec<u8>> {
        let mut out = Vec::new();
        self.doc.save_to(&mut out)?;
        Ok(out)
    }
}

/// Follow a reference one level
pub(crate) fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        other => other,
    }
}

pub(crate) fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(f) => Some(*f as f32),
        _ => None,
    }
}

/// Decode a PDF text string (UTF-16BE with BOM, otherwise single-byte)
pub fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

/// Encode a PDF text string, single-byte when every character fits
pub fn encode_text_string(text: &str) -> Object {
    if text.chars().all(|c| (c as u32) < 0x80 || (0xA0..=0xFF).contains(&(c as u32))) {
        let bytes = text.chars().map(|c| c as u8).collect();
        return Object::String(bytes, StringFormat::Literal);
    }

    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_and_inherited_media_box() {
        let data = fixtures::blank_pdf(2, 300.0, 200.0);
        let doc = PdfDocument::load(&data).unwrap();
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.page_size(2).unwrap(), PageSize::new(300.0, 200.0));
        assert_eq!(doc.page_sizes().len(), 2);
        assert!(matches!(doc.page_size(3), Err(DocumentError::ItemNotFound(2))));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            PdfDocument::load(b"hello"),
            Err(DocumentError::UnsupportedFormat(_))
        ));
        assert!(PdfDocument::load(b"%PDF-1.4\nnot really").is_err());
    }

    #[test]
    fn test_text_string_round_trip() {
        for text in ["Jan", "Kraków", "Łódź"] {
            match encode_text_string(text) {
                Object::String(bytes, _) => assert_eq!(decode_text_string(&bytes), text),
                other => panic!("unexpected object {:?}", other),
            }
        }
    }

    #[test]
    fn test_save_is_deterministic() {
        let data = fixtures::blank_pdf(1, 595.0, 842.0);
        let first = PdfDocument::load(&data).unwrap().save().unwrap();
        let second = PdfDocument::load(&data).unwrap().save().unwrap();
        assert_eq!(first, second);
    }
}
