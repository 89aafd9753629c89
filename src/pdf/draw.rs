//! Drawing text into page content
//!
//! Text is queued per page and written on `commit`: every touched page gets
//! the standard Helvetica font under [`FILL_FONT_RESOURCE`] and one appended
//! content stream. Existing content is wrapped in `q`/`Q` so its graphics
//! state cannot leak into the drawn text.

use std::collections::BTreeMap;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Object, ObjectId, Stream, StringFormat};

use crate::document::{DocumentError, DocumentResult};
use crate::text::encode_win_ansi;

use super::{resolve, PdfDocument};

/// Resource name of the font used for filled values
pub const FILL_FONT_RESOURCE: &str = "FFill";

/// Queues text operations per page
#[derive(Debug, Clone)]
pub struct TextPainter {
    color: [f32; 3],
    operations: BTreeMap<usize, Vec<Operation>>,
}

impl TextPainter {
    /// `color` is RGB in 0-1
    pub fn new(color: [f32; 3]) -> Self {
        Self {
            color: color.map(|c| c.clamp(0.0, 1.0)),
            operations: BTreeMap::new(),
        }
    }

    /// Queue `text` with its baseline origin at `(x, y)` points on `page` (1-indexed).
    ///
    /// Returns true when a character had no WinAnsi code and was replaced.
    pub fn draw_text(&mut self, page: usize, x: f32, y: f32, font_size: f32, text: &str) -> bool {
        let (bytes, lossy) = encode_win_ansi(text);
        let [r, g, b] = self.color;

        let ops = self.operations.entry(page).or_default();
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new(
            "Tf",
            vec![Object::Name(FILL_FONT_RESOURCE.as_bytes().to_vec()), real(font_size)],
        ));
        ops.push(Operation::new("rg", vec![real(r), real(g), real(b)]));
        ops.push(Operation::new("Td", vec![real(x), real(y)]));
        ops.push(Operation::new("Tj", vec![Object::String(bytes, StringFormat::Literal)]));
        ops.push(Operation::new("ET", vec![]));
        ops.push(Operation::new("Q", vec![]));

        lossy
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Pages with queued text
    pub fn pages(&self) -> Vec<usize> {
        self.operations.keys().copied().collect()
    }

    /// Write queued text into the document
    pub fn commit(self, doc: &mut PdfDocument) -> DocumentResult<()> {
        if self.operations.is_empty() {
            return Ok(());
        }

        let font_id = doc.inner_mut().add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });

        for (page, operations) in self.operations {
            let page_id = doc
                .page_id(page)
                .ok_or_else(|| DocumentError::ItemNotFound(page.saturating_sub(1)))?;
            add_font_resource(doc, page_id, font_id)?;
            let content = Content { operations }.encode()?;
            append_content(doc, page_id, content)?;
        }

        Ok(())
    }
}

fn real(value: f32) -> Object {
    Object::Real(value.into())
}

fn add_font_resource(doc: &mut PdfDocument, page_id: ObjectId, font_id: ObjectId) -> DocumentResult<()> {
    let own = doc.dictionary_mut(page_id)?.remove(b"Resources");
    let resources = match own {
        Some(resources) => resources,
        // Copy inherited resources so the shared parent is left alone
        None => doc
            .inherited_attribute(page_id, b"Resources")
            .map(|obj| resolve(doc.inner(), obj).clone())
            .unwrap_or_else(|| Object::Dictionary(Dictionary::new())),
    };

    let resources = match resources {
        Object::Reference(id) => {
            let mut dict = doc.inner().get_dictionary(id)?.clone();
            insert_font(doc, &mut dict, font_id);
            *doc.dictionary_mut(id)? = dict;
            Object::Reference(id)
        }
        Object::Dictionary(mut dict) => {
            insert_font(doc, &mut dict, font_id);
            Object::Dictionary(dict)
        }
        _ => {
            return Err(DocumentError::InvalidStructure(
                "page Resources is not a dictionary".to_string(),
            ))
        }
    };

    doc.dictionary_mut(page_id)?.set("Resources", resources);
    Ok(())
}

fn insert_font(doc: &PdfDocument, resources: &mut Dictionary, font_id: ObjectId) {
    let mut fonts = match resources.get(b"Font") {
        Ok(fonts) => resolve(doc.inner(), fonts)
            .as_dict()
            .map(Clone::clone)
            .unwrap_or_else(|_| Dictionary::new()),
        Err(_) => Dictionary::new(),
    };
    fonts.set(FILL_FONT_RESOURCE, font_id);
    resources.set("Font", fonts);
}

fn append_content(doc: &mut PdfDocument, page_id: ObjectId, content: Vec<u8>) -> DocumentResult<()> {
    let existing = doc.dictionary_mut(page_id)?.remove(b"Contents");

    let streams: Vec<Object> = match existing {
        Some(Object::Reference(id)) => match doc.inner().get_object(id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(id)],
        },
        Some(Object::Array(items)) => items,
        Some(Object::Stream(stream)) => vec![Object::Reference(doc.inner_mut().add_object(stream))],
        _ => Vec::new(),
    };

    let document = doc.inner_mut();
    let added = document.add_object(Stream::new(dictionary! {}, content));

    let contents = if streams.is_empty() {
        vec![Object::Reference(added)]
    } else {
        let open = document.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
        let close = document.add_object(Stream::new(dictionary! {}, b"\nQ\n".to_vec()));
        let mut contents = Vec::with_capacity(streams.len() + 3);
        contents.push(Object::Reference(open));
        contents.extend(streams);
        contents.push(Object::Reference(close));
        contents.push(Object::Reference(added));
        contents
    };

    doc.dictionary_mut(page_id)?.set("Contents", contents);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures;

    fn text_operands(doc: &PdfDocument, page: usize) -> Vec<Vec<u8>> {
        let page_id = doc.page_id(page).unwrap();
        let raw = doc.inner().get_page_content(page_id).unwrap();
        Content::decode(&raw)
            .unwrap()
            .operations
            .into_iter()
            .filter(|op| op.operator == "Tj")
            .filter_map(|op| match op.operands.first() {
                Some(Object::String(bytes, _)) => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_commit_appends_text_and_font() {
        let data = fixtures::blank_pdf(2, 595.0, 842.0);
        let mut doc = PdfDocument::load(&data).unwrap();

        let mut painter = TextPainter::new([0.0, 0.0, 0.0]);
        assert!(!painter.draw_text(2, 100.0, 700.0, 10.0, "Kowalski"));
        assert_eq!(painter.pages(), vec![2]);
        painter.commit(&mut doc).unwrap();

        let saved = doc.save().unwrap();
        let doc = PdfDocument::load(&saved).unwrap();

        assert_eq!(text_operands(&doc, 2), vec![b"page 2".to_vec(), b"Kowalski".to_vec()]);
        assert_eq!(text_operands(&doc, 1), vec![b"page 1".to_vec()]);

        let page = doc.inner().get_dictionary(doc.page_id(2).unwrap()).unwrap();
        let resources = resolve(doc.inner(), page.get(b"Resources").unwrap()).as_dict().unwrap();
        let fonts = resolve(doc.inner(), resources.get(b"Font").unwrap()).as_dict().unwrap();
        assert!(fonts.has(b"F1"), "inherited fonts are kept");
        let fill_font = resolve(doc.inner(), fonts.get(FILL_FONT_RESOURCE.as_bytes()).unwrap())
            .as_dict()
            .unwrap();
        assert_eq!(fill_font.get(b"BaseFont").unwrap().as_name().unwrap(), b"Helvetica");
    }

    #[test]
    fn test_existing_content_is_wrapped() {
        let data = fixtures::blank_pdf(1, 595.0, 842.0);
        let mut doc = PdfDocument::load(&data).unwrap();

        let mut painter = TextPainter::new([0.0, 0.0, 1.0]);
        painter.draw_text(1, 10.0, 10.0, 12.0, "x");
        painter.commit(&mut doc).unwrap();

        let page = doc.inner().get_dictionary(doc.page_id(1).unwrap()).unwrap();
        let contents = page.get(b"Contents").unwrap().as_array().unwrap();
        assert_eq!(contents.len(), 4);
    }

    #[test]
    fn test_unencodable_text_is_reported() {
        let mut painter = TextPainter::new([0.0, 0.0, 0.0]);
        assert!(painter.draw_text(1, 0.0, 0.0, 10.0, "Łódź"));
    }

    #[test]
    fn test_missing_page_fails_commit() {
        let data = fixtures::blank_pdf(1, 595.0, 842.0);
        let mut doc = PdfDocument::load(&data).unwrap();
        let mut painter = TextPainter::new([0.0, 0.0, 0.0]);
        painter.draw_text(5, 0.0, 0.0, 10.0, "x");
        assert!(matches!(painter.commit(&mut doc), Err(DocumentError::ItemNotFound(4))));
    }
}
