//! Label matching and field classification
//!
//! Each rectangle takes the nearest qualifying word as its label. A word
//! qualifies when it sits above the rectangle's top edge or left of it at
//! about the same height, lies within the distance bound, and was recognized
//! with confidence above the threshold.
//!
//! Rectangles are visited in scan order and a word, once taken, is not
//! offered to later rectangles. Among equally distant words the first one in
//! recognition order wins; a higher OCR confidence does not break ties.

use std::collections::{HashMap, HashSet};

use crate::config::DetectionConfig;
use crate::geometry::PageTransform;
use crate::text::{slugify, strip_diacritics};

use super::types::{DetectedField, FieldType, Rectangle, RecognizedText};

/// Pair rectangles of one page with labels and build fields
pub fn match_fields(
    rectangles: &[Rectangle],
    texts: &[RecognizedText],
    transform: &PageTransform,
    config: &DetectionConfig,
) -> Vec<DetectedField> {
    let mut claimed = vec![false; texts.len()];
    let mut fields = Vec::with_capacity(rectangles.len());

    for rect in rectangles {
        let label = find_label(rect, texts, &claimed, config).map(|index| {
            claimed[index] = true;
            &texts[index]
        });

        let points = transform.raster_to_points_rect(rect.bounds());
        let (label_text, confidence) = match label {
            Some(text) => (text.text.trim().to_string(), text.confidence),
            None => (String::new(), config.unlabeled_confidence),
        };

        let name = match slugify(&label_text) {
            slug if !slug.is_empty() => slug,
            _ => format!(
                "field_{}_{}_{}",
                rect.page,
                points.x.round() as i64,
                points.y.round() as i64
            ),
        };

        let field_type = classify_field(
            points.width,
            points.height,
            &label_text,
            &config.signature_keywords,
        );

        fields.push(DetectedField {
            name,
            label: label_text,
            x: points.x,
            y: points.y,
            width: points.width,
            height: points.height,
            page: rect.page,
            confidence,
            field_type,
        });
    }

    fields
}

/// Index of the nearest unclaimed qualifying text
fn find_label(
    rect: &Rectangle,
    texts: &[RecognizedText],
    claimed: &[bool],
    config: &DetectionConfig,
) -> Option<usize> {
    let bounds = rect.bounds();
    let mut best: Option<(usize, f32)> = None;

    for (index, text) in texts.iter().enumerate() {
        if claimed[index] || text.confidence <= config.min_label_confidence {
            continue;
        }

        let above = text.y < rect.y && (rect.y - text.y) as f32 <= config.label_max_distance;
        let left = text.x < rect.x
            && (text.y as f32 - rect.y as f32).abs() <= config.label_left_tolerance;
        if !above && !left {
            continue;
        }

        let distance = bounds.gap_distance(&text.bounds());
        if distance > config.label_max_distance {
            continue;
        }

        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((index, distance));
        }
    }

    best.map(|(index, _)| index)
}

/// Field type from size in points and label
pub fn classify_field(width: f32, height: f32, label: &str, signature_keywords: &[String]) -> FieldType {
    if width < 30.0 && height < 30.0 && (width - height).abs() < 10.0 {
        return FieldType::Checkbox;
    }

    let folded = strip_diacritics(label).to_lowercase();
    let is_signature_label = signature_keywords
        .iter()
        .any(|keyword| folded.contains(&strip_diacritics(keyword).to_lowercase()));
    if is_signature_label && width * height > 5000.0 {
        return FieldType::Signature;
    }

    FieldType::Text
}

/// Suffix repeated names with `_2`, `_3`, ... in field order
pub fn assign_unique_names(fields: &mut [DetectedField]) {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let taken: HashSet<String> = fields.iter().map(|f| f.name.clone()).collect();

    for field in fields.iter_mut() {
        let count = {
            let count = seen.entry(field.name.clone()).or_insert(0);
            *count += 1;
            *count
        };
        if count == 1 {
            continue;
        }

        let mut suffix = count;
        let mut candidate = format!("{}_{}", field.name, suffix);
        while taken.contains(&candidate) || seen.contains_key(&candidate) {
            suffix += 1;
            candidate = format!("{}_{}", field.name, suffix);
        }
        seen.insert(field.name.clone(), suffix);
        seen.insert(candidate.clone(), 1);
        field.name = candidate;
    }
}
