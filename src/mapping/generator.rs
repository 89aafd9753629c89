//! Mapping generation, merging, comparison and validation

use chrono::Utc;

use crate::detection::{DetectedField, DetectionResult};
use crate::geometry::PageSize;
use crate::pdf::PdfDocument;

use super::types::{
    DetectionInfo, FieldChange, FieldMapping, FormMapping, MappingDiff, MappingIssue,
    MappingMetadata, MappingResult, MergeOptions, MergeOutcome, ValidationReport,
};

/// Value of `metadata.generatedBy` in generated mappings
pub const GENERATOR_ID: &str = concat!("pdf-form-engine/", env!("CARGO_PKG_VERSION"));

fn entry_for(field: &DetectedField) -> FieldMapping {
    FieldMapping {
        pdf_field: field.name.clone(),
        page: field.page,
        x: Some(field.x),
        y: Some(field.y),
        detection: Some(DetectionInfo {
            label: field.label.clone(),
            confidence: field.confidence,
            field_type: field.field_type,
            width: field.width,
            height: field.height,
        }),
    }
}

/// Build a mapping from detected fields
///
/// The page count in the metadata is the highest page a field is on; use
/// [`DetectionResult::to_mapping`] for the document's real page count.
pub fn generate_mapping(fields: &[DetectedField], version: &str) -> FormMapping {
    let mut mapping = FormMapping::new(version);
    for field in fields {
        mapping.fields.insert(field.name.clone(), entry_for(field));
    }
    mapping.metadata = Some(MappingMetadata {
        generated_by: GENERATOR_ID.to_string(),
        generated_at: Utc::now(),
        page_count: fields.iter().map(|f| f.page).max().unwrap_or(0),
        page_size: PageSize::default(),
    });

    tracing::debug!("Generated mapping {} with {} fields", version, mapping.fields.len());
    mapping
}

impl DetectionResult {
    pub fn to_mapping(&self, version: &str) -> FormMapping {
        let mut mapping = generate_mapping(&self.fields, version);
        if let Some(metadata) = mapping.metadata.as_mut() {
            metadata.page_count = self.page_count;
            metadata.page_size = self.page_size;
        }
        mapping
    }
}

/// Merge a new detection run into an existing mapping
///
/// New names are always added. Existing entries keep their target field and
/// only get new coordinates with `overwrite_existing` and without
/// `only_add_new`.
pub fn merge_with_existing_mapping(
    detected: &[DetectedField],
    existing: &FormMapping,
    options: &MergeOptions,
) -> MergeOutcome {
    let mut mapping = existing.clone();
    let mut added = Vec::new();
    let mut updated = Vec::new();
    let mut ignored = Vec::new();
    let overwrite = options.overwrite_existing && !options.only_add_new;

    for field in detected {
        if field.confidence < options.min_confidence {
            ignored.push(field.name.clone());
            continue;
        }

        match mapping.fields.get_mut(&field.name) {
            None => {
                mapping.fields.insert(field.name.clone(), entry_for(field));
                added.push(field.name.clone());
            }
            Some(entry) if overwrite => {
                let fresh = entry_for(field);
                entry.page = fresh.page;
                entry.x = fresh.x;
                entry.y = fresh.y;
                entry.detection = fresh.detection;
                updated.push(field.name.clone());
            }
            Some(_) => {}
        }
    }

    tracing::info!(
        "Merged detection into mapping {}: {} added, {} updated, {} ignored",
        mapping.version,
        added.len(),
        updated.len(),
        ignored.len()
    );
    MergeOutcome {
        mapping,
        added,
        updated,
        ignored,
    }
}

/// What changed from `before` to `after`
pub fn compare_mappings(before: &FormMapping, after: &FormMapping) -> MappingDiff {
    let mut diff = MappingDiff::default();

    for (name, old) in &before.fields {
        let Some(new) = after.fields.get(name) else {
            diff.removed.push(name.clone());
            continue;
        };

        let mut changes = Vec::new();
        if old.page != new.page {
            changes.push(FieldChange::Page {
                before: old.page,
                after: new.page,
            });
        }
        if old.x != new.x {
            changes.push(FieldChange::X {
                before: old.x,
                after: new.x,
            });
        }
        if old.y != new.y {
            changes.push(FieldChange::Y {
                before: old.y,
                after: new.y,
            });
        }
        if !changes.is_empty() {
            diff.changed.insert(name.clone(), changes);
        }
    }

    diff.added = after
        .fields
        .keys()
        .filter(|name| !before.fields.contains_key(*name))
        .cloned()
        .collect();

    diff
}

/// Check mapping positions against a document's pages
pub fn validate_mapping(bytes: &[u8], mapping: &FormMapping) -> MappingResult<ValidationReport> {
    let doc = PdfDocument::load(bytes)?;
    let sizes = doc.page_sizes();
    let page_count = sizes.len();
    let mut issues = Vec::new();

    for (name, entry) in &mapping.fields {
        let mut issue = |message: String| {
            issues.push(MappingIssue {
                field: name.clone(),
                message: format!("field '{}': {}", name, message),
            })
        };

        if entry.page == 0 || entry.page > page_count {
            issue(format!(
                "page {} is outside the document (1-{})",
                entry.page, page_count
            ));
            continue;
        }
        let size = sizes[entry.page - 1];

        if let Some(x) = entry.x {
            if !(0.0..=size.width).contains(&x) {
                issue(format!(
                    "x={} is outside page width {} (page {})",
                    x, size.width, entry.page
                ));
            }
        }
        if let Some(y) = entry.y {
            if !(0.0..=size.height).contains(&y) {
                issue(format!(
                    "y={} is outside page height {} (page {})",
                    y, size.height, entry.page
                ));
            }
        }
    }

    if !issues.is_empty() {
        tracing::warn!("Mapping {} has {} invalid entries", mapping.version, issues.len());
    }
    Ok(ValidationReport { page_count, issues })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::FieldType;
    use crate::pdf::fixtures;

    fn detected(name: &str, page: usize, x: f32, y: f32, confidence: f32) -> DetectedField {
        DetectedField {
            name: name.to_string(),
            label: name.to_string(),
            x,
            y,
            width: 120.0,
            height: 18.0,
            page,
            confidence,
            field_type: FieldType::Text,
        }
    }

    fn sample() -> Vec<DetectedField> {
        vec![
            detected("imie", 1, 49.5, 700.25, 0.93),
            detected("nazwisko", 1, 300.0, 700.25, 0.88),
            detected("field_2_60_100", 2, 30.0, 50.0, 0.5),
        ]
    }

    #[test]
    fn test_generate_mapping_keeps_detection_data() {
        let mapping = generate_mapping(&sample(), "2023");
        assert_eq!(mapping.version, "2023");
        assert_eq!(mapping.fields.len(), 3);

        let imie = &mapping.fields["imie"];
        assert_eq!(imie.pdf_field, "imie");
        assert_eq!((imie.page, imie.x, imie.y), (1, Some(49.5), Some(700.25)));
        let info = imie.detection.as_ref().unwrap();
        assert_eq!(info.label, "imie");
        assert_eq!(info.width, 120.0);

        assert_eq!(mapping.metadata.unwrap().page_count, 2);
    }

    #[test]
    fn test_merge_round_trip_reproduces_coordinates() {
        let fields = sample();
        let original = generate_mapping(&fields, "1");
        let options = MergeOptions {
            overwrite_existing: true,
            min_confidence: 0.0,
            ..MergeOptions::default()
        };

        let outcome = merge_with_existing_mapping(&fields, &original, &options);
        assert!(outcome.added.is_empty());
        assert!(outcome.ignored.is_empty());
        assert_eq!(outcome.mapping.fields, original.fields);
        assert!(compare_mappings(&original, &outcome.mapping).is_empty());
    }

    #[test]
    fn test_merge_rules() {
        let mut existing = FormMapping::new("1");
        existing
            .fields
            .insert("imie".to_string(), FieldMapping::at("P_7", 1, 10.0, 10.0));

        let fields = vec![
            detected("imie", 1, 49.5, 700.0, 0.9),
            detected("pesel", 1, 60.0, 650.0, 0.9),
            detected("szum", 1, 1.0, 1.0, 0.2),
        ];

        // Existing entries are kept by default
        let outcome = merge_with_existing_mapping(&fields, &existing, &MergeOptions::default());
        assert_eq!(outcome.added, vec!["pesel"]);
        assert_eq!(outcome.ignored, vec!["szum"]);
        assert!(outcome.updated.is_empty());
        assert_eq!(outcome.mapping.fields["imie"].x, Some(10.0));

        // Overwrite replaces coordinates but not the target field
        let overwrite = MergeOptions {
            overwrite_existing: true,
            ..MergeOptions::default()
        };
        let outcome = merge_with_existing_mapping(&fields, &existing, &overwrite);
        assert_eq!(outcome.updated, vec!["imie"]);
        assert_eq!(outcome.mapping.fields["imie"].x, Some(49.5));
        assert_eq!(outcome.mapping.fields["imie"].pdf_field, "P_7");

        // Only-add-new wins over overwrite
        let add_only = MergeOptions {
            only_add_new: true,
            ..overwrite
        };
        let outcome = merge_with_existing_mapping(&fields, &existing, &add_only);
        assert!(outcome.updated.is_empty());
        assert_eq!(outcome.mapping.fields["imie"].x, Some(10.0));
        assert_eq!(outcome.added, vec!["pesel"]);
    }

    #[test]
    fn test_compare_mappings() {
        let mut before = FormMapping::new("1");
        before.fields.insert("a".into(), FieldMapping::at("a", 1, 10.0, 20.0));
        before.fields.insert("b".into(), FieldMapping::at("b", 1, 10.0, 20.0));
        before.fields.insert("gone".into(), FieldMapping::at("gone", 1, 0.0, 0.0));

        let mut after = FormMapping::new("2");
        after.fields.insert("a".into(), FieldMapping::at("a", 1, 10.0, 20.0));
        after.fields.insert("b".into(), FieldMapping::at("b", 2, 15.0, 20.0));
        after.fields.insert("new".into(), FieldMapping::at("new", 1, 0.0, 0.0));

        let diff = compare_mappings(&before, &after);
        assert_eq!(diff.added, vec!["new"]);
        assert_eq!(diff.removed, vec!["gone"]);
        assert_eq!(diff.changed.len(), 1);
        assert_eq!(
            diff.changed["b"],
            vec![
                FieldChange::Page { before: 1, after: 2 },
                FieldChange::X {
                    before: Some(10.0),
                    after: Some(15.0)
                },
            ]
        );
    }

    #[test]
    fn test_validate_flags_out_of_page_positions() {
        let pdf = fixtures::blank_pdf(1, 595.0, 842.0);
        let mut mapping = FormMapping::new("1");
        mapping.fields.insert("ok".into(), FieldMapping::at("ok", 1, 100.0, 100.0));
        mapping.fields.insert("wide".into(), FieldMapping::at("wide", 1, 700.0, 100.0));
        mapping.fields.insert("late".into(), FieldMapping::at("late", 3, 10.0, 10.0));

        let report = validate_mapping(&pdf, &mapping).unwrap();
        assert!(!report.is_valid());
        assert_eq!(report.page_count, 1);
        assert_eq!(report.issues.len(), 2);

        let wide = report.issues.iter().find(|i| i.field == "wide").unwrap();
        assert_eq!(
            wide.message,
            "field 'wide': x=700 is outside page width 595 (page 1)"
        );
        let late = report.issues.iter().find(|i| i.field == "late").unwrap();
        assert!(late.message.contains("page 3"));
    }

    #[test]
    fn test_validate_rejects_unreadable_document() {
        assert!(validate_mapping(b"nope", &FormMapping::new("1")).is_err());
    }
}
