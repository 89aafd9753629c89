//! Field mappings
//!
//! A mapping says where each named field of a form lives:
//!
//! ```json
//! {
//!   "version": "2023",
//!   "fields": { "income": { "pdfField": "P_10", "page": 1, "x": 320.5, "y": 611 } },
//!   "calculations": { "taxDue": "taxBase * 0.17" },
//!   "metadata": { "generatedBy": "...", "generatedAt": "...", "pageCount": 2, "pageSize": { "width": 595, "height": 842 } }
//! }
//! ```
//!
//! Mappings are produced from detection results, merged with hand-edited
//! ones, compared and checked against the document they describe.

mod generator;
mod types;

pub use generator::{
    compare_mappings, generate_mapping, merge_with_existing_mapping, validate_mapping,
    GENERATOR_ID,
};
pub use types::{
    DetectionInfo, FieldChange, FieldMapping, FormMapping, MappingDiff, MappingError,
    MappingIssue, MappingMetadata, MappingResult, MergeOptions, MergeOutcome, ValidationReport,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_mapping() {
        let mapping = FormMapping::from_json(
            r#"{"version": "2023", "fields": {"pesel": {"pdfField": "P_1", "x": 40, "y": 760}}}"#,
        )
        .unwrap();

        let pesel = &mapping.fields["pesel"];
        assert_eq!(pesel.page, 1);
        assert_eq!((pesel.x, pesel.y), (Some(40.0), Some(760.0)));
        assert!(mapping.calculations.is_empty());
        assert!(mapping.metadata.is_none());
    }

    #[test]
    fn test_json_round_trip() {
        let mut mapping = FormMapping::new("2023");
        mapping.fields.insert("income".into(), FieldMapping::at("P_10", 1, 320.5, 611.0));
        mapping
            .calculations
            .insert("taxDue".into(), "taxBase * 0.17".into());

        let json = mapping.to_json_pretty().unwrap();
        assert!(json.contains("\"pdfField\": \"P_10\""));
        assert!(!json.contains("detection"));
        assert_eq!(FormMapping::from_json(&json).unwrap(), mapping);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            FormMapping::from_json("{\"fields\": {}}"),
            Err(MappingError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.json");
        std::fs::write(&path, r#"{"version": "1"}"#).unwrap();

        let mapping = FormMapping::load_from_path(&path).await.unwrap();
        assert_eq!(mapping.version, "1");

        let missing = FormMapping::load_from_path(dir.path().join("missing.json")).await;
        assert!(matches!(missing, Err(MappingError::Io { .. })));
    }
}
