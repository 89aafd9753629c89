//! Template form service
//!
//! Fills official forms by type and version: template document and mapping
//! come from a [`TemplateStore`], derived values from the
//! [`CalculatorRegistry`], and drawing from [`FormFiller::fill_with_mapping`].

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde_json::Value;
use tokio::time::timeout;

use crate::config::EngineConfig;
use crate::filler::{FillOptions, FillingResult, FormData, FormFiller};
use crate::mapping::FormMapping;

use super::cache::MappingCache;
use super::calculations::CalculatorRegistry;
use super::store::{FsTemplateStore, TemplateStore};
use super::types::{CacheStats, TemplateError, TemplateRequest, TemplateResult};

/// Timeout for drawing and saving one filled template
const FILL_TIMEOUT_SECS: u64 = 60;

/// Record key holding the derived values
pub const CALCULATED_FIELDS_KEY: &str = "calculatedFields";

/// Filled template with what went into it
#[derive(Debug, Clone)]
pub struct TemplateFill {
    pub bytes: Vec<u8>,
    pub result: FillingResult,
    /// Derived values, empty for forms without a calculator
    pub calculated: FormData,
}

pub struct TemplateFormService {
    store: Arc<dyn TemplateStore>,
    cache: MappingCache,
    calculators: CalculatorRegistry,
    filler: FormFiller,
    options: FillOptions,
    batch_workers: usize,
}

impl TemplateFormService {
    /// Service over the configured template directory
    pub fn new(config: &EngineConfig) -> Self {
        let store = Arc::new(FsTemplateStore::new(config.templates.root.clone()));
        let mut service = Self::with_store(store, config.fill.clone());
        service.batch_workers = config.templates.batch_workers.max(1);
        service
    }

    pub fn with_store(store: Arc<dyn TemplateStore>, options: FillOptions) -> Self {
        Self {
            store,
            cache: MappingCache::new(),
            calculators: CalculatorRegistry::with_defaults(),
            filler: FormFiller::new(),
            options,
            batch_workers: 4,
        }
    }

    pub fn with_calculators(mut self, calculators: CalculatorRegistry) -> Self {
        self.calculators = calculators;
        self
    }

    /// Mapping for a form, loaded once per service
    pub async fn load_mappings(&self, form_type: &str, version: &str) -> TemplateResult<Arc<FormMapping>> {
        self.cache
            .get_or_load(form_type, version, || self.store.load_mapping(form_type, version))
            .await
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Data with the form's derived values added
    ///
    /// Derived values go under `calculatedFields` and under their own names,
    /// unless the caller already supplied a value of that name.
    pub fn apply_calculations(&self, form_type: &str, data: &FormData) -> FormData {
        let mut prepared = data.clone();
        let Some(derived) = self.calculators.calculate(form_type, data) else {
            return prepared;
        };

        for (name, value) in &derived {
            prepared.entry(name.clone()).or_insert_with(|| value.clone());
        }
        prepared.insert(CALCULATED_FIELDS_KEY.to_string(), Value::Object(derived));
        prepared
    }

    /// Filled template bytes
    pub async fn fill_form(&self, form_type: &str, version: &str, data: &FormData) -> TemplateResult<Vec<u8>> {
        Ok(self.fill_form_detailed(form_type, version, data).await?.bytes)
    }

    pub async fn fill_form_detailed(
        &self,
        form_type: &str,
        version: &str,
        data: &FormData,
    ) -> TemplateResult<TemplateFill> {
        let template = self.store.load_template(form_type, version).await?;
        let mapping = self.load_mappings(form_type, version).await?;

        let prepared = self.apply_calculations(form_type, data);
        let calculated = match prepared.get(CALCULATED_FIELDS_KEY) {
            Some(Value::Object(derived)) => derived.clone(),
            _ => FormData::new(),
        };
        let drawable = drawable_values(&prepared);

        let filler = self.filler;
        let options = self.options.clone();
        let fill_result = timeout(
            Duration::from_secs(FILL_TIMEOUT_SECS),
            tokio::task::spawn_blocking(move || {
                filler.fill_with_mapping(&template, &mapping, &drawable, &options)
            }),
        )
        .await;

        let filled = match fill_result {
            Ok(join_result) => {
                join_result.map_err(|e| TemplateError::Task(format!("Task join error: {}", e)))??
            }
            Err(_) => return Err(TemplateError::Timeout(FILL_TIMEOUT_SECS)),
        };

        tracing::info!(
            "Filled {} {}: {} values drawn, {} errors",
            form_type,
            version,
            filled.result.fields_filled,
            filled.result.errors.len()
        );
        Ok(TemplateFill {
            bytes: filled.bytes,
            result: filled.result,
            calculated,
        })
    }

    /// Fill many forms with a bounded number in flight
    ///
    /// Results are in request order; one failure does not stop the others.
    pub async fn fill_batch(&self, requests: Vec<TemplateRequest>) -> Vec<TemplateResult<Vec<u8>>> {
        let total = requests.len();
        let results: Vec<TemplateResult<Vec<u8>>> = stream::iter(requests)
            .map(|request| async move {
                self.fill_form(&request.form_type, &request.version, &request.data)
                    .await
            })
            .buffered(self.batch_workers.max(1))
            .collect()
            .await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            tracing::warn!("Batch fill: {} of {} documents failed", failed, total);
        }
        results
    }
}

/// Record values as drawn on a template
///
/// Numbers get two decimals and `true` becomes a mark; `false`, null and
/// nested values are left out.
fn drawable_values(data: &FormData) -> FormData {
    data.iter()
        .filter(|(key, _)| key.as_str() != CALCULATED_FIELDS_KEY)
        .filter_map(|(key, value)| format_value(value).map(|text| (key.clone(), Value::String(text))))
        .collect()
}

pub fn format_value(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => n.as_f64().map(|f| format!("{:.2}", f)),
        Value::Bool(true) => Some("X".to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Bool(false) | Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::FieldMapping;
    use crate::pdf::fixtures::{self, drawn_text};
    use serde_json::json;
    use std::path::Path;

    fn record(value: Value) -> FormData {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn install_pit37(root: &Path) {
        let dir = root.join("PIT-37").join("2023");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("PIT-37_2023.pdf"), fixtures::blank_pdf(1, 595.0, 842.0)).unwrap();

        let mut mapping = FormMapping::new("2023");
        mapping
            .fields
            .insert("employmentIncome".into(), FieldMapping::at("P_10", 1, 400.0, 500.0));
        mapping
            .fields
            .insert("hasSpouse".into(), FieldMapping::at("P_5", 1, 50.0, 50.0));
        mapping
            .fields
            .insert("taxDue".into(), FieldMapping::at("P_45", 1, 400.0, 300.0));
        mapping
            .fields
            .insert("remarks".into(), FieldMapping::at("P_99", 1, 50.0, 100.0));
        mapping
            .calculations
            .insert("taxDue".into(), "taxBase * 0.17".into());
        std::fs::write(dir.join("mapping.json"), mapping.to_json_pretty().unwrap()).unwrap();
    }

    fn service(root: &Path) -> TemplateFormService {
        TemplateFormService::with_store(Arc::new(FsTemplateStore::new(root)), FillOptions::default())
    }

    fn pit37_data() -> FormData {
        record(json!({
            "employmentIncome": 60000,
            "civilContractIncome": 15000,
            "numberOfChildren": 2,
            "childDeduction": 1112.04,
            "taxPaid": 8500,
            "hasSpouse": true,
        }))
    }

    #[tokio::test]
    async fn test_fill_pit37_with_calculations() {
        let dir = tempfile::tempdir().unwrap();
        install_pit37(dir.path());
        let service = service(dir.path());

        let filled = service
            .fill_form_detailed("PIT-37", "2023", &pit37_data())
            .await
            .unwrap();

        let tax_due = filled.calculated["taxDue"].as_f64().unwrap();
        assert!((tax_due - 12371.91).abs() < 0.01);
        assert!((filled.calculated["taxBase"].as_f64().unwrap() - 72775.92).abs() < 0.01);

        assert_eq!(
            drawn_text(&filled.bytes, 1),
            vec![
                (400.0, 500.0, "60000.00".to_string()),
                (50.0, 50.0, "X".to_string()),
                (400.0, 300.0, "12371.91".to_string()),
            ]
        );
        // remarks has no value
        assert_eq!(filled.result.fields_skipped, 1);
    }

    #[tokio::test]
    async fn test_missing_template_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());

        let err = service
            .fill_form("PIT-99", "2023", &FormData::new())
            .await
            .unwrap_err();
        match &err {
            TemplateError::TemplateNotFound { attempted, .. } => assert_eq!(attempted.len(), 2),
            other => panic!("unexpected error {:?}", other),
        }
        let message = err.to_string();
        assert!(message.contains("PIT-99_2023.pdf"));
        assert!(message.contains(&dir.path().join("PIT-99").join("2023").display().to_string()));
    }

    #[tokio::test]
    async fn test_mapping_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        install_pit37(dir.path());
        let service = service(dir.path());

        service.load_mappings("PIT-37", "2023").await.unwrap();
        // Removing the file does not matter once cached
        std::fs::remove_file(dir.path().join("PIT-37/2023/mapping.json")).unwrap();
        let mapping = service.load_mappings("PIT-37", "2023").await.unwrap();

        assert_eq!(mapping.fields.len(), 4);
        assert_eq!(service.cache_stats().misses, 1);
        assert_eq!(service.cache_stats().hits, 1);
    }

    #[tokio::test]
    async fn test_apply_calculations_keeps_caller_values() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());

        let mut data = pit37_data();
        data.insert("taxDue".into(), json!(1));
        let prepared = service.apply_calculations("PIT-37", &data);

        assert_eq!(prepared["taxDue"], json!(1));
        assert_eq!(prepared["totalIncome"].as_f64(), Some(75000.0));
        assert!(prepared[CALCULATED_FIELDS_KEY]["taxDue"].as_f64().unwrap() > 12000.0);

        let untouched = service.apply_calculations("ZAP-3", &data);
        assert_eq!(untouched, data);
    }

    #[tokio::test]
    async fn test_batch_keeps_order_and_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        install_pit37(dir.path());
        let service = service(dir.path());

        let requests = vec![
            TemplateRequest {
                form_type: "PIT-37".into(),
                version: "2023".into(),
                data: pit37_data(),
            },
            TemplateRequest {
                form_type: "PIT-37".into(),
                version: "1999".into(),
                data: FormData::new(),
            },
            TemplateRequest {
                form_type: "PIT-37".into(),
                version: "2023".into(),
                data: FormData::new(),
            },
        ];

        let results = service.fill_batch(requests).await;
        assert_eq!(results.len(), 3);
        assert!(results[0].as_ref().unwrap().starts_with(b"%PDF"));
        assert!(matches!(results[1], Err(TemplateError::TemplateNotFound { .. })));
        assert!(results[2].is_ok());
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&json!(60000)).as_deref(), Some("60000.00"));
        assert_eq!(format_value(&json!(2.5)).as_deref(), Some("2.50"));
        assert_eq!(format_value(&json!(true)).as_deref(), Some("X"));
        assert_eq!(format_value(&json!(false)), None);
        assert_eq!(format_value(&json!("abc")).as_deref(), Some("abc"));
    }
}
