//! Derived values for specific forms

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::filler::FormData;

/// Computes a form's derived fields from the caller's data
pub trait FormCalculator: Send + Sync {
    /// Derived values by field name, in computation order
    fn calculate(&self, data: &FormData) -> FormData;
}

/// PIT-37 statutory tax rate
pub const PIT37_TAX_RATE: f64 = 0.17;

/// PIT-37 annual return
///
/// ```text
/// totalIncome       = employmentIncome + civilContractIncome
/// totalTaxDeduction = childDeduction * numberOfChildren
/// taxBase           = totalIncome - totalTaxDeduction
/// taxDue            = taxBase * 17%
/// amountDue         = taxDue - taxPaid        (negative: refund)
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct Pit37Calculator;

impl FormCalculator for Pit37Calculator {
    fn calculate(&self, data: &FormData) -> FormData {
        let total_income = amount(data, "employmentIncome") + amount(data, "civilContractIncome");
        let total_deduction = amount(data, "childDeduction") * amount(data, "numberOfChildren");
        let tax_base = round_cents(total_income - total_deduction);
        let tax_due = round_cents(tax_base * PIT37_TAX_RATE);

        let mut derived = FormData::new();
        derived.insert("totalIncome".into(), Value::from(round_cents(total_income)));
        derived.insert("totalTaxDeduction".into(), Value::from(round_cents(total_deduction)));
        derived.insert("taxBase".into(), Value::from(tax_base));
        derived.insert("taxDue".into(), Value::from(tax_due));
        derived.insert(
            "amountDue".into(),
            Value::from(round_cents(tax_due - amount(data, "taxPaid"))),
        );
        derived
    }
}

/// Number from a record; strings may use a decimal comma. Missing or
/// unparsable values count as zero.
pub fn amount(data: &FormData, key: &str) -> f64 {
    match data.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s
            .trim()
            .replace([' ', '\u{00A0}'], "")
            .replace(',', ".")
            .parse()
            .unwrap_or(0.0),
        _ => 0.0,
    }
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Calculators by form type
#[derive(Clone, Default)]
pub struct CalculatorRegistry {
    calculators: HashMap<String, Arc<dyn FormCalculator>>,
}

impl CalculatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in calculators
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("PIT-37", Arc::new(Pit37Calculator));
        registry
    }

    pub fn register(&mut self, form_type: &str, calculator: Arc<dyn FormCalculator>) {
        self.calculators.insert(form_type.to_ascii_uppercase(), calculator);
    }

    /// Derived values for a form type; `None` when none is registered
    pub fn calculate(&self, form_type: &str, data: &FormData) -> Option<FormData> {
        self.calculators
            .get(&form_type.to_ascii_uppercase())
            .map(|calculator| calculator.calculate(data))
    }
}

impl std::fmt::Debug for CalculatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalculatorRegistry")
            .field("form_types", &self.calculators.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> FormData {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn number(data: &FormData, key: &str) -> f64 {
        data[key].as_f64().unwrap()
    }

    #[test]
    fn test_pit37() {
        let data = record(json!({
            "employmentIncome": 60000,
            "civilContractIncome": 15000,
            "numberOfChildren": 2,
            "childDeduction": 1112.04,
            "taxPaid": 8500,
        }));

        let derived = Pit37Calculator.calculate(&data);
        assert!((number(&derived, "totalIncome") - 75000.0).abs() < 0.01);
        assert!((number(&derived, "totalTaxDeduction") - 2224.08).abs() < 0.01);
        assert!((number(&derived, "taxBase") - 72775.92).abs() < 0.01);
        assert!((number(&derived, "taxDue") - 12371.91).abs() < 0.01);
        assert!((number(&derived, "amountDue") - 3871.91).abs() < 0.01);

        let keys: Vec<&String> = derived.keys().collect();
        assert_eq!(keys, ["totalIncome", "totalTaxDeduction", "taxBase", "taxDue", "amountDue"]);
    }

    #[test]
    fn test_amount_parsing() {
        let data = record(json!({"a": "1 112,04", "b": "abc", "c": true}));
        assert_eq!(amount(&data, "a"), 1112.04);
        assert_eq!(amount(&data, "b"), 0.0);
        assert_eq!(amount(&data, "c"), 0.0);
        assert_eq!(amount(&data, "missing"), 0.0);
    }

    #[test]
    fn test_registry_lookup() {
        let registry = CalculatorRegistry::with_defaults();
        assert!(registry.calculate("pit-37", &FormData::new()).is_some());
        assert!(registry.calculate("PIT-36", &FormData::new()).is_none());
    }
}
