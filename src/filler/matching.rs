//! Record key resolution and value conversion

use serde_json::Value;

use crate::text::normalize_key;

use super::types::FormData;

/// How a record key was matched to a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Key equals the fully qualified field name
    Exact,
    /// Key equals the last component of the field name
    Partial,
    /// Normalized key equals the normalized field name
    Normalized,
    /// One normalized name contains the other
    Substring,
}

/// Resolved record entry
#[derive(Debug, Clone, Copy)]
pub struct ResolvedValue<'a> {
    pub key: &'a str,
    pub value: &'a Value,
    pub kind: MatchKind,
}

/// Find the record value for a field
///
/// Exact names win over fuzzy matches; within a fuzzy pass the first key in
/// record order wins. Null values count as absent.
pub fn resolve_value<'a>(
    full_name: &str,
    partial_name: &str,
    data: &'a FormData,
    fuzzy: bool,
) -> Option<ResolvedValue<'a>> {
    let present = |name: &str| {
        data.iter()
            .find(|(key, value)| key.as_str() == name && !value.is_null())
    };

    if let Some((key, value)) = present(full_name) {
        return Some(ResolvedValue {
            key: key.as_str(),
            value,
            kind: MatchKind::Exact,
        });
    }
    if partial_name != full_name {
        if let Some((key, value)) = present(partial_name) {
            return Some(ResolvedValue {
                key: key.as_str(),
                value,
                kind: MatchKind::Partial,
            });
        }
    }
    if !fuzzy {
        return None;
    }

    let targets: Vec<String> = [normalize_key(full_name), normalize_key(partial_name)]
        .into_iter()
        .filter(|t| !t.is_empty())
        .collect();
    if targets.is_empty() {
        return None;
    }

    let candidates: Vec<(&'a String, &'a Value, String)> = data
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k, v, normalize_key(k)))
        .filter(|(_, _, normalized)| !normalized.is_empty())
        .collect();

    for &(key, value, ref normalized) in &candidates {
        if targets.iter().any(|t| t == normalized) {
            return Some(ResolvedValue {
                key: key.as_str(),
                value,
                kind: MatchKind::Normalized,
            });
        }
    }

    for &(key, value, ref normalized) in &candidates {
        if targets
            .iter()
            .any(|t| t.contains(normalized.as_str()) || normalized.contains(t.as_str()))
        {
            return Some(ResolvedValue {
                key: key.as_str(),
                value,
                kind: MatchKind::Substring,
            });
        }
    }

    None
}

/// Text of a scalar value; `None` for arrays, objects and null
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Checkbox state of a value; `None` when it has no sensible truthiness
pub fn truthiness(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => Some(n.as_f64().map_or(false, |f| f != 0.0)),
        Value::String(s) => {
            let folded = normalize_key(s);
            match folded.as_str() {
                "" | "false" | "0" | "no" | "nie" | "off" | "n" => Some(false),
                _ => Some(true),
            }
        }
        Value::Null => Some(false),
        Value::Array(_) | Value::Object(_) => None,
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

    #[test]
    fn test_exact_before_fuzzy() {
        let data = record(json!({"first_name": "Fuzzy", "firstName": "Exact"}));
        let resolved = resolve_value("firstName", "firstName", &data, true).unwrap();
        assert_eq!(resolved.kind, MatchKind::Exact);
        assert_eq!(resolved.value, &json!("Exact"));
    }

    #[test]
    fn test_partial_name_match() {
        let data = record(json!({"city": "Gdańsk"}));
        let resolved = resolve_value("person.city", "city", &data, false).unwrap();
        assert_eq!(resolved.kind, MatchKind::Partial);
    }

    #[test]
    fn test_normalized_and_substring_matches() {
        let data = record(json!({"Imię": "Jan", "nazwisko_panienskie": "Nowak"}));

        let resolved = resolve_value("imie", "imie", &data, true).unwrap();
        assert_eq!((resolved.key, resolved.kind), ("Imię", MatchKind::Normalized));

        let resolved = resolve_value("Nazwisko", "Nazwisko", &data, true).unwrap();
        assert_eq!((resolved.key, resolved.kind), ("nazwisko_panienskie", MatchKind::Substring));

        assert!(resolve_value("Nazwisko", "Nazwisko", &data, false).is_none());
    }

    #[test]
    fn test_first_key_wins_substring() {
        let data = record(json!({"adres_ulica": "Polna", "adres": "Polna 1"}));
        let resolved = resolve_value("ulica", "ulica", &data, true).unwrap();
        assert_eq!(resolved.key, "adres_ulica");
    }

    #[test]
    fn test_null_counts_as_absent() {
        let data = record(json!({"pesel": null}));
        assert!(resolve_value("pesel", "pesel", &data, true).is_none());
    }

    #[test]
    fn test_truthiness() {
        assert_eq!(truthiness(&json!(true)), Some(true));
        assert_eq!(truthiness(&json!(0)), Some(false));
        assert_eq!(truthiness(&json!("Tak")), Some(true));
        assert_eq!(truthiness(&json!("nie")), Some(false));
        assert_eq!(truthiness(&json!([1])), None);
    }

    #[test]
    fn test_scalar_text() {
        assert_eq!(scalar_text(&json!(12)).as_deref(), Some("12"));
        assert_eq!(scalar_text(&json!(1.5)).as_deref(), Some("1.5"));
        assert_eq!(scalar_text(&json!({"a": 1})), None);
    }
}
