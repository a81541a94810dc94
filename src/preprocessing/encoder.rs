//! Per-field category vocabularies (label encoding)

use crate::error::{ChurnError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Sorted distinct values observed for one categorical field.
///
/// The code of a value is its index in sorted order, so `"DSL" < "Fiber optic" < "No"`
/// yields codes 0, 1, 2. Each field owns its vocabulary; the same string may carry a
/// different code in another field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryVocabulary {
    field: String,
    values: Vec<String>,
}

impl CategoryVocabulary {
    /// Fit from observed values
    pub fn fit<'a, I>(field: impl Into<String>, observed: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let distinct: BTreeSet<&str> = observed.into_iter().collect();
        Self {
            field: field.into(),
            values: distinct.into_iter().map(str::to_string).collect(),
        }
    }

    /// Build from an explicit value list; order and duplicates are normalized.
    pub fn from_values(field: impl Into<String>, values: Vec<String>) -> Self {
        Self::fit(field, values.iter().map(String::as_str))
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, value: &str) -> bool {
        self.lookup(value).is_some()
    }

    fn lookup(&self, value: &str) -> Option<usize> {
        self.values.binary_search_by(|probe| probe.as_str().cmp(value)).ok()
    }

    /// Code of `value`, or `UnknownCategory` listing the allowed values
    pub fn encode(&self, value: &str) -> Result<usize> {
        self.lookup(value).ok_or_else(|| ChurnError::UnknownCategory {
            field: self.field.clone(),
            value: value.to_string(),
            allowed: self.values.clone(),
        })
    }

    /// Value for `code`
    pub fn decode(&self, code: usize) -> Result<&str> {
        self.values
            .get(code)
            .map(String::as_str)
            .ok_or_else(|| ChurnError::UnknownCode {
                field: self.field.clone(),
                code,
            })
    }

    /// Values are non-empty, strictly increasing and therefore unique.
    pub fn is_well_formed(&self) -> bool {
        !self.values.is_empty() && self.values.windows(2).all(|w| w[0] < w[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_follow_sorted_order() {
        let vocab = CategoryVocabulary::fit(
            "InternetService",
            ["No", "Fiber optic", "DSL", "No", "DSL"],
        );
        assert_eq!(vocab.values(), &["DSL", "Fiber optic", "No"]);
        assert_eq!(vocab.encode("DSL").unwrap(), 0);
        assert_eq!(vocab.encode("Fiber optic").unwrap(), 1);
        assert_eq!(vocab.encode("No").unwrap(), 2);
        assert!(vocab.is_well_formed());
    }

    #[test]
    fn test_unknown_value_rejected() {
        let vocab = CategoryVocabulary::fit("Contract", ["Month-to-month", "One year", "Two year"]);
        match vocab.encode("Weekly") {
            Err(ChurnError::UnknownCategory { field, value, allowed }) => {
                assert_eq!(field, "Contract");
                assert_eq!(value, "Weekly");
                assert_eq!(allowed.len(), 3);
            }
            other => panic!("expected UnknownCategory, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_out_of_range() {
        let vocab = CategoryVocabulary::fit("gender", ["Male", "Female"]);
        assert_eq!(vocab.decode(0).unwrap(), "Female");
        assert!(matches!(vocab.decode(2), Err(ChurnError::UnknownCode { code: 2, .. })));
    }

    #[test]
    fn test_from_values_normalizes() {
        let vocab = CategoryVocabulary::from_values("x", vec!["b".into(), "a".into(), "b".into()]);
        assert_eq!(vocab.values(), &["a", "b"]);
    }

    #[test]
    fn test_deserialized_unsorted_is_not_well_formed() {
        let vocab: CategoryVocabulary =
            serde_json::from_str(r#"{"field": "x", "values": ["b", "a"]}"#).unwrap();
        assert!(!vocab.is_well_formed());
    }
}
