//! Feature codec: raw customer records to fixed-order feature vectors
//!
//! One codec instance is fitted at training time, persisted in the model bundle and
//! reused verbatim at inference time, so the vocabulary, the column order and the
//! derived features can't drift between the two paths.

use super::encoder::CategoryVocabulary;
use super::transforms::DerivedFeature;
use crate::error::{ChurnError, Result};
use crate::schema::{CustomerRecord, FieldKind, FieldSpec, Schema, TrainingTable};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCodec {
    fields: Vec<FieldSpec>,
    vocabularies: BTreeMap<String, CategoryVocabulary>,
    derived: Vec<DerivedFeature>,
    columns: Vec<String>,
}

impl FeatureCodec {
    /// Column order a codec fitted for `schema` produces: raw fields in schema
    /// order, then derived features.
    pub fn expected_columns(schema: &Schema) -> Vec<String> {
        schema
            .fields()
            .iter()
            .map(|f| f.name.clone())
            .chain(schema.derived().iter().map(|d| d.name().to_string()))
            .collect()
    }

    /// Derive vocabularies and column order from a training table.
    pub fn fit(schema: &Schema, table: &TrainingTable) -> Result<Self> {
        if table.is_empty() {
            return Err(ChurnError::DataError("cannot fit codec on an empty table".to_string()));
        }
        for derived in schema.derived() {
            for source in derived.sources() {
                match schema.field(source) {
                    Some(spec) if spec.kind != FieldKind::Categorical => {}
                    _ => {
                        return Err(ChurnError::FeatureNotFound(format!(
                            "'{}' reads '{}', which is not a numeric schema field",
                            derived.name(),
                            source
                        )))
                    }
                }
            }
        }

        let mut vocabularies = BTreeMap::new();
        for spec in schema.categorical_fields() {
            let observed = table
                .records()
                .iter()
                .map(|record| record.text(&spec.name))
                .collect::<Result<Vec<&str>>>()?;
            let vocab = CategoryVocabulary::fit(spec.name.clone(), observed);
            debug!(field = %spec.name, size = vocab.len(), "fitted vocabulary");
            vocabularies.insert(spec.name.clone(), vocab);
        }

        let codec = Self {
            fields: schema.fields().to_vec(),
            vocabularies,
            derived: schema.derived().to_vec(),
            columns: Self::expected_columns(schema),
        };
        Ok(codec)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    pub fn vocabulary(&self, field: &str) -> Option<&CategoryVocabulary> {
        self.vocabularies.get(field)
    }

    pub fn vocabularies(&self) -> impl Iterator<Item = &CategoryVocabulary> {
        self.vocabularies.values()
    }

    fn vocabulary_for(&self, field: &str) -> Result<&CategoryVocabulary> {
        self.vocabularies
            .get(field)
            .ok_or_else(|| ChurnError::FeatureNotFound(field.to_string()))
    }

    /// Code of `value` within `field`'s vocabulary
    pub fn encode_category(&self, field: &str, value: &str) -> Result<usize> {
        self.vocabulary_for(field)?.encode(value)
    }

    /// Value behind `code` within `field`'s vocabulary
    pub fn decode_category(&self, field: &str, code: usize) -> Result<&str> {
        self.vocabulary_for(field)?.decode(code)
    }

    /// Encode one record. Fails on the first missing field, mistyped value or unknown
    /// category; a partial vector is never returned.
    pub fn encode(&self, record: &CustomerRecord) -> Result<Array1<f64>> {
        let mut out = Vec::with_capacity(self.columns.len());
        for spec in &self.fields {
            let value = match spec.kind {
                FieldKind::Categorical => {
                    let text = record.text(&spec.name)?;
                    self.encode_category(&spec.name, text)? as f64
                }
                FieldKind::Flag => record.flag(&spec.name)?,
                FieldKind::Numeric => record.number(&spec.name)?,
            };
            out.push(value);
        }
        for derived in &self.derived {
            out.push(derived.evaluate(|name| record.number(name))?);
        }
        Ok(Array1::from_vec(out))
    }

    /// Encode every record of a table into a row-major matrix.
    pub fn encode_table(&self, table: &TrainingTable) -> Result<Array2<f64>> {
        let rows = table
            .records()
            .par_iter()
            .enumerate()
            .map(|(i, record)| {
                self.encode(record)
                    .map_err(|e| ChurnError::DataError(format!("row {}: {}", i, e)))
            })
            .collect::<Result<Vec<Array1<f64>>>>()?;

        let width = self.columns.len();
        let flat: Vec<f64> = rows.into_iter().flat_map(|row| row.into_iter()).collect();
        Ok(Array2::from_shape_vec((table.len(), width), flat)?)
    }

    /// Human-readable view of an encoded (unscaled) vector: categorical codes are
    /// decoded, everything else is printed as a number.
    pub fn describe(&self, vector: &Array1<f64>) -> Result<Vec<(String, String)>> {
        if vector.len() != self.columns.len() {
            return Err(ChurnError::ShapeError {
                expected: format!("{} features", self.columns.len()),
                actual: format!("{} features", vector.len()),
            });
        }
        let mut out = Vec::with_capacity(vector.len());
        for (i, column) in self.columns.iter().enumerate() {
            let raw = vector[i];
            let is_categorical = self
                .fields
                .get(i)
                .map_or(false, |spec| spec.kind == FieldKind::Categorical);
            let shown = if is_categorical {
                self.decode_category(column, raw.round() as usize)?.to_string()
            } else {
                format!("{}", raw)
            };
            out.push((column.clone(), shown));
        }
        Ok(out)
    }

    /// Check a (typically deserialized) codec against the schema it is used with.
    pub fn verify(&self, schema: &Schema) -> Result<()> {
        let expected = Self::expected_columns(schema);
        if self.columns != expected {
            return Err(ChurnError::BundleVersionMismatch(describe_column_diff(&expected, &self.columns)));
        }
        if self.fields != schema.fields() || self.derived != schema.derived() {
            return Err(ChurnError::BundleVersionMismatch(
                "field kinds or derived features differ from the current schema".to_string(),
            ));
        }
        for spec in schema.categorical_fields() {
            match self.vocabularies.get(&spec.name) {
                Some(vocab) if vocab.is_well_formed() && vocab.field() == spec.name => {}
                Some(_) => {
                    return Err(ChurnError::BundleCorrupted {
                        artifact: "codec".to_string(),
                        reason: format!("vocabulary for '{}' is malformed", spec.name),
                    })
                }
                None => {
                    return Err(ChurnError::BundleCorrupted {
                        artifact: "codec".to_string(),
                        reason: format!("no vocabulary for '{}'", spec.name),
                    })
                }
            }
        }
        Ok(())
    }
}

/// Describe the first difference between two column orders.
pub fn describe_column_diff(expected: &[String], found: &[String]) -> String {
    if let Some(i) = expected.iter().zip(found.iter()).position(|(a, b)| a != b) {
        return format!(
            "column {} is '{}' in the bundle but '{}' is expected",
            i, found[i], expected[i]
        );
    }
    format!(
        "bundle has {} columns but {} are expected",
        found.len(),
        expected.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSpec;

    fn small_schema() -> Schema {
        Schema::new(
            vec![
                FieldSpec::categorical("plan"),
                FieldSpec::flag("senior"),
                FieldSpec::numeric("tenure", 0.0, 72.0),
                FieldSpec::numeric("total", 0.0, 10_000.0),
            ],
            "churn",
        )
        .with_derived(DerivedFeature::ratio("avg", "total", "tenure", 1.0))
        .with_derived(DerivedFeature::bucket("tenure_group", "tenure", vec![0.0, 12.0, 24.0]).unwrap())
    }

    fn record(plan: &str, senior: f64, tenure: f64, total: f64) -> CustomerRecord {
        CustomerRecord::new()
            .with_text("plan", plan)
            .with_number("senior", senior)
            .with_number("tenure", tenure)
            .with_number("total", total)
    }

    fn small_table() -> TrainingTable {
        TrainingTable::new(
            vec![
                record("gold", 0.0, 3.0, 30.0),
                record("basic", 1.0, 20.0, 400.0),
                record("silver", 0.0, 12.0, 130.0),
            ],
            vec![1, 0, 0],
        )
        .unwrap()
    }

    #[test]
    fn test_encode_layout() {
        let codec = FeatureCodec::fit(&small_schema(), &small_table()).unwrap();
        assert_eq!(codec.columns(), &["plan", "senior", "tenure", "total", "avg", "tenure_group"]);

        let v = codec.encode(&record("silver", 1.0, 12.0, 130.0)).unwrap();
        // basic=0, gold=1, silver=2
        assert_eq!(v.to_vec(), vec![2.0, 1.0, 12.0, 130.0, 10.0, 1.0]);
    }

    #[test]
    fn test_unknown_category_has_no_partial_output() {
        let codec = FeatureCodec::fit(&small_schema(), &small_table()).unwrap();
        let err = codec.encode(&record("platinum", 0.0, 1.0, 1.0)).unwrap_err();
        assert!(matches!(err, ChurnError::UnknownCategory { ref field, .. } if field == "plan"));
    }

    #[test]
    fn test_encode_table_matches_row_encoding() {
        let table = small_table();
        let codec = FeatureCodec::fit(&small_schema(), &table).unwrap();
        let matrix = codec.encode_table(&table).unwrap();
        assert_eq!(matrix.dim(), (3, 6));
        for (i, rec) in table.records().iter().enumerate() {
            assert_eq!(matrix.row(i).to_vec(), codec.encode(rec).unwrap().to_vec());
        }
    }

    #[test]
    fn test_describe_decodes_categories() {
        let codec = FeatureCodec::fit(&small_schema(), &small_table()).unwrap();
        let v = codec.encode(&record("gold", 0.0, 3.0, 30.0)).unwrap();
        let shown = codec.describe(&v).unwrap();
        assert_eq!(shown[0], ("plan".to_string(), "gold".to_string()));
        assert_eq!(shown[2], ("tenure".to_string(), "3".to_string()));
    }

    #[test]
    fn test_fit_rejects_empty_table() {
        let result = FeatureCodec::fit(&small_schema(), &TrainingTable::default());
        assert!(matches!(result, Err(ChurnError::DataError(_))));
    }

    #[test]
    fn test_verify_against_other_schema() {
        let codec = FeatureCodec::fit(&small_schema(), &small_table()).unwrap();
        assert!(codec.verify(&small_schema()).is_ok());

        let reordered = Schema::new(
            vec![
                FieldSpec::flag("senior"),
                FieldSpec::categorical("plan"),
                FieldSpec::numeric("tenure", 0.0, 72.0),
                FieldSpec::numeric("total", 0.0, 10_000.0),
            ],
            "churn",
        );
        assert!(matches!(codec.verify(&reordered), Err(ChurnError::BundleVersionMismatch(_))));
    }
}
