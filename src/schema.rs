//! Customer schema, customer records and training tables

use crate::error::{ChurnError, Result};
use crate::preprocessing::{Binner, DerivedFeature};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a raw field is typed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// String drawn from a finite vocabulary
    Categorical,
    /// 0/1 integer flag
    Flag,
    /// Real number
    Numeric,
}

/// One input field of the schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    /// Inclusive lower bound accepted at inference time
    pub min: Option<f64>,
    /// Inclusive upper bound accepted at inference time
    pub max: Option<f64>,
    /// Fill blank or unparseable cells with the column median when loading training data
    pub impute_median: bool,
}

impl FieldSpec {
    pub fn categorical(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Categorical,
            min: None,
            max: None,
            impute_median: false,
        }
    }

    pub fn flag(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Flag,
            min: Some(0.0),
            max: Some(1.0),
            impute_median: false,
        }
    }

    pub fn numeric(name: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Numeric,
            min: Some(min),
            max: Some(max),
            impute_median: false,
        }
    }

    pub fn with_median_imputation(mut self) -> Self {
        self.impute_median = true;
        self
    }
}

/// Ordered field list plus the derived features computed from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<FieldSpec>,
    derived: Vec<DerivedFeature>,
    target: String,
    id_column: Option<String>,
}

pub const TENURE: &str = "tenure";
pub const MONTHLY_CHARGES: &str = "MonthlyCharges";
pub const TOTAL_CHARGES: &str = "TotalCharges";
pub const CHURN: &str = "Churn";
pub const CUSTOMER_ID: &str = "customerID";

pub const TENURE_EDGES: [f64; 5] = [0.0, 12.0, 24.0, 48.0, 72.0];
pub const CHARGES_EDGES: [f64; 5] = [0.0, 35.0, 70.0, 105.0, 120.0];

impl Schema {
    pub fn new(fields: Vec<FieldSpec>, target: impl Into<String>) -> Self {
        Self {
            fields,
            derived: Vec::new(),
            target: target.into(),
            id_column: None,
        }
    }

    /// Append a derived feature (emitted after all raw fields, in insertion order)
    pub fn with_derived(mut self, feature: DerivedFeature) -> Self {
        self.derived.push(feature);
        self
    }

    /// Identifier column dropped when loading data
    pub fn with_id_column(mut self, name: impl Into<String>) -> Self {
        self.id_column = Some(name.into());
        self
    }

    /// The Telco customer schema.
    pub fn telco() -> Self {
        let fields = vec![
            FieldSpec::categorical("gender"),
            FieldSpec::flag("SeniorCitizen"),
            FieldSpec::categorical("Partner"),
            FieldSpec::categorical("Dependents"),
            FieldSpec::numeric(TENURE, 0.0, 72.0),
            FieldSpec::categorical("PhoneService"),
            FieldSpec::categorical("MultipleLines"),
            FieldSpec::categorical("InternetService"),
            FieldSpec::categorical("OnlineSecurity"),
            FieldSpec::categorical("OnlineBackup"),
            FieldSpec::categorical("DeviceProtection"),
            FieldSpec::categorical("TechSupport"),
            FieldSpec::categorical("StreamingTV"),
            FieldSpec::categorical("StreamingMovies"),
            FieldSpec::categorical("Contract"),
            FieldSpec::categorical("PaperlessBilling"),
            FieldSpec::categorical("PaymentMethod"),
            FieldSpec::numeric(MONTHLY_CHARGES, 0.0, 200.0),
            FieldSpec::numeric(TOTAL_CHARGES, 0.0, 10_000.0).with_median_imputation(),
        ];

        Schema::new(fields, CHURN)
            .with_id_column(CUSTOMER_ID)
            .with_derived(DerivedFeature::ratio("AvgMonthlyCharges", TOTAL_CHARGES, TENURE, 1.0))
            .with_derived(DerivedFeature::Bucket {
                name: "TenureGroup".to_string(),
                source: TENURE.to_string(),
                binner: Binner::from_trusted(TENURE_EDGES.to_vec()),
            })
            .with_derived(DerivedFeature::Bucket {
                name: "ChargesGroup".to_string(),
                source: MONTHLY_CHARGES.to_string(),
                binner: Binner::from_trusted(CHARGES_EDGES.to_vec()),
            })
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn categorical_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.kind == FieldKind::Categorical)
    }

    pub fn derived(&self) -> &[DerivedFeature] {
        &self.derived
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn id_column(&self) -> Option<&str> {
        self.id_column.as_deref()
    }

    /// Check presence and type of every field, without range checks.
    pub fn check_types(&self, record: &CustomerRecord) -> Result<()> {
        for spec in &self.fields {
            match spec.kind {
                FieldKind::Categorical => {
                    record.text(&spec.name)?;
                }
                FieldKind::Flag => {
                    record.flag(&spec.name)?;
                }
                FieldKind::Numeric => {
                    record.number(&spec.name)?;
                }
            }
        }
        Ok(())
    }

    /// Full input validation run by callers before inference: presence, type and range.
    pub fn validate(&self, record: &CustomerRecord) -> Result<()> {
        self.check_types(record)?;
        for spec in self.fields.iter().filter(|f| f.kind == FieldKind::Numeric) {
            let value = record.number(&spec.name)?;
            let below = spec.min.map_or(false, |min| value < min);
            let above = spec.max.map_or(false, |max| value > max);
            if below || above {
                return Err(ChurnError::InvalidFieldValue {
                    field: spec.name.clone(),
                    value: value.to_string(),
                    reason: format!(
                        "must be within [{}, {}]",
                        spec.min.map_or("-inf".to_string(), |v| v.to_string()),
                        spec.max.map_or("inf".to_string(), |v| v.to_string()),
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Raw value of one record field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// A raw customer record keyed by field name.
///
/// Deserializes from a flat JSON object such as
/// `{"gender": "Female", "tenure": 12, "Contract": "One year"}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerRecord {
    values: BTreeMap<String, FieldValue>,
}

impl CustomerRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_text(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(field.into(), FieldValue::Text(value.into()));
        self
    }

    pub fn with_number(mut self, field: impl Into<String>, value: f64) -> Self {
        self.values.insert(field.into(), FieldValue::Number(value));
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: FieldValue) {
        self.values.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.values.iter()
    }

    /// Categorical value of `field`
    pub fn text(&self, field: &str) -> Result<&str> {
        match self.values.get(field) {
            Some(FieldValue::Text(s)) => Ok(s),
            Some(FieldValue::Number(n)) => Err(ChurnError::InvalidFieldValue {
                field: field.to_string(),
                value: n.to_string(),
                reason: "expected a categorical string".to_string(),
            }),
            None => Err(ChurnError::MissingField(field.to_string())),
        }
    }

    /// Finite numeric value of `field`
    pub fn number(&self, field: &str) -> Result<f64> {
        match self.values.get(field) {
            Some(FieldValue::Number(n)) if n.is_finite() => Ok(*n),
            Some(FieldValue::Number(n)) => Err(ChurnError::InvalidFieldValue {
                field: field.to_string(),
                value: n.to_string(),
                reason: "must be a finite number".to_string(),
            }),
            Some(FieldValue::Text(s)) => Err(ChurnError::InvalidFieldValue {
                field: field.to_string(),
                value: s.clone(),
                reason: "expected a number".to_string(),
            }),
            None => Err(ChurnError::MissingField(field.to_string())),
        }
    }

    /// 0/1 value of `field`
    pub fn flag(&self, field: &str) -> Result<f64> {
        let value = self.number(field)?;
        if value == 0.0 || value == 1.0 {
            Ok(value)
        } else {
            Err(ChurnError::InvalidFieldValue {
                field: field.to_string(),
                value: value.to_string(),
                reason: "flag must be 0 or 1".to_string(),
            })
        }
    }
}

/// Records with their binary churn labels (1 = churned, 0 = retained)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingTable {
    records: Vec<CustomerRecord>,
    labels: Vec<u8>,
}

impl TrainingTable {
    pub fn new(records: Vec<CustomerRecord>, labels: Vec<u8>) -> Result<Self> {
        if records.len() != labels.len() {
            return Err(ChurnError::ShapeError {
                expected: format!("{} labels", records.len()),
                actual: format!("{} labels", labels.len()),
            });
        }
        if let Some(bad) = labels.iter().find(|&&l| l > 1) {
            return Err(ChurnError::InvalidInput(format!("label must be 0 or 1, got {}", bad)));
        }
        Ok(Self { records, labels })
    }

    pub fn push(&mut self, record: CustomerRecord, churned: bool) {
        self.records.push(record);
        self.labels.push(u8::from(churned));
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[CustomerRecord] {
        &self.records
    }

    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    pub fn labels_array(&self) -> Array1<f64> {
        self.labels.iter().map(|&l| f64::from(l)).collect()
    }

    /// Fraction of churned rows
    pub fn churn_rate(&self) -> f64 {
        if self.labels.is_empty() {
            return 0.0;
        }
        self.labels.iter().map(|&l| l as usize).sum::<usize>() as f64 / self.labels.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> CustomerRecord {
        CustomerRecord::new()
            .with_text("gender", "Female")
            .with_number("SeniorCitizen", 0.0)
            .with_text("Partner", "Yes")
            .with_text("Dependents", "No")
            .with_number("tenure", 12.0)
            .with_text("PhoneService", "Yes")
            .with_text("MultipleLines", "No")
            .with_text("InternetService", "DSL")
            .with_text("OnlineSecurity", "Yes")
            .with_text("OnlineBackup", "No")
            .with_text("DeviceProtection", "No")
            .with_text("TechSupport", "No")
            .with_text("StreamingTV", "No")
            .with_text("StreamingMovies", "No")
            .with_text("Contract", "One year")
            .with_text("PaperlessBilling", "No")
            .with_text("PaymentMethod", "Mailed check")
            .with_number("MonthlyCharges", 56.95)
            .with_number("TotalCharges", 683.4)
    }

    #[test]
    fn test_telco_schema_layout() {
        let schema = Schema::telco();
        assert_eq!(schema.fields().len(), 19);
        assert_eq!(schema.categorical_fields().count(), 15);
        assert_eq!(schema.derived().len(), 3);
        assert_eq!(schema.target(), "Churn");
        assert_eq!(schema.id_column(), Some("customerID"));
        assert_eq!(schema.fields()[4].name, "tenure");
    }

    #[test]
    fn test_validate_accepts_complete_record() {
        let schema = Schema::telco();
        assert!(schema.validate(&sample_record()).is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let schema = Schema::telco();
        let record = sample_record().with_number("tenure", 80.0);
        let err = schema.validate(&record).unwrap_err();
        assert!(matches!(err, ChurnError::InvalidFieldValue { ref field, .. } if field == "tenure"));
        // type checks alone do not look at ranges
        assert!(schema.check_types(&record).is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_and_mistyped() {
        let schema = Schema::telco();
        let mut record = sample_record();
        record.values.remove("Contract");
        assert!(matches!(schema.validate(&record), Err(ChurnError::MissingField(f)) if f == "Contract"));

        let record = sample_record().with_text("tenure", "twelve");
        assert!(matches!(schema.validate(&record), Err(ChurnError::InvalidFieldValue { .. })));

        let record = sample_record().with_number("SeniorCitizen", 2.0);
        assert!(matches!(schema.validate(&record), Err(ChurnError::InvalidFieldValue { .. })));
    }

    #[test]
    fn test_record_from_json() {
        let record = CustomerRecord::from_json(r#"{"gender": "Male", "tenure": 5, "TotalCharges": 120.5}"#).unwrap();
        assert_eq!(record.text("gender").unwrap(), "Male");
        assert_eq!(record.number("tenure").unwrap(), 5.0);
        assert_eq!(record.number("TotalCharges").unwrap(), 120.5);
    }

    #[test]
    fn test_training_table_checks_labels() {
        assert!(TrainingTable::new(vec![CustomerRecord::new()], vec![]).is_err());
        assert!(TrainingTable::new(vec![CustomerRecord::new()], vec![2]).is_err());

        let mut table = TrainingTable::default();
        table.push(CustomerRecord::new(), true);
        table.push(CustomerRecord::new(), false);
        assert_eq!(table.len(), 2);
        assert!((table.churn_rate() - 0.5).abs() < 1e-12);
    }
}
