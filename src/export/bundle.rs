//! The model bundle: everything inference needs, created once and loaded whole

use crate::error::{ChurnError, Result};
use crate::preprocessing::{FeatureCodec, StandardScaler};
use crate::schema::CustomerRecord;
use crate::training::{ChurnClassifier, ModelMetrics, ModelType, TrainedClassifier};
use chrono::{DateTime, Utc};
use ndarray::Axis;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// On-disk layout version written into every manifest
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

/// Provenance of a trained bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleMetadata {
    pub id: Uuid,
    pub model_name: String,
    pub model_type: ModelType,
    pub crate_version: String,
    pub trained_at: DateTime<Utc>,
    /// Held-out metrics of the selected classifier
    pub metrics: ModelMetrics,
    pub n_train: usize,
    pub n_test: usize,
    pub random_seed: u64,
    pub test_ratio: f64,
}

impl BundleMetadata {
    pub fn new(model_name: impl Into<String>, model_type: ModelType, metrics: ModelMetrics) -> Self {
        Self {
            id: Uuid::new_v4(),
            model_name: model_name.into(),
            model_type,
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            trained_at: Utc::now(),
            metrics,
            n_train: 0,
            n_test: 0,
            random_seed: 0,
            test_ratio: 0.0,
        }
    }

    pub fn with_split(mut self, n_train: usize, n_test: usize, test_ratio: f64, seed: u64) -> Self {
        self.n_train = n_train;
        self.n_test = n_test;
        self.test_ratio = test_ratio;
        self.random_seed = seed;
        self
    }
}

/// Codec, scaler and classifier that were fitted together
#[derive(Debug, Clone)]
pub struct ModelBundle {
    codec: FeatureCodec,
    scaler: StandardScaler,
    classifier: TrainedClassifier,
    metadata: BundleMetadata,
}

impl ModelBundle {
    /// Assemble a bundle, checking that the parts agree on the column order.
    pub fn new(
        codec: FeatureCodec,
        scaler: StandardScaler,
        classifier: TrainedClassifier,
        metadata: BundleMetadata,
    ) -> Result<Self> {
        let state = scaler
            .state()
            .ok_or_else(|| ChurnError::NotFitted("scaler".to_string()))?;
        if state.columns != codec.columns() {
            return Err(ChurnError::BundleVersionMismatch(format!(
                "scaler columns differ from codec columns: {}",
                crate::preprocessing::describe_column_diff(codec.columns(), &state.columns)
            )));
        }
        if metadata.model_type != classifier.model_type() {
            return Err(ChurnError::BundleVersionMismatch(format!(
                "metadata names {} but the classifier is {}",
                metadata.model_type,
                classifier.model_type()
            )));
        }
        Ok(Self {
            codec,
            scaler,
            classifier,
            metadata,
        })
    }

    pub fn codec(&self) -> &FeatureCodec {
        &self.codec
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn classifier(&self) -> &TrainedClassifier {
        &self.classifier
    }

    pub fn metadata(&self) -> &BundleMetadata {
        &self.metadata
    }

    pub fn columns(&self) -> &[String] {
        self.codec.columns()
    }

    /// Churn probability for one record: encode, scale, classify.
    /// The record is not range-checked here; see `Schema::validate`.
    pub fn predict_probability(&self, record: &CustomerRecord) -> Result<f64> {
        let features = self.codec.encode(record)?;
        let scaled = self.scaler.transform(&features)?;
        let proba = self.classifier.predict_probability(&scaled.insert_axis(Axis(0)))?;
        proba
            .first()
            .copied()
            .ok_or_else(|| ChurnError::TrainingError("classifier returned no probability".to_string()))
    }
}
