//! Churn predictor over a loaded bundle

use super::policy::{Recommendation, RetentionPolicy};
use crate::error::Result;
use crate::export::{ModelBundle, ModelRegistry};
use crate::schema::{CustomerRecord, Schema};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Prediction for one customer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChurnPrediction {
    /// Churn probability in [0, 1]
    pub probability: f64,
    pub retention_probability: f64,
    pub likely_to_churn: bool,
    pub recommendation: Recommendation,
}

/// Read-only predictor; cheap to clone and safe to share across threads.
#[derive(Debug, Clone)]
pub struct ChurnPredictor {
    bundle: Arc<ModelBundle>,
    schema: Schema,
    policy: RetentionPolicy,
}

impl ChurnPredictor {
    pub fn new(bundle: Arc<ModelBundle>, schema: Schema) -> Self {
        Self {
            bundle,
            schema,
            policy: RetentionPolicy::default(),
        }
    }

    /// Load the bundle at `location` and verify it against `schema`.
    pub fn load(location: impl AsRef<Path>, schema: Schema) -> Result<Self> {
        let bundle = ModelRegistry::new(schema.clone()).load(location)?;
        Ok(Self::new(Arc::new(bundle), schema))
    }

    pub fn with_policy(mut self, policy: RetentionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn bundle(&self) -> &ModelBundle {
        &self.bundle
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    pub fn predict(&self, record: &CustomerRecord) -> Result<ChurnPrediction> {
        self.schema.validate(record)?;
        let probability = self.bundle.predict_probability(record)?.clamp(0.0, 1.0);
        Ok(ChurnPrediction {
            probability,
            retention_probability: 1.0 - probability,
            likely_to_churn: self.policy.is_likely_churn(probability),
            recommendation: self.policy.recommend(probability),
        })
    }

    /// One result per record, in input order
    pub fn predict_batch(&self, records: &[CustomerRecord]) -> Vec<Result<ChurnPrediction>> {
        records.par_iter().map(|r| self.predict(r)).collect()
    }
}
