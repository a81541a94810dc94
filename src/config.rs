//! Pipeline configuration
//!
//! Layered as: defaults, then an optional JSON file, then `CHURNKIT_*` environment
//! variables, then command line flags (applied by the CLI).

use crate::error::{ChurnError, Result};
use crate::training::{ModelType, TrainingConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ENV_SEED: &str = "CHURNKIT_SEED";
pub const ENV_TEST_RATIO: &str = "CHURNKIT_TEST_RATIO";
pub const ENV_MODELS: &str = "CHURNKIT_MODELS";

/// Settings for one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub training: TrainingConfig,
    /// Fail on zero-variance columns instead of passing them through unscaled
    pub strict_scaling: bool,
    /// Name recorded in the bundle metadata
    pub model_name: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            training: TrainingConfig::default(),
            strict_scaling: false,
            model_name: "churn_model".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_training(mut self, training: TrainingConfig) -> Self {
        self.training = training;
        self
    }

    pub fn with_strict_scaling(mut self, strict: bool) -> Self {
        self.strict_scaling = strict;
        self
    }

    pub fn with_model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = name.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.training.random_seed = seed;
        self
    }

    pub fn with_test_ratio(mut self, ratio: f64) -> Self {
        self.training.test_ratio = ratio;
        self
    }

    pub fn with_candidates(mut self, candidates: Vec<ModelType>) -> Self {
        self.training.candidates = candidates;
        self
    }

    /// Load from a JSON file; absent keys keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| ChurnError::ConfigError(format!("{}: {}", path.display(), e)))
    }

    /// Apply `CHURNKIT_SEED`, `CHURNKIT_TEST_RATIO` and `CHURNKIT_MODELS` from the process environment
    pub fn apply_env(self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_SEED) {
            self.training.random_seed = raw.trim().parse().map_err(|_| {
                ChurnError::ConfigError(format!("{} must be an unsigned integer, got '{}'", ENV_SEED, raw))
            })?;
        }
        if let Some(raw) = lookup(ENV_TEST_RATIO) {
            self.training.test_ratio = raw.trim().parse().map_err(|_| {
                ChurnError::ConfigError(format!("{} must be a number, got '{}'", ENV_TEST_RATIO, raw))
            })?;
        }
        if let Some(raw) = lookup(ENV_MODELS) {
            self.training.candidates = ModelType::parse_list(&raw)?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        self.training.validate()?;
        if self.model_name.trim().is_empty() {
            return Err(ChurnError::ConfigError("model_name must not be empty".to_string()));
        }
        Ok(())
    }
}
