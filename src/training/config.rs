//! Training configuration

use super::decision_tree::Criterion;
use super::random_forest::MaxFeatures;
use crate::error::{ChurnError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Candidate classifier families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelType {
    LogisticRegression,
    DecisionTree,
    RandomForest,
    GradientBoosting,
    NaiveBayes,
}

impl ModelType {
    /// Default comparison set
    pub fn default_candidates() -> Vec<ModelType> {
        vec![
            ModelType::LogisticRegression,
            ModelType::DecisionTree,
            ModelType::RandomForest,
            ModelType::GradientBoosting,
        ]
    }

    pub fn all() -> Vec<ModelType> {
        vec![
            ModelType::LogisticRegression,
            ModelType::DecisionTree,
            ModelType::RandomForest,
            ModelType::GradientBoosting,
            ModelType::NaiveBayes,
        ]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ModelType::LogisticRegression => "Logistic Regression",
            ModelType::DecisionTree => "Decision Tree",
            ModelType::RandomForest => "Random Forest",
            ModelType::GradientBoosting => "Gradient Boosting",
            ModelType::NaiveBayes => "Naive Bayes",
        }
    }

    /// Parse a comma separated list such as `"logistic,forest"`
    pub fn parse_list(s: &str) -> Result<Vec<ModelType>> {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(ModelType::from_str)
            .collect()
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ModelType {
    type Err = ChurnError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "logistic" | "logistic_regression" | "lr" => Ok(ModelType::LogisticRegression),
            "tree" | "decision_tree" | "dt" => Ok(ModelType::DecisionTree),
            "forest" | "random_forest" | "rf" => Ok(ModelType::RandomForest),
            "boosting" | "gradient_boosting" | "gb" => Ok(ModelType::GradientBoosting),
            "bayes" | "naive_bayes" | "nb" => Ok(ModelType::NaiveBayes),
            other => Err(ChurnError::ConfigError(format!("unknown model type: {}", other))),
        }
    }
}

/// Split, seed, candidate list and per-family hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Candidates compared, in tie-break order
    pub candidates: Vec<ModelType>,
    /// Held-out fraction of each class
    pub test_ratio: f64,
    /// Seed for the split and every randomized learner
    pub random_seed: u64,

    pub logistic_max_iter: usize,
    pub logistic_learning_rate: f64,
    /// L2 penalty
    pub logistic_alpha: f64,

    pub tree_max_depth: Option<usize>,
    pub tree_min_samples_leaf: usize,
    /// Split criterion of the single-tree candidate
    pub tree_criterion: Criterion,

    pub forest_n_estimators: usize,
    pub forest_max_depth: Option<usize>,
    pub forest_max_features: MaxFeatures,
    pub forest_bootstrap: bool,

    pub boosting_n_estimators: usize,
    pub boosting_learning_rate: f64,
    pub boosting_max_depth: usize,
    pub boosting_subsample: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            candidates: ModelType::default_candidates(),
            test_ratio: 0.2,
            random_seed: 42,
            logistic_max_iter: 1000,
            logistic_learning_rate: 0.1,
            logistic_alpha: 0.01,
            tree_max_depth: None,
            tree_min_samples_leaf: 1,
            tree_criterion: Criterion::Gini,
            forest_n_estimators: 100,
            forest_max_depth: None,
            forest_max_features: MaxFeatures::Sqrt,
            forest_bootstrap: true,
            boosting_n_estimators: 100,
            boosting_learning_rate: 0.1,
            boosting_max_depth: 3,
            boosting_subsample: 1.0,
        }
    }
}

impl TrainingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_candidates(mut self, candidates: Vec<ModelType>) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn with_test_ratio(mut self, ratio: f64) -> Self {
        self.test_ratio = ratio;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    pub fn with_forest_estimators(mut self, n: usize) -> Self {
        self.forest_n_estimators = n;
        self
    }

    pub fn with_tree_criterion(mut self, criterion: Criterion) -> Self {
        self.tree_criterion = criterion;
        self
    }

    pub fn with_forest_features(mut self, max_features: MaxFeatures, bootstrap: bool) -> Self {
        self.forest_max_features = max_features;
        self.forest_bootstrap = bootstrap;
        self
    }

    pub fn with_boosting_estimators(mut self, n: usize) -> Self {
        self.boosting_n_estimators = n;
        self
    }

    /// Checks the settings shared by every candidate. Per-family hyperparameters are
    /// checked by each learner so a bad one only disqualifies that candidate.
    pub fn validate(&self) -> Result<()> {
        if !(self.test_ratio > 0.0 && self.test_ratio < 1.0) {
            return Err(ChurnError::ConfigError(format!(
                "test_ratio must be in (0, 1), got {}",
                self.test_ratio
            )));
        }
        if self.candidates.is_empty() {
            return Err(ChurnError::ConfigError("candidate list is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrainingConfig::default();
        assert_eq!(config.test_ratio, 0.2);
        assert_eq!(config.random_seed, 42);
        assert_eq!(config.candidates.len(), 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_model_list() {
        let models = ModelType::parse_list("logistic, Random-Forest,bayes").unwrap();
        assert_eq!(
            models,
            vec![ModelType::LogisticRegression, ModelType::RandomForest, ModelType::NaiveBayes]
        );
        assert!(ModelType::parse_list("svm").is_err());
    }

    #[test]
    fn test_validate_ratio_and_candidates() {
        assert!(TrainingConfig::new().with_test_ratio(0.0).validate().is_err());
        assert!(TrainingConfig::new().with_test_ratio(1.0).validate().is_err());
        assert!(TrainingConfig::new().with_candidates(vec![]).validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TrainingConfig = serde_json::from_str(r#"{"random_seed": 7}"#).unwrap();
        assert_eq!(config.random_seed, 7);
        assert_eq!(config.forest_n_estimators, 100);
    }
}
