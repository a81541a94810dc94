//! Gradient Boosting implementation
//!
//! Binary log-loss boosting: trees are fitted to the residuals `y - p` and
//! their outputs are accumulated in log-odds space.

use super::decision_tree::DecisionTree;
use super::models::{check_fit_input, ChurnClassifier};
use crate::error::{ChurnError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Gradient boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Row fraction drawn for each round
    pub subsample: f64,
    /// Feature fraction considered at each node
    pub colsample: f64,
    pub random_state: u64,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            colsample: 1.0,
            random_state: 42,
        }
    }
}

impl GradientBoostingConfig {
    fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(ChurnError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "boosting needs at least one round".to_string(),
            });
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(ChurnError::InvalidParameter {
                name: "learning_rate".to_string(),
                value: self.learning_rate.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        for (name, value) in [("subsample", self.subsample), ("colsample", self.colsample)] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ChurnError::InvalidParameter {
                    name: name.to_string(),
                    value: value.to_string(),
                    reason: "must be in (0, 1]".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Gradient boosted trees for churn probability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    pub config: GradientBoostingConfig,
    trees: Vec<DecisionTree>,
    /// Initial log-odds
    init_prediction: f64,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
    /// Training log-loss after each round
    pub train_loss: Vec<f64>,
}

impl Default for GradientBoostingClassifier {
    fn default() -> Self {
        Self::new(GradientBoostingConfig::default())
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn log_loss(y: &Array1<f64>, raw: &Array1<f64>) -> f64 {
    let eps = 1e-15;
    let total: f64 = y
        .iter()
        .zip(raw.iter())
        .map(|(&t, &r)| {
            let p = sigmoid(r).clamp(eps, 1.0 - eps);
            -(t * p.ln() + (1.0 - t) * (1.0 - p).ln())
        })
        .sum();
    total / y.len().max(1) as f64
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            init_prediction: 0.0,
            n_features: 0,
            feature_importances: None,
            train_loss: Vec::new(),
        }
    }

    pub fn n_rounds(&self) -> usize {
        self.trees.len()
    }

    fn raw_scores(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let mut raw = Array1::from_elem(x.nrows(), self.init_prediction);
        for tree in &self.trees {
            raw.scaled_add(self.config.learning_rate, &tree.predict(x)?);
        }
        Ok(raw)
    }
}

impl ChurnClassifier for GradientBoostingClassifier {
    fn name(&self) -> &'static str {
        "Gradient Boosting"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.config.validate()?;

        let n_samples = x.nrows();
        self.n_features = x.ncols();

        let p = y.mean().unwrap_or(0.5).clamp(1e-7, 1.0 - 1e-7);
        self.init_prediction = (p / (1.0 - p)).ln();

        let mut raw = Array1::from_elem(n_samples, self.init_prediction);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        let mut importances = Array1::<f64>::zeros(self.n_features);
        let n_subsample = ((n_samples as f64 * self.config.subsample).ceil() as usize).clamp(1, n_samples);
        let max_features = ((self.n_features as f64 * self.config.colsample).ceil() as usize).max(1);

        self.trees.clear();
        self.train_loss.clear();

        for round in 0..self.config.n_estimators {
            let residuals: Array1<f64> = y
                .iter()
                .zip(raw.iter())
                .map(|(&t, &r)| t - sigmoid(r))
                .collect();

            let mut tree = DecisionTree::new_regressor()
                .with_max_depth(self.config.max_depth)
                .with_min_samples_split(self.config.min_samples_split)
                .with_min_samples_leaf(self.config.min_samples_leaf)
                .with_max_features(max_features)
                .with_random_state(self.config.random_state.wrapping_add(round as u64));

            if n_subsample < n_samples {
                let mut indices: Vec<usize> = (0..n_samples).collect();
                indices.shuffle(&mut rng);
                indices.truncate(n_subsample);
                indices.sort_unstable();
                tree.fit_targets(&x.select(Axis(0), &indices), &residuals.select(Axis(0), &indices))?;
            } else {
                tree.fit_targets(x, &residuals)?;
            }

            // every row moves, sampled or not
            raw.scaled_add(self.config.learning_rate, &tree.predict(x)?);

            if let Some(imp) = tree.importances() {
                importances += imp;
            }
            self.train_loss.push(log_loss(y, &raw));
            self.trees.push(tree);
        }

        if raw.iter().any(|r| !r.is_finite()) {
            return Err(ChurnError::TrainingError("boosting scores diverged".to_string()));
        }

        let total = importances.sum();
        if total > 0.0 {
            importances /= total;
        }
        self.feature_importances = Some(importances);
        Ok(())
    }

    fn predict_probability(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(ChurnError::NotFitted(self.name().to_string()));
        }
        Ok(self.raw_scores(x)?.mapv(sigmoid))
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn threshold_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| if j == 0 { i as f64 } else { (i % 4) as f64 });
        let y = Array1::from_shape_fn(30, |i| if i >= 15 { 1.0 } else { 0.0 });
        (x, y)
    }

    #[test]
    fn test_boosting_learns_threshold() {
        let (x, y) = threshold_data();
        let mut model = GradientBoostingClassifier::new(GradientBoostingConfig {
            n_estimators: 30,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        assert_eq!(model.n_rounds(), 30);
        assert_eq!(model.predict_label(&x).unwrap(), y);
        let first = model.train_loss[0];
        let last = *model.train_loss.last().unwrap();
        assert!(last < first);
    }

    #[test]
    fn test_subsampled_rounds_still_reduce_loss() {
        let (x, y) = threshold_data();
        let mut model = GradientBoostingClassifier::new(GradientBoostingConfig {
            n_estimators: 20,
            subsample: 0.5,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        assert!(model.train_loss.last().unwrap() < &model.train_loss[0]);

        let p = model.predict_probability(&array![[0.0, 0.0], [29.0, 1.0]]).unwrap();
        assert!(p[0] < 0.5 && p[1] > 0.5);
    }

    #[test]
    fn test_invalid_learning_rate() {
        let (x, y) = threshold_data();
        let mut model = GradientBoostingClassifier::new(GradientBoostingConfig {
            learning_rate: -0.1,
            ..Default::default()
        });
        assert!(matches!(model.fit(&x, &y), Err(ChurnError::InvalidParameter { .. })));
    }
}
