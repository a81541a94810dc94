//! Random Forest implementation

use super::decision_tree::DecisionTree;
use super::models::{check_fit_input, ChurnClassifier};
use crate::error::{ChurnError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Max features strategy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum MaxFeatures {
    /// Use all features
    All,
    /// Use sqrt(n_features)
    Sqrt,
    /// Use log2(n_features)
    Log2,
    /// Use a fixed number of features
    Fixed(usize),
    /// Use a fraction of features
    Fraction(f64),
}

impl MaxFeatures {
    fn resolve(&self, n_features: usize) -> usize {
        let k = match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().ceil() as usize,
            MaxFeatures::Fixed(n) => *n,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).ceil() as usize,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// Bagged ensemble of decision trees with per-node feature sampling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub random_state: u64,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomForest {
    pub fn new() -> Self {
        Self {
            trees: Vec::new(),
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            random_state: 42,
            n_features: 0,
            feature_importances: None,
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = n;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn bootstrap_sample(
        x: &Array2<f64>,
        y: &Array1<f64>,
        rng: &mut ChaCha8Rng,
    ) -> (Array2<f64>, Array1<f64>) {
        let n_samples = x.nrows();
        let indices: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
        (x.select(Axis(0), &indices), y.select(Axis(0), &indices))
    }
}

impl ChurnClassifier for RandomForest {
    fn name(&self) -> &'static str {
        "Random Forest"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.n_estimators == 0 {
            return Err(ChurnError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "forest needs at least one tree".to_string(),
            });
        }

        self.n_features = x.ncols();
        let max_features = self.max_features.resolve(self.n_features);
        let base_seed = self.random_state;

        let trees: Vec<DecisionTree> = (0..self.n_estimators)
            .into_par_iter()
            .map(|i| {
                let seed = base_seed.wrapping_add(i as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let mut tree = DecisionTree::new_classifier()
                    .with_max_depth_opt(self.max_depth)
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_max_features(max_features)
                    .with_random_state(seed);

                if self.bootstrap {
                    let (x_sample, y_sample) = Self::bootstrap_sample(x, y, &mut rng);
                    tree.fit_targets(&x_sample, &y_sample)?;
                } else {
                    tree.fit_targets(x, y)?;
                }
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut importances = Array1::zeros(self.n_features);
        for tree in &trees {
            if let Some(imp) = tree.importances() {
                importances += imp;
            }
        }
        importances /= trees.len() as f64;

        self.trees = trees;
        self.feature_importances = Some(importances);
        Ok(())
    }

    /// Mean of the trees' leaf churn rates
    fn predict_probability(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(ChurnError::NotFitted(self.name().to_string()));
        }
        let per_tree: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<_>>>()?;

        let mut sum = Array1::zeros(x.nrows());
        for p in &per_tree {
            sum += p;
        }
        Ok((sum / self.trees.len() as f64).mapv(|p: f64| p.clamp(0.0, 1.0)))
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances.clone()
    }
}
