//! Decision tree implementation
//!
//! Leaves hold the mean target of their samples: the churn rate for 0/1 labels,
//! or a residual estimate when the tree is used inside gradient boosting.

use super::models::{check_fit_input, ChurnClassifier};
use crate::error::{ChurnError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        gain: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Criterion {
    /// Gini impurity (binary labels)
    Gini,
    /// Entropy (binary labels)
    Entropy,
    /// Mean squared error (regression)
    Mse,
}

impl Criterion {
    /// Impurity from count, sum and sum of squares of the targets
    fn impurity(&self, n: f64, sum: f64, sq_sum: f64) -> f64 {
        if n <= 0.0 {
            return 0.0;
        }
        let mean = sum / n;
        match self {
            Criterion::Gini => 2.0 * mean * (1.0 - mean),
            Criterion::Entropy => {
                let term = |p: f64| if p > 0.0 { -p * p.ln() } else { 0.0 };
                term(mean) + term(1.0 - mean)
            }
            Criterion::Mse => (sq_sum / n - mean * mean).max(0.0),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// CART decision tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features sampled at each node; all when `None`
    pub max_features: Option<usize>,
    pub criterion: Criterion,
    pub random_state: u64,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            random_state: 42,
            n_features: 0,
            feature_importances: None,
        }
    }

    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::Mse,
            ..Self::new_classifier()
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_max_depth_opt(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Fit on arbitrary real targets (used directly by gradient boosting)
    pub fn fit_targets(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(ChurnError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if x.nrows() == 0 {
            return Err(ChurnError::TrainingError("empty training matrix".to_string()));
        }
        if self.min_samples_leaf == 0 || self.min_samples_split < 2 {
            return Err(ChurnError::InvalidParameter {
                name: "min_samples_leaf/min_samples_split".to_string(),
                value: format!("{}/{}", self.min_samples_leaf, self.min_samples_split),
                reason: "need min_samples_leaf >= 1 and min_samples_split >= 2".to_string(),
            });
        }

        self.n_features = x.ncols();
        let mut importances = vec![0.0; self.n_features];
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let indices: Vec<usize> = (0..x.nrows()).collect();

        let root = self.build_tree(x, y, &indices, 0, &mut importances, &mut rng);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.root = Some(root);
        self.feature_importances = Some(Array1::from_vec(importances));
        Ok(())
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let n = n_samples as f64;
        let sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let sq_sum: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
        let leaf = TreeNode::Leaf {
            value: if n_samples > 0 { sum / n } else { 0.0 },
            n_samples,
        };

        let parent_impurity = self.criterion.impurity(n, sum, sq_sum);
        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || parent_impurity <= 1e-12;
        if should_stop {
            return leaf;
        }

        let features = self.sample_features(rng);
        let best = match self.find_best_split(x, y, indices, &features, parent_impurity) {
            Some(best) => best,
            None => return leaf,
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, best.feature_idx]] <= best.threshold);
        if left_idx.len() < self.min_samples_leaf || right_idx.len() < self.min_samples_leaf {
            return leaf;
        }

        importances[best.feature_idx] += n * best.gain;

        let left = Box::new(self.build_tree(x, y, &left_idx, depth + 1, importances, rng));
        let right = Box::new(self.build_tree(x, y, &right_idx, depth + 1, importances, rng));
        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left,
            right,
            n_samples,
            gain: best.gain,
        }
    }

    fn sample_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        match self.max_features {
            Some(k) if k < self.n_features => {
                let mut chosen = rand::seq::index::sample(rng, self.n_features, k.max(1)).into_vec();
                chosen.sort_unstable();
                chosen
            }
            _ => (0..self.n_features).collect(),
        }
    }

    /// Scans each candidate feature in parallel with a sorted sweep over its values.
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        features: &[usize],
        parent_impurity: f64,
    ) -> Option<SplitCandidate> {
        let n = indices.len();
        let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();

        features
            .par_iter()
            .filter_map(|&feature_idx| {
                let mut order = indices.to_vec();
                order.sort_by(|&a, &b| x[[a, feature_idx]].total_cmp(&x[[b, feature_idx]]));

                let mut best: Option<SplitCandidate> = None;
                let (mut left_sum, mut left_sq) = (0.0, 0.0);
                for k in 0..n - 1 {
                    let yi = y[order[k]];
                    left_sum += yi;
                    left_sq += yi * yi;

                    let current = x[[order[k], feature_idx]];
                    let next = x[[order[k + 1], feature_idx]];
                    if next <= current {
                        continue;
                    }
                    let left_n = k + 1;
                    let right_n = n - left_n;
                    if left_n < self.min_samples_leaf || right_n < self.min_samples_leaf {
                        continue;
                    }

                    let weighted = (left_n as f64
                        * self.criterion.impurity(left_n as f64, left_sum, left_sq)
                        + right_n as f64
                            * self.criterion.impurity(right_n as f64, total_sum - left_sum, total_sq - left_sq))
                        / n as f64;
                    let gain = parent_impurity - weighted;
                    if gain > best.map_or(1e-12, |b| b.gain) {
                        best = Some(SplitCandidate {
                            feature_idx,
                            threshold: (current + next) / 2.0,
                            gain,
                        });
                    }
                }
                best
            })
            .collect::<Vec<_>>()
            .into_iter()
            .reduce(|a, b| if b.gain > a.gain { b } else { a })
    }

    fn predict_row(&self, node: &TreeNode, row: ArrayView1<f64>) -> f64 {
        let mut node = node;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if row[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    /// Leaf value for every row
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| ChurnError::NotFitted("decision tree".to_string()))?;
        if x.ncols() != self.n_features {
            return Err(ChurnError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.rows().into_iter().map(|row| self.predict_row(root, row)).collect())
    }

    pub fn importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn depth(&self) -> usize {
        fn node_depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
            }
        }
        self.root.as_ref().map_or(0, node_depth)
    }

    pub fn n_leaves(&self) -> usize {
        fn count(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => count(left) + count(right),
            }
        }
        self.root.as_ref().map_or(0, count)
    }
}

impl ChurnClassifier for DecisionTree {
    fn name(&self) -> &'static str {
        "Decision Tree"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.fit_targets(x, y)
    }

    fn predict_probability(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict(x)?.mapv(|p| p.clamp(0.0, 1.0)))
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances.clone()
    }
}
