//! Classifier trait and evaluation metrics

use crate::error::{ChurnError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Probability above which a customer is labelled as churning
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Binary probabilistic classifier. Labels are 0.0 (retained) and 1.0 (churned);
/// inputs are already scaled.
pub trait ChurnClassifier: Send + Sync {
    fn name(&self) -> &'static str;

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Probability of churn for every row, each in [0, 1]
    fn predict_probability(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    fn predict_label(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self
            .predict_probability(x)?
            .mapv(|p| if p > DECISION_THRESHOLD { 1.0 } else { 0.0 }))
    }

    /// Normalized importances, one per feature, if the model exposes them
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }
}

/// Check fit inputs shared by every learner.
pub(crate) fn check_fit_input(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(ChurnError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(ChurnError::TrainingError("empty training matrix".to_string()));
    }
    if y.iter().any(|&v| v != 0.0 && v != 1.0) {
        return Err(ChurnError::TrainingError("labels must be 0 or 1".to_string()));
    }
    Ok(())
}

/// Binary confusion counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

impl ConfusionMatrix {
    pub fn from_labels(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let mut cm = Self::default();
        for (t, p) in y_true.iter().zip(y_pred.iter()) {
            match (*t > 0.5, *p > 0.5) {
                (true, true) => cm.true_positive += 1,
                (false, true) => cm.false_positive += 1,
                (false, false) => cm.true_negative += 1,
                (true, false) => cm.false_negative += 1,
            }
        }
        cm
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }
}

/// Held-out evaluation of one classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub roc_auc: f64,
    pub confusion: ConfusionMatrix,
    pub n_samples: usize,
    pub training_time_secs: f64,
}

impl ModelMetrics {
    /// Metrics from true labels and predicted churn probabilities
    pub fn compute(y_true: &Array1<f64>, y_prob: &Array1<f64>) -> Result<Self> {
        if y_true.len() != y_prob.len() {
            return Err(ChurnError::ShapeError {
                expected: format!("{} probabilities", y_true.len()),
                actual: format!("{} probabilities", y_prob.len()),
            });
        }
        let y_pred = y_prob.mapv(|p| if p > DECISION_THRESHOLD { 1.0 } else { 0.0 });
        let confusion = ConfusionMatrix::from_labels(y_true, &y_pred);

        let tp = confusion.true_positive as f64;
        let fp = confusion.false_positive as f64;
        let fn_ = confusion.false_negative as f64;
        let total = confusion.total().max(1) as f64;

        let accuracy = (tp + confusion.true_negative as f64) / total;
        let precision = if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 };
        let recall = if tp + fn_ > 0.0 { tp / (tp + fn_) } else { 0.0 };
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Ok(Self {
            accuracy,
            precision,
            recall,
            f1_score,
            roc_auc: roc_auc(y_true, y_prob)?,
            confusion,
            n_samples: y_true.len(),
            training_time_secs: 0.0,
        })
    }
}

/// Area under the ROC curve through the rank-sum (Mann-Whitney) statistic.
/// Tied scores share their average rank.
pub fn roc_auc(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<f64> {
    if y_true.len() != scores.len() {
        return Err(ChurnError::ShapeError {
            expected: format!("{} scores", y_true.len()),
            actual: format!("{} scores", scores.len()),
        });
    }
    if scores.iter().any(|s| !s.is_finite()) {
        return Err(ChurnError::InvalidInput("scores must be finite".to_string()));
    }
    let n_pos = y_true.iter().filter(|&&t| t > 0.5).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(ChurnError::InvalidInput(
            "ROC-AUC needs both classes in the evaluation set".to_string(),
        ));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum_pos = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && scores[order[end + 1]] == scores[order[start]] {
            end += 1;
        }
        // ranks are 1-based; the tie group start..=end shares the mean rank
        let avg_rank = (start + end) as f64 / 2.0 + 1.0;
        for &idx in &order[start..=end] {
            if y_true[idx] > 0.5 {
                rank_sum_pos += avg_rank;
            }
        }
        start = end + 1;
    }

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Ok((rank_sum_pos - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}
