//! Gaussian Naive Bayes

use super::models::{check_fit_input, ChurnClassifier};
use crate::error::{ChurnError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClassStats {
    log_prior: f64,
    means: Array1<f64>,
    variances: Array1<f64>,
}

impl ClassStats {
    fn log_likelihood(&self, row: ndarray::ArrayView1<f64>) -> f64 {
        let mut ll = self.log_prior;
        for ((x, mean), var) in row.iter().zip(self.means.iter()).zip(self.variances.iter()) {
            let diff = x - mean;
            ll += -0.5 * ((2.0 * std::f64::consts::PI * var).ln() + diff * diff / var);
        }
        ll
    }
}

/// Gaussian Naive Bayes over the two churn classes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianNaiveBayes {
    /// Added to every variance, as a fraction of the largest feature variance
    pub var_smoothing: f64,
    retained: Option<ClassStats>,
    churned: Option<ClassStats>,
}

impl Default for GaussianNaiveBayes {
    fn default() -> Self {
        Self::new()
    }
}

impl GaussianNaiveBayes {
    pub fn new() -> Self {
        Self {
            var_smoothing: 1e-9,
            retained: None,
            churned: None,
        }
    }

    pub fn with_var_smoothing(mut self, smoothing: f64) -> Self {
        self.var_smoothing = smoothing;
        self
    }
}

impl ChurnClassifier for GaussianNaiveBayes {
    fn name(&self) -> &'static str {
        "Naive Bayes"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;

        let max_var = x.var_axis(Axis(0), 0.0).fold(0.0_f64, |a, &b| a.max(b));
        let epsilon = (self.var_smoothing * max_var).max(1e-12);
        let n_total = x.nrows() as f64;

        let stats_for = |label: f64| -> Result<ClassStats> {
            let rows: Vec<usize> = y
                .iter()
                .enumerate()
                .filter(|(_, t)| **t == label)
                .map(|(i, _)| i)
                .collect();
            if rows.is_empty() {
                return Err(ChurnError::TrainingError(format!(
                    "no training rows with label {}",
                    label
                )));
            }
            let subset = x.select(Axis(0), &rows);
            let means = subset
                .mean_axis(Axis(0))
                .ok_or_else(|| ChurnError::TrainingError("empty class subset".to_string()))?;
            let variances = subset.var_axis(Axis(0), 0.0) + epsilon;
            Ok(ClassStats {
                log_prior: (rows.len() as f64 / n_total).ln(),
                means,
                variances,
            })
        };

        self.retained = Some(stats_for(0.0)?);
        self.churned = Some(stats_for(1.0)?);
        Ok(())
    }

    fn predict_probability(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (retained, churned) = match (&self.retained, &self.churned) {
            (Some(r), Some(c)) => (r, c),
            _ => return Err(ChurnError::NotFitted(self.name().to_string())),
        };
        if x.ncols() != churned.means.len() {
            return Err(ChurnError::ShapeError {
                expected: format!("{} features", churned.means.len()),
                actual: format!("{} features", x.ncols()),
            });
        }

        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let l0 = retained.log_likelihood(row);
                let l1 = churned.log_likelihood(row);
                // log-sum-exp
                let max = l0.max(l1);
                let p1 = (l1 - max).exp();
                p1 / ((l0 - max).exp() + p1)
            })
            .collect())
    }
}
