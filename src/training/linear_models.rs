//! Logistic regression

use super::models::{check_fit_input, ChurnClassifier};
use crate::error::{ChurnError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// L2-regularized logistic regression fitted by batch gradient descent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Fitted coefficients
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept
    pub intercept: Option<f64>,
    /// Regularization strength (L2)
    pub alpha: f64,
    /// Maximum iterations
    pub max_iter: usize,
    /// Convergence tolerance on the gradient norm
    pub tol: f64,
    pub learning_rate: f64,
    /// Iterations actually run by the last fit
    pub n_iter: usize,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            alpha: 0.01,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.1,
            n_iter: 0,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }

    fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
        z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
    }

    fn check_params(&self) -> Result<()> {
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(ChurnError::InvalidParameter {
                name: "learning_rate".to_string(),
                value: self.learning_rate.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.alpha < 0.0 || self.max_iter == 0 {
            return Err(ChurnError::InvalidParameter {
                name: "alpha/max_iter".to_string(),
                value: format!("{}/{}", self.alpha, self.max_iter),
                reason: "alpha must be >= 0 and max_iter > 0".to_string(),
            });
        }
        Ok(())
    }
}

impl ChurnClassifier for LogisticRegression {
    fn name(&self) -> &'static str {
        "Logistic Regression"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.check_params()?;

        let n_samples = x.nrows() as f64;
        let mut weights = Array1::zeros(x.ncols());
        let mut bias = 0.0;
        let mut iterations = 0;

        for _ in 0..self.max_iter {
            iterations += 1;
            let predictions = Self::sigmoid(&(x.dot(&weights) + bias));

            let errors = &predictions - y;
            let dw = (x.t().dot(&errors) / n_samples) + (self.alpha * &weights);
            let db = errors.mean().unwrap_or(0.0);

            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if grad_norm < self.tol {
                break;
            }

            weights = weights - self.learning_rate * dw;
            bias -= self.learning_rate * db;
        }

        if !bias.is_finite() || weights.iter().any(|w: &f64| !w.is_finite()) {
            return Err(ChurnError::TrainingError(format!(
                "gradient descent diverged after {} iterations",
                iterations
            )));
        }

        self.coefficients = Some(weights);
        self.intercept = Some(bias);
        self.n_iter = iterations;
        Ok(())
    }

    fn predict_probability(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self
            .coefficients
            .as_ref()
            .ok_or_else(|| ChurnError::NotFitted(self.name().to_string()))?;
        if x.ncols() != coefficients.len() {
            return Err(ChurnError::ShapeError {
                expected: format!("{} features", coefficients.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        let linear = x.dot(coefficients) + self.intercept.unwrap_or(0.0);
        Ok(Self::sigmoid(&linear))
    }

    /// Absolute coefficients, normalized to sum to one
    fn feature_importances(&self) -> Option<Array1<f64>> {
        let abs = self.coefficients.as_ref()?.mapv(f64::abs);
        let total = abs.sum();
        if total > 0.0 {
            Some(abs / total)
        } else {
            Some(abs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_logistic_regression_separable() {
        let x = array![
            [1.0, 1.0],
            [1.5, 1.5],
            [2.0, 2.0],
            [5.0, 5.0],
            [5.5, 5.5],
            [6.0, 6.0],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut model = LogisticRegression::new().with_learning_rate(0.5);
        model.fit(&x, &y).unwrap();
        assert!(model.is_fitted());

        let labels = model.predict_label(&x).unwrap();
        let correct = labels.iter().zip(y.iter()).filter(|(p, t)| p == t).count();
        assert!(correct >= 5, "got {} of 6 right", correct);
    }

    #[test]
    fn test_predict_probability_ordering() {
        let x = array![[-2.0], [-1.0], [1.0], [2.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut model = LogisticRegression::new().with_max_iter(500);
        model.fit(&x, &y).unwrap();

        let proba = model.predict_probability(&x).unwrap();
        assert!(proba[0] < 0.5);
        assert!(proba[3] > 0.5);
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_not_fitted() {
        let model = LogisticRegression::new();
        assert!(matches!(
            model.predict_probability(&array![[1.0]]),
            Err(ChurnError::NotFitted(_))
        ));
    }

    #[test]
    fn test_rejects_bad_learning_rate() {
        let mut model = LogisticRegression::new().with_learning_rate(0.0);
        assert!(model.fit(&array![[0.0], [1.0]], &array![0.0, 1.0]).is_err());
    }
}
