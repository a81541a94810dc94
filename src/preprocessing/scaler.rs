//! Standard scaling fitted once on training data

use crate::error::{ChurnError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Population standard deviations at or below this (relative to the mean) count as zero.
const DEGENERATE_TOLERANCE: f64 = 1e-12;

/// Fitted per-column parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    pub columns: Vec<String>,
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
    /// Indices of zero-variance columns whose scale was replaced by 1.0
    pub degenerate_columns: Vec<usize>,
}

/// Z-score scaler: `(x - mean) / std`.
///
/// Parameters are frozen after the first fit; a fitted scaler can't be refitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    state: Option<ScalerState>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scaler over previously fitted parameters
    pub fn from_state(state: ScalerState) -> Result<Self> {
        let n = state.columns.len();
        if state.means.len() != n || state.stds.len() != n {
            return Err(ChurnError::ShapeError {
                expected: format!("{} means and stds", n),
                actual: format!("{} means, {} stds", state.means.len(), state.stds.len()),
            });
        }
        if state.stds.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(ChurnError::InvalidInput("scaler stds must be positive and finite".to_string()));
        }
        Ok(Self { state: Some(state) })
    }

    /// Fit, replacing the scale of zero-variance columns by 1.0 with a warning.
    pub fn fit(&mut self, x: &Array2<f64>, columns: &[String]) -> Result<&mut Self> {
        self.fit_inner(x, columns, false)
    }

    /// Fit, failing with `DegenerateColumn` on the first zero-variance column.
    pub fn fit_strict(&mut self, x: &Array2<f64>, columns: &[String]) -> Result<&mut Self> {
        self.fit_inner(x, columns, true)
    }

    fn fit_inner(&mut self, x: &Array2<f64>, columns: &[String], strict: bool) -> Result<&mut Self> {
        if self.state.is_some() {
            return Err(ChurnError::InvalidInput("scaler is already fitted".to_string()));
        }
        if x.ncols() != columns.len() {
            return Err(ChurnError::ShapeError {
                expected: format!("{} columns", columns.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        if x.nrows() == 0 {
            return Err(ChurnError::DataError("cannot fit scaler on zero rows".to_string()));
        }

        let means = x
            .mean_axis(Axis(0))
            .ok_or_else(|| ChurnError::DataError("cannot fit scaler on zero rows".to_string()))?;
        let raw_stds = x.std_axis(Axis(0), 0.0);

        let mut stds = Vec::with_capacity(columns.len());
        let mut degenerate_columns = Vec::new();
        for (j, (&std, &mean)) in raw_stds.iter().zip(means.iter()).enumerate() {
            if !std.is_finite() || !mean.is_finite() {
                return Err(ChurnError::DataError(format!(
                    "column '{}' contains non-finite values",
                    columns[j]
                )));
            }
            if std <= DEGENERATE_TOLERANCE * (1.0 + mean.abs()) {
                if strict {
                    return Err(ChurnError::DegenerateColumn {
                        column: columns[j].clone(),
                    });
                }
                warn!(column = %columns[j], "zero-variance column, using unit scale");
                degenerate_columns.push(j);
                stds.push(1.0);
            } else {
                stds.push(std);
            }
        }

        self.state = Some(ScalerState {
            columns: columns.to_vec(),
            means: means.to_vec(),
            stds,
            degenerate_columns,
        });
        Ok(self)
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    pub fn state(&self) -> Option<&ScalerState> {
        self.state.as_ref()
    }

    fn fitted(&self) -> Result<&ScalerState> {
        self.state
            .as_ref()
            .ok_or_else(|| ChurnError::NotFitted("scaler".to_string()))
    }

    fn check_width(state: &ScalerState, width: usize) -> Result<()> {
        if width != state.means.len() {
            return Err(ChurnError::ShapeError {
                expected: format!("{} features", state.means.len()),
                actual: format!("{} features", width),
            });
        }
        Ok(())
    }

    /// Scale one feature vector
    pub fn transform(&self, x: &Array1<f64>) -> Result<Array1<f64>> {
        let state = self.fitted()?;
        Self::check_width(state, x.len())?;
        Ok(Array1::from_iter(
            x.iter()
                .zip(state.means.iter().zip(state.stds.iter()))
                .map(|(&v, (&mean, &std))| (v - mean) / std),
        ))
    }

    /// Scale every row of a matrix
    pub fn transform_matrix(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let state = self.fitted()?;
        Self::check_width(state, x.ncols())?;
        let means = Array1::from_vec(state.means.clone());
        let stds = Array1::from_vec(state.stds.clone());
        Ok((x - &means) / &stds)
    }

    /// Undo scaling of one feature vector
    pub fn inverse_transform(&self, x: &Array1<f64>) -> Result<Array1<f64>> {
        let state = self.fitted()?;
        Self::check_width(state, x.len())?;
        Ok(Array1::from_iter(
            x.iter()
                .zip(state.means.iter().zip(state.stds.iter()))
                .map(|(&v, (&mean, &std))| v * std + mean),
        ))
    }
}
