//! Stratified train/test split

use crate::error::{ChurnError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

/// Row partition of a feature matrix. Indices refer to rows of the input and are sorted.
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Hold out `test_ratio` of each class, so both sides keep the label balance.
///
/// Each class contributes `round(n * test_ratio)` rows to the test side, clamped
/// so that both sides receive at least one row of that class.
pub fn stratified_split(
    x: &Array2<f64>,
    y: &Array1<f64>,
    test_ratio: f64,
    seed: u64,
) -> Result<TrainTestSplit> {
    if x.nrows() != y.len() {
        return Err(ChurnError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if !(test_ratio > 0.0 && test_ratio < 1.0) {
        return Err(ChurnError::InvalidParameter {
            name: "test_ratio".to_string(),
            value: test_ratio.to_string(),
            reason: "must be in (0, 1)".to_string(),
        });
    }

    let mut by_class: BTreeMap<u8, Vec<usize>> = BTreeMap::new();
    for (i, &label) in y.iter().enumerate() {
        by_class.entry(if label > 0.5 { 1 } else { 0 }).or_default().push(i);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train_indices = Vec::with_capacity(y.len());
    let mut test_indices = Vec::new();

    for (class, mut rows) in by_class {
        let n = rows.len();
        if n < 2 {
            return Err(ChurnError::DataError(format!(
                "class {} has {} row(s); stratified split needs at least 2",
                class, n
            )));
        }
        let n_test = ((n as f64 * test_ratio).round() as usize).clamp(1, n - 1);
        rows.shuffle(&mut rng);
        test_indices.extend_from_slice(&rows[..n_test]);
        train_indices.extend_from_slice(&rows[n_test..]);
    }

    train_indices.sort_unstable();
    test_indices.sort_unstable();

    Ok(TrainTestSplit {
        x_train: x.select(Axis(0), &train_indices),
        x_test: x.select(Axis(0), &test_indices),
        y_train: y.select(Axis(0), &train_indices),
        y_test: y.select(Axis(0), &test_indices),
        train_indices,
        test_indices,
    })
}
