//! Inference module
//!
//! Single and batch (rayon) churn prediction over a loaded model bundle, plus the
//! probability bands that turn a prediction into a retention recommendation.

mod engine;
mod policy;

pub use engine::{ChurnPrediction, ChurnPredictor};
pub use policy::{Recommendation, RetentionPolicy};
