//! Model training module
//!
//! Candidate churn classifiers and the selector that compares them:
//! - Logistic regression (L2, gradient descent)
//! - Decision trees and Random Forests
//! - Gradient boosting on log-loss
//! - Gaussian Naive Bayes
//!
//! plus the stratified split and the end-to-end training pipeline.

mod config;
mod engine;
mod models;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod linear_models;
pub mod naive_bayes;
pub mod pipeline;
pub mod random_forest;
pub mod split;

pub use config::{ModelType, TrainingConfig};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use engine::{CandidateFailure, CandidateResult, ModelSelector, SelectionReport, TrainedClassifier};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use linear_models::LogisticRegression;
pub use models::{roc_auc, ChurnClassifier, ConfusionMatrix, ModelMetrics, DECISION_THRESHOLD};
pub use naive_bayes::GaussianNaiveBayes;
pub use pipeline::{train, TrainingOutcome};
pub use random_forest::{MaxFeatures, RandomForest};
pub use split::{stratified_split, TrainTestSplit};
