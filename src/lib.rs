//! churnkit - customer churn prediction toolkit
//!
//! This crate trains and serves churn classifiers for the Telco customer schema:
//! - Feature encoding shared by training and inference
//! - Standard scaling fitted on the training split
//! - Comparison of several classifiers on a stratified hold-out
//! - Atomic, checksummed model bundles
//!
//! # Modules
//!
//! - [`schema`] - Field schema, customer records and training tables
//! - [`preprocessing`] - Feature codec, category vocabularies, scaling
//! - [`training`] - Classifiers, selection and the training pipeline
//! - [`export`] - Model bundle and registry
//! - [`inference`] - Churn predictor and retention recommendations
//! - [`config`] - Pipeline configuration
//! - [`utils`] - CSV loading
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

pub mod config;
pub mod schema;

// Core ML modules
pub mod preprocessing;
pub mod training;
pub mod inference;

// Persistence and IO
pub mod export;
pub mod utils;

// Services
pub mod cli;

pub use error::{ChurnError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{ChurnError, Result};

    // Schema and configuration
    pub use crate::config::PipelineConfig;
    pub use crate::schema::{CustomerRecord, FieldKind, FieldSpec, FieldValue, Schema, TrainingTable};

    // Preprocessing
    pub use crate::preprocessing::{CategoryVocabulary, FeatureCodec, StandardScaler};

    // Training
    pub use crate::training::{
        train, ChurnClassifier, ModelMetrics, ModelSelector, ModelType, SelectionReport, TrainedClassifier,
        TrainingConfig, TrainingOutcome,
    };

    // Export
    pub use crate::export::{BundleManifest, BundleMetadata, ModelBundle, ModelRegistry};

    // Inference
    pub use crate::inference::{ChurnPrediction, ChurnPredictor, Recommendation, RetentionPolicy};

    // Data loading
    pub use crate::utils::DataLoader;
}
