//! End-to-end training run

use super::engine::{ModelSelector, SelectionReport};
use super::split::stratified_split;
use crate::config::PipelineConfig;
use crate::error::{ChurnError, Result};
use crate::export::{BundleMetadata, ModelBundle};
use crate::preprocessing::{FeatureCodec, StandardScaler};
use crate::schema::{Schema, TrainingTable};
use tracing::info;

/// The persisted-to-be bundle together with the full comparison
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub bundle: ModelBundle,
    pub report: SelectionReport,
}

/// Fit codec, scaler and every candidate on `table`, returning a bundle of the winner.
///
/// The scaler is fitted on the training split only.
pub fn train(table: &TrainingTable, schema: &Schema, config: &PipelineConfig) -> Result<TrainingOutcome> {
    config.validate()?;
    let training = &config.training;

    let churned = table.labels().iter().filter(|&&l| l == 1).count();
    if churned == 0 || churned == table.len() {
        return Err(ChurnError::DataError(format!(
            "training data needs both churned and retained customers ({} of {} churned)",
            churned,
            table.len()
        )));
    }
    info!(rows = table.len(), churn_rate = table.churn_rate(), "training started");

    let codec = FeatureCodec::fit(schema, table)?;
    let x = codec.encode_table(table)?;
    let y = table.labels_array();

    let split = stratified_split(&x, &y, training.test_ratio, training.random_seed)?;
    info!(
        train = split.train_indices.len(),
        test = split.test_indices.len(),
        seed = training.random_seed,
        "stratified split"
    );

    let mut scaler = StandardScaler::new();
    if config.strict_scaling {
        scaler.fit_strict(&split.x_train, codec.columns())?;
    } else {
        scaler.fit(&split.x_train, codec.columns())?;
    }
    let x_train = scaler.transform_matrix(&split.x_train)?;
    let x_test = scaler.transform_matrix(&split.x_test)?;

    let report = ModelSelector::new(training.clone()).select(
        &x_train,
        &split.y_train,
        &x_test,
        &split.y_test,
        codec.columns(),
    )?;

    let best = report.best_result();
    let metadata = BundleMetadata::new(&config.model_name, best.model_type, best.metrics.clone()).with_split(
        split.train_indices.len(),
        split.test_indices.len(),
        training.test_ratio,
        training.random_seed,
    );
    let bundle = ModelBundle::new(codec, scaler, report.best.clone(), metadata)?;

    Ok(TrainingOutcome { bundle, report })
}
