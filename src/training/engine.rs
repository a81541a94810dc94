//! Candidate training and selection

use super::config::{ModelType, TrainingConfig};
use super::decision_tree::DecisionTree;
use super::gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
use super::linear_models::LogisticRegression;
use super::models::{ChurnClassifier, ModelMetrics};
use super::naive_bayes::GaussianNaiveBayes;
use super::random_forest::RandomForest;
use crate::error::{ChurnError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Enum to hold trained classifier variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedClassifier {
    LogisticRegression(LogisticRegression),
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
    GradientBoosting(GradientBoostingClassifier),
    NaiveBayes(GaussianNaiveBayes),
}

impl TrainedClassifier {
    /// Unfitted classifier of the given family, configured from `config`
    pub fn new(model_type: ModelType, config: &TrainingConfig) -> Self {
        let seed = config.random_seed;
        match model_type {
            ModelType::LogisticRegression => TrainedClassifier::LogisticRegression(
                LogisticRegression::new()
                    .with_max_iter(config.logistic_max_iter)
                    .with_learning_rate(config.logistic_learning_rate)
                    .with_alpha(config.logistic_alpha),
            ),
            ModelType::DecisionTree => TrainedClassifier::DecisionTree(
                DecisionTree::new_classifier()
                    .with_max_depth_opt(config.tree_max_depth)
                    .with_min_samples_leaf(config.tree_min_samples_leaf)
                    .with_criterion(config.tree_criterion)
                    .with_random_state(seed),
            ),
            ModelType::RandomForest => TrainedClassifier::RandomForest(
                RandomForest::new()
                    .with_n_estimators(config.forest_n_estimators)
                    .with_max_depth(config.forest_max_depth)
                    .with_max_features(config.forest_max_features)
                    .with_bootstrap(config.forest_bootstrap)
                    .with_random_state(seed),
            ),
            ModelType::GradientBoosting => {
                TrainedClassifier::GradientBoosting(GradientBoostingClassifier::new(GradientBoostingConfig {
                    n_estimators: config.boosting_n_estimators,
                    learning_rate: config.boosting_learning_rate,
                    max_depth: config.boosting_max_depth,
                    subsample: config.boosting_subsample,
                    random_state: seed,
                    ..Default::default()
                }))
            }
            ModelType::NaiveBayes => TrainedClassifier::NaiveBayes(GaussianNaiveBayes::new()),
        }
    }

    pub fn model_type(&self) -> ModelType {
        match self {
            TrainedClassifier::LogisticRegression(_) => ModelType::LogisticRegression,
            TrainedClassifier::DecisionTree(_) => ModelType::DecisionTree,
            TrainedClassifier::RandomForest(_) => ModelType::RandomForest,
            TrainedClassifier::GradientBoosting(_) => ModelType::GradientBoosting,
            TrainedClassifier::NaiveBayes(_) => ModelType::NaiveBayes,
        }
    }

    fn inner(&self) -> &dyn ChurnClassifier {
        match self {
            TrainedClassifier::LogisticRegression(m) => m,
            TrainedClassifier::DecisionTree(m) => m,
            TrainedClassifier::RandomForest(m) => m,
            TrainedClassifier::GradientBoosting(m) => m,
            TrainedClassifier::NaiveBayes(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn ChurnClassifier {
        match self {
            TrainedClassifier::LogisticRegression(m) => m,
            TrainedClassifier::DecisionTree(m) => m,
            TrainedClassifier::RandomForest(m) => m,
            TrainedClassifier::GradientBoosting(m) => m,
            TrainedClassifier::NaiveBayes(m) => m,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

impl ChurnClassifier for TrainedClassifier {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict_probability(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.inner().predict_probability(x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.inner().feature_importances()
    }
}

/// Held-out scores of a candidate that fitted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResult {
    pub model_type: ModelType,
    pub name: String,
    pub metrics: ModelMetrics,
}

/// A candidate that failed to fit or produced unusable probabilities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateFailure {
    pub model_type: ModelType,
    pub name: String,
    pub reason: String,
}

impl CandidateFailure {
    pub fn to_error(&self) -> ChurnError {
        ChurnError::CandidateFit {
            model: self.name.clone(),
            reason: self.reason.clone(),
        }
    }
}

/// Outcome of comparing every candidate on the same split
#[derive(Debug, Clone)]
pub struct SelectionReport {
    /// Survivors, best first
    pub ranking: Vec<CandidateResult>,
    pub failures: Vec<CandidateFailure>,
    /// The winning fitted classifier
    pub best: TrainedClassifier,
    /// Winner's importances paired with column names, largest first
    pub feature_importances: Vec<(String, f64)>,
}

impl SelectionReport {
    pub fn best_result(&self) -> &CandidateResult {
        // select() never builds a report with an empty ranking
        &self.ranking[0]
    }

    /// Comparison table in the `model_performance_results.csv` layout
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let names: Vec<&str> = self.ranking.iter().map(|r| r.name.as_str()).collect();
        let metric = |f: fn(&ModelMetrics) -> f64| -> Vec<f64> {
            self.ranking.iter().map(|r| f(&r.metrics)).collect()
        };
        let df = df!(
            "Model" => names,
            "Accuracy" => metric(|m| m.accuracy),
            "Precision" => metric(|m| m.precision),
            "Recall" => metric(|m| m.recall),
            "F1-Score" => metric(|m| m.f1_score),
            "ROC-AUC" => metric(|m| m.roc_auc),
        )?;
        Ok(df)
    }

    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut df = self.to_dataframe()?;
        let mut file = std::fs::File::create(path.as_ref())?;
        CsvWriter::new(&mut file).finish(&mut df)?;
        Ok(())
    }

    /// Importances of the winning model in the `feature_importance.csv` layout,
    /// highest first. Writes nothing and returns `false` when the model has none.
    pub fn write_importances_csv(&self, path: impl AsRef<Path>) -> Result<bool> {
        if self.feature_importances.is_empty() {
            return Ok(false);
        }
        let features: Vec<&str> = self.feature_importances.iter().map(|(n, _)| n.as_str()).collect();
        let importances: Vec<f64> = self.feature_importances.iter().map(|(_, v)| *v).collect();
        let mut df = df!(
            "Feature" => features,
            "Importance" => importances,
        )?;
        let mut file = std::fs::File::create(path.as_ref())?;
        CsvWriter::new(&mut file).finish(&mut df)?;
        Ok(true)
    }

    /// Plain text summary of the comparison
    pub fn summary(&self) -> String {
        let mut report = String::new();
        report.push_str("=== Churn Model Selection Report ===\n\n");

        report.push_str("--- Ranking (ROC-AUC, then F1) ---\n");
        report.push_str(&format!(
            "  {:<22} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9}\n",
            "Model", "Accuracy", "Precision", "Recall", "F1", "ROC-AUC", "Time(s)"
        ));
        for r in &self.ranking {
            let m = &r.metrics;
            report.push_str(&format!(
                "  {:<22} {:>9.4} {:>9.4} {:>9.4} {:>9.4} {:>9.4} {:>9.3}\n",
                r.name, m.accuracy, m.precision, m.recall, m.f1_score, m.roc_auc, m.training_time_secs
            ));
        }
        report.push('\n');

        if !self.failures.is_empty() {
            report.push_str("--- Failed Candidates ---\n");
            for f in &self.failures {
                report.push_str(&format!("  {:<22} {}\n", f.name, f.reason));
            }
            report.push('\n');
        }

        let best = self.best_result();
        let cm = &best.metrics.confusion;
        report.push_str(&format!("--- Best Model: {} ---\n", best.name));
        report.push_str(&format!("  Test samples: {}\n", best.metrics.n_samples));
        report.push_str("  Confusion matrix (rows = actual, cols = predicted)\n");
        report.push_str("               No    Yes\n");
        report.push_str(&format!("    No   {:>6} {:>6}\n", cm.true_negative, cm.false_positive));
        report.push_str(&format!("    Yes  {:>6} {:>6}\n\n", cm.false_negative, cm.true_positive));

        if !self.feature_importances.is_empty() {
            report.push_str("--- Feature Importance ---\n");
            for (name, imp) in &self.feature_importances {
                report.push_str(&format!("  {:<20} {:.4}\n", name, imp));
            }
        }
        report
    }
}

/// Fits every configured candidate and ranks them on the held-out split
#[derive(Debug, Clone)]
pub struct ModelSelector {
    config: TrainingConfig,
}

impl ModelSelector {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    fn evaluate(
        &self,
        model_type: ModelType,
        x_train: &Array2<f64>,
        y_train: &Array1<f64>,
        x_test: &Array2<f64>,
        y_test: &Array1<f64>,
    ) -> Result<(TrainedClassifier, ModelMetrics)> {
        let mut model = TrainedClassifier::new(model_type, &self.config);
        let start = Instant::now();
        model.fit(x_train, y_train)?;
        let elapsed = start.elapsed().as_secs_f64();

        let proba = model.predict_probability(x_test)?;
        if let Some(bad) = proba.iter().find(|p| !p.is_finite()) {
            return Err(ChurnError::TrainingError(format!(
                "non-finite held-out probability {}",
                bad
            )));
        }
        let mut metrics = ModelMetrics::compute(y_test, &proba)?;
        metrics.training_time_secs = elapsed;
        Ok((model, metrics))
    }

    /// Fit, score and rank every candidate. `columns` names the feature columns for the
    /// importance listing.
    pub fn select(
        &self,
        x_train: &Array2<f64>,
        y_train: &Array1<f64>,
        x_test: &Array2<f64>,
        y_test: &Array1<f64>,
        columns: &[String],
    ) -> Result<SelectionReport> {
        let mut fitted: Vec<(CandidateResult, TrainedClassifier)> = Vec::new();
        let mut failures = Vec::new();

        for &model_type in &self.config.candidates {
            let name = model_type.display_name().to_string();
            match self.evaluate(model_type, x_train, y_train, x_test, y_test) {
                Ok((model, metrics)) => {
                    info!(
                        model = %name,
                        roc_auc = metrics.roc_auc,
                        f1 = metrics.f1_score,
                        secs = metrics.training_time_secs,
                        "candidate evaluated"
                    );
                    fitted.push((CandidateResult { model_type, name, metrics }, model));
                }
                Err(e) => {
                    warn!(model = %name, error = %e, "candidate failed");
                    failures.push(CandidateFailure {
                        model_type,
                        name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        // stable: equal scores keep candidate order
        fitted.sort_by(|(a, _), (b, _)| {
            b.metrics
                .roc_auc
                .total_cmp(&a.metrics.roc_auc)
                .then(b.metrics.f1_score.total_cmp(&a.metrics.f1_score))
        });

        let mut iter = fitted.into_iter();
        let (best_result, best) = match iter.next() {
            Some(first) => first,
            None => {
                let listing = failures
                    .iter()
                    .map(|f| format!("{}: {}", f.name, f.reason))
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(ChurnError::NoViableCandidate(listing));
            }
        };

        let mut feature_importances: Vec<(String, f64)> = match best.feature_importances() {
            Some(imp) => columns.iter().cloned().zip(imp.iter().copied()).collect(),
            None => Vec::new(),
        };
        feature_importances.sort_by(|a, b| b.1.total_cmp(&a.1));

        info!(model = %best_result.name, roc_auc = best_result.metrics.roc_auc, "best candidate selected");

        let mut ranking = vec![best_result];
        ranking.extend(iter.map(|(r, _)| r));

        Ok(SelectionReport {
            ranking,
            failures,
            best,
            feature_importances,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{Criterion, MaxFeatures};

    fn separable() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| {
            let base = if i % 2 == 0 { -1.0 } else { 1.0 };
            base + (i as f64 * 0.01) * if j == 0 { 1.0 } else { -1.0 }
        });
        let y = Array1::from_shape_fn(40, |i| (i % 2) as f64);
        (x, y)
    }

    #[test]
    fn test_classifier_bytes_round_trip() {
        let (x, y) = separable();
        let mut model = TrainedClassifier::new(ModelType::DecisionTree, &TrainingConfig::default());
        model.fit(&x, &y).unwrap();

        let restored = TrainedClassifier::from_bytes(&model.to_bytes().unwrap()).unwrap();
        assert_eq!(restored.model_type(), ModelType::DecisionTree);
        assert_eq!(
            restored.predict_probability(&x).unwrap(),
            model.predict_probability(&x).unwrap()
        );
    }

    #[test]
    fn test_failing_candidate_is_isolated() {
        let (x, y) = separable();
        let config = TrainingConfig::default()
            .with_candidates(vec![ModelType::RandomForest, ModelType::LogisticRegression])
            .with_forest_estimators(0);
        let columns = vec!["a".to_string(), "b".to_string()];

        let report = ModelSelector::new(config).select(&x, &y, &x, &y, &columns).unwrap();
        assert_eq!(report.ranking.len(), 1);
        assert_eq!(report.ranking[0].model_type, ModelType::LogisticRegression);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].model_type, ModelType::RandomForest);
        assert!(matches!(report.failures[0].to_error(), ChurnError::CandidateFit { .. }));
    }

    #[test]
    fn test_importances_csv_is_sorted() {
        let (x, y) = separable();
        let config = TrainingConfig::default().with_candidates(vec![ModelType::DecisionTree]);
        let columns = vec!["a".to_string(), "b".to_string()];
        let report = ModelSelector::new(config).select(&x, &y, &x, &y, &columns).unwrap();

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("feature_importance.csv");
        assert!(report.write_importances_csv(&path).unwrap());

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Feature,Importance"));
        let values: Vec<f64> = lines
            .map(|l| l.split(',').nth(1).unwrap().parse().unwrap())
            .collect();
        assert_eq!(values.len(), 2);
        assert!(values.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_hyperparameters_reach_the_learners() {
        let json = r#"{"tree_criterion": "Entropy", "forest_max_features": {"Fixed": 1}, "forest_bootstrap": false}"#;
        let config: TrainingConfig = serde_json::from_str(json).unwrap();

        match TrainedClassifier::new(ModelType::DecisionTree, &config) {
            TrainedClassifier::DecisionTree(tree) => assert_eq!(tree.criterion, Criterion::Entropy),
            other => panic!("unexpected {:?}", other.model_type()),
        }
        match TrainedClassifier::new(ModelType::RandomForest, &config) {
            TrainedClassifier::RandomForest(forest) => {
                assert_eq!(forest.max_features, MaxFeatures::Fixed(1));
                assert!(!forest.bootstrap);
            }
            other => panic!("unexpected {:?}", other.model_type()),
        }

        let (x, y) = separable();
        let mut model = TrainedClassifier::new(ModelType::RandomForest, &config.with_forest_estimators(5));
        model.fit(&x, &y).unwrap();
        assert!(model.predict_probability(&x).unwrap().iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_no_viable_candidate() {
        let (x, y) = separable();
        let config = TrainingConfig::default()
            .with_candidates(vec![ModelType::RandomForest])
            .with_forest_estimators(0);
        let result = ModelSelector::new(config).select(&x, &y, &x, &y, &[]);
        assert!(matches!(result, Err(ChurnError::NoViableCandidate(_))));
    }

    #[test]
    fn test_ranking_order_and_report() {
        let (x, y) = separable();
        let config = TrainingConfig::default()
            .with_candidates(vec![ModelType::LogisticRegression, ModelType::DecisionTree])
            .with_forest_estimators(5);
        let columns = vec!["a".to_string(), "b".to_string()];
        let report = ModelSelector::new(config).select(&x, &y, &x, &y, &columns).unwrap();

        assert_eq!(report.ranking.len(), 2);
        assert!(report.ranking[0].metrics.roc_auc >= report.ranking[1].metrics.roc_auc);
        assert_eq!(report.best.model_type(), report.best_result().model_type);

        let df = report.to_dataframe().unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.get_column_names()[0].as_str(), "Model");
        assert!(report.summary().contains("Best Model"));
    }
}
