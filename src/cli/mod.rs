//! churnkit CLI Module
//!
//! Command-line interface for training, prediction and bundle inspection.

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::error::ChurnError;
use crate::export::ModelRegistry;
use crate::inference::{ChurnPrediction, ChurnPredictor};
use crate::schema::{CustomerRecord, FieldValue, Schema};
use crate::training::{self, ModelType};
use crate::utils::{DataLoader, DataSaver};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn alert(s: &str) -> ColoredString  { s.truecolor(240, 110, 100) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "churnkit")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Customer churn prediction: train, compare and serve classifiers")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// One customer given field by field
#[derive(Args, Debug, Default)]
pub struct RecordArgs {
    #[arg(long)]
    pub gender: Option<String>,
    /// 0 or 1
    #[arg(long)]
    pub senior_citizen: Option<u8>,
    #[arg(long)]
    pub partner: Option<String>,
    #[arg(long)]
    pub dependents: Option<String>,
    /// Months with the company (0-72)
    #[arg(long)]
    pub tenure: Option<f64>,
    #[arg(long)]
    pub phone_service: Option<String>,
    #[arg(long)]
    pub multiple_lines: Option<String>,
    #[arg(long)]
    pub internet_service: Option<String>,
    #[arg(long)]
    pub online_security: Option<String>,
    #[arg(long)]
    pub online_backup: Option<String>,
    #[arg(long)]
    pub device_protection: Option<String>,
    #[arg(long)]
    pub tech_support: Option<String>,
    #[arg(long)]
    pub streaming_tv: Option<String>,
    #[arg(long)]
    pub streaming_movies: Option<String>,
    #[arg(long)]
    pub contract: Option<String>,
    #[arg(long)]
    pub paperless_billing: Option<String>,
    #[arg(long)]
    pub payment_method: Option<String>,
    #[arg(long)]
    pub monthly_charges: Option<f64>,
    #[arg(long)]
    pub total_charges: Option<f64>,
}

impl RecordArgs {
    /// Flags that were given, keyed by schema field name
    fn values(&self) -> Vec<(&'static str, FieldValue)> {
        let text = |name: &'static str, v: &Option<String>| v.clone().map(|s| (name, FieldValue::Text(s)));
        let number = |name: &'static str, v: Option<f64>| v.map(|n| (name, FieldValue::Number(n)));
        [
            text("gender", &self.gender),
            number("SeniorCitizen", self.senior_citizen.map(f64::from)),
            text("Partner", &self.partner),
            text("Dependents", &self.dependents),
            number("tenure", self.tenure),
            text("PhoneService", &self.phone_service),
            text("MultipleLines", &self.multiple_lines),
            text("InternetService", &self.internet_service),
            text("OnlineSecurity", &self.online_security),
            text("OnlineBackup", &self.online_backup),
            text("DeviceProtection", &self.device_protection),
            text("TechSupport", &self.tech_support),
            text("StreamingTV", &self.streaming_tv),
            text("StreamingMovies", &self.streaming_movies),
            text("Contract", &self.contract),
            text("PaperlessBilling", &self.paperless_billing),
            text("PaymentMethod", &self.payment_method),
            number("MonthlyCharges", self.monthly_charges),
            number("TotalCharges", self.total_charges),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train and compare candidate classifiers, then save the best as a bundle
    Train {
        /// Input CSV with the customer columns and Churn
        #[arg(short, long)]
        data: PathBuf,

        /// Bundle directory to write
        #[arg(short, long, default_value = "models/churn_model")]
        output: PathBuf,

        /// Comma separated candidates (logistic,tree,forest,boosting,bayes)
        #[arg(short, long)]
        models: Option<String>,

        /// Held-out fraction
        #[arg(long)]
        test_ratio: Option<f64>,

        /// Random seed for the split and the learners
        #[arg(long)]
        seed: Option<u64>,

        /// Write the comparison table as CSV
        #[arg(long)]
        report: Option<PathBuf>,

        /// Write the winning model's feature importances as CSV
        #[arg(long)]
        importances: Option<PathBuf>,

        /// JSON pipeline configuration
        #[arg(long)]
        config: Option<PathBuf>,

        /// Fail on zero-variance feature columns
        #[arg(long)]
        strict_scaling: bool,
    },

    /// Predict churn for one customer or a CSV of customers
    Predict {
        /// Bundle directory
        #[arg(short, long)]
        model: PathBuf,

        /// Customer record as a JSON file; field flags override its values
        #[arg(short, long)]
        record: Option<PathBuf>,

        /// Batch input CSV instead of a single record
        #[arg(short, long, conflicts_with = "record")]
        data: Option<PathBuf>,

        /// Batch output CSV
        #[arg(short, long, requires = "data")]
        output: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        #[command(flatten)]
        fields: RecordArgs,
    },

    /// Show the manifest of a saved bundle
    Inspect {
        #[arg(short, long)]
        model: PathBuf,
    },

    /// List category vocabularies of a saved bundle
    Vocab {
        #[arg(short, long)]
        model: PathBuf,

        /// Only this field
        #[arg(short, long)]
        field: Option<String>,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub struct TrainArgs<'a> {
    pub data: &'a Path,
    pub output: &'a Path,
    pub models: Option<&'a str>,
    pub test_ratio: Option<f64>,
    pub seed: Option<u64>,
    pub report: Option<&'a Path>,
    pub importances: Option<&'a Path>,
    pub config: Option<&'a Path>,
    pub strict_scaling: bool,
}

/// Defaults, then the config file, then the environment, then flags.
fn build_config(args: &TrainArgs<'_>) -> anyhow::Result<PipelineConfig> {
    let mut config = match args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    }
    .apply_env()?;

    if let Some(models) = args.models {
        config = config.with_candidates(ModelType::parse_list(models)?);
    }
    if let Some(ratio) = args.test_ratio {
        config = config.with_test_ratio(ratio);
    }
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    if args.strict_scaling {
        config = config.with_strict_scaling(true);
    }
    if let Some(name) = args.output.file_name().and_then(|n| n.to_str()) {
        config = config.with_model_name(name);
    }
    config.validate()?;
    Ok(config)
}

pub fn cmd_train(args: TrainArgs<'_>) -> anyhow::Result<()> {
    section("Train");

    let schema = Schema::telco();
    let config = build_config(&args)?;

    step_run("Loading data");
    let start = Instant::now();
    let table = DataLoader::new().load_training_table(args.data, &schema)?;
    step_done(&format!(
        "{} rows, {:.1}% churn in {:?}",
        table.len(),
        table.churn_rate() * 100.0,
        start.elapsed()
    ));

    let names: Vec<&str> = config.training.candidates.iter().map(|m| m.display_name()).collect();
    step_run(&format!("Training {}", names.join(", ").cyan()));
    let start = Instant::now();
    let outcome = training::train(&table, &schema, &config)?;
    step_done(&format!("{:?}", start.elapsed()));

    let report = &outcome.report;
    println!();
    println!(
        "  {:<24} {:>9} {:>9} {:>9} {:>9}",
        muted("Model"),
        muted("Accuracy"),
        muted("F1"),
        muted("ROC-AUC"),
        muted("Time")
    );
    println!("  {}", dim(&"─".repeat(64)));
    for (rank, r) in report.ranking.iter().enumerate() {
        let m = &r.metrics;
        let name = if rank == 0 { r.name.white().bold() } else { r.name.normal() };
        println!(
            "  {:<24} {:>9.4} {:>9.4} {:>9.4} {:>8.2}s",
            name, m.accuracy, m.f1_score, m.roc_auc, m.training_time_secs
        );
    }
    for f in &report.failures {
        println!("  {:<24} {}", f.name, alert(&format!("failed: {}", f.reason)));
    }
    println!("  {}", dim(&"─".repeat(64)));

    let best = report.best_result();
    println!();
    println!("  {} {} {} {:.4}", ok("best"), best.name.white().bold(), muted("ROC-AUC:"), best.metrics.roc_auc);

    if !report.feature_importances.is_empty() {
        section("Top features");
        for (name, imp) in report.feature_importances.iter().take(10) {
            println!("  {:<22} {:.4}", name, imp);
        }
    }

    if let Some(path) = args.report {
        report.write_csv(path)?;
        step_ok(&format!("Report written to {}", path.display()));
    }
    if let Some(path) = args.importances {
        if report.write_importances_csv(path)? {
            step_ok(&format!("Feature importances written to {}", path.display()));
        } else {
            println!("  {}", muted(&format!("{} exposes no feature importances", best.name)));
        }
    }

    println!();
    step_run(&format!("Saving bundle → {}", args.output.display()));
    ModelRegistry::new(schema).save(&outcome.bundle, args.output)?;
    step_done(&outcome.bundle.metadata().id.to_string());
    println!();

    Ok(())
}

fn build_record(record: Option<&Path>, fields: &RecordArgs) -> anyhow::Result<CustomerRecord> {
    let mut customer = match record {
        Some(path) => CustomerRecord::from_json(&std::fs::read_to_string(path)?)?,
        None => CustomerRecord::new(),
    };
    for (name, value) in fields.values() {
        customer.set(name, value);
    }
    Ok(customer)
}

fn print_features(features: &[(String, String)]) {
    section("Customer");
    for (column, value) in features {
        println!("  {:<20} {}", muted(column), value);
    }
}

fn print_prediction(prediction: &ChurnPrediction) {
    let verdict = if prediction.likely_to_churn {
        alert("likely to churn")
    } else {
        ok("likely to stay")
    };

    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", verdict.bold()));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("Churn probability    ", &format!("{:.1}%", prediction.probability * 100.0)));
    line_box(&kv("Retention probability", &format!("{:.1}%", prediction.retention_probability * 100.0)));
    line_box(&kv("Recommendation       ", &prediction.recommendation.to_string()));
    line_box_empty();
    line_box_bottom();

    println!();
    println!("  {}", prediction.recommendation.message());
    for action in prediction.recommendation.actions() {
        println!("  {} {}", accent("›"), action);
    }
    println!();
}

pub fn cmd_predict(
    model: &Path,
    record: Option<&Path>,
    data: Option<&Path>,
    output: Option<&Path>,
    format: OutputFormat,
    fields: &RecordArgs,
) -> anyhow::Result<()> {
    let schema = Schema::telco();
    let predictor = ChurnPredictor::load(model, schema.clone())?;

    if let Some(data) = data {
        return predict_batch(&predictor, &schema, data, output, format);
    }

    let customer = build_record(record, fields)?;
    let prediction = predictor.predict(&customer)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&prediction)?),
        OutputFormat::Text => {
            let codec = predictor.bundle().codec();
            print_features(&codec.describe(&codec.encode(&customer)?)?);
            print_prediction(&prediction);
        }
    }
    Ok(())
}

fn predict_batch(
    predictor: &ChurnPredictor,
    schema: &Schema,
    data: &Path,
    output: Option<&Path>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let loader = DataLoader::new().with_imputation(false);
    let df = loader.load_csv(data)?;
    let records = loader.records_from_dataframe(&df, schema)?;
    let results = predictor.predict_batch(&records);

    let ids: Vec<String> = match schema.id_column().and_then(|c| df.column(c).ok()) {
        Some(col) => col
            .as_materialized_series()
            .str()?
            .into_iter()
            .map(|v| v.unwrap_or("").to_string())
            .collect(),
        None => (0..records.len()).map(|i| i.to_string()).collect(),
    };

    let probability: Vec<Option<f64>> = results.iter().map(|r| r.as_ref().ok().map(|p| p.probability)).collect();
    let likely: Vec<Option<bool>> = results.iter().map(|r| r.as_ref().ok().map(|p| p.likely_to_churn)).collect();
    let recommendation: Vec<Option<String>> = results
        .iter()
        .map(|r| r.as_ref().ok().map(|p| p.recommendation.to_string()))
        .collect();
    let errors: Vec<Option<String>> = results.iter().map(|r| r.as_ref().err().map(ChurnError::to_string)).collect();
    let n_failed = errors.iter().filter(|e| e.is_some()).count();

    let mut out = df!(
        "customerID" => ids,
        "churn_probability" => probability,
        "likely_to_churn" => likely,
        "recommendation" => recommendation,
        "error" => errors,
    )?;

    match (output, format) {
        (Some(path), _) => {
            DataSaver::save_csv(&mut out, path)?;
            step_ok(&format!(
                "{} predictions written to {} ({} rejected)",
                records.len(),
                path.display(),
                n_failed
            ));
        }
        (None, OutputFormat::Json) => {
            let rows: Vec<serde_json::Value> = results
                .iter()
                .map(|r| match r {
                    Ok(p) => serde_json::to_value(p).unwrap_or(serde_json::Value::Null),
                    Err(e) => serde_json::json!({ "error": e.to_string() }),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        (None, OutputFormat::Text) => println!("{}", out),
    }
    Ok(())
}

pub fn cmd_inspect(model: &Path) -> anyhow::Result<()> {
    let manifest = ModelRegistry::new(Schema::telco()).inspect(model)?;
    let meta = &manifest.metadata;
    let m = &meta.metrics;

    section("Bundle");
    println!("  {:<16} {}", muted("Location"), model.display());
    println!("  {:<16} {}", muted("Id"), meta.id);
    println!("  {:<16} {}", muted("Name"), meta.model_name);
    println!("  {:<16} {}", muted("Classifier"), meta.model_type.to_string().white().bold());
    println!("  {:<16} {}", muted("Trained"), meta.trained_at.to_rfc3339());
    println!("  {:<16} v{}", muted("Built with"), meta.crate_version);
    println!("  {:<16} {}", muted("Format"), manifest.format_version);
    println!(
        "  {:<16} {} train / {} test (ratio {}, seed {})",
        muted("Split"),
        meta.n_train,
        meta.n_test,
        meta.test_ratio,
        meta.random_seed
    );

    section("Held-out metrics");
    println!("  {:<16} {:.4}", muted("Accuracy"), m.accuracy);
    println!("  {:<16} {:.4}", muted("Precision"), m.precision);
    println!("  {:<16} {:.4}", muted("Recall"), m.recall);
    println!("  {:<16} {:.4}", muted("F1"), m.f1_score);
    println!("  {:<16} {:.4}", muted("ROC-AUC"), m.roc_auc);

    section("Artifacts");
    for (file, sha) in &manifest.artifacts {
        println!("  {:<16} {}", file, dim(sha));
    }

    section(&format!("Columns ({})", manifest.columns.len()));
    for (i, col) in manifest.columns.iter().enumerate() {
        println!("  {:>3} {}", dim(&i.to_string()), col);
    }
    println!();
    Ok(())
}

pub fn cmd_vocab(model: &Path, field: Option<&str>) -> anyhow::Result<()> {
    let bundle = ModelRegistry::new(Schema::telco()).load(model)?;
    let codec = bundle.codec();

    let vocabularies: Vec<_> = match field {
        Some(name) => vec![codec
            .vocabulary(name)
            .ok_or_else(|| ChurnError::FeatureNotFound(name.to_string()))?],
        None => codec.vocabularies().collect(),
    };

    for vocab in vocabularies {
        section(vocab.field());
        for (code, value) in vocab.values().iter().enumerate() {
            println!("  {:>3} {}", accent(&code.to_string()), value);
        }
    }
    println!();
    Ok(())
}

pub fn show_help() {
    section("Commands");

    let cmds: &[(&str, &str)] = &[
        ("churnkit train -d telco.csv", "Train, compare and save the best model"),
        ("churnkit train -d telco.csv -m logistic,forest", "Compare a subset of models"),
        ("churnkit predict -m models/churn_model -r c.json", "Predict one customer"),
        ("churnkit predict -m models/churn_model -d in.csv", "Predict a CSV of customers"),
        ("churnkit inspect -m models/churn_model", "Show bundle manifest"),
        ("churnkit vocab -m models/churn_model", "List category codes"),
    ];

    for (cmd, desc) in cmds {
        println!("  {:<50} {}", cmd.white(), muted(desc));
    }

    section("Environment");
    let vars: &[(&str, &str)] = &[
        ("CHURNKIT_SEED", "Override the random seed"),
        ("CHURNKIT_TEST_RATIO", "Override the held-out fraction"),
        ("CHURNKIT_MODELS", "Override the candidate list"),
        ("RUST_LOG", "Log filter (default churnkit=info)"),
    ];
    for (var, desc) in vars {
        println!("  {:<50} {}", var.truecolor(120, 170, 255), muted(desc));
    }
    println!();
}
