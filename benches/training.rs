use churnkit::config::PipelineConfig;
use churnkit::inference::ChurnPredictor;
use churnkit::schema::{CustomerRecord, Schema, TrainingTable};
use churnkit::training::{train, ModelType, TrainingConfig};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

fn random_customer(rng: &mut impl Rng) -> (CustomerRecord, bool) {
    let mut pick = |options: &[&'static str]| options[rng.gen_range(0..options.len())];
    let contract = pick(&["Month-to-month", "One year", "Two year"]);
    let internet = pick(&["DSL", "Fiber optic", "No"]);
    let payment = pick(&[
        "Electronic check",
        "Mailed check",
        "Bank transfer (automatic)",
        "Credit card (automatic)",
    ]);
    let addon = |rng: &mut dyn RngCore| {
        if internet == "No" {
            "No internet service"
        } else if rng.gen_bool(0.5) {
            "Yes"
        } else {
            "No"
        }
    };

    let tenure = rng.gen_range(0..=72) as f64;
    let monthly = rng.gen_range(18.0..119.0_f64);
    let mut risk = 0.15;
    if contract == "Month-to-month" {
        risk += 0.3;
    }
    if internet == "Fiber optic" {
        risk += 0.15;
    }
    if tenure < 12.0 {
        risk += 0.2;
    }
    let churned = rng.gen_bool(f64::min(risk, 0.95));

    let record = CustomerRecord::new()
        .with_text("gender", if rng.gen_bool(0.5) { "Female" } else { "Male" })
        .with_number("SeniorCitizen", if rng.gen_bool(0.16) { 1.0 } else { 0.0 })
        .with_text("Partner", if rng.gen_bool(0.5) { "Yes" } else { "No" })
        .with_text("Dependents", if rng.gen_bool(0.3) { "Yes" } else { "No" })
        .with_number("tenure", tenure)
        .with_text("PhoneService", "Yes")
        .with_text("MultipleLines", if rng.gen_bool(0.4) { "Yes" } else { "No" })
        .with_text("InternetService", internet)
        .with_text("OnlineSecurity", addon(rng))
        .with_text("OnlineBackup", addon(rng))
        .with_text("DeviceProtection", addon(rng))
        .with_text("TechSupport", addon(rng))
        .with_text("StreamingTV", addon(rng))
        .with_text("StreamingMovies", addon(rng))
        .with_text("Contract", contract)
        .with_text("PaperlessBilling", if rng.gen_bool(0.6) { "Yes" } else { "No" })
        .with_text("PaymentMethod", payment)
        .with_number("MonthlyCharges", monthly)
        .with_number("TotalCharges", tenure * monthly);
    (record, churned)
}

fn create_table(n_rows: usize, seed: u64) -> TrainingTable {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut table = TrainingTable::default();
    for _ in 0..n_rows {
        let (record, churned) = random_customer(&mut rng);
        table.push(record, churned);
    }
    table
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10); // Fewer samples for training benchmarks
    let schema = Schema::telco();

    for model_type in [
        ModelType::LogisticRegression,
        ModelType::DecisionTree,
        ModelType::RandomForest,
        ModelType::GradientBoosting,
    ] {
        let table = create_table(2000, 1);
        let config = PipelineConfig::default()
            .with_training(TrainingConfig::default().with_candidates(vec![model_type]));

        group.bench_with_input(BenchmarkId::new("fit", model_type), &table, |b, table| {
            b.iter(|| train(black_box(table), &schema, &config).unwrap())
        });
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");
    let schema = Schema::telco();

    // Train model once
    let outcome = train(&create_table(2000, 1), &schema, &PipelineConfig::default()).unwrap();
    let predictor = ChurnPredictor::new(Arc::new(outcome.bundle), schema);

    for n_rows in [1, 100, 1000] {
        let records: Vec<CustomerRecord> = create_table(n_rows, 2).records().to_vec();

        group.bench_with_input(BenchmarkId::new("predict_batch", n_rows), &records, |b, records| {
            b.iter(|| predictor.predict_batch(black_box(records)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_training, bench_prediction);
criterion_main!(benches);
