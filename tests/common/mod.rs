//! Shared fixtures: a deterministic synthetic Telco table

#![allow(dead_code)]

use churnkit::schema::{CustomerRecord, FieldValue, Schema, TrainingTable};
use std::io::Write;
use std::path::Path;

/// Row `i` churns when `i % 10 < 3`, so 100 rows give 30 churned customers.
pub fn is_churned(i: usize) -> bool {
    i % 10 < 3
}

pub fn customer(i: usize) -> CustomerRecord {
    let churned = is_churned(i);
    let pick = |options: &[&'static str]| options[i % options.len()];

    let (tenure, monthly, contract, internet, payment) = if churned {
        (
            1.0 + (i % 6) as f64,
            85.0 + (i % 5) as f64 * 4.0,
            "Month-to-month",
            "Fiber optic",
            "Electronic check",
        )
    } else {
        (
            30.0 + (i % 40) as f64,
            20.0 + (i % 9) as f64 * 5.0,
            pick(&["One year", "Two year"]),
            pick(&["DSL", "No", "DSL"]),
            pick(&["Mailed check", "Bank transfer (automatic)", "Credit card (automatic)"]),
        )
    };
    let addon = |options: &[&'static str]| {
        if internet == "No" {
            "No internet service"
        } else {
            pick(options)
        }
    };

    CustomerRecord::new()
        .with_text("gender", pick(&["Female", "Male"]))
        .with_number("SeniorCitizen", if i % 7 == 0 { 1.0 } else { 0.0 })
        .with_text("Partner", pick(&["Yes", "No", "No"]))
        .with_text("Dependents", pick(&["No", "Yes"]))
        .with_number("tenure", tenure)
        .with_text("PhoneService", if i % 9 == 0 { "No" } else { "Yes" })
        .with_text("MultipleLines", if i % 9 == 0 { "No phone service" } else { pick(&["No", "Yes"]) })
        .with_text("InternetService", internet)
        .with_text("OnlineSecurity", addon(&["No", "Yes"]))
        .with_text("OnlineBackup", addon(&["Yes", "No", "No"]))
        .with_text("DeviceProtection", addon(&["No", "Yes"]))
        .with_text("TechSupport", addon(&["No", "No", "Yes"]))
        .with_text("StreamingTV", addon(&["Yes", "No"]))
        .with_text("StreamingMovies", addon(&["No", "Yes"]))
        .with_text("Contract", contract)
        .with_text("PaperlessBilling", pick(&["Yes", "No"]))
        .with_text("PaymentMethod", payment)
        .with_number("MonthlyCharges", monthly)
        .with_number("TotalCharges", (tenure * monthly * 100.0).round() / 100.0)
}

pub fn synthetic_table(n: usize) -> TrainingTable {
    let mut table = TrainingTable::default();
    for i in 0..n {
        table.push(customer(i), is_churned(i));
    }
    table
}

fn cell(value: Option<&FieldValue>) -> String {
    match value {
        Some(FieldValue::Text(s)) => s.clone(),
        Some(FieldValue::Number(n)) => n.to_string(),
        None => String::new(),
    }
}

/// Write the synthetic table as a Telco CSV. Rows listed in `blank_total` get a
/// single-space `TotalCharges`, as in the public dataset.
pub fn write_csv(path: &Path, n: usize, blank_total: &[usize]) {
    let schema = Schema::telco();
    let mut file = std::fs::File::create(path).unwrap();

    let mut header = vec!["customerID".to_string()];
    header.extend(schema.field_names());
    header.push("Churn".to_string());
    writeln!(file, "{}", header.join(",")).unwrap();

    for i in 0..n {
        let record = customer(i);
        let mut row = vec![format!("{:04}-TEST", i)];
        for name in schema.field_names() {
            if name == "TotalCharges" && blank_total.contains(&i) {
                row.push(" ".to_string());
            } else {
                let value = cell(record.get(&name));
                row.push(if value.contains(' ') || value.contains('(') {
                    format!("\"{}\"", value)
                } else {
                    value
                });
            }
        }
        row.push(if is_churned(i) { "Yes" } else { "No" }.to_string());
        writeln!(file, "{}", row.join(",")).unwrap();
    }
}
