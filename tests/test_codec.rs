//! Integration test: feature codec and scaler on the Telco schema

mod common;

use churnkit::error::ChurnError;
use churnkit::preprocessing::{FeatureCodec, StandardScaler};
use churnkit::schema::{FieldValue, Schema};
use ndarray::{array, Array2};

fn fitted_codec() -> (Schema, FeatureCodec) {
    let schema = Schema::telco();
    let codec = FeatureCodec::fit(&schema, &common::synthetic_table(100)).unwrap();
    (schema, codec)
}

fn column(codec: &FeatureCodec, name: &str) -> usize {
    codec.columns().iter().position(|c| c == name).unwrap()
}

#[test]
fn test_column_order_is_schema_then_derived() {
    let (schema, codec) = fitted_codec();
    assert_eq!(codec.n_features(), 22);
    assert_eq!(codec.columns(), FeatureCodec::expected_columns(&schema).as_slice());
    assert_eq!(codec.columns()[0], "gender");
    assert_eq!(
        &codec.columns()[19..],
        &["AvgMonthlyCharges".to_string(), "TenureGroup".to_string(), "ChargesGroup".to_string()]
    );

    let refit = FeatureCodec::fit(&schema, &common::synthetic_table(100)).unwrap();
    assert_eq!(refit, codec);
}

#[test]
fn test_vocabulary_round_trip_for_every_field() {
    let (schema, codec) = fitted_codec();
    for spec in schema.categorical_fields() {
        let vocab = codec.vocabulary(&spec.name).unwrap();
        assert!(!vocab.is_empty(), "{} has no values", spec.name);
        for value in vocab.values() {
            let code = codec.encode_category(&spec.name, value).unwrap();
            assert_eq!(codec.decode_category(&spec.name, code).unwrap(), value);
        }
    }
}

#[test]
fn test_internet_service_codes_are_sorted_per_field() {
    let (_, codec) = fitted_codec();
    assert_eq!(codec.encode_category("InternetService", "DSL").unwrap(), 0);
    assert_eq!(codec.encode_category("InternetService", "Fiber optic").unwrap(), 1);
    assert_eq!(codec.encode_category("InternetService", "No").unwrap(), 2);

    // same string, different field, different code
    assert_eq!(codec.encode_category("Partner", "No").unwrap(), 0);
    assert_eq!(codec.encode_category("OnlineSecurity", "No internet service").unwrap(), 1);
}

#[test]
fn test_encoding_is_deterministic() {
    let (schema, codec) = fitted_codec();
    let other = FeatureCodec::fit(&schema, &common::synthetic_table(100)).unwrap();
    for i in [0, 7, 42, 99] {
        let record = common::customer(i);
        let a = codec.encode(&record).unwrap();
        let b = other.encode(&record).unwrap();
        let bits_a: Vec<u64> = a.iter().map(|v| v.to_bits()).collect();
        let bits_b: Vec<u64> = b.iter().map(|v| v.to_bits()).collect();
        assert_eq!(bits_a, bits_b);
    }
}

#[test]
fn test_derived_features_and_bucket_edges() {
    let (_, codec) = fitted_codec();
    let tenure_group = column(&codec, "TenureGroup");
    let charges_group = column(&codec, "ChargesGroup");
    let avg = column(&codec, "AvgMonthlyCharges");

    for (tenure, expected) in [(0.0, 0.0), (11.0, 0.0), (12.0, 1.0), (23.0, 1.0), (24.0, 2.0), (47.0, 2.0), (48.0, 3.0), (72.0, 3.0)] {
        let mut record = common::customer(3);
        record.set("tenure", FieldValue::Number(tenure));
        let v = codec.encode(&record).unwrap();
        assert_eq!(v[tenure_group], expected, "tenure {}", tenure);
    }

    for (charges, expected) in [(0.0, 0.0), (18.25, 0.0), (34.99, 0.0), (35.0, 1.0), (69.99, 1.0), (70.0, 2.0), (104.9, 2.0), (105.0, 3.0), (118.75, 3.0), (120.0, 3.0)] {
        let mut record = common::customer(3);
        record.set("MonthlyCharges", FieldValue::Number(charges));
        let v = codec.encode(&record).unwrap();
        assert_eq!(v[charges_group], expected, "charges {}", charges);
    }

    let mut record = common::customer(3);
    record.set("tenure", FieldValue::Number(9.0));
    record.set("TotalCharges", FieldValue::Number(500.0));
    let v = codec.encode(&record).unwrap();
    assert!((v[avg] - 50.0).abs() < 1e-12);
}

#[test]
fn test_unknown_category_rejected() {
    let (_, codec) = fitted_codec();
    let mut record = common::customer(1);
    record.set("PaymentMethod", FieldValue::Text("Bitcoin".to_string()));

    match codec.encode(&record) {
        Err(ChurnError::UnknownCategory { field, value, allowed }) => {
            assert_eq!(field, "PaymentMethod");
            assert_eq!(value, "Bitcoin");
            assert!(allowed.contains(&"Electronic check".to_string()));
        }
        other => panic!("expected UnknownCategory, got {:?}", other),
    }
}

#[test]
fn test_malformed_records_rejected() {
    let (schema, codec) = fitted_codec();

    let extra = common::customer(2).with_text("extra", "ignored");
    assert_eq!(codec.encode(&extra).unwrap().len(), 22);

    let mut wrong_type = common::customer(2);
    wrong_type.set("tenure", FieldValue::Text("twelve".to_string()));
    assert!(matches!(codec.encode(&wrong_type), Err(ChurnError::InvalidFieldValue { .. })));

    let mut out_of_range = common::customer(2);
    out_of_range.set("tenure", FieldValue::Number(500.0));
    let err = schema.validate(&out_of_range).unwrap_err();
    assert!(err.is_rejected_input());

    let json = r#"{"gender": "Male", "tenure": 4}"#;
    let partial = churnkit::schema::CustomerRecord::from_json(json).unwrap();
    assert!(matches!(codec.encode(&partial), Err(ChurnError::MissingField(_))));
}

#[test]
fn test_scaler_on_encoded_table() {
    let (_, codec) = fitted_codec();
    let x = codec.encode_table(&common::synthetic_table(100)).unwrap();

    let mut scaler = StandardScaler::new();
    scaler.fit(&x, codec.columns()).unwrap();
    let state = scaler.state().unwrap().clone();

    let means = ndarray::Array1::from_vec(state.means.clone());
    let stds = ndarray::Array1::from_vec(state.stds.clone());
    let at_mean = scaler.transform(&means).unwrap();
    let one_sigma = scaler.transform(&(&means + &stds)).unwrap();
    assert!(at_mean.iter().all(|v| v.abs() < 1e-9));
    assert!(one_sigma.iter().all(|v| (v - 1.0).abs() < 1e-9));

    let scaled = scaler.transform_matrix(&x).unwrap();
    let row = scaler.inverse_transform(&scaled.row(5).to_owned()).unwrap();
    for (a, b) in row.iter().zip(x.row(5).iter()) {
        assert!((a - b).abs() < 1e-9);
    }
}

#[test]
fn test_scaler_refuses_wrong_width() {
    let mut scaler = StandardScaler::new();
    let x: Array2<f64> = array![[1.0, 2.0], [3.0, 5.0]];
    scaler.fit(&x, &["a".to_string(), "b".to_string()]).unwrap();
    assert!(matches!(
        scaler.transform(&array![1.0, 2.0, 3.0]),
        Err(ChurnError::ShapeError { .. })
    ));
}

#[test]
fn test_codec_json_round_trip() {
    let (schema, codec) = fitted_codec();
    let json = serde_json::to_string(&codec).unwrap();
    let restored: FeatureCodec = serde_json::from_str(&json).unwrap();
    restored.verify(&schema).unwrap();
    assert_eq!(
        restored.encode(&common::customer(11)).unwrap(),
        codec.encode(&common::customer(11)).unwrap()
    );
}

#[test]
fn test_describe_decodes_categories() {
    let (_, codec) = fitted_codec();
    let record = common::customer(0);
    let described = codec.describe(&codec.encode(&record).unwrap()).unwrap();

    assert_eq!(described.len(), 22);
    assert!(described.contains(&("Contract".to_string(), "Month-to-month".to_string())));
    assert!(described.contains(&("InternetService".to_string(), "Fiber optic".to_string())));
    assert!(described.contains(&("tenure".to_string(), "1".to_string())));
}
