use dpcreator::stats::{StatSpecVariant, UNCATEGORIZED};
use dpcreator::{
    DataLayout, DpConfig, MissingValuesHandling, StatSpec, StatSpecRequest, StatValue,
    StatisticKind, StatisticRequest, VariableInfo, VariableType,
};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde_json::{json, Value};

fn wide_csv(rows: usize) -> (DataLayout, String) {
    let columns: Vec<String> = (0..11).map(|i| format!("c{i}")).collect();
    let mut text = columns.join(",");
    text.push('\n');
    for r in 0..rows {
        let row: Vec<String> = (0..11).map(|c| ((r + c) % 50).to_string()).collect();
        text.push_str(&row.join(","));
        text.push('\n');
    }
    (DataLayout::new(',', columns), text)
}

#[test]
fn count_over_ten_thousand_rows_stays_close() {
    let cfg = DpConfig::default();
    let (layout, text) = wide_csv(10_000);
    let info = VariableInfo::numeric("c3", VariableType::Integer, 0.0, 49.0);
    let req = StatisticRequest::new(StatisticKind::Count, "c3", 1.0).with_cl(0.95);
    let spec = StatSpec::new(&StatSpecRequest::new(req, info, 3), &cfg).expect("valid");
    assert!(spec.is_chain_valid());

    let chained = spec.build_chain().expect("chain");
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let computed = chained
        .run_chain_with_rng(text.as_bytes(), &layout, &mut rng)
        .expect("computed");
    let StatValue::Integer(count) = computed.value() else {
        panic!("count should be an integer, got {:?}", computed.value());
    };
    assert!(*count > 9_800 && *count < 10_200, "count {count}");
    assert_eq!(computed.release_entry().noise_mechanism, "Geometric");
}

#[test]
fn bin_edges_histogram_layout() {
    let cfg = DpConfig::default();
    let info = VariableInfo::numeric("age", VariableType::Integer, 18.0, 75.0);
    let mut req = StatisticRequest::new(StatisticKind::Histogram, "age", 0.5)
        .with_bin_type("bin_edges")
        .with_missing_values(MissingValuesHandling::Drop, Value::Null);
    req.histogram_bin_edges = json!([18, 25, 35, 45, 55, 65, 75]);
    let spec = StatSpec::new(&StatSpecRequest::new(req, info, 0), &cfg).expect("valid");
    assert_eq!(spec.variant().output_len(), 7);

    let layout = DataLayout::new(',', vec!["age".into()]);
    let data = "age\n18\n24\n25\n75\n76\n\n40\n";
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let entry = spec
        .build_chain()
        .expect("chain")
        .run_chain_with_rng(data.as_bytes(), &layout, &mut rng)
        .expect("computed")
        .release_entry();

    let hist = entry.result.value.as_histogram().expect("histogram");
    assert_eq!(
        hist.categories,
        vec![
            "[18,24]",
            "[25,34]",
            "[35,44]",
            "[45,54]",
            "[55,64]",
            "[65,75]",
            UNCATEGORIZED
        ]
    );
    assert_eq!(hist.values.len(), 7);
    assert!(hist.values.iter().all(|v| *v >= 0));
    assert_eq!(
        entry.histogram_bin_edges,
        Some(vec![18, 25, 35, 45, 55, 65, 76])
    );
}

#[test]
fn equal_ranges_and_one_per_value_bucket_counts() {
    let cfg = DpConfig::default();
    let info = VariableInfo::numeric("score", VariableType::Integer, 0.0, 99.0);
    let mut req = StatisticRequest::new(StatisticKind::Histogram, "score", 0.5)
        .with_bin_type("equal_ranges")
        .with_missing_values(MissingValuesHandling::InsertRandom, Value::Null);
    req.histogram_number_of_bins = json!(10);
    let spec = StatSpec::new(&StatSpecRequest::new(req, info.clone(), 0), &cfg).expect("valid");
    assert_eq!(spec.variant().categories().map(<[String]>::len), Some(11));

    let req = StatisticRequest::new(StatisticKind::Histogram, "score", 0.5)
        .with_missing_values(MissingValuesHandling::Drop, Value::Null);
    let spec = StatSpec::new(&StatSpecRequest::new(req, info, 0), &cfg).expect("valid");
    assert_eq!(spec.variant().output_len(), 100 + 1);
}

#[test]
fn boolean_histogram_fixed_value_falls_into_uncategorized() {
    let cfg = DpConfig::default();
    let info = VariableInfo::boolean("smoker", json!("yes"), json!("no"));
    let req = StatisticRequest::new(StatisticKind::Histogram, "smoker", 1.0)
        .with_missing_values(MissingValuesHandling::InsertFixed, json!("unknown"));
    let spec = StatSpec::new(&StatSpecRequest::new(req, info, 1), &cfg).expect("valid");

    let layout = DataLayout::new(',', vec!["id".into(), "smoker".into()]);
    let mut data = String::from("id,smoker\n");
    for i in 0..300 {
        let answer = ["yes", "yes", "no", ""][i % 4];
        data.push_str(&format!("{i},{answer}\n"));
    }
    let mut rng = ChaCha8Rng::seed_from_u64(8);
    let entry = spec
        .build_chain()
        .expect("chain")
        .run_chain_with_rng(data.as_bytes(), &layout, &mut rng)
        .expect("computed")
        .release_entry();
    let hist = entry.result.value.as_histogram().expect("histogram");
    assert_eq!(hist.categories, vec!["yes", "no", UNCATEGORIZED]);
    assert!((hist.values[0] - 150).abs() < 25, "{:?}", hist.values);
    assert!((hist.values[2] - 75).abs() < 25, "{:?}", hist.values);
    let labels = entry.boolean_values.expect("labels");
    assert_eq!(labels.true_value, "yes");
}

#[test]
fn categorical_histogram_counts_labels() {
    let cfg = DpConfig::default();
    let info = VariableInfo::categorical("color", ["red, green", "blue"]);
    let req = StatisticRequest::new(StatisticKind::Histogram, "color", 1.0)
        .with_missing_values(MissingValuesHandling::InsertFixed, json!("\"red\""));
    let spec = StatSpec::new(&StatSpecRequest::new(req, info, 1), &cfg).expect("valid");

    let layout = DataLayout::new(',', vec!["id".into(), "color".into()]);
    let mut data = String::from("id,color\n");
    for i in 0..300 {
        let color = ["red", "\"green\"", "", "purple"][i % 4];
        data.push_str(&format!("{i},{color}\n"));
    }
    let mut rng = ChaCha8Rng::seed_from_u64(13);
    let entry = spec
        .build_chain()
        .expect("chain")
        .run_chain_with_rng(data.as_bytes(), &layout, &mut rng)
        .expect("computed")
        .release_entry();
    let hist = entry.result.value.as_histogram().expect("histogram");
    assert_eq!(hist.categories, vec!["blue", "green", "red", UNCATEGORIZED]);
    // red: 75 present + 75 imputed; green: 75; purple: 75 uncategorized
    let red = hist.category_value_pairs[2].1;
    assert!((red - 150).abs() < 25, "{:?}", hist.values);
    assert!((hist.values[3] - 75).abs() < 25, "{:?}", hist.values);
    assert_eq!(entry.missing_value_handling.kind, "insert_fixed");
}

#[test]
fn wrong_column_count_is_reported_not_panicked() {
    let cfg = DpConfig::default();
    let info = VariableInfo::numeric("x", VariableType::Float, 0.0, 1.0);
    let req = StatisticRequest::new(StatisticKind::Count, "x", 0.5);
    let chained = StatSpec::new(&StatSpecRequest::new(req, info, 0), &cfg)
        .and_then(|s| s.build_chain())
        .expect("chain");
    let layout = DataLayout::new(',', vec!["x".into(), "y".into()]);
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let err = chained
        .run_chain_with_rng("x,y\n0.5\n".as_bytes(), &layout, &mut rng)
        .unwrap_err();
    assert!(err.to_string().contains("columns"));
}

fn mean_request(epsilon: f64, cl: f64) -> StatSpecRequest {
    let info = VariableInfo::numeric("income", VariableType::Float, 0.0, 200_000.0);
    let req = StatisticRequest::new(StatisticKind::Mean, "income", epsilon)
        .with_cl(cl)
        .with_missing_values(MissingValuesHandling::InsertFixed, json!(50_000));
    StatSpecRequest::new(req, info, 0).with_dataset_size(5_000)
}

proptest! {
    #[test]
    fn validation_is_idempotent(
        epsilon in -0.5f64..1.5,
        cl in prop::sample::select(vec![0.5, 0.9, 0.95, 0.99, 1.2]),
    ) {
        let cfg = DpConfig::default();
        let req = mean_request(epsilon, cl);
        let first = StatSpec::new(&req, &cfg);
        let second = StatSpec::new(&req, &cfg);
        prop_assert_eq!(first.is_ok(), second.is_ok());
        match (first, second) {
            (Ok(a), Ok(b)) => prop_assert_eq!(a, b),
            (Err(a), Err(b)) => prop_assert_eq!(a.first(), b.first()),
            _ => unreachable!(),
        }
    }

    #[test]
    fn accuracy_decreases_with_epsilon(
        low in 0.01f64..0.5,
        bump in 0.01f64..0.5,
    ) {
        let cfg = DpConfig::default();
        let accuracy = |eps: f64| {
            StatSpec::new(&mean_request(eps, 0.95), &cfg)
                .and_then(|s| s.build_chain())
                .map(|c| c.accuracy())
        };
        let a = accuracy(low).unwrap();
        let b = accuracy(low + bump).unwrap();
        prop_assert!(b < a, "{} !< {}", b, a);
    }
}
