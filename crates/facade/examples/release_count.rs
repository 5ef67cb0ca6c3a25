use dpcreator::{
    DataLayout, DpConfig, MissingValuesHandling, StatSpec, StatSpecRequest, StatisticKind,
    StatisticRequest, VariableInfo, VariableType,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde_json::json;

fn main() {
    let mut data = String::from("id,visits\n");
    for i in 0..500 {
        let visits = if i % 7 == 0 { String::new() } else { (i % 12).to_string() };
        data.push_str(&format!("{i},{visits}\n"));
    }
    let layout = DataLayout::new(',', vec!["id".into(), "visits".into()]);
    let info = VariableInfo::numeric("visits", VariableType::Integer, 0.0, 11.0);
    let cfg = DpConfig::default();
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    let count = StatisticRequest::new(StatisticKind::Count, "visits", 0.5)
        .with_missing_values(MissingValuesHandling::Drop, json!(null));
    let spec = StatSpec::new(&StatSpecRequest::new(count, info.clone(), 1), &cfg).expect("count");
    let chained = spec.build_chain().expect("chain");
    println!("{}", chained.accuracy_message());
    let computed = chained
        .run_chain_with_rng(data.as_bytes(), &layout, &mut rng)
        .expect("computed");
    println!("noisy count of non-missing visits: {:?}", computed.value());

    let hist = StatisticRequest::new(StatisticKind::Histogram, "visits", 0.5)
        .with_missing_values(MissingValuesHandling::InsertFixed, json!(0));
    let chained = StatSpec::new(&StatSpecRequest::new(hist, info, 1), &cfg)
        .and_then(|s| s.build_chain())
        .expect("histogram");
    let entry = chained
        .run_chain_with_rng(data.as_bytes(), &layout, &mut rng)
        .expect("computed")
        .release_entry();
    println!(
        "{}",
        serde_json::to_string_pretty(&entry).expect("json")
    );
}
