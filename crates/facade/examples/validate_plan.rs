use dpcreator::{AnalysisPlan, DpConfig};
use serde_json::json;

fn main() {
    let plan = json!({
        "dataset": {
            "name": "household survey",
            "column_names": ["id", "age", "income"],
            "variables": {
                "age": {"name": "age", "type": "integer", "min": 18, "max": 90},
                "income": {"name": "income", "type": "float", "min": 0, "max": 250000}
            },
            "row_count": 1200,
            "size_is_public": false
        },
        "statistics": [
            {"statistic": "mean", "variable": "income", "epsilon": 0.4, "cl": 0.95,
             "missing_values_handling": "insert_fixed", "fixed_value": 52000},
            {"statistic": "histogram", "variable": "age", "epsilon": 0.3, "cl": 0.95,
             "histogram_bin_type": "equal_ranges", "histogram_number_of_bins": 8,
             "missing_values_handling": "drop"},
            {"statistic": "variance", "variable": "age", "epsilon": 0.4, "cl": 0.99,
             "missing_values_handling": "drop"}
        ],
        "budget": {"ceiling_epsilon": 1.0}
    });

    let plan = AnalysisPlan::from_json(&plan.to_string()).expect("plan");
    let validation = plan.validate(&DpConfig::default());
    println!(
        "{}",
        serde_json::to_string_pretty(&validation).expect("json")
    );
    println!("plan valid: {}", validation.is_valid());
}
