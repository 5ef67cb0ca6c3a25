//! JSON shapes of released statistics.
//!
//! Field names are part of the release contract consumed by reporting and
//! deposit code.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Noisy per-category counts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistogramValue {
    /// Bucket labels, last one "uncategorized".
    pub categories: Vec<String>,
    /// Noisy counts, aligned with `categories`.
    pub values: Vec<i64>,
    /// `(category, count)` pairs.
    pub category_value_pairs: Vec<(String, i64)>,
}

impl HistogramValue {
    /// Pair up labels and counts.
    pub fn new(categories: Vec<String>, values: Vec<i64>) -> Self {
        let category_value_pairs = categories
            .iter()
            .cloned()
            .zip(values.iter().copied())
            .collect();
        Self {
            categories,
            values,
            category_value_pairs,
        }
    }
}

/// A computed noisy statistic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatValue {
    /// Integer-valued result (count, integer sum).
    Integer(i64),
    /// Real-valued result.
    Float(f64),
    /// Histogram result.
    Histogram(HistogramValue),
}

impl StatValue {
    /// Scalar view of the value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StatValue::Integer(i) => Some(*i as f64),
            StatValue::Float(x) => Some(*x),
            StatValue::Histogram(_) => None,
        }
    }

    /// Histogram view of the value.
    pub fn as_histogram(&self) -> Option<&HistogramValue> {
        match self {
            StatValue::Histogram(h) => Some(h),
            _ => None,
        }
    }
}

/// Wrapper matching `{"value": ...}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultValue {
    /// The noisy result.
    pub value: StatValue,
}

/// Declared bounds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Lower bound.
    pub min: Value,
    /// Upper bound.
    pub max: Value,
}

/// Boolean labels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BooleanValues {
    /// True label.
    pub true_value: String,
    /// False label.
    pub false_value: String,
}

/// Missing value policy as released.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MissingValueHandlingEntry {
    /// Policy name.
    #[serde(rename = "type")]
    pub kind: String,
    /// Impute value, present only for `insert_fixed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_value: Option<Value>,
}

/// Accuracy statement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccuracyEntry {
    /// Interval half-width.
    pub value: f64,
    /// Human-readable statement.
    pub message: String,
}

/// Short description in two formats.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Description {
    /// HTML rendering.
    pub html: String,
    /// Plain-text rendering.
    pub text: String,
}

/// One released statistic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReleaseEntry {
    /// Statistic name.
    pub statistic: String,
    /// Variable name.
    pub variable: String,
    /// Variable type.
    pub variable_type: String,
    /// Noisy result.
    pub result: ResultValue,
    /// Noise mechanism name.
    pub noise_mechanism: String,
    /// Epsilon spent.
    pub epsilon: f64,
    /// Delta spent.
    pub delta: f64,
    /// Bounds, for bounded statistics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
    /// Boolean labels, for boolean statistics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boolean_values: Option<BooleanValues>,
    /// Missing value policy.
    pub missing_value_handling: MissingValueHandlingEntry,
    /// Confidence level.
    pub confidence_level: f64,
    /// `1 - confidence_level`.
    pub confidence_level_alpha: f64,
    /// Accuracy statement.
    pub accuracy: AccuracyEntry,
    /// Description.
    pub description: Description,
    /// Histogram edges, for integer histograms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub histogram_bin_edges: Option<Vec<i64>>,
    /// Set when the statistic was added automatically.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub auto_generated: bool,
}

/// A request that could not become a valid statistic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// Variable name, as submitted.
    pub variable: String,
    /// Statistic name, as submitted.
    pub statistic: String,
    /// Always false.
    pub valid: bool,
    /// User-facing reason.
    pub message: String,
}

impl ErrorEntry {
    /// Build an error entry.
    pub fn new(
        variable: impl Into<String>,
        statistic: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            variable: variable.into(),
            statistic: statistic.into(),
            valid: false,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn histogram_value_shape() {
        let h = HistogramValue::new(vec!["a".into(), "uncategorized".into()], vec![3, 0]);
        let v = serde_json::to_value(StatValue::Histogram(h)).expect("json");
        assert_eq!(
            v,
            json!({
                "categories": ["a", "uncategorized"],
                "values": [3, 0],
                "category_value_pairs": [["a", 3], ["uncategorized", 0]]
            })
        );
    }

    #[test]
    fn fixed_value_only_for_insert_fixed() {
        let entry = MissingValueHandlingEntry {
            kind: "drop".into(),
            fixed_value: None,
        };
        assert_eq!(serde_json::to_value(entry).unwrap(), json!({"type": "drop"}));
    }

    #[test]
    fn error_entry_shape() {
        let e = ErrorEntry::new("age", "mean", "bad");
        assert_eq!(
            serde_json::to_value(e).unwrap(),
            json!({"variable": "age", "statistic": "mean", "valid": false, "message": "bad"})
        );
    }
}
