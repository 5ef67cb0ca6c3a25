//! Raw statistic requests and dataset metadata.
//!
//! Requests arrive untrusted, so numeric fields are kept as loose JSON values
//! and coerced during the first validation phase.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Statistics a request may name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatisticKind {
    /// Number of records.
    Count,
    /// Bounded mean.
    Mean,
    /// Bounded sum.
    Sum,
    /// Bounded sample variance.
    Variance,
    /// Per-category counts.
    Histogram,
    /// Quantile (recognised, not computable).
    Quantile,
}

impl StatisticKind {
    /// Lower-case name used in requests and releases.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatisticKind::Count => "count",
            StatisticKind::Mean => "mean",
            StatisticKind::Sum => "sum",
            StatisticKind::Variance => "variance",
            StatisticKind::Histogram => "histogram",
            StatisticKind::Quantile => "quantile",
        }
    }

    /// Whether computing this statistic needs the dataset size.
    pub fn requires_dataset_size(&self) -> bool {
        matches!(
            self,
            StatisticKind::Mean
                | StatisticKind::Sum
                | StatisticKind::Quantile
                | StatisticKind::Variance
        )
    }

    /// Whether a release can compute this statistic.
    pub fn is_supported(&self) -> bool {
        !matches!(self, StatisticKind::Quantile)
    }
}

impl fmt::Display for StatisticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatisticKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "count" => Ok(StatisticKind::Count),
            "mean" => Ok(StatisticKind::Mean),
            "sum" => Ok(StatisticKind::Sum),
            "variance" => Ok(StatisticKind::Variance),
            "histogram" => Ok(StatisticKind::Histogram),
            "quantile" => Ok(StatisticKind::Quantile),
            other => Err(format!("Statistic \"{other}\" is not supported.")),
        }
    }
}

/// Column type as reported by the dataset profiler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableType {
    /// Whole numbers.
    #[serde(rename = "integer", alias = "Integer")]
    Integer,
    /// Real numbers.
    #[serde(rename = "float", alias = "Float")]
    Float,
    /// Free-form labels.
    #[serde(rename = "categorical", alias = "Categorical")]
    Categorical,
    /// Two-valued labels.
    #[serde(rename = "boolean", alias = "Boolean")]
    Boolean,
}

impl VariableType {
    /// Lower-case name used in releases.
    pub fn as_str(&self) -> &'static str {
        match self {
            VariableType::Integer => "integer",
            VariableType::Float => "float",
            VariableType::Categorical => "categorical",
            VariableType::Boolean => "boolean",
        }
    }

    /// Integer or float.
    pub fn is_numeric(&self) -> bool {
        matches!(self, VariableType::Integer | VariableType::Float)
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Policy for cells that are empty or cannot be coerced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MissingValuesHandling {
    /// Skip the record.
    #[serde(rename = "drop")]
    Drop,
    /// Replace with a random in-domain value.
    #[serde(rename = "insert_random")]
    InsertRandom,
    /// Replace with the request's fixed value.
    #[serde(rename = "insert_fixed")]
    InsertFixed,
    /// No imputation (count only).
    #[serde(rename = "")]
    NotApplicable,
}

impl MissingValuesHandling {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            MissingValuesHandling::Drop => "drop",
            MissingValuesHandling::InsertRandom => "insert_random",
            MissingValuesHandling::InsertFixed => "insert_fixed",
            MissingValuesHandling::NotApplicable => "",
        }
    }
}

impl FromStr for MissingValuesHandling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "drop" => Ok(MissingValuesHandling::Drop),
            "insert_random" => Ok(MissingValuesHandling::InsertRandom),
            "insert_fixed" => Ok(MissingValuesHandling::InsertFixed),
            "" => Ok(MissingValuesHandling::NotApplicable),
            other => Err(format!(
                "\"{other}\" is not a valid missing value handling option. \
                 Use one of: drop, insert_random, insert_fixed."
            )),
        }
    }
}

/// How histogram buckets are laid out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistogramBinType {
    /// Two buckets from a true/false value pair.
    Boolean,
    /// One bucket per integer or category.
    OnePerValue,
    /// `N` equal-width integer ranges.
    EqualRanges,
    /// Caller-supplied integer edges.
    BinEdges,
}

impl FromStr for HistogramBinType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "boolean" => Ok(HistogramBinType::Boolean),
            "one_per_value" => Ok(HistogramBinType::OnePerValue),
            "equal_ranges" => Ok(HistogramBinType::EqualRanges),
            "bin_edges" => Ok(HistogramBinType::BinEdges),
            other => Err(format!("\"{other}\" is not a valid histogram bin type.")),
        }
    }
}

/// A raw statistic request as submitted by a client.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticRequest {
    /// Statistic name (`count`, `mean`, ...).
    #[serde(default)]
    pub statistic: String,
    /// Variable (column) name.
    #[serde(default)]
    pub variable: String,
    /// Requested epsilon.
    #[serde(default)]
    pub epsilon: Value,
    /// Requested delta.
    #[serde(default)]
    pub delta: Value,
    /// Confidence-level coefficient, e.g. 0.95.
    #[serde(default)]
    pub cl: Value,
    /// Missing value policy name.
    #[serde(default)]
    pub missing_values_handling: String,
    /// Imputation value for `insert_fixed`.
    #[serde(default)]
    pub fixed_value: Value,
    /// Histogram layout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub histogram_bin_type: Option<String>,
    /// Bin count for `equal_ranges`.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub histogram_number_of_bins: Value,
    /// Edges for `bin_edges`.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub histogram_bin_edges: Value,
    /// Set when the request was synthesized rather than user supplied.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub auto_generated: bool,
}

impl StatisticRequest {
    /// Create a request with the common fields filled in.
    pub fn new(statistic: StatisticKind, variable: impl Into<String>, epsilon: f64) -> Self {
        Self {
            statistic: statistic.as_str().to_string(),
            variable: variable.into(),
            epsilon: Value::from(epsilon),
            delta: Value::from(0.0),
            cl: Value::from(0.95),
            ..Self::default()
        }
    }

    /// Set the confidence level.
    pub fn with_cl(mut self, cl: f64) -> Self {
        self.cl = Value::from(cl);
        self
    }

    /// Set the delta.
    pub fn with_delta(mut self, delta: f64) -> Self {
        self.delta = Value::from(delta);
        self
    }

    /// Set the missing value policy and optional fixed value.
    pub fn with_missing_values(mut self, handling: MissingValuesHandling, fixed: Value) -> Self {
        self.missing_values_handling = handling.as_str().to_string();
        self.fixed_value = fixed;
        self
    }

    /// Set the histogram bin type.
    pub fn with_bin_type(mut self, bin_type: &str) -> Self {
        self.histogram_bin_type = Some(bin_type.to_string());
        self
    }

    /// Parsed statistic name, if recognised.
    pub fn statistic_kind(&self) -> Option<StatisticKind> {
        self.statistic.parse().ok()
    }

    /// Epsilon as a float, if it coerces.
    pub fn epsilon_f64(&self) -> Option<f64> {
        value_to_f64(&self.epsilon)
    }

    /// Delta as a float; a missing delta counts as zero.
    pub fn delta_f64(&self) -> Option<f64> {
        if self.delta.is_null() {
            Some(0.0)
        } else {
            value_to_f64(&self.delta)
        }
    }
}

/// Per-column metadata supplied by the dataset profiler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VariableInfo {
    /// Column name.
    #[serde(default)]
    pub name: String,
    /// Column type.
    #[serde(rename = "type")]
    pub variable_type: VariableType,
    /// Lower bound for numeric columns.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub min: Value,
    /// Upper bound for numeric columns.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub max: Value,
    /// Ordered labels for categorical columns.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<Value>,
    /// Label treated as true for boolean columns.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub true_value: Value,
    /// Label treated as false for boolean columns.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub false_value: Value,
}

impl VariableInfo {
    /// Metadata for a numeric column.
    pub fn numeric(name: impl Into<String>, variable_type: VariableType, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            variable_type,
            min: number_value(min),
            max: number_value(max),
            categories: Vec::new(),
            true_value: Value::Null,
            false_value: Value::Null,
        }
    }

    /// Metadata for a categorical column.
    pub fn categorical<I, S>(name: impl Into<String>, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            variable_type: VariableType::Categorical,
            min: Value::Null,
            max: Value::Null,
            categories: categories
                .into_iter()
                .map(|c| Value::String(c.into()))
                .collect(),
            true_value: Value::Null,
            false_value: Value::Null,
        }
    }

    /// Metadata for a boolean column.
    pub fn boolean(name: impl Into<String>, true_value: Value, false_value: Value) -> Self {
        Self {
            name: name.into(),
            variable_type: VariableType::Boolean,
            min: Value::Null,
            max: Value::Null,
            categories: Vec::new(),
            true_value,
            false_value,
        }
    }

    /// Categories rendered as plain labels.
    pub fn category_labels(&self) -> Vec<String> {
        self.categories.iter().filter_map(value_label).collect()
    }
}

/// Dataset-level facts the statistic builder depends on.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    /// Human-readable dataset name.
    #[serde(default)]
    pub name: String,
    /// Physical column order of the data file.
    pub column_names: Vec<String>,
    /// Metadata keyed by variable name.
    pub variables: BTreeMap<String, VariableInfo>,
    /// True number of rows, when known.
    #[serde(default)]
    pub row_count: Option<u64>,
    /// Whether the owner allows the row count to be published.
    #[serde(default)]
    pub size_is_public: bool,
}

impl DatasetInfo {
    /// Position of `variable` in the physical column order.
    pub fn column_index(&self, variable: &str) -> Option<usize> {
        self.column_names.iter().position(|c| c == variable)
    }
}

/// Coerce a JSON number or numeric string to `f64`.
pub fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|x| x.is_finite())
}

/// Coerce a JSON value to an integer, accepting integral floats and strings.
pub fn value_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral_f64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral_f64))
        }
        _ => None,
    }
}

/// Render a scalar JSON value as a category label.
pub fn value_label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// JSON number for a float, using an integer representation when exact.
pub fn number_value(x: f64) -> Value {
    match integral_f64(x) {
        Some(i) => Value::from(i),
        None => Value::from(x),
    }
}

fn integral_f64(x: f64) -> Option<i64> {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 9.0e15 {
        Some(x as i64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_deserializes_with_loose_fields() {
        let req: StatisticRequest = serde_json::from_value(json!({
            "statistic": "mean",
            "variable": "age",
            "epsilon": "0.5",
            "cl": 0.95,
            "missing_values_handling": "insert_fixed",
            "fixed_value": "44"
        }))
        .expect("request");
        assert_eq!(req.statistic_kind(), Some(StatisticKind::Mean));
        assert_eq!(req.epsilon_f64(), Some(0.5));
        assert_eq!(req.delta_f64(), Some(0.0));
        assert_eq!(value_to_i64(&req.fixed_value), Some(44));
    }

    #[test]
    fn variable_type_accepts_capitalised_names() {
        let info: VariableInfo =
            serde_json::from_value(json!({"type": "Integer", "min": 0, "max": 10})).expect("info");
        assert_eq!(info.variable_type, VariableType::Integer);
    }

    #[test]
    fn size_dependent_statistics() {
        assert!(StatisticKind::Mean.requires_dataset_size());
        assert!(StatisticKind::Quantile.requires_dataset_size());
        assert!(!StatisticKind::Count.requires_dataset_size());
        assert!(!StatisticKind::Histogram.requires_dataset_size());
        assert!(!StatisticKind::Quantile.is_supported());
        assert!(StatisticKind::Mean.is_supported());
    }

    #[test]
    fn numeric_coercion() {
        assert_eq!(value_to_i64(&json!(3.0)), Some(3));
        assert_eq!(value_to_i64(&json!(3.5)), None);
        assert_eq!(value_to_f64(&json!(" 2.5 ")), Some(2.5));
        assert_eq!(value_to_f64(&json!("abc")), None);
        assert_eq!(value_label(&json!(7)), Some("7".to_string()));
    }

    #[test]
    fn unknown_missing_value_option_rejected() {
        assert!("fill".parse::<MissingValuesHandling>().is_err());
        assert_eq!(
            "".parse::<MissingValuesHandling>(),
            Ok(MissingValuesHandling::NotApplicable)
        );
    }
}
