//! Statistic properties before and after basic validation.

use serde_json::Value;

use dpcreator_core::{
    value_label, value_to_f64, value_to_i64, HistogramBinType, MissingValuesHandling,
    StatisticKind, StatisticRequest, VariableInfo, VariableType,
};

/// Everything needed to construct one statistic spec.
#[derive(Clone, Debug, PartialEq)]
pub struct StatSpecRequest {
    /// The raw request.
    pub request: StatisticRequest,
    /// Metadata of the requested variable.
    pub variable_info: VariableInfo,
    /// Position of the variable in the data file.
    pub col_index: usize,
    /// Dataset size for size-dependent statistics.
    pub dataset_size: Option<u64>,
    /// The size is private and will come from a DP count.
    pub dataset_size_pending: bool,
}

impl StatSpecRequest {
    /// Bundle a request with its resolved metadata.
    pub fn new(request: StatisticRequest, variable_info: VariableInfo, col_index: usize) -> Self {
        Self {
            request,
            variable_info,
            col_index,
            dataset_size: None,
            dataset_size_pending: false,
        }
    }

    /// Attach the dataset size.
    pub fn with_dataset_size(mut self, dataset_size: u64) -> Self {
        self.dataset_size = Some(dataset_size);
        self
    }

    /// Mark the size as private; it is supplied later by a DP count.
    pub fn with_pending_dataset_size(mut self) -> Self {
        self.dataset_size = None;
        self.dataset_size_pending = true;
        self
    }
}

/// Request fields after the initial transforms, still untrusted.
#[derive(Clone, Debug, PartialEq)]
pub struct RawProps {
    /// Statistic named by the request.
    pub statistic: StatisticKind,
    /// Variable name.
    pub variable: String,
    /// Variable type.
    pub variable_type: VariableType,
    /// Column index.
    pub col_index: usize,
    /// Epsilon as submitted.
    pub epsilon: Value,
    /// Delta as submitted.
    pub delta: Value,
    /// Confidence level as submitted.
    pub cl: Value,
    /// Missing value policy as submitted.
    pub missing_values_handling: String,
    /// Impute value, coerced to the variable type where possible.
    pub fixed_value: Value,
    /// Lower bound.
    pub min: Value,
    /// Upper bound.
    pub max: Value,
    /// Resolved category labels (without the "uncategorized" bucket).
    pub categories: Vec<String>,
    /// Boolean true label.
    pub true_value: Option<String>,
    /// Boolean false label.
    pub false_value: Option<String>,
    /// Histogram bin type as submitted.
    pub histogram_bin_type: Option<String>,
    /// Bin count as submitted.
    pub histogram_number_of_bins: Value,
    /// Bin edges as submitted.
    pub histogram_bin_edges: Value,
    /// Dataset size.
    pub dataset_size: Option<u64>,
    /// The size will come from a DP count.
    pub dataset_size_pending: bool,
    /// Synthesized request marker.
    pub auto_generated: bool,
}

impl RawProps {
    /// Copy the request and metadata, coercing numeric strings to numbers.
    pub fn from_request(req: &StatSpecRequest, statistic: StatisticKind) -> Self {
        let info = &req.variable_info;
        let r = &req.request;
        Self {
            statistic,
            variable: r.variable.trim().to_string(),
            variable_type: info.variable_type,
            col_index: req.col_index,
            epsilon: coerce_number(&r.epsilon),
            delta: coerce_number(&r.delta),
            cl: coerce_number(&r.cl),
            missing_values_handling: r.missing_values_handling.trim().to_string(),
            fixed_value: coerce_fixed_value(&r.fixed_value, info.variable_type),
            min: coerce_number(&info.min),
            max: coerce_number(&info.max),
            categories: info.category_labels(),
            true_value: value_label(&info.true_value),
            false_value: value_label(&info.false_value),
            histogram_bin_type: r.histogram_bin_type.clone(),
            histogram_number_of_bins: coerce_number(&r.histogram_number_of_bins),
            histogram_bin_edges: r.histogram_bin_edges.clone(),
            dataset_size: req.dataset_size,
            dataset_size_pending: req.dataset_size_pending,
            auto_generated: r.auto_generated,
        }
    }

    /// Bounds as integers, when both coerce.
    pub fn integer_bounds(&self) -> Option<(i64, i64)> {
        Some((value_to_i64(&self.min)?, value_to_i64(&self.max)?))
    }

    /// Bin edges as integers, when every entry coerces.
    pub fn integer_bin_edges(&self) -> Option<Vec<i64>> {
        match &self.histogram_bin_edges {
            Value::Array(items) => items.iter().map(value_to_i64).collect(),
            Value::String(s) => s
                .split(',')
                .map(|p| p.trim().parse::<i64>().ok())
                .collect(),
            _ => None,
        }
    }
}

/// Turn numeric strings into JSON numbers; anything else is kept as is.
pub fn coerce_number(value: &Value) -> Value {
    match value {
        Value::String(s) => match value_to_i64(value) {
            Some(i) if !s.contains('.') => Value::from(i),
            _ => value_to_f64(value).map(Value::from).unwrap_or_else(|| value.clone()),
        },
        other => other.clone(),
    }
}

fn coerce_fixed_value(value: &Value, variable_type: VariableType) -> Value {
    match variable_type {
        VariableType::Integer => value_to_i64(value)
            .map(Value::from)
            .unwrap_or_else(|| coerce_number(value)),
        VariableType::Float => coerce_number(value),
        VariableType::Categorical | VariableType::Boolean => match value {
            Value::Null => Value::Null,
            other => value_label(other).map(Value::String).unwrap_or(Value::Null),
        },
    }
}

/// Validated, typed statistic properties.
#[derive(Clone, Debug, PartialEq)]
pub struct SpecProps {
    /// Statistic.
    pub statistic: StatisticKind,
    /// Variable name.
    pub variable: String,
    /// Variable type.
    pub variable_type: VariableType,
    /// Column index.
    pub col_index: usize,
    /// Epsilon.
    pub epsilon: f64,
    /// Delta.
    pub delta: f64,
    /// Confidence level.
    pub cl: f64,
    /// `1 - cl`, rounded down to two decimals.
    pub alpha: f64,
    /// Missing value policy.
    pub missing_values_handling: MissingValuesHandling,
    /// Impute value.
    pub fixed_value: Value,
    /// Lower bound, for statistics that declare bounds.
    pub min: Option<f64>,
    /// Upper bound, for statistics that declare bounds.
    pub max: Option<f64>,
    /// Category labels (without "uncategorized").
    pub categories: Vec<String>,
    /// Boolean true label.
    pub true_value: Option<String>,
    /// Boolean false label.
    pub false_value: Option<String>,
    /// Histogram layout.
    pub histogram_bin_type: Option<HistogramBinType>,
    /// Requested bin count.
    pub histogram_number_of_bins: Option<i64>,
    /// Requested bin edges.
    pub histogram_bin_edges: Vec<i64>,
    /// Dataset size; `None` while a private size awaits its DP count.
    pub dataset_size: Option<u64>,
    /// The size is private and comes from a DP count.
    pub dataset_size_pending: bool,
    /// Synthesized request marker.
    pub auto_generated: bool,
}

impl SpecProps {
    /// Both bounds, when declared.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        Some((self.min?, self.max?))
    }

    /// Fixed value as a float.
    pub fn fixed_f64(&self) -> Option<f64> {
        value_to_f64(&self.fixed_value)
    }

    /// Fixed value as a label.
    pub fn fixed_label(&self) -> Option<String> {
        value_label(&self.fixed_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_strings_become_numbers() {
        assert_eq!(coerce_number(&json!("5")), json!(5));
        assert_eq!(coerce_number(&json!("5.5")), json!(5.5));
        assert_eq!(coerce_number(&json!("x")), json!("x"));
    }

    #[test]
    fn fixed_value_follows_variable_type() {
        assert_eq!(coerce_fixed_value(&json!("3"), VariableType::Integer), json!(3));
        assert_eq!(coerce_fixed_value(&json!(3), VariableType::Categorical), json!("3"));
        assert_eq!(coerce_fixed_value(&Value::Null, VariableType::Boolean), Value::Null);
    }

    #[test]
    fn bin_edges_from_string_or_array() {
        let info = VariableInfo::numeric("age", VariableType::Integer, 0.0, 100.0);
        let mut req = StatisticRequest::new(StatisticKind::Histogram, "age", 0.5);
        req.histogram_bin_edges = json!("0, 10, 20");
        let raw = RawProps::from_request(
            &StatSpecRequest::new(req.clone(), info.clone(), 0),
            StatisticKind::Histogram,
        );
        assert_eq!(raw.integer_bin_edges(), Some(vec![0, 10, 20]));

        req.histogram_bin_edges = json!([0, "x"]);
        let raw = RawProps::from_request(
            &StatSpecRequest::new(req, info, 0),
            StatisticKind::Histogram,
        );
        assert_eq!(raw.integer_bin_edges(), None);
    }
}
