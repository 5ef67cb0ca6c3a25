//! Scalar validator primitives.
//!
//! Each validator is silent on success and returns a [`ValidationError`]
//! carrying a user-facing message on failure.

use serde_json::Value;

use crate::config::DpConfig;
use crate::error::{ValidationError, ValidationResult};
use crate::types::{value_label, value_to_f64, MissingValuesHandling};

/// Epsilon must be a number inside the configured inclusive range.
pub fn validate_epsilon(value: &Value, config: &DpConfig) -> ValidationResult {
    let msg = || {
        ValidationError::new(format!(
            "The epsilon value must be between {} and {}, inclusive.",
            config.epsilon_min, config.epsilon_max
        ))
    };
    let eps = value_to_f64(value).ok_or_else(msg)?;
    if eps < config.epsilon_min || eps > config.epsilon_max {
        return Err(msg());
    }
    Ok(())
}

/// Delta must be a number in `[0, delta_max]`; a missing delta is zero.
pub fn validate_delta(value: &Value, config: &DpConfig) -> ValidationResult {
    if value.is_null() {
        return Ok(());
    }
    let msg = || {
        ValidationError::new(format!(
            "The delta value must be between 0 and {}, inclusive.",
            config.delta_max
        ))
    };
    let delta = value_to_f64(value).ok_or_else(msg)?;
    if delta < 0.0 || delta > config.delta_max {
        return Err(msg());
    }
    Ok(())
}

/// Confidence level must be one of the configured coefficients.
pub fn validate_confidence_level(value: &Value, config: &DpConfig) -> ValidationResult {
    let allowed = config
        .confidence_levels
        .iter()
        .map(|cl| cl.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let msg = || {
        ValidationError::new(format!(
            "The confidence level must be one of: {allowed}."
        ))
    };
    let cl = value_to_f64(value).ok_or_else(msg)?;
    if config
        .confidence_levels
        .iter()
        .any(|allowed| (allowed - cl).abs() < 1e-9)
    {
        Ok(())
    } else {
        Err(msg())
    }
}

/// Both bounds must be numeric with `max > min`.
pub fn validate_min_max(min: &Value, max: &Value) -> ValidationResult {
    let min = value_to_f64(min)
        .ok_or_else(|| ValidationError::new("The minimum value is not a number."))?;
    let max = value_to_f64(max)
        .ok_or_else(|| ValidationError::new("The maximum value is not a number."))?;
    if max <= min {
        return Err(ValidationError::new(format!(
            "The maximum value ({max}) must be greater than the minimum value ({min})."
        )));
    }
    Ok(())
}

/// The policy name must be a known option.
pub fn validate_missing_values_handling(value: &str) -> ValidationResult {
    value
        .parse::<MissingValuesHandling>()
        .map(|_| ())
        .map_err(ValidationError::new)
}

/// A numeric impute value must satisfy `min <= fixed <= max`.
pub fn validate_fixed_value_in_bounds(fixed: &Value, min: f64, max: f64) -> ValidationResult {
    let x = value_to_f64(fixed).ok_or_else(|| {
        ValidationError::new("The fixed value for missing values is not a number.")
    })?;
    if x < min {
        return Err(ValidationError::new(format!(
            "The fixed value ({x}) may not be less than the minimum value ({min})."
        )));
    }
    if x > max {
        return Err(ValidationError::new(format!(
            "The fixed value ({x}) may not be greater than the maximum value ({max})."
        )));
    }
    Ok(())
}

/// A categorical impute value must be one of the resolved categories.
pub fn validate_fixed_value_in_categories(fixed: &Value, categories: &[String]) -> ValidationResult {
    let label = value_label(fixed).ok_or_else(|| {
        ValidationError::new("The fixed value for missing values is not set.")
    })?;
    let label = strip_quotes(&label);
    if categories.iter().any(|c| strip_quotes(c) == label) {
        Ok(())
    } else {
        Err(ValidationError::new(format!(
            "The fixed value \"{label}\" is not one of the categories: {}.",
            categories.join(", ")
        )))
    }
}

/// There cannot be more bins than integer steps between the bounds.
pub fn validate_bin_count(bins: i64, min: i64, max: i64) -> ValidationResult {
    if bins < 1 {
        return Err(ValidationError::new(
            "The number of histogram bins must be at least 1.",
        ));
    }
    let available = max.saturating_sub(min);
    if bins > available {
        return Err(ValidationError::new(format!(
            "The number of bins ({bins}) may not exceed the range max - min ({available})."
        )));
    }
    Ok(())
}

/// Histogram edges need at least two strictly increasing integers.
pub fn validate_bin_edges(edges: &[i64]) -> ValidationResult {
    if edges.len() < 2 {
        return Err(ValidationError::new(
            "At least two histogram bin edges are required.",
        ));
    }
    if edges.windows(2).any(|w| w[1] <= w[0]) {
        return Err(ValidationError::new(
            "The histogram bin edges must be strictly increasing.",
        ));
    }
    Ok(())
}

/// The true and false labels of a boolean variable must differ.
pub fn validate_not_equal(true_value: &str, false_value: &str) -> ValidationResult {
    if strip_quotes(true_value) == strip_quotes(false_value) {
        return Err(ValidationError::new(format!(
            "The true value and false value may not be the same (\"{}\").",
            strip_quotes(true_value)
        )));
    }
    Ok(())
}

/// Remove one layer of surrounding double quotes.
pub fn strip_quotes(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(s)
}
