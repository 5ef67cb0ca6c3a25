//! Accuracy intervals derived from a noise scale and a confidence level.

use serde_json::Value;
use statrs::distribution::{ContinuousCDF, Laplace};

use crate::error::{ConfidenceLevelError, DpError, Result};
use crate::noise::NoiseMechanism;

/// Turn a confidence-level coefficient into alpha, rounded down to two decimals.
///
/// 0.95 becomes 0.05.
pub fn confidence_level_alpha(cl: &Value) -> std::result::Result<f64, ConfidenceLevelError> {
    let cl = match cl {
        Value::Null => return Err(ConfidenceLevelError::NotSet),
        Value::String(s) if s.trim().is_empty() => return Err(ConfidenceLevelError::NotSet),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|x| x.is_finite())
    .ok_or(ConfidenceLevelError::NotNumeric)?;

    if cl > 1.0 {
        return Err(ConfidenceLevelError::GreaterThanOne);
    }
    if cl <= 0.0 {
        return Err(ConfidenceLevelError::LessThanZero);
    }
    // Nudge before flooring so 1 - 0.90 (0.0999...) lands on 0.10.
    Ok(((1.0 - cl) * 100.0 + 1e-9).floor() / 100.0)
}

fn check_inputs(scale: f64, alpha: f64) -> Result<()> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(DpError::invalid("scale must be positive and finite"));
    }
    if !alpha.is_finite() || alpha <= 0.0 || alpha >= 1.0 {
        return Err(DpError::invalid("alpha must be in (0, 1)"));
    }
    Ok(())
}

/// Half-width `a` with `P(|noise| > a) = alpha` for Laplace noise.
pub fn laplace_scale_to_accuracy(scale: f64, alpha: f64) -> Result<f64> {
    check_inputs(scale, alpha)?;
    let dist = Laplace::new(0.0, scale).map_err(|e| DpError::numerical(e.to_string()))?;
    Ok(dist.inverse_cdf(1.0 - alpha / 2.0))
}

/// Half-width `a` with `P(|noise| >= a) = alpha` for discrete Laplace noise.
pub fn discrete_laplace_scale_to_accuracy(scale: f64, alpha: f64) -> Result<f64> {
    check_inputs(scale, alpha)?;
    let tail = 1.0 + (-1.0 / scale).exp();
    Ok(scale * (2.0 / (alpha * tail)).ln())
}

/// Accuracy for a mechanism, with alpha split evenly over `outputs` values.
pub fn scale_to_accuracy(
    mechanism: NoiseMechanism,
    scale: f64,
    alpha: f64,
    outputs: usize,
) -> Result<f64> {
    let alpha = alpha / outputs.max(1) as f64;
    match mechanism {
        NoiseMechanism::Laplace => laplace_scale_to_accuracy(scale, alpha),
        NoiseMechanism::Geometric => discrete_laplace_scale_to_accuracy(scale, alpha),
    }
}

/// Human-readable accuracy statement for a release.
pub fn accuracy_message(statistic: &str, variable: &str, accuracy: f64, alpha: f64) -> String {
    let probability = ((1.0 - alpha) * 100.0).round();
    format!(
        "Releasing {statistic} for the variable {variable}. With at least probability \
         {probability}% the output {statistic} will differ from the true {statistic} by at most \
         {accuracy:.4} units. Here the units are the same units the variable has in the dataset."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn alpha_from_confidence_level() {
        assert_eq!(confidence_level_alpha(&json!(0.95)), Ok(0.05));
        assert_eq!(confidence_level_alpha(&json!(0.99)), Ok(0.01));
        assert_eq!(confidence_level_alpha(&json!(0.90)), Ok(0.1));
        assert_eq!(confidence_level_alpha(&json!("0.95")), Ok(0.05));
    }

    #[test]
    fn alpha_error_kinds_are_distinct() {
        assert_eq!(
            confidence_level_alpha(&Value::Null),
            Err(ConfidenceLevelError::NotSet)
        );
        assert_eq!(
            confidence_level_alpha(&json!("nope")),
            Err(ConfidenceLevelError::NotNumeric)
        );
        assert_eq!(
            confidence_level_alpha(&json!(1.5)),
            Err(ConfidenceLevelError::GreaterThanOne)
        );
        assert_eq!(
            confidence_level_alpha(&json!(-0.5)),
            Err(ConfidenceLevelError::LessThanZero)
        );
    }

    #[test]
    fn laplace_accuracy_matches_closed_form() {
        let acc = laplace_scale_to_accuracy(2.0, 0.05).expect("accuracy");
        let expected = 2.0 * (1.0f64 / 0.05).ln();
        assert!((acc - expected).abs() < 1e-3, "{acc} vs {expected}");
    }

    #[test]
    fn splitting_alpha_widens_interval() {
        let one = scale_to_accuracy(NoiseMechanism::Geometric, 1.0, 0.05, 1).unwrap();
        let ten = scale_to_accuracy(NoiseMechanism::Geometric, 1.0, 0.05, 10).unwrap();
        assert!(ten > one);
    }

    #[test]
    fn message_mentions_probability() {
        let msg = accuracy_message("mean", "age", 1.5, 0.05);
        assert!(msg.contains("95%"));
        assert!(msg.contains("age"));
    }

    proptest! {
        #[test]
        fn prop_accuracy_grows_with_scale(s in 0.01f64..100.0, k in 1.01f64..10.0) {
            let a = discrete_laplace_scale_to_accuracy(s, 0.05).unwrap();
            let b = discrete_laplace_scale_to_accuracy(s * k, 0.05).unwrap();
            prop_assert!(b > a);
        }
    }
}
