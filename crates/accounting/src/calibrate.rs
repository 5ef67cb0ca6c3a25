//! Noise-scale calibration.

use dpcreator_core::{DpConfig, DpError, NoiseMechanism, Result};

use crate::DpEvent;

/// Find the smallest scale whose event spends at most `target_epsilon` at `d_in`.
///
/// Assumes epsilon decreases as the scale grows. The search brackets the
/// answer by doubling from `lower`, then bisects. It fails with
/// [`DpError::ScaleSearchFailed`] when the target is already met at `lower`
/// (the required scale is below the searchable range, typically because the
/// bounds are degenerate) or still missed at `upper`.
pub fn calibrate_scale(
    make_event: impl Fn(f64) -> DpEvent,
    d_in: f64,
    target_epsilon: f64,
    lower: f64,
    upper: f64,
    max_iters: usize,
) -> Result<f64> {
    if !target_epsilon.is_finite() || target_epsilon <= 0.0 {
        return Err(DpError::invalid("target_epsilon must be finite and > 0"));
    }
    if !(lower > 0.0 && upper > lower) {
        return Err(DpError::invalid("scale bounds must satisfy 0 < lower < upper"));
    }

    let meets = |scale: f64| make_event(scale).epsilon(d_in) <= target_epsilon;

    if meets(lower) {
        return Err(DpError::ScaleSearchFailed { lower, upper });
    }

    let mut lo = lower;
    let mut hi = lower.max(1.0).min(upper);
    while !meets(hi) {
        if hi >= upper {
            return Err(DpError::ScaleSearchFailed { lower, upper });
        }
        lo = hi;
        hi = (hi * 2.0).min(upper);
    }

    for _ in 0..max_iters.max(1) {
        let mid = 0.5 * (lo + hi);
        if mid <= lo || mid >= hi {
            break;
        }
        if meets(mid) {
            hi = mid;
        } else {
            lo = mid;
        }
    }

    Ok(hi)
}

/// Calibrate a single-mechanism release using the configured search bounds.
pub fn calibrate_mechanism(
    mechanism: NoiseMechanism,
    sensitivity: f64,
    target_epsilon: f64,
    config: &DpConfig,
) -> Result<f64> {
    if !sensitivity.is_finite() || sensitivity < 0.0 {
        return Err(DpError::invalid(format!(
            "sensitivity must be finite and >= 0, got {sensitivity}"
        )));
    }
    let scale = calibrate_scale(
        |s| DpEvent::for_mechanism(mechanism, sensitivity, s),
        1.0,
        target_epsilon,
        config.scale_search_lower,
        config.scale_search_upper,
        config.scale_search_iterations,
    );
    match &scale {
        Ok(s) => tracing::debug!(
            mechanism = mechanism.as_str(),
            sensitivity,
            target_epsilon,
            scale = s,
            "calibrated noise scale"
        ),
        Err(err) => tracing::warn!(
            mechanism = mechanism.as_str(),
            sensitivity,
            target_epsilon,
            "scale search failed: {err}"
        ),
    }
    scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn calibrate_laplace_matches_closed_form() {
        let cfg = DpConfig::default();
        let scale = calibrate_mechanism(NoiseMechanism::Laplace, 2.0, 0.5, &cfg).expect("scale");
        assert!((scale - 4.0).abs() < 1e-9);
        let eps = DpEvent::Laplace {
            sensitivity: 2.0,
            scale,
        }
        .epsilon(1.0);
        assert!(eps <= 0.5);
    }

    #[test]
    fn degenerate_sensitivity_fails_to_bracket() {
        let cfg = DpConfig::default();
        let err = calibrate_mechanism(NoiseMechanism::Laplace, 1e-14, 1.0, &cfg).unwrap_err();
        assert!(matches!(err, DpError::ScaleSearchFailed { .. }));
        let err = calibrate_mechanism(NoiseMechanism::Geometric, 0.0, 1.0, &cfg).unwrap_err();
        assert!(matches!(err, DpError::ScaleSearchFailed { .. }));
    }

    #[test]
    fn huge_sensitivity_exceeds_upper_bound() {
        let cfg = DpConfig::default();
        let err = calibrate_mechanism(NoiseMechanism::Laplace, 1e15, 0.001, &cfg).unwrap_err();
        assert!(matches!(err, DpError::ScaleSearchFailed { .. }));
    }

    #[test]
    fn invalid_target_rejected() {
        let r = calibrate_scale(
            |s| DpEvent::Laplace {
                sensitivity: 1.0,
                scale: s,
            },
            1.0,
            0.0,
            1e-6,
            1.0,
            10,
        );
        assert!(matches!(r, Err(DpError::InvalidParameters { .. })));
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

        #[test]
        fn prop_calibrated_scale_meets_target(
            sensitivity in 1e-3f64..1e3,
            eps in 0.001f64..1.0,
        ) {
            let cfg = DpConfig::default();
            let scale = calibrate_mechanism(NoiseMechanism::Geometric, sensitivity, eps, &cfg)
                .expect("scale");
            let spent = DpEvent::Geometric { sensitivity, scale }.epsilon(1.0);
            prop_assert!(spent <= eps);
            prop_assert!((scale - sensitivity / eps).abs() <= 1e-9 * (sensitivity / eps));
        }
    }
}
