//! Process-wide settings for statistic validation.

use crate::error::{DpError, Result};

/// Settings shared by every validation and release cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct DpConfig {
    /// Smallest epsilon accepted for a single statistic.
    pub epsilon_min: f64,
    /// Largest epsilon accepted for a single statistic.
    pub epsilon_max: f64,
    /// Largest delta accepted for a single statistic.
    pub delta_max: f64,
    /// Confidence-level coefficients a request may use.
    pub confidence_levels: Vec<f64>,
    /// Epsilon spent on an automatically added dataset-size count.
    pub auto_count_epsilon: f64,
    /// Smallest noise scale the scale search will consider.
    pub scale_search_lower: f64,
    /// Largest noise scale the scale search will consider.
    pub scale_search_upper: f64,
    /// Bisection steps for the scale search.
    pub scale_search_iterations: usize,
}

impl Default for DpConfig {
    fn default() -> Self {
        Self {
            epsilon_min: 0.001,
            epsilon_max: 1.0,
            delta_max: 1e-5,
            confidence_levels: vec![0.90, 0.95, 0.99],
            auto_count_epsilon: 0.05,
            scale_search_lower: 1e-10,
            scale_search_upper: 1e12,
            scale_search_iterations: 200,
        }
    }
}

impl DpConfig {
    /// Load overrides from the environment (best-effort).
    ///
    /// Supported:
    /// - DPCREATOR_EPSILON_MIN
    /// - DPCREATOR_EPSILON_MAX
    /// - DPCREATOR_DELTA_MAX
    /// - DPCREATOR_AUTO_COUNT_EPSILON
    pub fn from_env_or_default() -> Self {
        let mut cfg = Self::default();

        if let Some(x) = positive_env("DPCREATOR_EPSILON_MIN") {
            cfg.epsilon_min = x;
        }
        if let Some(x) = positive_env("DPCREATOR_EPSILON_MAX") {
            cfg.epsilon_max = x;
        }
        if let Some(x) = positive_env("DPCREATOR_DELTA_MAX") {
            cfg.delta_max = x;
        }
        if let Some(x) = positive_env("DPCREATOR_AUTO_COUNT_EPSILON") {
            cfg.auto_count_epsilon = x;
        }

        if let Err(err) = cfg.validate() {
            tracing::warn!("ignoring environment overrides: {err}");
            return Self::default();
        }
        cfg
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<()> {
        if !self.epsilon_min.is_finite() || self.epsilon_min <= 0.0 {
            return Err(DpError::config("epsilon_min must be positive"));
        }
        if !self.epsilon_max.is_finite() || self.epsilon_max < self.epsilon_min {
            return Err(DpError::config("epsilon_max must be >= epsilon_min"));
        }
        if !self.delta_max.is_finite() || self.delta_max < 0.0 || self.delta_max >= 1.0 {
            return Err(DpError::config("delta_max must be in [0, 1)"));
        }
        if self.confidence_levels.is_empty()
            || self
                .confidence_levels
                .iter()
                .any(|cl| !cl.is_finite() || *cl <= 0.0 || *cl >= 1.0)
        {
            return Err(DpError::config(
                "confidence_levels must be non-empty and inside (0, 1)",
            ));
        }
        if self.auto_count_epsilon < self.epsilon_min || self.auto_count_epsilon > self.epsilon_max
        {
            return Err(DpError::config(
                "auto_count_epsilon must lie inside [epsilon_min, epsilon_max]",
            ));
        }
        if !(self.scale_search_lower > 0.0 && self.scale_search_upper > self.scale_search_lower) {
            return Err(DpError::config(
                "scale search bounds must satisfy 0 < lower < upper",
            ));
        }
        if self.scale_search_iterations == 0 {
            return Err(DpError::config("scale_search_iterations must be positive"));
        }
        Ok(())
    }
}

fn positive_env(key: &str) -> Option<f64> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<f64>() {
        Ok(x) if x.is_finite() && x > 0.0 => Some(x),
        _ => {
            tracing::warn!("ignoring invalid value for {key}: {raw:?}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        DpConfig::default().validate().expect("default config");
    }

    #[test]
    fn inverted_epsilon_bounds_rejected() {
        let cfg = DpConfig {
            epsilon_min: 2.0,
            epsilon_max: 1.0,
            ..DpConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn auto_count_epsilon_must_fit_bounds() {
        let cfg = DpConfig {
            auto_count_epsilon: 5.0,
            ..DpConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
