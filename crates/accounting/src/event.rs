//! Privacy maps for the additive noise mechanisms.
//!
//! A [`DpEvent`] describes one release; [`DpEvent::epsilon`] maps an input
//! distance to the epsilon the release spends.

use dpcreator_core::NoiseMechanism;

/// A composable description of a DP release.
#[derive(Clone, Debug, PartialEq)]
pub enum DpEvent {
    /// Laplace noise on a value with the given L1 sensitivity.
    Laplace {
        /// L1 sensitivity at input distance 1.
        sensitivity: f64,
        /// Noise scale.
        scale: f64,
    },
    /// Geometric noise on an integer vector with the given L1 sensitivity.
    Geometric {
        /// L1 sensitivity at input distance 1.
        sensitivity: f64,
        /// Noise scale.
        scale: f64,
    },
    /// Sequential composition of independent releases.
    Composed(Vec<DpEvent>),
}

impl DpEvent {
    /// Event for a single mechanism.
    pub fn for_mechanism(mechanism: NoiseMechanism, sensitivity: f64, scale: f64) -> Self {
        match mechanism {
            NoiseMechanism::Laplace => DpEvent::Laplace { sensitivity, scale },
            NoiseMechanism::Geometric => DpEvent::Geometric { sensitivity, scale },
        }
    }

    /// Epsilon spent at input distance `d_in`.
    pub fn epsilon(&self, d_in: f64) -> f64 {
        if !d_in.is_finite() || d_in < 0.0 {
            return f64::INFINITY;
        }
        match self {
            DpEvent::Laplace { sensitivity, scale } | DpEvent::Geometric { sensitivity, scale } => {
                if *scale <= 0.0 || !scale.is_finite() {
                    if *sensitivity == 0.0 {
                        0.0
                    } else {
                        f64::INFINITY
                    }
                } else {
                    d_in * sensitivity / scale
                }
            }
            DpEvent::Composed(events) => events.iter().map(|e| e.epsilon(d_in)).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn laplace_epsilon_is_sensitivity_over_scale() {
        let e = DpEvent::Laplace {
            sensitivity: 2.0,
            scale: 4.0,
        };
        assert!((e.epsilon(1.0) - 0.5).abs() < 1e-12);
        assert!((e.epsilon(2.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn composition_adds() {
        let e = DpEvent::Composed(vec![
            DpEvent::Geometric {
                sensitivity: 1.0,
                scale: 2.0,
            },
            DpEvent::Laplace {
                sensitivity: 1.0,
                scale: 4.0,
            },
        ]);
        assert!((e.epsilon(1.0) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn zero_scale_is_infinite_unless_insensitive() {
        let e = DpEvent::Laplace {
            sensitivity: 1.0,
            scale: 0.0,
        };
        assert!(e.epsilon(1.0).is_infinite());
    }
}
