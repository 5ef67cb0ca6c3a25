//! Noise mechanisms for differential privacy.

use rand::Rng;
use rand_distr::{Distribution, Exp, Geometric};
use serde::{Deserialize, Serialize};

use crate::error::{DpError, Result};

/// Noise families a statistic can be released with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoiseMechanism {
    /// Continuous Laplace noise.
    Laplace,
    /// Two-sided geometric (discrete Laplace) noise.
    Geometric,
}

impl NoiseMechanism {
    /// Name recorded in release entries.
    pub fn as_str(&self) -> &'static str {
        match self {
            NoiseMechanism::Laplace => "Laplace",
            NoiseMechanism::Geometric => "Geometric",
        }
    }
}

fn check_scale(scale: f64) -> Result<()> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(DpError::invalid(format!(
            "noise scale must be positive and finite, got {scale}"
        )));
    }
    Ok(())
}

/// Sample Laplace(0, scale) noise.
pub fn sample_laplace<R: Rng + ?Sized>(scale: f64, rng: &mut R) -> Result<f64> {
    check_scale(scale)?;
    // Laplace noise can be sampled as the difference of two exponentials.
    let dist = Exp::new(1.0 / scale).map_err(|e| DpError::numerical(e.to_string()))?;
    Ok(dist.sample(rng) - dist.sample(rng))
}

/// Sample two-sided geometric noise with the given scale.
pub fn sample_discrete_laplace<R: Rng + ?Sized>(scale: f64, rng: &mut R) -> Result<i64> {
    check_scale(scale)?;
    // Difference of two geometric draws with success probability 1 - e^{-1/scale}.
    let p = -(-1.0 / scale).exp_m1();
    let dist = Geometric::new(p).map_err(|e| DpError::numerical(e.to_string()))?;
    let a = dist.sample(rng).min(i64::MAX as u64) as i64;
    let b = dist.sample(rng).min(i64::MAX as u64) as i64;
    Ok(a.saturating_sub(b))
}

/// Laplace mechanism at a calibrated scale.
#[derive(Clone, Debug, PartialEq)]
pub struct LaplaceMechanism {
    /// Noise scale.
    pub scale: f64,
}

impl LaplaceMechanism {
    /// Create a mechanism from a calibrated scale.
    pub fn new(scale: f64) -> Result<Self> {
        check_scale(scale)?;
        Ok(Self { scale })
    }

    /// Add noise to a value.
    pub fn apply<R: Rng + ?Sized>(&self, value: f64, rng: &mut R) -> Result<f64> {
        Ok(value + sample_laplace(self.scale, rng)?)
    }
}

/// Geometric mechanism at a calibrated scale.
#[derive(Clone, Debug, PartialEq)]
pub struct GeometricMechanism {
    /// Noise scale.
    pub scale: f64,
}

impl GeometricMechanism {
    /// Create a mechanism from a calibrated scale.
    pub fn new(scale: f64) -> Result<Self> {
        check_scale(scale)?;
        Ok(Self { scale })
    }

    /// Add noise to a count.
    pub fn apply<R: Rng + ?Sized>(&self, value: i64, rng: &mut R) -> Result<i64> {
        Ok(value.saturating_add(sample_discrete_laplace(self.scale, rng)?))
    }

    /// Add independent noise to every entry of a count vector.
    pub fn apply_vec<R: Rng + ?Sized>(&self, values: &[i64], rng: &mut R) -> Result<Vec<i64>> {
        values.iter().map(|v| self.apply(*v, rng)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_laplace_deterministic() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let a = LaplaceMechanism::new(1.0).unwrap().apply(0.0, &mut rng).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let b = LaplaceMechanism::new(1.0).unwrap().apply(0.0, &mut rng).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_laplace_statistics() {
        let mut rng = ChaCha8Rng::seed_from_u64(123);
        let n = 20_000;
        let samples: Vec<f64> = (0..n)
            .map(|_| sample_laplace(2.0, &mut rng).unwrap())
            .collect();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        // Var[Laplace(b)] = 2 b^2
        assert!(mean.abs() < 0.1);
        assert!((var - 8.0).abs() < 0.8);
    }

    #[test]
    fn test_discrete_laplace_is_centered() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let n = 20_000;
        let total: i64 = (0..n)
            .map(|_| sample_discrete_laplace(1.0, &mut rng).unwrap())
            .sum();
        assert!((total as f64 / n as f64).abs() < 0.1);
    }

    #[test]
    fn test_invalid_scale_rejected() {
        assert!(LaplaceMechanism::new(0.0).is_err());
        assert!(GeometricMechanism::new(f64::NAN).is_err());
    }
}
