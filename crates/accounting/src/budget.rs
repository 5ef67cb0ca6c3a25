//! Privacy-budget accounting across the statistics of a plan.
//!
//! Amounts are accumulated in fixed point (`value * BUDGET_SCALE` as `u64`)
//! so that sums such as `0.6 + 0.45` compare exactly against a ceiling.

use serde::{Deserialize, Serialize};

use dpcreator_core::{DpError, Result};

/// Scale factor for fixed-point budget arithmetic.
pub const BUDGET_SCALE: f64 = 1_000_000_000.0;

fn to_fixed(x: f64) -> u64 {
    (x * BUDGET_SCALE).round().max(0.0) as u64
}

fn from_fixed(x: u64) -> f64 {
    x as f64 / BUDGET_SCALE
}

/// Exact fixed-point total of `items`.
pub fn total_spent(items: &[BudgetItem]) -> (f64, f64) {
    let (eps, delta) = items.iter().fold((0u64, 0u64), |(e, d), item| {
        (
            e.saturating_add(to_fixed(item.epsilon)),
            d.saturating_add(to_fixed(item.delta)),
        )
    });
    (from_fixed(eps), from_fixed(delta))
}

/// A dataset's budget ceiling and what earlier plans already committed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrivacyBudget {
    /// Maximum total epsilon for the dataset.
    pub ceiling_epsilon: f64,
    /// Maximum total delta for the dataset.
    #[serde(default)]
    pub ceiling_delta: f64,
    /// Epsilon already spent by accepted plans.
    #[serde(default)]
    pub committed_epsilon: f64,
    /// Delta already spent by accepted plans.
    #[serde(default)]
    pub committed_delta: f64,
}

/// One statistic's claim on the budget.
#[derive(Clone, Debug, PartialEq)]
pub struct BudgetItem {
    /// Statistic name.
    pub statistic: String,
    /// Variable name.
    pub variable: String,
    /// Requested epsilon.
    pub epsilon: f64,
    /// Requested delta.
    pub delta: f64,
}

/// The first statistic that would push the plan over its ceiling.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error(
    "The running total of epsilon ({running_epsilon:?}) and delta ({running_delta:?}) after adding \
     {statistic} of {variable} exceeds the ceiling of epsilon ({ceiling_epsilon:?}) and delta \
     ({ceiling_delta:?})."
)]
pub struct BudgetExceeded {
    /// Position of the statistic in the plan.
    pub index: usize,
    /// Statistic name.
    pub statistic: String,
    /// Variable name.
    pub variable: String,
    /// Epsilon total including this statistic.
    pub running_epsilon: f64,
    /// Epsilon ceiling.
    pub ceiling_epsilon: f64,
    /// Delta total including this statistic.
    pub running_delta: f64,
    /// Delta ceiling.
    pub ceiling_delta: f64,
}

impl PrivacyBudget {
    /// A fresh budget with nothing committed.
    pub fn new(ceiling_epsilon: f64, ceiling_delta: f64) -> Result<Self> {
        let budget = Self {
            ceiling_epsilon,
            ceiling_delta,
            committed_epsilon: 0.0,
            committed_delta: 0.0,
        };
        budget.validate()?;
        Ok(budget)
    }

    /// Record amounts already spent by earlier plans.
    pub fn with_committed(mut self, epsilon: f64, delta: f64) -> Result<Self> {
        self.committed_epsilon = epsilon;
        self.committed_delta = delta;
        self.validate()?;
        Ok(self)
    }

    /// Validate the budget figures.
    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("ceiling_epsilon", self.ceiling_epsilon),
            ("ceiling_delta", self.ceiling_delta),
            ("committed_epsilon", self.committed_epsilon),
            ("committed_delta", self.committed_delta),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(DpError::invalid(format!(
                    "{name} must be finite and >= 0"
                )));
            }
        }
        Ok(())
    }

    /// Epsilon still available.
    pub fn remaining_epsilon(&self) -> f64 {
        from_fixed(to_fixed(self.ceiling_epsilon).saturating_sub(to_fixed(self.committed_epsilon)))
    }

    /// Delta still available.
    pub fn remaining_delta(&self) -> f64 {
        from_fixed(to_fixed(self.ceiling_delta).saturating_sub(to_fixed(self.committed_delta)))
    }

    /// Whether a single `(epsilon, delta)` request still fits.
    pub fn can_spend(&self, epsilon: f64, delta: f64) -> bool {
        if !epsilon.is_finite() || epsilon < 0.0 || !delta.is_finite() || delta < 0.0 {
            return false;
        }
        to_fixed(self.committed_epsilon) + to_fixed(epsilon) <= to_fixed(self.ceiling_epsilon)
            && to_fixed(self.committed_delta) + to_fixed(delta) <= to_fixed(self.ceiling_delta)
    }

    /// Walk `items` in order and report the first one that exceeds the ceiling.
    ///
    /// Returns the running totals on success.
    pub fn check(&self, items: &[BudgetItem]) -> std::result::Result<(f64, f64), BudgetExceeded> {
        let ceiling_eps = to_fixed(self.ceiling_epsilon);
        let ceiling_delta = to_fixed(self.ceiling_delta);
        let mut running_eps = to_fixed(self.committed_epsilon);
        let mut running_delta = to_fixed(self.committed_delta);

        for (index, item) in items.iter().enumerate() {
            running_eps = running_eps.saturating_add(to_fixed(item.epsilon));
            running_delta = running_delta.saturating_add(to_fixed(item.delta));
            if running_eps > ceiling_eps || running_delta > ceiling_delta {
                let exceeded = BudgetExceeded {
                    index,
                    statistic: item.statistic.clone(),
                    variable: item.variable.clone(),
                    running_epsilon: from_fixed(running_eps),
                    ceiling_epsilon: self.ceiling_epsilon,
                    running_delta: from_fixed(running_delta),
                    ceiling_delta: self.ceiling_delta,
                };
                tracing::warn!("{exceeded}");
                return Err(exceeded);
            }
        }
        Ok((from_fixed(running_eps), from_fixed(running_delta)))
    }

    /// Commit spent amounts, failing closed when they do not fit.
    pub fn commit(&mut self, epsilon: f64, delta: f64) -> Result<()> {
        if !self.can_spend(epsilon, delta) {
            return Err(DpError::PrivacyBudgetExhausted {
                eps: self.committed_epsilon + epsilon,
                delta: self.committed_delta + delta,
            });
        }
        self.committed_epsilon = from_fixed(to_fixed(self.committed_epsilon) + to_fixed(epsilon));
        self.committed_delta = from_fixed(to_fixed(self.committed_delta) + to_fixed(delta));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn item(eps: f64) -> BudgetItem {
        BudgetItem {
            statistic: "mean".into(),
            variable: "age".into(),
            epsilon: eps,
            delta: 0.0,
        }
    }

    #[test]
    fn second_statistic_exceeds_ceiling() {
        let budget = PrivacyBudget::new(1.0, 0.0).expect("budget");
        let err = budget.check(&[item(0.6), item(0.45)]).unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.running_epsilon, 1.05);
        let msg = err.to_string();
        assert!(msg.contains("1.05"), "{msg}");
        assert!(msg.contains("ceiling of epsilon (1.0)"), "{msg}");
    }

    #[test]
    fn totals_are_exact() {
        assert_eq!(total_spent(&[item(0.6), item(0.45)]), (1.05, 0.0));
        assert_eq!(total_spent(&[]), (0.0, 0.0));
    }

    #[test]
    fn exact_fit_is_accepted() {
        let budget = PrivacyBudget::new(1.0, 0.0).expect("budget");
        let (eps, _) = budget.check(&[item(0.6), item(0.4)]).expect("fits");
        assert_eq!(eps, 1.0);
    }

    #[test]
    fn committed_amounts_count_against_ceiling() {
        let budget = PrivacyBudget::new(1.0, 0.0)
            .and_then(|b| b.with_committed(0.5, 0.0))
            .expect("budget");
        assert!(budget.check(&[item(0.6)]).is_err());
        assert!((budget.remaining_epsilon() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn commit_fails_closed() {
        let mut budget = PrivacyBudget::new(1.0, 0.0).expect("budget");
        budget.commit(0.7, 0.0).expect("fits");
        assert!(budget.commit(0.4, 0.0).is_err());
        assert!((budget.committed_epsilon - 0.7).abs() < 1e-12);
    }

    #[test]
    fn delta_ceiling_enforced() {
        let budget = PrivacyBudget::new(1.0, 1e-6).expect("budget");
        let mut it = item(0.1);
        it.delta = 1e-5;
        assert!(budget.check(&[it]).is_err());
    }

    proptest! {
        #[test]
        fn prop_budget_rejects_first_overflow(
            eps in prop::collection::vec(0.001f64..0.5, 1..12),
            ceiling in 0.1f64..3.0,
        ) {
            let budget = PrivacyBudget::new(ceiling, 0.0).unwrap();
            let items: Vec<_> = eps.iter().map(|e| item(*e)).collect();
            let mut running = 0u64;
            let mut expected = None;
            for (i, e) in eps.iter().enumerate() {
                running += to_fixed(*e);
                if running > to_fixed(ceiling) {
                    expected = Some(i);
                    break;
                }
            }
            match budget.check(&items) {
                Ok(_) => prop_assert!(expected.is_none()),
                Err(err) => prop_assert_eq!(Some(err.index), expected),
            }
        }
    }
}
