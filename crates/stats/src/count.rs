//! DP count of the records of one variable.

use rand::RngCore;

use dpcreator_core::{
    GeometricMechanism, MissingValuesHandling, NoiseMechanism, Result, StatisticKind,
    VariableType,
};

use crate::data::{parse_floats, parse_integers};
use crate::props::SpecProps;
use crate::release::StatValue;
use crate::variant::{Chain, StatSpecVariant};

/// Counts records; any variable type, sensitivity 1, geometric noise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DpCountSpec;

impl DpCountSpec {
    /// True count before noise.
    ///
    /// With `drop`, only cells that hold a value of the variable's type are
    /// counted. Every other policy keeps every row.
    pub fn true_count(props: &SpecProps, cells: &[Option<String>]) -> usize {
        if props.missing_values_handling != MissingValuesHandling::Drop {
            return cells.len();
        }
        match props.variable_type {
            VariableType::Integer => parse_integers(cells).iter().flatten().count(),
            VariableType::Float => parse_floats(cells).iter().flatten().count(),
            VariableType::Categorical | VariableType::Boolean => {
                cells.iter().flatten().count()
            }
        }
    }
}

impl StatSpecVariant for DpCountSpec {
    fn statistic(&self) -> StatisticKind {
        StatisticKind::Count
    }

    fn allowed_variable_types(&self) -> &'static [VariableType] {
        &[
            VariableType::Integer,
            VariableType::Float,
            VariableType::Categorical,
            VariableType::Boolean,
        ]
    }

    fn noise_mechanism(&self, _props: &SpecProps) -> NoiseMechanism {
        NoiseMechanism::Geometric
    }

    fn sensitivity(&self, _props: &SpecProps) -> Result<f64> {
        Ok(1.0)
    }

    fn compute(
        &self,
        props: &SpecProps,
        chain: &Chain,
        cells: &[Option<String>],
        rng: &mut dyn RngCore,
    ) -> Result<StatValue> {
        let count = i64::try_from(Self::true_count(props, cells)).unwrap_or(i64::MAX);
        let noisy = GeometricMechanism::new(chain.scale)?.apply(count, rng)?;
        Ok(StatValue::Integer(noisy.max(0)))
    }
}
