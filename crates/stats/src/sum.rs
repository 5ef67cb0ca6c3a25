//! DP sum over a bounded numeric variable of known size.

use rand::RngCore;

use dpcreator_core::{
    GeometricMechanism, LaplaceMechanism, NoiseMechanism, Result, StatisticKind,
    ValidationErrors, VariableType,
};

use crate::numeric;
use crate::props::SpecProps;
use crate::release::StatValue;
use crate::variant::{Chain, PropertyValidator, StatSpecVariant};

/// Sized bounded sum; sensitivity `max - min`.
///
/// Integer variables get geometric noise and an integer result, float
/// variables Laplace noise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DpSumSpec;

impl StatSpecVariant for DpSumSpec {
    fn statistic(&self) -> StatisticKind {
        StatisticKind::Sum
    }

    fn allowed_variable_types(&self) -> &'static [VariableType] {
        &[VariableType::Integer, VariableType::Float]
    }

    fn noise_mechanism(&self, props: &SpecProps) -> NoiseMechanism {
        match props.variable_type {
            VariableType::Integer => NoiseMechanism::Geometric,
            _ => NoiseMechanism::Laplace,
        }
    }

    fn specific_validators(&self) -> &'static [PropertyValidator] {
        &[PropertyValidator::MinMax]
    }

    fn custom_validation(&self, props: &SpecProps) -> std::result::Result<(), ValidationErrors> {
        numeric::validate_bounded(props, 1)
    }

    fn sensitivity(&self, props: &SpecProps) -> Result<f64> {
        let (min, max) = numeric::bounds(props)?;
        Ok(max - min)
    }

    fn compute(
        &self,
        props: &SpecProps,
        chain: &Chain,
        cells: &[Option<String>],
        rng: &mut dyn RngCore,
    ) -> Result<StatValue> {
        let values = numeric::sized_values(props, cells, rng)?;
        let sum: f64 = values.iter().sum();
        match chain.mechanism {
            NoiseMechanism::Geometric => {
                let noisy = GeometricMechanism::new(chain.scale)?.apply(sum.round() as i64, rng)?;
                Ok(StatValue::Integer(noisy))
            }
            NoiseMechanism::Laplace => {
                let noisy = LaplaceMechanism::new(chain.scale)?.apply(sum, rng)?;
                Ok(StatValue::Float(noisy))
            }
        }
    }
}
