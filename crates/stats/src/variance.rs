//! DP variance over a bounded numeric variable of known size.

use rand::RngCore;

use dpcreator_core::{
    LaplaceMechanism, NoiseMechanism, Result, StatisticKind, ValidationErrors, VariableType,
};

use crate::numeric;
use crate::props::SpecProps;
use crate::release::StatValue;
use crate::variant::{Chain, PropertyValidator, StatSpecVariant};

/// Sized bounded variance (divisor `n`) with Laplace noise; sensitivity
/// `(max - min)^2 / n`. The noisy value is clamped at zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DpVarianceSpec;

impl StatSpecVariant for DpVarianceSpec {
    fn statistic(&self) -> StatisticKind {
        StatisticKind::Variance
    }

    fn allowed_variable_types(&self) -> &'static [VariableType] {
        &[VariableType::Integer, VariableType::Float]
    }

    fn noise_mechanism(&self, _props: &SpecProps) -> NoiseMechanism {
        NoiseMechanism::Laplace
    }

    fn specific_validators(&self) -> &'static [PropertyValidator] {
        &[PropertyValidator::MinMax]
    }

    fn custom_validation(&self, props: &SpecProps) -> std::result::Result<(), ValidationErrors> {
        numeric::validate_bounded(props, 2)
    }

    fn sensitivity(&self, props: &SpecProps) -> Result<f64> {
        let (min, max) = numeric::bounds(props)?;
        let range = max - min;
        Ok(range * range / numeric::dataset_size(props)? as f64)
    }

    fn compute(
        &self,
        props: &SpecProps,
        chain: &Chain,
        cells: &[Option<String>],
        rng: &mut dyn RngCore,
    ) -> Result<StatValue> {
        let values = numeric::sized_values(props, cells, rng)?;
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n;
        let noisy = LaplaceMechanism::new(chain.scale)?.apply(variance, rng)?;
        Ok(StatValue::Float(noisy.max(0.0)))
    }
}
