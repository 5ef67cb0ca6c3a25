//! DP mean over a bounded numeric variable of known size.

use rand::RngCore;

use dpcreator_core::{
    LaplaceMechanism, NoiseMechanism, Result, StatisticKind, ValidationErrors, VariableType,
};

use crate::numeric;
use crate::props::SpecProps;
use crate::release::StatValue;
use crate::variant::{Chain, PropertyValidator, StatSpecVariant};

/// Sized bounded mean with Laplace noise; sensitivity `(max - min) / n`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DpMeanSpec;

impl StatSpecVariant for DpMeanSpec {
    fn statistic(&self) -> StatisticKind {
        StatisticKind::Mean
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
        numeric::validate_bounded(props, 1)
    }

    fn sensitivity(&self, props: &SpecProps) -> Result<f64> {
        let (min, max) = numeric::bounds(props)?;
        Ok((max - min) / numeric::dataset_size(props)? as f64)
    }

    fn compute(
        &self,
        props: &SpecProps,
        chain: &Chain,
        cells: &[Option<String>],
        rng: &mut dyn RngCore,
    ) -> Result<StatValue> {
        let values = numeric::sized_values(props, cells, rng)?;
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let noisy = LaplaceMechanism::new(chain.scale)?.apply(mean, rng)?;
        Ok(StatValue::Float(noisy))
    }
}
