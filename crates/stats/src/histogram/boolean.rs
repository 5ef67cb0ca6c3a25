use rand::RngCore;

use dpcreator_core::{NoiseMechanism, Result, StatisticKind, ValidationErrors, VariableType};

use super::{count_labels, release_counts, BucketTable};
use crate::props::{RawProps, SpecProps};
use crate::release::StatValue;
use crate::variant::{Chain, PropertyValidator, StatSpecVariant};

/// Histogram with a bucket for the true label, one for the false label and
/// the catch-all.
///
/// A fixed impute value that matches neither label lands in the catch-all.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DpHistogramBooleanSpec {
    table: BucketTable,
}

impl StatSpecVariant for DpHistogramBooleanSpec {
    fn statistic(&self) -> StatisticKind {
        StatisticKind::Histogram
    }

    fn allowed_variable_types(&self) -> &'static [VariableType] {
        &[VariableType::Boolean]
    }

    fn noise_mechanism(&self, _props: &SpecProps) -> NoiseMechanism {
        NoiseMechanism::Geometric
    }

    fn specific_validators(&self) -> &'static [PropertyValidator] {
        &[PropertyValidator::TrueFalseValues]
    }

    fn transform(&mut self, raw: &mut RawProps) {
        if let (Some(t), Some(f)) = (&raw.true_value, &raw.false_value) {
            raw.categories = vec![t.clone(), f.clone()];
            self.table = BucketTable::from_labels(raw.categories.clone());
        }
    }

    fn custom_validation(&self, _props: &SpecProps) -> std::result::Result<(), ValidationErrors> {
        if self.table.is_empty() {
            return Err(ValidationErrors::single(
                "The true and false values must both be set.",
            ));
        }
        Ok(())
    }

    fn sensitivity(&self, _props: &SpecProps) -> Result<f64> {
        Ok(1.0)
    }

    fn output_len(&self) -> usize {
        self.table.len()
    }

    fn categories(&self) -> Option<&[String]> {
        Some(self.table.labels())
    }

    fn compute(
        &self,
        props: &SpecProps,
        chain: &Chain,
        cells: &[Option<String>],
        rng: &mut dyn RngCore,
    ) -> Result<StatValue> {
        let counts = count_labels(&self.table, props, cells, rng);
        release_counts(&self.table, chain, &counts, rng)
    }
}
