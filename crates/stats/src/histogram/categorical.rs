use std::collections::BTreeSet;

use rand::RngCore;

use dpcreator_core::validators::{strip_quotes, validate_fixed_value_in_categories};
use dpcreator_core::{
    MissingValuesHandling, NoiseMechanism, Result, StatisticKind, ValidationErrors, VariableType,
};

use super::{count_labels, release_counts, BucketTable, UNCATEGORIZED};
use crate::props::{RawProps, SpecProps};
use crate::release::StatValue;
use crate::variant::{Chain, PropertyValidator, StatSpecVariant};

/// Histogram with one bucket per declared category.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DpHistogramCategoricalSpec {
    table: BucketTable,
}

/// Split comma-joined category entries, strip quotes, deduplicate and sort.
pub(crate) fn normalize_categories(categories: &[String]) -> Vec<String> {
    categories
        .iter()
        .flat_map(|c| c.split(','))
        .map(|c| strip_quotes(c.trim()).trim().to_string())
        .filter(|c| !c.is_empty() && c != UNCATEGORIZED)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

impl StatSpecVariant for DpHistogramCategoricalSpec {
    fn statistic(&self) -> StatisticKind {
        StatisticKind::Histogram
    }

    fn allowed_variable_types(&self) -> &'static [VariableType] {
        &[VariableType::Categorical]
    }

    fn noise_mechanism(&self, _props: &SpecProps) -> NoiseMechanism {
        NoiseMechanism::Geometric
    }

    fn specific_validators(&self) -> &'static [PropertyValidator] {
        &[PropertyValidator::Categories]
    }

    fn transform(&mut self, raw: &mut RawProps) {
        raw.categories = normalize_categories(&raw.categories);
        if !raw.categories.is_empty() {
            self.table = BucketTable::from_labels(raw.categories.clone());
        }
    }

    fn custom_validation(&self, props: &SpecProps) -> std::result::Result<(), ValidationErrors> {
        if props.missing_values_handling == MissingValuesHandling::InsertFixed {
            validate_fixed_value_in_categories(&props.fixed_value, &props.categories)?;
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_are_split_and_sorted() {
        let cats = normalize_categories(&[
            "\"b\", a".to_string(),
            "c".to_string(),
            "a".to_string(),
        ]);
        assert_eq!(cats, vec!["a", "b", "c"]);
    }
}
