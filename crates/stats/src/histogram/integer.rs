use rand::RngCore;

use dpcreator_core::validators::{
    validate_bin_count, validate_bin_edges, validate_fixed_value_in_bounds,
};
use dpcreator_core::{
    value_to_i64, MissingValuesHandling, NoiseMechanism, Result, StatisticKind, ValidationErrors,
    VariableType,
};

use super::{count_integers, release_counts, BucketTable, MAX_ONE_PER_VALUE_BUCKETS};
use crate::props::{RawProps, SpecProps};
use crate::release::StatValue;
use crate::variant::{Chain, PropertyValidator, StatSpecVariant};

/// Bounds must be integral and an insert_fixed value must lie inside them.
fn validate_integer_bounds(props: &SpecProps, errors: &mut Vec<String>) {
    let Some((min, max)) = props.bounds() else {
        return;
    };
    if min.fract() != 0.0 || max.fract() != 0.0 {
        errors.push(
            "The minimum and maximum values of an integer histogram must be integers.".into(),
        );
    }
    if props.missing_values_handling == MissingValuesHandling::InsertFixed {
        if let Err(e) = validate_fixed_value_in_bounds(&props.fixed_value, min, max) {
            errors.push(e.0);
        }
    }
}

fn finish(errors: Vec<String>) -> std::result::Result<(), ValidationErrors> {
    ValidationErrors::from_messages(errors).map_or(Ok(()), Err)
}

macro_rules! integer_histogram {
    ($name:ident) => {
        impl StatSpecVariant for $name {
            fn statistic(&self) -> StatisticKind {
                StatisticKind::Histogram
            }

            fn allowed_variable_types(&self) -> &'static [VariableType] {
                &[VariableType::Integer]
            }

            fn noise_mechanism(&self, _props: &SpecProps) -> NoiseMechanism {
                NoiseMechanism::Geometric
            }

            fn specific_validators(&self) -> &'static [PropertyValidator] {
                Self::VALIDATORS
            }

            fn transform(&mut self, raw: &mut RawProps) {
                self.table = Self::layout(raw).unwrap_or_default();
            }

            fn custom_validation(
                &self,
                props: &SpecProps,
            ) -> std::result::Result<(), ValidationErrors> {
                let mut errors = Vec::new();
                validate_integer_bounds(props, &mut errors);
                if errors.is_empty() && self.table.is_empty() {
                    errors.push(Self::LAYOUT_ERROR.to_string());
                }
                finish(errors)
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

            fn bin_edges(&self) -> Option<&[i64]> {
                Some(self.table.edges())
            }

            fn compute(
                &self,
                props: &SpecProps,
                chain: &Chain,
                cells: &[Option<String>],
                rng: &mut dyn RngCore,
            ) -> Result<StatValue> {
                let counts = count_integers(&self.table, props, cells, rng);
                release_counts(&self.table, chain, &counts, rng)
            }
        }
    };
}

/// Histogram with one bucket per integer in `[min, max]`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DpHistogramIntegerSpec {
    table: BucketTable,
}

impl DpHistogramIntegerSpec {
    const VALIDATORS: &'static [PropertyValidator] = &[PropertyValidator::MinMax];
    const LAYOUT_ERROR: &'static str =
        "The range between the minimum and maximum values is too large for one bucket per value. \
         Use equal_ranges or bin_edges instead.";

    fn layout(raw: &RawProps) -> Option<BucketTable> {
        let (min, max) = raw.integer_bounds()?;
        let buckets = max.checked_sub(min)?.checked_add(1)?;
        (max > min && buckets <= MAX_ONE_PER_VALUE_BUCKETS)
            .then(|| BucketTable::one_per_value(min, max))
    }
}

integer_histogram!(DpHistogramIntegerSpec);

/// Histogram with `N` equal-width integer ranges over `[min, max]`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DpHistogramEqualRangesSpec {
    table: BucketTable,
}

impl DpHistogramEqualRangesSpec {
    const VALIDATORS: &'static [PropertyValidator] =
        &[PropertyValidator::MinMax, PropertyValidator::NumberOfBins];
    const LAYOUT_ERROR: &'static str = "The histogram ranges could not be laid out.";

    fn layout(raw: &RawProps) -> Option<BucketTable> {
        let (min, max) = raw.integer_bounds()?;
        let bins = value_to_i64(&raw.histogram_number_of_bins)?;
        validate_bin_count(bins, min, max).ok()?;
        Some(BucketTable::equal_ranges(min, max, bins))
    }
}

integer_histogram!(DpHistogramEqualRangesSpec);

/// Histogram between caller-supplied integer edges.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DpHistogramBinEdgesSpec {
    table: BucketTable,
}

impl DpHistogramBinEdgesSpec {
    const VALIDATORS: &'static [PropertyValidator] =
        &[PropertyValidator::MinMax, PropertyValidator::BinEdges];
    const LAYOUT_ERROR: &'static str = "The histogram bin edges could not be laid out.";

    fn layout(raw: &RawProps) -> Option<BucketTable> {
        let edges = raw.integer_bin_edges()?;
        validate_bin_edges(&edges).ok()?;
        Some(BucketTable::bin_edges(&edges))
    }
}

integer_histogram!(DpHistogramBinEdgesSpec);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props::StatSpecRequest;
    use dpcreator_core::{StatisticRequest, VariableInfo};
    use serde_json::json;

    fn raw(min: f64, max: f64, edit: impl FnOnce(&mut StatisticRequest)) -> RawProps {
        let info = VariableInfo::numeric("age", VariableType::Integer, min, max);
        let mut req = StatisticRequest::new(StatisticKind::Histogram, "age", 0.5);
        edit(&mut req);
        RawProps::from_request(&StatSpecRequest::new(req, info, 0), StatisticKind::Histogram)
    }

    #[test]
    fn one_per_value_refuses_huge_ranges() {
        let mut spec = DpHistogramIntegerSpec::default();
        spec.transform(&mut raw(0.0, 10.0, |_| {}));
        assert_eq!(spec.output_len(), 12);

        let mut spec = DpHistogramIntegerSpec::default();
        spec.transform(&mut raw(0.0, 1e6, |_| {}));
        assert!(spec.table.is_empty());
    }

    #[test]
    fn bin_edges_layout_from_request() {
        let mut spec = DpHistogramBinEdgesSpec::default();
        spec.transform(&mut raw(18.0, 75.0, |r| {
            r.histogram_bin_edges = json!([18, 25, 35, 45, 55, 65, 75]);
        }));
        assert_eq!(spec.bin_edges(), Some(&[18, 25, 35, 45, 55, 65, 76][..]));
        assert_eq!(spec.output_len(), 7);
    }

    #[test]
    fn equal_ranges_need_a_valid_bin_count() {
        let mut spec = DpHistogramEqualRangesSpec::default();
        spec.transform(&mut raw(0.0, 5.0, |r| r.histogram_number_of_bins = json!(10)));
        assert!(spec.table.is_empty());

        spec.transform(&mut raw(0.0, 99.0, |r| r.histogram_number_of_bins = json!("10")));
        assert_eq!(spec.output_len(), 11);
    }
}
