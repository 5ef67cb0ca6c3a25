//! The statistic-variant interface and the dispatch table.

use rand::RngCore;

use dpcreator_accounting::DpEvent;
use dpcreator_core::{
    DpError, HistogramBinType, NoiseMechanism, Result, StatisticKind, ValidationErrors,
    VariableType,
};

use crate::count::DpCountSpec;
use crate::histogram::{
    DpHistogramBinEdgesSpec, DpHistogramBooleanSpec, DpHistogramCategoricalSpec,
    DpHistogramEqualRangesSpec, DpHistogramIntegerSpec,
};
use crate::mean::DpMeanSpec;
use crate::props::{RawProps, SpecProps};
use crate::release::StatValue;
use crate::sum::DpSumSpec;
use crate::variance::DpVarianceSpec;

/// Single-property validators a variant can opt into.
///
/// Declaring `MinMax` also puts the bounds into the release entry, and
/// `TrueFalseValues` the boolean labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropertyValidator {
    /// Numeric bounds with `max > min`.
    MinMax,
    /// Non-empty category list.
    Categories,
    /// Distinct true/false labels.
    TrueFalseValues,
    /// Bin count within the integer range.
    NumberOfBins,
    /// At least two increasing integer edges.
    BinEdges,
}

/// A calibrated noise chain, built without touching data.
#[derive(Clone, Debug, PartialEq)]
pub struct Chain {
    /// Noise family.
    pub mechanism: NoiseMechanism,
    /// L1 sensitivity at input distance 1.
    pub sensitivity: f64,
    /// Calibrated noise scale.
    pub scale: f64,
    /// Privacy map of the release.
    pub event: DpEvent,
}

/// Per-statistic behaviour plugged into the shared validation pipeline.
pub trait StatSpecVariant {
    /// Statistic this variant computes.
    fn statistic(&self) -> StatisticKind;

    /// Variable types this variant accepts.
    fn allowed_variable_types(&self) -> &'static [VariableType];

    /// Noise family used for the release.
    fn noise_mechanism(&self, props: &SpecProps) -> NoiseMechanism;

    /// Validators run in addition to the shared ones.
    fn specific_validators(&self) -> &'static [PropertyValidator] {
        &[]
    }

    /// Statistic-specific coercion and scaffolding (phase 01).
    fn transform(&mut self, _raw: &mut RawProps) {}

    /// Cross-field checks (phase 03).
    fn custom_validation(&self, _props: &SpecProps) -> std::result::Result<(), ValidationErrors> {
        Ok(())
    }

    /// Sensitivity of the pre-noise statistic.
    fn sensitivity(&self, props: &SpecProps) -> Result<f64>;

    /// Number of noisy outputs sharing one confidence statement.
    fn output_len(&self) -> usize {
        1
    }

    /// Bucket labels, for histograms.
    fn categories(&self) -> Option<&[String]> {
        None
    }

    /// Bucket edges, for integer histograms.
    fn bin_edges(&self) -> Option<&[i64]> {
        None
    }

    /// Run the statistic over one column and add noise.
    fn compute(
        &self,
        props: &SpecProps,
        chain: &Chain,
        cells: &[Option<String>],
        rng: &mut dyn RngCore,
    ) -> Result<StatValue>;
}

/// The closed set of statistic variants.
#[derive(Clone, Debug, PartialEq)]
pub enum StatVariant {
    /// DP count.
    Count(DpCountSpec),
    /// DP mean.
    Mean(DpMeanSpec),
    /// DP sum.
    Sum(DpSumSpec),
    /// DP variance.
    Variance(DpVarianceSpec),
    /// Histogram over a true/false pair.
    HistogramBoolean(DpHistogramBooleanSpec),
    /// Histogram over categories.
    HistogramCategorical(DpHistogramCategoricalSpec),
    /// Histogram with one bucket per integer.
    HistogramInteger(DpHistogramIntegerSpec),
    /// Histogram with equal-width integer ranges.
    HistogramEqualRanges(DpHistogramEqualRangesSpec),
    /// Histogram with explicit integer edges.
    HistogramBinEdges(DpHistogramBinEdgesSpec),
}

macro_rules! delegate {
    ($self:ident, $v:ident => $body:expr) => {
        match $self {
            StatVariant::Count($v) => $body,
            StatVariant::Mean($v) => $body,
            StatVariant::Sum($v) => $body,
            StatVariant::Variance($v) => $body,
            StatVariant::HistogramBoolean($v) => $body,
            StatVariant::HistogramCategorical($v) => $body,
            StatVariant::HistogramInteger($v) => $body,
            StatVariant::HistogramEqualRanges($v) => $body,
            StatVariant::HistogramBinEdges($v) => $body,
        }
    };
}

impl StatVariant {
    /// Pick the variant for `(statistic, variable type, bin type)`.
    pub fn dispatch(
        statistic: StatisticKind,
        variable_type: VariableType,
        bin_type: Option<HistogramBinType>,
    ) -> Result<Self> {
        use HistogramBinType as B;
        use VariableType as T;

        let variant = match (statistic, variable_type, bin_type) {
            (StatisticKind::Count, _, _) => StatVariant::Count(DpCountSpec),
            (StatisticKind::Mean, _, _) => StatVariant::Mean(DpMeanSpec),
            (StatisticKind::Sum, _, _) => StatVariant::Sum(DpSumSpec),
            (StatisticKind::Variance, _, _) => StatVariant::Variance(DpVarianceSpec),
            (StatisticKind::Histogram, T::Boolean, None | Some(B::Boolean | B::OnePerValue)) => {
                StatVariant::HistogramBoolean(DpHistogramBooleanSpec::default())
            }
            (StatisticKind::Histogram, T::Categorical, None | Some(B::OnePerValue)) => {
                StatVariant::HistogramCategorical(DpHistogramCategoricalSpec::default())
            }
            (StatisticKind::Histogram, T::Integer, None | Some(B::OnePerValue)) => {
                StatVariant::HistogramInteger(DpHistogramIntegerSpec::default())
            }
            (StatisticKind::Histogram, T::Integer, Some(B::EqualRanges)) => {
                StatVariant::HistogramEqualRanges(DpHistogramEqualRangesSpec::default())
            }
            (StatisticKind::Histogram, T::Integer, Some(B::BinEdges)) => {
                StatVariant::HistogramBinEdges(DpHistogramBinEdgesSpec::default())
            }
            (StatisticKind::Histogram, t, Some(b)) => {
                return Err(DpError::unsupported(format!(
                    "Histogram bin type {b:?} is not supported for {t} variables."
                )))
            }
            (StatisticKind::Histogram, t, None) => {
                return Err(DpError::unsupported(format!(
                    "Histograms are not supported for {t} variables."
                )))
            }
            (StatisticKind::Quantile, _, _) => {
                return Err(DpError::unsupported("Statistic \"quantile\" is not supported."))
            }
        };
        Ok(variant)
    }
}

impl StatSpecVariant for StatVariant {
    fn statistic(&self) -> StatisticKind {
        delegate!(self, v => v.statistic())
    }

    fn allowed_variable_types(&self) -> &'static [VariableType] {
        delegate!(self, v => v.allowed_variable_types())
    }

    fn noise_mechanism(&self, props: &SpecProps) -> NoiseMechanism {
        delegate!(self, v => v.noise_mechanism(props))
    }

    fn specific_validators(&self) -> &'static [PropertyValidator] {
        delegate!(self, v => v.specific_validators())
    }

    fn transform(&mut self, raw: &mut RawProps) {
        delegate!(self, v => v.transform(raw))
    }

    fn custom_validation(&self, props: &SpecProps) -> std::result::Result<(), ValidationErrors> {
        delegate!(self, v => v.custom_validation(props))
    }

    fn sensitivity(&self, props: &SpecProps) -> Result<f64> {
        delegate!(self, v => v.sensitivity(props))
    }

    fn output_len(&self) -> usize {
        delegate!(self, v => v.output_len())
    }

    fn categories(&self) -> Option<&[String]> {
        delegate!(self, v => v.categories())
    }

    fn bin_edges(&self) -> Option<&[i64]> {
        delegate!(self, v => v.bin_edges())
    }

    fn compute(
        &self,
        props: &SpecProps,
        chain: &Chain,
        cells: &[Option<String>],
        rng: &mut dyn RngCore,
    ) -> Result<StatValue> {
        delegate!(self, v => v.compute(props, chain, cells, rng))
    }
}
