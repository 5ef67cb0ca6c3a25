//! Validated statistic specs and their release pipeline.
//!
//! A spec moves through three states:
//!
//! - [`StatSpec`]: the request passed transform, basic and custom validation.
//! - [`ChainedSpec`]: a noise chain was calibrated and the accuracy is known.
//!   No data has been touched.
//! - [`ComputedSpec`]: the chain ran over the data and produced a noisy value.

use std::io::BufRead;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use dpcreator_accounting::{calibrate_mechanism, BudgetItem, DpEvent};
use dpcreator_core::validators::{
    validate_bin_count, validate_bin_edges, validate_confidence_level, validate_delta,
    validate_epsilon, validate_min_max, validate_missing_values_handling, validate_not_equal,
};
use dpcreator_core::{
    accuracy_message, confidence_level_alpha, number_value, scale_to_accuracy, value_to_f64,
    value_to_i64, DpConfig, DpError, HistogramBinType, MissingValuesHandling, Result,
    StatisticKind, ValidationErrors, ValidationResult,
};

use crate::data::{read_column, DataLayout};
use crate::props::{RawProps, SpecProps, StatSpecRequest};
use crate::release::{
    AccuracyEntry, BooleanValues, Bounds, Description, MissingValueHandlingEntry, ReleaseEntry,
    ResultValue, StatValue,
};
use crate::variant::{Chain, PropertyValidator, StatSpecVariant, StatVariant};

/// A statistic request that passed every validation phase.
#[derive(Clone, Debug, PartialEq)]
pub struct StatSpec {
    variant: StatVariant,
    props: SpecProps,
    config: DpConfig,
}

impl StatSpec {
    /// Validate a request; every basic-validation problem is reported at once.
    pub fn new(
        req: &StatSpecRequest,
        config: &DpConfig,
    ) -> std::result::Result<Self, ValidationErrors> {
        let statistic: StatisticKind = req
            .request
            .statistic
            .parse()
            .map_err(ValidationErrors::single)?;
        let bin_type = req
            .request
            .histogram_bin_type
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<HistogramBinType>)
            .transpose()
            .map_err(ValidationErrors::single)?;
        let mut variant =
            StatVariant::dispatch(statistic, req.variable_info.variable_type, bin_type)?;

        let mut raw = RawProps::from_request(req, statistic);
        variant.transform(&mut raw);

        let props = run_02_basic_validation(&variant, &raw, bin_type, config)?;
        run_03_custom_validation(&variant, &props)?;

        tracing::debug!(
            statistic = %props.statistic,
            variable = %props.variable,
            epsilon = props.epsilon,
            "statistic spec validated"
        );
        Ok(Self {
            variant,
            props,
            config: config.clone(),
        })
    }

    /// Validated properties.
    pub fn props(&self) -> &SpecProps {
        &self.props
    }

    /// The statistic variant.
    pub fn variant(&self) -> &StatVariant {
        &self.variant
    }

    /// Replace the dataset size and re-run the cross-field checks.
    pub fn set_dataset_size(&mut self, n: u64) -> std::result::Result<(), ValidationErrors> {
        self.props.dataset_size = Some(n);
        self.props.dataset_size_pending = false;
        run_03_custom_validation(&self.variant, &self.props)
    }

    /// Whether the spec waits for a DP count to supply its dataset size.
    pub fn awaits_dataset_size(&self) -> bool {
        self.props.dataset_size_pending
            && self.props.dataset_size.is_none()
            && self.props.statistic.requires_dataset_size()
    }

    /// Budget claim of this statistic.
    pub fn budget_item(&self) -> BudgetItem {
        BudgetItem {
            statistic: self.props.statistic.to_string(),
            variable: self.props.variable.clone(),
            epsilon: self.props.epsilon,
            delta: self.props.delta,
        }
    }

    /// Calibrate the noise chain and compute the accuracy.
    pub fn build_chain(&self) -> std::result::Result<ChainedSpec, ValidationErrors> {
        let props = &self.props;
        if self.awaits_dataset_size() {
            return Err(ValidationErrors::single(format!(
                "The noise for {} of {} is calibrated once a DP count estimates the \
                 dataset size.",
                props.statistic, props.variable
            )));
        }
        let mechanism = self.variant.noise_mechanism(props);
        let sensitivity = self.variant.sensitivity(props)?;
        let scale = calibrate_mechanism(mechanism, sensitivity, props.epsilon, &self.config)
            .map_err(|e| match e {
                DpError::ScaleSearchFailed { .. } => ValidationErrors::single(format!(
                    "Failed to calibrate the noise for {} of {}. The minimum and maximum \
                     values may be too close together; try widening them.",
                    props.statistic, props.variable
                )),
                other => ValidationErrors::from(other),
            })?;
        let accuracy =
            scale_to_accuracy(mechanism, scale, props.alpha, self.variant.output_len())?;
        tracing::debug!(
            statistic = %props.statistic,
            variable = %props.variable,
            sensitivity,
            scale,
            accuracy,
            "noise chain built"
        );
        Ok(ChainedSpec {
            spec: self.clone(),
            chain: Chain {
                mechanism,
                sensitivity,
                scale,
                event: DpEvent::for_mechanism(mechanism, sensitivity, scale),
            },
            accuracy,
        })
    }

    /// Whether a noise chain can be built.
    pub fn is_chain_valid(&self) -> bool {
        self.build_chain().is_ok()
    }
}

fn collect(errors: &mut Vec<String>, result: ValidationResult) {
    if let Err(e) = result {
        errors.push(e.0);
    }
}

/// Phase 02: shared and variant-declared single-property checks.
fn run_02_basic_validation(
    variant: &StatVariant,
    raw: &RawProps,
    bin_type: Option<HistogramBinType>,
    config: &DpConfig,
) -> std::result::Result<SpecProps, ValidationErrors> {
    let mut errors = Vec::new();

    if !variant.allowed_variable_types().contains(&raw.variable_type) {
        errors.push(format!(
            "Statistic \"{}\" is not supported for {} variables.",
            raw.statistic, raw.variable_type
        ));
    }
    collect(&mut errors, validate_epsilon(&raw.epsilon, config));
    collect(&mut errors, validate_delta(&raw.delta, config));
    collect(&mut errors, validate_confidence_level(&raw.cl, config));
    if raw.missing_values_handling.is_empty() && raw.statistic != StatisticKind::Count {
        errors.push(format!(
            "A missing value handling option is required for {}.",
            raw.statistic
        ));
    } else {
        collect(
            &mut errors,
            validate_missing_values_handling(&raw.missing_values_handling),
        );
    }

    let validators = variant.specific_validators();
    for v in validators {
        match v {
            PropertyValidator::MinMax => collect(&mut errors, validate_min_max(&raw.min, &raw.max)),
            PropertyValidator::Categories => {
                if raw.categories.is_empty() {
                    errors.push("At least one category is required.".into());
                }
            }
            PropertyValidator::TrueFalseValues => match (&raw.true_value, &raw.false_value) {
                (Some(t), Some(f)) => collect(&mut errors, validate_not_equal(t, f)),
                _ => errors.push("The true and false values must both be set.".into()),
            },
            PropertyValidator::NumberOfBins => match value_to_i64(&raw.histogram_number_of_bins) {
                Some(bins) => {
                    if let Some((min, max)) = raw.integer_bounds() {
                        collect(&mut errors, validate_bin_count(bins, min, max));
                    }
                }
                None => errors.push("The number of histogram bins must be an integer.".into()),
            },
            PropertyValidator::BinEdges => match raw.integer_bin_edges() {
                Some(edges) => collect(&mut errors, validate_bin_edges(&edges)),
                None => errors.push("The histogram bin edges must be a list of integers.".into()),
            },
        }
    }

    let alpha = confidence_level_alpha(&raw.cl);
    if let Some(e) = ValidationErrors::from_messages(errors) {
        tracing::debug!(
            statistic = %raw.statistic,
            variable = %raw.variable,
            errors = e.len(),
            "basic validation failed"
        );
        return Err(e);
    }

    let invalid = |what: &str| ValidationErrors::single(format!("The {what} is not valid."));
    let epsilon = value_to_f64(&raw.epsilon).ok_or_else(|| invalid("epsilon value"))?;
    let delta = if raw.delta.is_null() {
        0.0
    } else {
        value_to_f64(&raw.delta).ok_or_else(|| invalid("delta value"))?
    };
    let cl = value_to_f64(&raw.cl).ok_or_else(|| invalid("confidence level"))?;
    let alpha = alpha.map_err(|e| ValidationErrors::single(e.to_string()))?;
    let missing_values_handling: MissingValuesHandling = raw
        .missing_values_handling
        .parse()
        .map_err(ValidationErrors::single)?;

    let declares = |v: PropertyValidator| validators.contains(&v);
    let (min, max) = if declares(PropertyValidator::MinMax) {
        (value_to_f64(&raw.min), value_to_f64(&raw.max))
    } else {
        (None, None)
    };
    let (true_value, false_value) = if declares(PropertyValidator::TrueFalseValues) {
        (raw.true_value.clone(), raw.false_value.clone())
    } else {
        (None, None)
    };

    Ok(SpecProps {
        statistic: raw.statistic,
        variable: raw.variable.clone(),
        variable_type: raw.variable_type,
        col_index: raw.col_index,
        epsilon,
        delta,
        cl,
        alpha,
        missing_values_handling,
        fixed_value: raw.fixed_value.clone(),
        min,
        max,
        categories: raw.categories.clone(),
        true_value,
        false_value,
        histogram_bin_type: bin_type,
        histogram_number_of_bins: value_to_i64(&raw.histogram_number_of_bins),
        histogram_bin_edges: raw.integer_bin_edges().unwrap_or_default(),
        dataset_size: raw.dataset_size,
        dataset_size_pending: raw.dataset_size_pending,
        auto_generated: raw.auto_generated,
    })
}

/// Phase 03: cross-field checks.
fn run_03_custom_validation(
    variant: &StatVariant,
    props: &SpecProps,
) -> std::result::Result<(), ValidationErrors> {
    if props.missing_values_handling == MissingValuesHandling::InsertFixed
        && props.fixed_value.is_null()
    {
        return Err(ValidationErrors::single(
            "A fixed value is required when missing values are handled with insert_fixed.",
        ));
    }
    variant.custom_validation(props)
}

/// A spec with a calibrated noise chain.
#[derive(Clone, Debug, PartialEq)]
pub struct ChainedSpec {
    spec: StatSpec,
    chain: Chain,
    accuracy: f64,
}

impl ChainedSpec {
    /// The validated spec.
    pub fn spec(&self) -> &StatSpec {
        &self.spec
    }

    /// Validated properties.
    pub fn props(&self) -> &SpecProps {
        &self.spec.props
    }

    /// The calibrated chain.
    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    /// Accuracy at the requested confidence level.
    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    /// Human-readable accuracy statement.
    pub fn accuracy_message(&self) -> String {
        let p = self.props();
        accuracy_message(p.statistic.as_str(), &p.variable, self.accuracy, p.alpha)
    }

    /// Epsilon the chain spends, from its privacy map.
    pub fn epsilon_spent(&self) -> f64 {
        self.chain.event.epsilon(1.0)
    }

    /// Read the variable's column and run the chain with an OS-seeded RNG.
    pub fn run_chain<R: BufRead>(&self, reader: R, layout: &DataLayout) -> Result<ComputedSpec> {
        let mut rng = ChaCha20Rng::from_entropy();
        self.run_chain_with_rng(reader, layout, &mut rng)
    }

    /// Read the variable's column and run the chain with the given RNG.
    pub fn run_chain_with_rng<R: BufRead, G: RngCore>(
        &self,
        reader: R,
        layout: &DataLayout,
        rng: &mut G,
    ) -> Result<ComputedSpec> {
        let props = self.props();
        let cells = read_column(reader, layout, props.col_index, &props.variable)?;
        self.run_on_cells(&cells, rng)
    }

    /// Run the chain over already extracted cells.
    pub fn run_on_cells<G: RngCore>(
        &self,
        cells: &[Option<String>],
        rng: &mut G,
    ) -> Result<ComputedSpec> {
        let value = self
            .spec
            .variant
            .compute(self.props(), &self.chain, cells, rng)?;
        tracing::info!(
            statistic = %self.props().statistic,
            variable = %self.props().variable,
            rows = cells.len(),
            "statistic computed"
        );
        Ok(ComputedSpec {
            chained: self.clone(),
            value,
        })
    }
}

/// A spec whose chain ran over the data.
#[derive(Clone, Debug, PartialEq)]
pub struct ComputedSpec {
    chained: ChainedSpec,
    value: StatValue,
}

impl ComputedSpec {
    /// The chained spec this value came from.
    pub fn chained(&self) -> &ChainedSpec {
        &self.chained
    }

    /// The noisy value.
    pub fn value(&self) -> &StatValue {
        &self.value
    }

    /// The release JSON entry.
    pub fn release_entry(&self) -> ReleaseEntry {
        let chained = &self.chained;
        let props = chained.props();
        let variant = &chained.spec.variant;
        let validators = variant.specific_validators();

        let bounds = match (validators.contains(&PropertyValidator::MinMax), props.bounds()) {
            (true, Some((min, max))) => Some(Bounds {
                min: number_value(min),
                max: number_value(max),
            }),
            _ => None,
        };
        let boolean_values = match (&props.true_value, &props.false_value) {
            (Some(t), Some(f)) => Some(BooleanValues {
                true_value: t.clone(),
                false_value: f.clone(),
            }),
            _ => None,
        };
        let fixed_value = (props.missing_values_handling == MissingValuesHandling::InsertFixed)
            .then(|| props.fixed_value.clone());

        ReleaseEntry {
            statistic: props.statistic.to_string(),
            variable: props.variable.clone(),
            variable_type: props.variable_type.to_string(),
            result: ResultValue {
                value: self.value.clone(),
            },
            noise_mechanism: chained.chain.mechanism.as_str().to_string(),
            epsilon: props.epsilon,
            delta: props.delta,
            bounds,
            boolean_values,
            missing_value_handling: MissingValueHandlingEntry {
                kind: props.missing_values_handling.as_str().to_string(),
                fixed_value,
            },
            confidence_level: props.cl,
            confidence_level_alpha: props.alpha,
            accuracy: AccuracyEntry {
                value: chained.accuracy,
                message: chained.accuracy_message(),
            },
            description: describe(chained, variant.output_len()),
            histogram_bin_edges: variant
                .bin_edges()
                .filter(|e| !e.is_empty())
                .map(<[i64]>::to_vec),
            auto_generated: props.auto_generated,
        }
    }
}

fn describe(chained: &ChainedSpec, outputs: usize) -> Description {
    let p = chained.props();
    let mechanism = chained.chain.mechanism.as_str();
    let extra = if p.statistic == StatisticKind::Histogram {
        format!(" across {outputs} buckets")
    } else {
        String::new()
    };
    Description {
        text: format!(
            "DP {} of \"{}\"{extra}, released with epsilon {} using the {mechanism} mechanism.",
            p.statistic, p.variable, p.epsilon
        ),
        html: format!(
            "<b>DP {}</b> of <code>{}</code>{extra}, released with epsilon <b>{}</b> using the \
             {mechanism} mechanism.",
            p.statistic, p.variable, p.epsilon
        ),
    }
}
