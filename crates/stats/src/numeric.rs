//! Helpers shared by the bounded numeric statistics.

use rand::RngCore;

use dpcreator_core::validators::validate_fixed_value_in_bounds;
use dpcreator_core::{
    DpError, MissingValuesHandling, Result, ValidationErrors, VariableType,
};

use crate::data::{impute_numeric, parse_floats, parse_integers, resize};
use crate::props::SpecProps;

/// Declared bounds, or an error if validation let them through unset.
pub(crate) fn bounds(props: &SpecProps) -> Result<(f64, f64)> {
    props
        .bounds()
        .ok_or_else(|| DpError::invalid(format!("{} requires min and max", props.statistic)))
}

/// Dataset size as a positive count.
pub(crate) fn dataset_size(props: &SpecProps) -> Result<usize> {
    match props.dataset_size {
        Some(n) if n > 0 => usize::try_from(n)
            .map_err(|_| DpError::invalid(format!("dataset size {n} does not fit in memory"))),
        _ => Err(DpError::invalid(format!(
            "{} requires a positive dataset size",
            props.statistic
        ))),
    }
}

/// Checks common to mean, sum and variance.
pub(crate) fn validate_bounded(
    props: &SpecProps,
    min_size: u64,
) -> std::result::Result<(), ValidationErrors> {
    let mut errors = Vec::new();
    if let (MissingValuesHandling::InsertFixed, Some((min, max))) =
        (props.missing_values_handling, props.bounds())
    {
        if let Err(e) = validate_fixed_value_in_bounds(&props.fixed_value, min, max) {
            errors.push(e.0);
        }
    }
    match props.dataset_size {
        Some(n) if n >= min_size => {}
        Some(n) => errors.push(format!(
            "The dataset size ({n}) must be at least {min_size} to release a {}.",
            props.statistic
        )),
        None if props.dataset_size_pending => {}
        None => errors.push(format!(
            "The dataset size is required to release a {}.",
            props.statistic
        )),
    }
    ValidationErrors::from_messages(errors).map_or(Ok(()), Err)
}

/// Parsed, imputed and clamped values of one column.
pub(crate) fn clean_values(
    props: &SpecProps,
    cells: &[Option<String>],
    rng: &mut dyn RngCore,
) -> Result<Vec<f64>> {
    let (min, max) = bounds(props)?;
    let integer = props.variable_type == VariableType::Integer;
    let parsed = if integer {
        parse_integers(cells)
            .into_iter()
            .map(|v| v.map(|i| i as f64))
            .collect()
    } else {
        parse_floats(cells)
    };
    Ok(impute_numeric(
        parsed,
        props.missing_values_handling,
        props.fixed_f64(),
        (min, max),
        integer,
        rng,
    ))
}

/// Clean values resized to the dataset size.
///
/// Padding uses the fixed value when one is set, otherwise the midpoint of
/// the bounds.
pub(crate) fn sized_values(
    props: &SpecProps,
    cells: &[Option<String>],
    rng: &mut dyn RngCore,
) -> Result<Vec<f64>> {
    let (min, max) = bounds(props)?;
    let n = dataset_size(props)?;
    let values = clean_values(props, cells, rng)?;
    if values.len() != n {
        tracing::debug!(
            variable = %props.variable,
            rows = values.len(),
            dataset_size = n,
            "resizing column to dataset size"
        );
    }
    let pad = props
        .fixed_f64()
        .map(|x| x.clamp(min, max))
        .unwrap_or(min + (max - min) / 2.0);
    Ok(resize(values, n, pad))
}
