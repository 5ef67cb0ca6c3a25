//! Core building blocks for differentially private statistic releases.
//!
//! This crate provides the request and metadata types, scalar validators,
//! noise mechanisms and accuracy formulas shared by the statistic engine.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod accuracy;
pub mod config;
pub mod error;
pub mod noise;
pub mod types;
pub mod validators;

pub use accuracy::{
    accuracy_message, confidence_level_alpha, discrete_laplace_scale_to_accuracy,
    laplace_scale_to_accuracy, scale_to_accuracy,
};
pub use config::DpConfig;
pub use error::{
    ConfidenceLevelError, DpError, Result, ValidationError, ValidationErrors, ValidationResult,
};
pub use noise::{
    sample_discrete_laplace, sample_laplace, GeometricMechanism, LaplaceMechanism, NoiseMechanism,
};
pub use types::{
    number_value, value_label, value_to_f64, value_to_i64, DatasetInfo, HistogramBinType,
    MissingValuesHandling, StatisticKind, StatisticRequest, VariableInfo, VariableType,
};

/// Common imports for downstream users.
pub mod prelude {
    pub use crate::{
        confidence_level_alpha, scale_to_accuracy, DatasetInfo, DpConfig, DpError,
        GeometricMechanism, HistogramBinType, LaplaceMechanism, MissingValuesHandling,
        NoiseMechanism, Result, StatisticKind, StatisticRequest, ValidationError,
        ValidationErrors, VariableInfo, VariableType,
    };
}
