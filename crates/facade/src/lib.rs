//! Facade crate re-exporting stable APIs.
//!
//! [`AnalysisPlan`] ties the pieces together: it validates a list of
//! statistic requests against a dataset's metadata and privacy budget, and
//! runs the accepted statistics over a delimited data file to produce a
//! [`Release`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod plan;
pub mod release;

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use dpcreator_accounting as accounting;
pub use dpcreator_core as core;
pub use dpcreator_stats as stats;

pub use accounting::{
    calibrate_mechanism, calibrate_scale, total_spent, BudgetExceeded, BudgetItem, DpEvent,
    PrivacyBudget,
};
pub use core::prelude as core_prelude;
pub use core::{
    DatasetInfo, DpConfig, DpError, MissingValuesHandling, StatisticKind, StatisticRequest,
    ValidationErrors, VariableInfo, VariableType,
};
pub use plan::{AnalysisPlan, PlanError, PlanValidation, StatisticOutcome, ValidStatistic};
pub use release::{Release, ReleaseItem};
pub use stats::{
    BuiltItem, ChainedSpec, ComputedSpec, DataLayout, ErrorEntry, HistogramValue, ReleaseEntry,
    StatSpec, StatSpecBuilder, StatSpecRequest, StatValue,
};

/// Convenience prelude covering plan validation and release.
pub mod prelude {
    pub use crate::plan::{AnalysisPlan, PlanError, PlanValidation, StatisticOutcome};
    pub use crate::release::{Release, ReleaseItem};
    pub use dpcreator_accounting::prelude::*;
    pub use dpcreator_core::prelude::*;
    pub use dpcreator_stats::prelude::*;
}
