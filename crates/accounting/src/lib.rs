//! Privacy accounting for DP statistic releases.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod budget;
pub mod calibrate;
pub mod event;

pub use budget::{total_spent, BudgetExceeded, BudgetItem, PrivacyBudget, BUDGET_SCALE};
pub use calibrate::{calibrate_mechanism, calibrate_scale};
pub use event::DpEvent;

/// Common imports for privacy accounting.
pub mod prelude {
    pub use crate::{
        calibrate_mechanism, calibrate_scale, total_spent, BudgetExceeded, BudgetItem, DpEvent,
        PrivacyBudget,
    };
}
