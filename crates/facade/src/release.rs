//! The JSON document produced by a release run.

use serde::{Deserialize, Serialize};

use dpcreator_accounting::PrivacyBudget;
use dpcreator_stats::{ErrorEntry, ReleaseEntry};

/// One statistic of a release: its entry, or why it was not released.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReleaseItem {
    /// A released statistic.
    Entry(Box<ReleaseEntry>),
    /// A statistic that failed validation or computation.
    Error(ErrorEntry),
}

impl ReleaseItem {
    /// The release entry, when the statistic was released.
    pub fn entry(&self) -> Option<&ReleaseEntry> {
        match self {
            ReleaseItem::Entry(e) => Some(e),
            ReleaseItem::Error(_) => None,
        }
    }

    /// The error entry, when the statistic was not released.
    pub fn error(&self) -> Option<&ErrorEntry> {
        match self {
            ReleaseItem::Entry(_) => None,
            ReleaseItem::Error(e) => Some(e),
        }
    }
}

/// Every statistic of a plan, in plan order, plus what it spent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Release {
    /// Dataset name.
    pub dataset: String,
    /// Statistics in plan order (auto-generated ones first).
    pub statistics: Vec<ReleaseItem>,
    /// Epsilon spent by the released statistics.
    pub epsilon_used: f64,
    /// Delta spent by the released statistics.
    pub delta_used: f64,
    /// The dataset budget after committing this release.
    pub budget: PrivacyBudget,
}

impl Release {
    /// Released entries only.
    pub fn entries(&self) -> impl Iterator<Item = &ReleaseEntry> {
        self.statistics.iter().filter_map(ReleaseItem::entry)
    }

    /// Error entries only.
    pub fn errors(&self) -> impl Iterator<Item = &ErrorEntry> {
        self.statistics.iter().filter_map(ReleaseItem::error)
    }
}
