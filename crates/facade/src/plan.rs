//! Analysis plans: validation against the budget and release execution.

use std::io::{Cursor, Read};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use dpcreator_accounting::{total_spent, BudgetExceeded, BudgetItem, PrivacyBudget};
use dpcreator_core::{DatasetInfo, DpConfig, DpError, StatisticKind, StatisticRequest};
use dpcreator_stats::release::AccuracyEntry;
use dpcreator_stats::{
    BuiltItem, ChainedSpec, DataLayout, ErrorEntry, ReleaseEntry, StatSpec, StatSpecBuilder,
};

use crate::release::{Release, ReleaseItem};

/// Failures that stop a plan as a whole.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// The plan spends more than the dataset budget allows.
    #[error(transparent)]
    BudgetExceeded(#[from] BudgetExceeded),
    /// Invalid configuration, budget figures or data file.
    #[error(transparent)]
    Dp(#[from] DpError),
    /// Malformed plan JSON.
    #[error("invalid analysis plan: {0}")]
    Json(#[from] serde_json::Error),
}

/// A dataset, the statistics requested on it, and its budget.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPlan {
    /// Dataset metadata.
    pub dataset: DatasetInfo,
    /// Requested statistics, in order.
    pub statistics: Vec<StatisticRequest>,
    /// Dataset budget.
    pub budget: PrivacyBudget,
}

/// A statistic that passed validation, with its accuracy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidStatistic {
    /// Variable name.
    pub variable: String,
    /// Statistic name.
    pub statistic: String,
    /// Always true.
    pub valid: bool,
    /// Epsilon requested.
    pub epsilon: f64,
    /// Delta requested.
    pub delta: f64,
    /// Accuracy at the requested confidence level. Absent while a private
    /// dataset size waits for its DP count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<AccuracyEntry>,
    /// Set when the statistic was added automatically.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub auto_generated: bool,
}

/// Validation outcome of one statistic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatisticOutcome {
    /// Valid, with accuracy.
    Valid(ValidStatistic),
    /// Rejected, with the reason.
    Invalid(ErrorEntry),
}

impl StatisticOutcome {
    /// Whether the statistic passed.
    pub fn is_valid(&self) -> bool {
        matches!(self, StatisticOutcome::Valid(_))
    }
}

/// Validation outcome of a plan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanValidation {
    /// Per-statistic outcomes, in plan order.
    pub statistics: Vec<StatisticOutcome>,
    /// Epsilon requested by the valid statistics.
    pub epsilon_total: f64,
    /// Delta requested by the valid statistics.
    pub delta_total: f64,
    /// Budget violation, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_error: Option<String>,
}

impl PlanValidation {
    /// Whether every statistic passed and the plan fits the budget.
    pub fn is_valid(&self) -> bool {
        self.budget_error.is_none() && self.statistics.iter().all(StatisticOutcome::is_valid)
    }
}

/// One statistic after building and chaining.
#[derive(Clone, Debug)]
enum Prepared {
    Chained(ChainedSpec),
    /// Valid, but the chain needs the DP-estimated dataset size.
    AwaitingSize(StatSpec),
    Rejected(ErrorEntry),
}

impl Prepared {
    fn spec(&self) -> Option<&StatSpec> {
        match self {
            Prepared::Chained(c) => Some(c.spec()),
            Prepared::AwaitingSize(s) => Some(s),
            Prepared::Rejected(_) => None,
        }
    }
}

impl AnalysisPlan {
    /// Parse a plan from JSON.
    pub fn from_json(json: &str) -> Result<Self, PlanError> {
        let plan: Self = serde_json::from_str(json)?;
        plan.budget.validate()?;
        Ok(plan)
    }

    /// Build and chain every statistic, then check the budget in order.
    ///
    /// The first statistic that pushes the running total over the ceiling
    /// is rejected and budget checking stops there.
    fn prepare(&self, config: &DpConfig) -> (Vec<Prepared>, Option<BudgetExceeded>) {
        let builder = StatSpecBuilder::new(&self.dataset, config);
        let mut prepared: Vec<Prepared> = builder
            .build(&self.statistics)
            .into_iter()
            .map(|item| match item {
                BuiltItem::Spec(spec) if spec.awaits_dataset_size() => {
                    Prepared::AwaitingSize(*spec)
                }
                BuiltItem::Spec(spec) => match spec.build_chain() {
                    Ok(chained) => Prepared::Chained(chained),
                    Err(e) => Prepared::Rejected(spec_error(&spec, e.to_string())),
                },
                BuiltItem::Error(e) => Prepared::Rejected(e),
            })
            .collect();

        let (positions, items): (Vec<usize>, Vec<BudgetItem>) = prepared
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.spec().map(|s| (i, s.budget_item())))
            .unzip();
        let exceeded = self.budget.check(&items).err();
        if let Some(e) = &exceeded {
            let position = positions[e.index];
            prepared[position] = Prepared::Rejected(ErrorEntry::new(
                e.variable.clone(),
                e.statistic.clone(),
                e.to_string(),
            ));
        }
        (prepared, exceeded)
    }

    /// Validate every statistic and the budget without touching data.
    ///
    /// A private `row_count` never reaches the output: statistics that
    /// depend on the dataset size report no accuracy until a release
    /// estimates the size with a DP count.
    pub fn validate(&self, config: &DpConfig) -> PlanValidation {
        let (prepared, exceeded) = self.prepare(config);
        let items: Vec<BudgetItem> = prepared
            .iter()
            .filter_map(|p| p.spec().map(StatSpec::budget_item))
            .collect();
        let (epsilon_total, delta_total) = total_spent(&items);

        let statistics = prepared
            .into_iter()
            .map(|p| match p {
                Prepared::Chained(chained) => {
                    let accuracy = AccuracyEntry {
                        value: chained.accuracy(),
                        message: chained.accuracy_message(),
                    };
                    StatisticOutcome::Valid(valid_statistic(chained.spec(), Some(accuracy)))
                }
                Prepared::AwaitingSize(spec) => {
                    StatisticOutcome::Valid(valid_statistic(&spec, None))
                }
                Prepared::Rejected(e) => StatisticOutcome::Invalid(e),
            })
            .collect::<Vec<_>>();

        let valid = statistics.iter().filter(|s| s.is_valid()).count();
        tracing::info!(
            dataset = %self.dataset.name,
            valid,
            rejected = statistics.len() - valid,
            epsilon_total,
            "analysis plan validated"
        );
        PlanValidation {
            statistics,
            epsilon_total,
            delta_total,
            budget_error: exceeded.map(|e| e.to_string()),
        }
    }

    /// Run every valid statistic over the data with an OS-seeded RNG.
    pub fn run_release<R: Read>(
        &self,
        config: &DpConfig,
        data: R,
        separator: char,
    ) -> Result<Release, PlanError> {
        let mut rng = ChaCha20Rng::from_entropy();
        self.run_release_with_rng(config, data, separator, &mut rng)
    }

    /// Run every valid statistic over the data with the given RNG.
    ///
    /// Counts run first. When the dataset size is private, the first
    /// released count supplies the size of every size-dependent statistic,
    /// whose chain is built only then. Entries keep plan order.
    pub fn run_release_with_rng<R: Read, G: RngCore>(
        &self,
        config: &DpConfig,
        mut data: R,
        separator: char,
        rng: &mut G,
    ) -> Result<Release, PlanError> {
        let (prepared, exceeded) = self.prepare(config);
        if let Some(e) = exceeded {
            return Err(e.into());
        }

        let mut text = String::new();
        data.read_to_string(&mut text)
            .map_err(|e| DpError::data(format!("Failed to read the data file: {e}")))?;
        let layout = DataLayout::new(separator, self.dataset.column_names.clone());

        let mut results: Vec<Option<ReleaseItem>> = vec![None; prepared.len()];
        let mut private_size: Option<u64> = None;

        let is_count = |p: &Prepared| {
            matches!(p, Prepared::Chained(c) if c.props().statistic == StatisticKind::Count)
        };
        let use_private_count = prepared
            .iter()
            .any(|p| matches!(p, Prepared::AwaitingSize(_)));
        let order = (0..prepared.len())
            .filter(|&i| is_count(&prepared[i]))
            .chain((0..prepared.len()).filter(|&i| !is_count(&prepared[i])));

        for i in order {
            let run = match &prepared[i] {
                Prepared::Rejected(e) => Err(e.clone()),
                Prepared::AwaitingSize(spec) => match private_size {
                    Some(n) => {
                        sized_chain(spec, n).and_then(|c| run_one(&c, &text, &layout, rng))
                    }
                    None => Err(spec_error(
                        spec,
                        "The dataset size could not be estimated because no DP count was \
                         released.",
                    )),
                },
                Prepared::Chained(chained) => {
                    let run = run_one(chained, &text, &layout, rng);
                    let first_count = use_private_count
                        && private_size.is_none()
                        && chained.props().statistic == StatisticKind::Count;
                    if first_count {
                        if let Some(n) = run.as_ref().ok().and_then(|e| e.result.value.as_f64()) {
                            let n = n.max(1.0) as u64;
                            tracing::info!(dataset_size = n, "using DP count as the dataset size");
                            private_size = Some(n);
                        }
                    }
                    run
                }
            };
            results[i] = Some(match run {
                Ok(entry) => ReleaseItem::Entry(Box::new(entry)),
                Err(e) => ReleaseItem::Error(e),
            });
        }

        let statistics: Vec<ReleaseItem> = results.into_iter().flatten().collect();
        let spent: Vec<BudgetItem> = statistics
            .iter()
            .filter_map(ReleaseItem::entry)
            .map(|e| BudgetItem {
                statistic: e.statistic.clone(),
                variable: e.variable.clone(),
                epsilon: e.epsilon,
                delta: e.delta,
            })
            .collect();
        let (epsilon_used, delta_used) = total_spent(&spent);
        let mut budget = self.budget;
        budget.commit(epsilon_used, delta_used)?;

        tracing::info!(
            dataset = %self.dataset.name,
            released = spent.len(),
            epsilon_used,
            "release complete"
        );
        Ok(Release {
            dataset: self.dataset.name.clone(),
            statistics,
            epsilon_used,
            delta_used,
            budget,
        })
    }
}

fn valid_statistic(spec: &StatSpec, accuracy: Option<AccuracyEntry>) -> ValidStatistic {
    let props = spec.props();
    ValidStatistic {
        variable: props.variable.clone(),
        statistic: props.statistic.to_string(),
        valid: true,
        epsilon: props.epsilon,
        delta: props.delta,
        accuracy,
        auto_generated: props.auto_generated,
    }
}

fn spec_error(spec: &StatSpec, message: impl Into<String>) -> ErrorEntry {
    let p = spec.props();
    ErrorEntry::new(p.variable.clone(), p.statistic.to_string(), message)
}

fn sized_chain(spec: &StatSpec, n: u64) -> Result<ChainedSpec, ErrorEntry> {
    let mut spec = spec.clone();
    spec.set_dataset_size(n)
        .and_then(|()| spec.build_chain())
        .map_err(|e| spec_error(&spec, e.to_string()))
}

fn run_one<G: RngCore>(
    chained: &ChainedSpec,
    text: &str,
    layout: &DataLayout,
    rng: &mut G,
) -> Result<ReleaseEntry, ErrorEntry> {
    chained
        .run_chain_with_rng(Cursor::new(text.as_bytes()), layout, rng)
        .map(|computed| computed.release_entry())
        .map_err(|e| {
            tracing::warn!(
                statistic = %chained.props().statistic,
                variable = %chained.props().variable,
                "statistic failed to compute: {e}"
            );
            spec_error(chained.spec(), e.to_string())
        })
}
