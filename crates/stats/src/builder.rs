//! Turning a list of raw requests into validated specs or error entries.

use serde_json::Value;

use dpcreator_core::{
    number_value, value_to_i64, DatasetInfo, DpConfig, StatisticKind, StatisticRequest,
    VariableInfo, VariableType,
};

use crate::props::StatSpecRequest;
use crate::release::ErrorEntry;
use crate::spec::StatSpec;

/// Outcome of building one request.
#[derive(Clone, Debug, PartialEq)]
pub enum BuiltItem {
    /// A validated spec.
    Spec(Box<StatSpec>),
    /// A request that failed, with its reason.
    Error(ErrorEntry),
}

impl BuiltItem {
    /// The validated statistic, if validation passed.
    pub fn spec(&self) -> Option<&StatSpec> {
        match self {
            BuiltItem::Spec(s) => Some(s),
            BuiltItem::Error(_) => None,
        }
    }

    /// The error entry, if validation failed.
    pub fn error(&self) -> Option<&ErrorEntry> {
        match self {
            BuiltItem::Spec(_) => None,
            BuiltItem::Error(e) => Some(e),
        }
    }
}

/// Where size-dependent specs get their dataset size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SizeSource {
    Public,
    Private,
    Unused,
}

/// Builds specs for one dataset.
#[derive(Clone, Debug)]
pub struct StatSpecBuilder<'a> {
    dataset: &'a DatasetInfo,
    config: &'a DpConfig,
}

impl<'a> StatSpecBuilder<'a> {
    /// Builder over a dataset's metadata.
    pub fn new(dataset: &'a DatasetInfo, config: &'a DpConfig) -> Self {
        Self { dataset, config }
    }

    /// Whether any request needs the dataset size.
    pub fn dataset_size_required(requests: &[StatisticRequest]) -> bool {
        requests
            .iter()
            .filter_map(StatisticRequest::statistic_kind)
            .any(|k| k.is_supported() && k.requires_dataset_size())
    }

    /// Whether the dataset size must come from a DP count.
    pub fn use_private_count(&self, requests: &[StatisticRequest]) -> bool {
        Self::dataset_size_required(requests) && !self.dataset.size_is_public
    }

    /// Prepend a DP count when the size is private and no count was requested.
    ///
    /// The count reuses the variable and missing value policy of the first
    /// size-dependent request.
    pub fn prepare_requests(&self, requests: &[StatisticRequest]) -> Vec<StatisticRequest> {
        let mut prepared = requests.to_vec();
        if !self.use_private_count(requests) {
            return prepared;
        }
        let has_count = requests
            .iter()
            .any(|r| r.statistic_kind() == Some(StatisticKind::Count));
        if has_count {
            return prepared;
        }
        let first_sized = requests.iter().find(|r| {
            r.statistic_kind()
                .is_some_and(|k| k.is_supported() && k.requires_dataset_size())
        });
        if let Some(source) = first_sized {
            let mut count = StatisticRequest::new(
                StatisticKind::Count,
                source.variable.clone(),
                self.config.auto_count_epsilon,
            );
            count.cl = source.cl.clone();
            count.missing_values_handling = source.missing_values_handling.clone();
            count.fixed_value = source.fixed_value.clone();
            count.auto_generated = true;
            tracing::info!(
                variable = %count.variable,
                epsilon = self.config.auto_count_epsilon,
                "added a DP count for the private dataset size"
            );
            prepared.insert(0, count);
        }
        prepared
    }

    /// Validate every request, keeping going past failures.
    ///
    /// A private dataset size is never attached: size-dependent specs are
    /// left pending until the plan's DP count is released.
    pub fn build(&self, requests: &[StatisticRequest]) -> Vec<BuiltItem> {
        let size = if self.use_private_count(requests) {
            SizeSource::Private
        } else if Self::dataset_size_required(requests) {
            SizeSource::Public
        } else {
            SizeSource::Unused
        };
        self.prepare_requests(requests)
            .into_iter()
            .map(|request| match self.build_one(request.clone(), size) {
                Ok(spec) => BuiltItem::Spec(Box::new(spec)),
                Err(message) => {
                    tracing::debug!(
                        statistic = %request.statistic,
                        variable = %request.variable,
                        "statistic rejected: {message}"
                    );
                    BuiltItem::Error(ErrorEntry::new(
                        request.variable,
                        request.statistic,
                        message,
                    ))
                }
            })
            .collect()
    }

    fn build_one(
        &self,
        request: StatisticRequest,
        size: SizeSource,
    ) -> Result<StatSpec, String> {
        let variable = request.variable.trim();
        let info = self
            .dataset
            .variables
            .get(variable)
            .ok_or_else(|| format!("Variable \"{variable}\" was not found in the dataset."))?;
        let col_index = self.dataset.column_index(variable).ok_or_else(|| {
            format!("Variable \"{variable}\" is not a column of the data file.")
        })?;
        let info = match request.statistic_kind() {
            Some(StatisticKind::Histogram) => integer_like_categorical(info),
            _ => None,
        }
        .unwrap_or_else(|| info.clone());

        let sized = request
            .statistic_kind()
            .is_some_and(|k| k.requires_dataset_size());
        let mut spec_request = StatSpecRequest::new(request, info, col_index);
        match (size, self.dataset.row_count) {
            (SizeSource::Private, _) if sized => {
                spec_request = spec_request.with_pending_dataset_size();
            }
            (SizeSource::Public, Some(n)) => {
                spec_request = spec_request.with_dataset_size(n);
            }
            _ => {}
        }
        StatSpec::new(&spec_request, self.config).map_err(|e| e.to_string())
    }
}

/// A categorical variable whose labels are all integers, viewed as an
/// integer variable bounded by its smallest and largest label.
fn integer_like_categorical(info: &VariableInfo) -> Option<VariableInfo> {
    if info.variable_type != VariableType::Categorical || info.categories.is_empty() {
        return None;
    }
    let values: Vec<i64> = info
        .category_labels()
        .iter()
        .map(|c| value_to_i64(&Value::String(c.clone())))
        .collect::<Option<_>>()?;
    let min = *values.iter().min()?;
    let max = *values.iter().max()?;
    Some(VariableInfo {
        variable_type: VariableType::Integer,
        min: number_value(min as f64),
        max: number_value(max as f64),
        categories: Vec::new(),
        ..info.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpcreator_core::MissingValuesHandling;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn dataset(size_is_public: bool) -> DatasetInfo {
        let mut variables = BTreeMap::new();
        variables.insert(
            "age".to_string(),
            VariableInfo::numeric("age", VariableType::Integer, 18.0, 80.0),
        );
        variables.insert(
            "grade".to_string(),
            VariableInfo::categorical("grade", ["1", "2", "5"]),
        );
        DatasetInfo {
            name: "survey".into(),
            column_names: vec!["id".into(), "age".into(), "grade".into()],
            variables,
            row_count: Some(1000),
            size_is_public,
        }
    }

    fn mean_age() -> StatisticRequest {
        StatisticRequest::new(StatisticKind::Mean, "age", 0.5)
            .with_missing_values(MissingValuesHandling::InsertFixed, json!(30))
    }

    #[test]
    fn private_size_prepends_auto_count() {
        let ds = dataset(false);
        let cfg = DpConfig::default();
        let builder = StatSpecBuilder::new(&ds, &cfg);
        let prepared = builder.prepare_requests(&[mean_age()]);
        assert_eq!(prepared.len(), 2);
        assert_eq!(prepared[0].statistic, "count");
        assert!(prepared[0].auto_generated);
        assert_eq!(prepared[0].epsilon_f64(), Some(0.05));
        assert_eq!(prepared[0].missing_values_handling, "insert_fixed");
    }

    #[test]
    fn public_size_or_explicit_count_needs_no_auto_count() {
        let cfg = DpConfig::default();
        let public = dataset(true);
        assert_eq!(
            StatSpecBuilder::new(&public, &cfg)
                .prepare_requests(&[mean_age()])
                .len(),
            1
        );
        let private = dataset(false);
        let count = StatisticRequest::new(StatisticKind::Count, "age", 0.1);
        assert_eq!(
            StatSpecBuilder::new(&private, &cfg)
                .prepare_requests(&[count, mean_age()])
                .len(),
            2
        );
    }

    #[test]
    fn failures_become_error_entries_and_processing_continues() {
        let ds = dataset(true);
        let cfg = DpConfig::default();
        let requests = vec![
            StatisticRequest::new(StatisticKind::Mean, "salary", 0.5),
            mean_age(),
        ];
        let built = StatSpecBuilder::new(&ds, &cfg).build(&requests);
        assert_eq!(built.len(), 2);
        let err = built[0].error().expect("error entry");
        assert!(!err.valid);
        assert!(err.message.contains("salary"));
        assert_eq!(built[1].spec().map(|s| s.props().col_index), Some(1));
        assert_eq!(built[1].spec().and_then(|s| s.props().dataset_size), Some(1000));
    }

    #[test]
    fn private_row_count_is_never_attached() {
        let ds = dataset(false);
        let cfg = DpConfig::default();
        let built = StatSpecBuilder::new(&ds, &cfg).build(&[mean_age()]);
        assert_eq!(built.len(), 2);
        let mean = built[1].spec().expect("mean spec");
        assert_eq!(mean.props().dataset_size, None);
        assert!(mean.props().dataset_size_pending);
        assert!(mean.awaits_dataset_size());
        assert!(!built[0].spec().expect("count spec").awaits_dataset_size());
    }

    #[test]
    fn quantile_alone_adds_no_auto_count() {
        let ds = dataset(false);
        let cfg = DpConfig::default();
        let builder = StatSpecBuilder::new(&ds, &cfg);
        let quantile = StatisticRequest::new(StatisticKind::Quantile, "age", 0.5);
        assert!(!StatSpecBuilder::dataset_size_required(&[quantile.clone()]));
        let built = builder.build(&[quantile]);
        assert_eq!(built.len(), 1);
        assert!(built[0].error().is_some());
    }

    #[test]
    fn integer_like_categories_become_integer_histograms() {
        let ds = dataset(true);
        let cfg = DpConfig::default();
        let hist = StatisticRequest::new(StatisticKind::Histogram, "grade", 0.5)
            .with_missing_values(MissingValuesHandling::Drop, Value::Null);
        let built = StatSpecBuilder::new(&ds, &cfg).build(&[hist]);
        let spec = built[0].spec().expect("spec");
        assert_eq!(spec.props().variable_type, VariableType::Integer);
        assert_eq!(spec.props().bounds(), Some((1.0, 5.0)));
    }
}
