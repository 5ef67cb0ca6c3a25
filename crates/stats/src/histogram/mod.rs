//! DP histograms.
//!
//! Every histogram releases one noisy count per bucket plus a trailing
//! "uncategorized" bucket for values outside the declared layout. Adding or
//! removing one record changes exactly one bucket, so the sensitivity is 1
//! and the geometric mechanism is used throughout.

mod boolean;
mod categorical;
mod integer;

use rand::{Rng, RngCore};

use dpcreator_core::validators::strip_quotes;
use dpcreator_core::{value_to_i64, GeometricMechanism, MissingValuesHandling, Result};

use crate::data::parse_integers;
use crate::props::SpecProps;
use crate::release::{HistogramValue, StatValue};
use crate::variant::Chain;

pub use boolean::DpHistogramBooleanSpec;
pub use categorical::DpHistogramCategoricalSpec;
pub use integer::{DpHistogramBinEdgesSpec, DpHistogramEqualRangesSpec, DpHistogramIntegerSpec};

/// Label of the catch-all bucket.
pub const UNCATEGORIZED: &str = "uncategorized";

/// Largest integer range a one-bucket-per-value histogram may span.
pub const MAX_ONE_PER_VALUE_BUCKETS: i64 = 1_000;

/// Bucket labels and, for integer layouts, the half-open bucket edges.
///
/// Bucket `i` of an integer table covers `[edges[i], edges[i + 1])`. The
/// last label is always [`UNCATEGORIZED`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BucketTable {
    labels: Vec<String>,
    edges: Vec<i64>,
}

impl BucketTable {
    /// Label buckets, plus the catch-all.
    pub fn from_labels(labels: Vec<String>) -> Self {
        let mut labels: Vec<String> = labels
            .into_iter()
            .filter(|l| l != UNCATEGORIZED)
            .collect();
        labels.push(UNCATEGORIZED.to_string());
        Self {
            labels,
            edges: Vec::new(),
        }
    }

    /// One bucket per integer in `[min, max]`.
    pub fn one_per_value(min: i64, max: i64) -> Self {
        let edges: Vec<i64> = (min..=max.saturating_add(1)).collect();
        let mut labels: Vec<String> = (min..=max).map(|v| v.to_string()).collect();
        labels.push(UNCATEGORIZED.to_string());
        Self { labels, edges }
    }

    /// `bins` ranges of (nearly) equal width covering `[min, max]`.
    pub fn equal_ranges(min: i64, max: i64, bins: i64) -> Self {
        let span = i128::from(max) - i128::from(min) + 1;
        let bins_wide = i128::from(bins.max(1));
        let edges = (0..=bins_wide)
            .map(|i| (i128::from(min) + i * span / bins_wide) as i64)
            .collect();
        Self::ranges(edges)
    }

    /// Buckets between caller-supplied edges; the last edge is an inclusive
    /// upper bound.
    pub fn bin_edges(supplied: &[i64]) -> Self {
        let mut edges = supplied.to_vec();
        if let Some(last) = edges.last_mut() {
            *last = last.saturating_add(1);
        }
        Self::ranges(edges)
    }

    fn ranges(edges: Vec<i64>) -> Self {
        let mut labels: Vec<String> = edges
            .windows(2)
            .map(|w| format!("[{},{}]", w[0], w[1] - 1))
            .collect();
        labels.push(UNCATEGORIZED.to_string());
        Self { labels, edges }
    }

    /// Bucket labels, ending with [`UNCATEGORIZED`].
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Bucket edges; empty for label tables.
    pub fn edges(&self) -> &[i64] {
        &self.edges
    }

    /// Number of buckets including the catch-all.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the table has not been laid out yet.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Index of the catch-all bucket.
    pub fn uncategorized(&self) -> usize {
        self.labels.len().saturating_sub(1)
    }

    /// Labels of the real buckets.
    pub fn categories(&self) -> &[String] {
        &self.labels[..self.uncategorized()]
    }

    /// Bucket of a label, ignoring surrounding quotes.
    pub fn index_of_label(&self, label: &str) -> usize {
        let label = strip_quotes(label.trim());
        self.categories()
            .iter()
            .position(|c| strip_quotes(c) == label)
            .unwrap_or_else(|| self.uncategorized())
    }

    /// Bucket of an integer value.
    pub fn index_of_integer(&self, value: i64) -> usize {
        match (self.edges.first(), self.edges.last()) {
            (Some(&lo), Some(&hi)) if value >= lo && value < hi => {
                self.edges.partition_point(|&e| e <= value) - 1
            }
            _ => self.uncategorized(),
        }
    }
}

/// Bucket counts for label data (boolean and categorical variables).
pub(crate) fn count_labels(
    table: &BucketTable,
    props: &SpecProps,
    cells: &[Option<String>],
    rng: &mut dyn RngCore,
) -> Vec<i64> {
    let mut counts = vec![0i64; table.len()];
    let categories = table.categories();
    for cell in cells {
        let bucket = match (cell, props.missing_values_handling) {
            (Some(label), _) => Some(table.index_of_label(label)),
            (None, MissingValuesHandling::InsertFixed) => props
                .fixed_label()
                .map(|label| table.index_of_label(&label)),
            (None, MissingValuesHandling::InsertRandom) if !categories.is_empty() => {
                Some(rng.gen_range(0..categories.len()))
            }
            (None, _) => None,
        };
        if let Some(i) = bucket {
            counts[i] += 1;
        }
    }
    counts
}

/// Bucket counts for integer data.
pub(crate) fn count_integers(
    table: &BucketTable,
    props: &SpecProps,
    cells: &[Option<String>],
    rng: &mut dyn RngCore,
) -> Vec<i64> {
    let mut counts = vec![0i64; table.len()];
    let bounds = props
        .bounds()
        .map(|(min, max)| (min.ceil() as i64, max.floor() as i64));
    for value in parse_integers(cells) {
        let value = match (value, props.missing_values_handling) {
            (Some(v), _) => Some(v),
            (None, MissingValuesHandling::InsertFixed) => value_to_i64(&props.fixed_value),
            (None, MissingValuesHandling::InsertRandom) => match bounds {
                Some((lo, hi)) if lo <= hi => Some(rng.gen_range(lo..=hi)),
                _ => None,
            },
            (None, _) => None,
        };
        if let Some(v) = value {
            counts[table.index_of_integer(v)] += 1;
        }
    }
    counts
}

/// Add geometric noise to every bucket and clamp at zero.
pub(crate) fn release_counts(
    table: &BucketTable,
    chain: &Chain,
    counts: &[i64],
    rng: &mut dyn RngCore,
) -> Result<StatValue> {
    let noisy = GeometricMechanism::new(chain.scale)?
        .apply_vec(counts, rng)?
        .into_iter()
        .map(|c| c.max(0))
        .collect();
    Ok(StatValue::Histogram(HistogramValue::new(
        table.labels().to_vec(),
        noisy,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn bin_edges_treat_last_edge_as_inclusive() {
        let table = BucketTable::bin_edges(&[18, 25, 35, 45, 55, 65, 75]);
        assert_eq!(table.edges(), &[18, 25, 35, 45, 55, 65, 76]);
        assert_eq!(
            table.labels(),
            &[
                "[18,24]",
                "[25,34]",
                "[35,44]",
                "[45,54]",
                "[55,64]",
                "[65,75]",
                UNCATEGORIZED
            ]
        );
        assert_eq!(table.index_of_integer(75), 5);
        assert_eq!(table.index_of_integer(76), 6);
        assert_eq!(table.index_of_integer(17), 6);
        assert_eq!(table.index_of_integer(25), 1);
    }

    #[test]
    fn one_per_value_layout() {
        let table = BucketTable::one_per_value(1, 3);
        assert_eq!(table.labels(), &["1", "2", "3", UNCATEGORIZED]);
        assert_eq!(table.edges(), &[1, 2, 3, 4]);
        assert_eq!(table.index_of_integer(3), 2);
        assert_eq!(table.index_of_integer(4), 3);
    }

    #[test]
    fn label_lookup_ignores_quotes() {
        let table = BucketTable::from_labels(vec!["a".into(), "b".into()]);
        assert_eq!(table.index_of_label("\"b\""), 1);
        assert_eq!(table.index_of_label("zzz"), 2);
        assert_eq!(table.categories(), &["a", "b"]);
    }

    #[test]
    fn equal_ranges_cover_the_bounds() {
        let table = BucketTable::equal_ranges(0, 9, 3);
        assert_eq!(table.edges(), &[0, 3, 6, 10]);
        assert_eq!(table.labels(), &["[0,2]", "[3,5]", "[6,9]", UNCATEGORIZED]);
    }

    proptest! {
        #[test]
        fn equal_ranges_partition_every_value(
            min in -1_000i64..1_000,
            width in 1i64..500,
            bins_seed in 1i64..500,
        ) {
            let max = min + width;
            let bins = 1 + bins_seed % width;
            let table = BucketTable::equal_ranges(min, max, bins);
            let edges = table.edges();
            prop_assert_eq!(edges.len() as i64, bins + 1);
            prop_assert_eq!(edges[0], min);
            prop_assert_eq!(*edges.last().unwrap(), max + 1);
            prop_assert!(edges.windows(2).all(|w| w[0] < w[1]));
            for v in [min, max, min + width / 2] {
                prop_assert!(table.index_of_integer(v) < table.uncategorized());
            }
            prop_assert_eq!(table.index_of_integer(max + 1), table.uncategorized());
        }
    }
}
