//! Differentially private statistic specs.
//!
//! A raw [`StatisticRequest`](dpcreator_core::StatisticRequest) becomes a
//! [`StatSpec`] after transform, basic and custom validation. A spec builds
//! a calibrated noise chain ([`ChainedSpec`]) without touching data, then
//! runs it over one column to produce a [`ComputedSpec`] and its
//! [`ReleaseEntry`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builder;
pub mod count;
pub mod data;
pub mod histogram;
pub mod mean;
mod numeric;
pub mod props;
pub mod release;
pub mod spec;
pub mod sum;
pub mod variance;
pub mod variant;

pub use builder::{BuiltItem, StatSpecBuilder};
pub use count::DpCountSpec;
pub use data::{read_column, split_fields, DataLayout};
pub use histogram::{
    BucketTable, DpHistogramBinEdgesSpec, DpHistogramBooleanSpec, DpHistogramCategoricalSpec,
    DpHistogramEqualRangesSpec, DpHistogramIntegerSpec, UNCATEGORIZED,
};
pub use mean::DpMeanSpec;
pub use props::{RawProps, SpecProps, StatSpecRequest};
pub use release::{ErrorEntry, HistogramValue, ReleaseEntry, StatValue};
pub use spec::{ChainedSpec, ComputedSpec, StatSpec};
pub use sum::DpSumSpec;
pub use variance::DpVarianceSpec;
pub use variant::{Chain, PropertyValidator, StatSpecVariant, StatVariant};

/// Common imports for building and running statistic specs.
pub mod prelude {
    pub use crate::{
        BuiltItem, ChainedSpec, ComputedSpec, DataLayout, ErrorEntry, ReleaseEntry, StatSpec,
        StatSpecBuilder, StatSpecRequest, StatSpecVariant, StatValue,
    };
}
