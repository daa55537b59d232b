//! Aggregation execution core over column blocks.
//!
//! This crate focuses on:
//! - A closed family of aggregation functions behind one capability trait, created by name or
//!   type through [`AggregationFunctionFactory`].
//! - Caller-owned accumulator storage: one slot for ungrouped queries, a growable arena indexed
//!   by dense group key for grouped ones.
//! - Mergeable partial results, so blocks, segments and shards can be reduced in any order and
//!   finalized once.

#![forbid(unsafe_code)]

mod config;
mod error;
mod executor;
mod function;
mod hll;
mod holder;
pub mod reduce;
mod star_tree;
mod types;

pub use crate::config::GroupByOptions;
pub use crate::error::{AggResult, AggregationError};
pub use crate::executor::{AggregationExecutor, GroupByExecutor};
pub use crate::function::{
    AggregationFunction, AggregationFunctionFactory, AggregationFunctionRef,
    AggregationFunctionType,
};
pub use crate::function::{
    AvgAggregationFunction, CountAggregationFunction, DistinctCountAggregationFunction,
    DistinctCountHllAggregationFunction, MaxAggregationFunction, MinAggregationFunction,
    MinMaxRangeAggregationFunction, PercentileAggregationFunction, SumAggregationFunction,
};
pub use crate::hll::{HyperLogLog, DEFAULT_LOG2M, MAX_LOG2M, MIN_LOG2M};
pub use crate::holder::{AggregationResultHolder, GroupByResultHolder};
pub use crate::star_tree::{
    AggregationFunctionColumnPair, StarTreeIndexConfig, DEFAULT_MAX_LEAF_RECORDS,
};
pub use crate::types::{
    AvgPair, ColumnDataType, DistinctKey, FinalResult, IntermediateResult, MinMaxRangePair,
};

pub use tally_columnar::{Block, BlockBuilder, BlockError};
