//! Column block source for the tally aggregation core.
//!
//! A [`Block`] is an immutable batch of row-aligned column values handed to aggregation
//! functions by the storage layer. This crate focuses on:
//! - Typed, zero-copy access to single-value (SV) and multi-value (MV) columns.
//! - Static per-column metadata (sortedness, dictionary presence, multi-value bound).
//! - Strict type checks: asking for the wrong type or arity is an error, never a silent cast.
//!
//! The only conversion offered is the widening numeric read used by numeric aggregations
//! ([`BlockValSet::to_double_values_sv`] / [`BlockValSet::to_double_values_mv`]).

#![forbid(unsafe_code)]

#[cfg(feature = "arrow")]
pub mod arrow;
mod block;
mod error;
mod metadata;
mod types;

pub use crate::block::{Block, BlockBuilder, BlockValSet, MultiValues};
pub use crate::error::{BlockError, BlockResult};
pub use crate::metadata::BlockMetadata;
pub use crate::types::{ColumnValues, DataType};
