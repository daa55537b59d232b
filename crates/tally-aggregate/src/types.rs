#![forbid(unsafe_code)]

use crate::hll::HyperLogLog;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Declared type of an intermediate or final result column.
///
/// The serialization layer picks its wire encoding from this tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnDataType {
    Int,
    Long,
    Float,
    Double,
    String,
    Object,
}

impl fmt::Display for ColumnDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnDataType::Int => "INT",
            ColumnDataType::Long => "LONG",
            ColumnDataType::Float => "FLOAT",
            ColumnDataType::Double => "DOUBLE",
            ColumnDataType::String => "STRING",
            ColumnDataType::Object => "OBJECT",
        };
        f.write_str(name)
    }
}

/// Running sum and count behind AVG.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AvgPair {
    pub sum: f64,
    pub count: u64,
}

impl AvgPair {
    pub fn new(sum: f64, count: u64) -> Self {
        Self { sum, count }
    }

    pub fn apply(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    pub fn merge(&mut self, other: &AvgPair) {
        self.sum += other.sum;
        self.count += other.count;
    }

    pub fn average(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Running extremes behind MINMAXRANGE.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MinMaxRangePair {
    pub min: f64,
    pub max: f64,
}

impl Default for MinMaxRangePair {
    fn default() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl MinMaxRangePair {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn apply(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn merge(&mut self, other: &MinMaxRangePair) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// `max - min`; `-inf` when nothing was applied.
    pub fn range(&self) -> f64 {
        self.max - self.min
    }
}

/// A value counted by exact DISTINCTCOUNT.
///
/// Numbers are compared by value (`-0.0 == 0.0`), strings by content.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DistinctKey {
    Number(OrderedFloat<f64>),
    Text(Arc<str>),
}

/// Mutable, function-specific partial aggregation state.
#[derive(Clone, Debug, PartialEq)]
pub enum IntermediateResult {
    Long(i64),
    Double(f64),
    Avg(AvgPair),
    MinMaxRange(MinMaxRangePair),
    DistinctSet(HashSet<DistinctKey>),
    Hll(HyperLogLog),
    DoubleList(Vec<f64>),
}

impl IntermediateResult {
    pub fn kind_name(&self) -> &'static str {
        match self {
            IntermediateResult::Long(_) => "LONG",
            IntermediateResult::Double(_) => "DOUBLE",
            IntermediateResult::Avg(_) => "AVG_PAIR",
            IntermediateResult::MinMaxRange(_) => "MIN_MAX_RANGE_PAIR",
            IntermediateResult::DistinctSet(_) => "DISTINCT_SET",
            IntermediateResult::Hll(_) => "HYPER_LOG_LOG",
            IntermediateResult::DoubleList(_) => "DOUBLE_LIST",
        }
    }

    /// Ordering between two comparable intermediate results of the same kind.
    ///
    /// Returns `None` for kinds without an order (sets, sketches, lists) and for mixed kinds.
    pub fn compare(&self, other: &IntermediateResult) -> Option<Ordering> {
        match (self, other) {
            (IntermediateResult::Long(a), IntermediateResult::Long(b)) => Some(a.cmp(b)),
            (IntermediateResult::Double(a), IntermediateResult::Double(b)) => {
                Some(a.total_cmp(b))
            }
            (IntermediateResult::Avg(a), IntermediateResult::Avg(b)) => {
                let a = a.average().unwrap_or(f64::NEG_INFINITY);
                let b = b.average().unwrap_or(f64::NEG_INFINITY);
                Some(a.total_cmp(&b))
            }
            (IntermediateResult::MinMaxRange(a), IntermediateResult::MinMaxRange(b)) => {
                Some(a.range().total_cmp(&b.range()))
            }
            _ => None,
        }
    }
}

/// Externally visible value produced once per query or per group.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FinalResult {
    Long(i64),
    Double(f64),
}

impl FinalResult {
    pub fn as_f64(&self) -> f64 {
        match self {
            FinalResult::Long(v) => *v as f64,
            FinalResult::Double(v) => *v,
        }
    }

    pub fn column_data_type(&self) -> ColumnDataType {
        match self {
            FinalResult::Long(_) => ColumnDataType::Long,
            FinalResult::Double(_) => ColumnDataType::Double,
        }
    }
}

impl fmt::Display for FinalResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalResult::Long(v) => write!(f, "{v}"),
            FinalResult::Double(v) => write!(f, "{v}"),
        }
    }
}
