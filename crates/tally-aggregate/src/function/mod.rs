//! The aggregation-function contract and its registry.
//!
//! Every aggregation kind is a stateless strategy bound to its arguments at construction. The
//! caller owns the accumulator storage (result holders) and drives the calls:
//!
//! 1. `aggregate*` for every block, against an ungrouped or grouped holder,
//! 2. `extract_*_result` to read a holder's accumulator,
//! 3. `merge` to combine partial accumulators from other blocks or shards,
//! 4. `extract_final_result` exactly once per logical result.
//!
//! No state check enforces that order; it is a usage contract of the executing engine.

mod avg;
mod count;
mod distinct_count;
mod fold;
mod min_max;
mod min_max_range;
mod percentile;
mod sum;

pub use crate::function::avg::AvgAggregationFunction;
pub use crate::function::count::CountAggregationFunction;
pub use crate::function::distinct_count::{
    DistinctCountAggregationFunction, DistinctCountHllAggregationFunction,
};
pub use crate::function::min_max::{MaxAggregationFunction, MinAggregationFunction};
pub use crate::function::min_max_range::MinMaxRangeAggregationFunction;
pub use crate::function::percentile::PercentileAggregationFunction;
pub use crate::function::sum::SumAggregationFunction;

use crate::error::{AggResult, AggregationError};
use crate::holder::{AggregationResultHolder, GroupByResultHolder};
use crate::types::{ColumnDataType, FinalResult, IntermediateResult};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tally_columnar::{Block, BlockError, MultiValues};

/// Registered aggregation kinds. `*Mv` kinds read multi-value columns and fold every entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregationFunctionType {
    Count,
    Min,
    Max,
    Sum,
    Avg,
    MinMaxRange,
    DistinctCount,
    DistinctCountHll,
    Percentile,
    CountMv,
    MinMv,
    MaxMv,
    SumMv,
    AvgMv,
    MinMaxRangeMv,
    DistinctCountMv,
    DistinctCountHllMv,
    PercentileMv,
}

impl AggregationFunctionType {
    pub const ALL: [AggregationFunctionType; 18] = [
        AggregationFunctionType::Count,
        AggregationFunctionType::Min,
        AggregationFunctionType::Max,
        AggregationFunctionType::Sum,
        AggregationFunctionType::Avg,
        AggregationFunctionType::MinMaxRange,
        AggregationFunctionType::DistinctCount,
        AggregationFunctionType::DistinctCountHll,
        AggregationFunctionType::Percentile,
        AggregationFunctionType::CountMv,
        AggregationFunctionType::MinMv,
        AggregationFunctionType::MaxMv,
        AggregationFunctionType::SumMv,
        AggregationFunctionType::AvgMv,
        AggregationFunctionType::MinMaxRangeMv,
        AggregationFunctionType::DistinctCountMv,
        AggregationFunctionType::DistinctCountHllMv,
        AggregationFunctionType::PercentileMv,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AggregationFunctionType::Count => "COUNT",
            AggregationFunctionType::Min => "MIN",
            AggregationFunctionType::Max => "MAX",
            AggregationFunctionType::Sum => "SUM",
            AggregationFunctionType::Avg => "AVG",
            AggregationFunctionType::MinMaxRange => "MINMAXRANGE",
            AggregationFunctionType::DistinctCount => "DISTINCTCOUNT",
            AggregationFunctionType::DistinctCountHll => "DISTINCTCOUNTHLL",
            AggregationFunctionType::Percentile => "PERCENTILE",
            AggregationFunctionType::CountMv => "COUNTMV",
            AggregationFunctionType::MinMv => "MINMV",
            AggregationFunctionType::MaxMv => "MAXMV",
            AggregationFunctionType::SumMv => "SUMMV",
            AggregationFunctionType::AvgMv => "AVGMV",
            AggregationFunctionType::MinMaxRangeMv => "MINMAXRANGEMV",
            AggregationFunctionType::DistinctCountMv => "DISTINCTCOUNTMV",
            AggregationFunctionType::DistinctCountHllMv => "DISTINCTCOUNTHLLMV",
            AggregationFunctionType::PercentileMv => "PERCENTILEMV",
        }
    }

    pub fn is_multi_value(self) -> bool {
        matches!(
            self,
            AggregationFunctionType::CountMv
                | AggregationFunctionType::MinMv
                | AggregationFunctionType::MaxMv
                | AggregationFunctionType::SumMv
                | AggregationFunctionType::AvgMv
                | AggregationFunctionType::MinMaxRangeMv
                | AggregationFunctionType::DistinctCountMv
                | AggregationFunctionType::DistinctCountHllMv
                | AggregationFunctionType::PercentileMv
        )
    }

    /// Case-insensitive lookup by registered name.
    pub fn from_name(name: &str) -> AggResult<Self> {
        let trimmed = name.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| AggregationError::UnknownFunction(name.to_string()))
    }
}

impl fmt::Display for AggregationFunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AggregationFunctionType {
    type Err = AggregationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

/// Capability set shared by every aggregation kind.
///
/// Implementations are immutable after construction and may be shared across worker threads;
/// all mutable state lives in the holders and intermediate results the caller passes in.
pub trait AggregationFunction: fmt::Debug + Send + Sync {
    fn function_type(&self) -> AggregationFunctionType;

    /// Internal result-column identifier, e.g. `PERCENTILE95_price`.
    fn column_name(&self) -> String;

    /// User-facing name, e.g. `percentile95(price)`.
    fn result_column_name(&self) -> String;

    /// Block columns read by `aggregate*`.
    fn input_columns(&self) -> &[String];

    /// Accumulator returned by `extract_*_result` for a slot that never received a value.
    fn empty_intermediate_result(&self) -> IntermediateResult;

    /// Checks that `block` carries every input column with a usable type and arity.
    ///
    /// Executors call this for all functions before folding a block, so a bad block leaves
    /// every holder untouched.
    fn validate_block(&self, block: &Block) -> AggResult<()> {
        for column in self.input_columns() {
            block.val_set(column)?;
        }
        Ok(())
    }

    fn create_aggregation_result_holder(&self) -> AggregationResultHolder {
        AggregationResultHolder::new()
    }

    fn create_group_by_result_holder(
        &self,
        initial_capacity: usize,
        max_capacity: usize,
    ) -> AggResult<GroupByResultHolder> {
        GroupByResultHolder::new(initial_capacity, max_capacity)
    }

    /// Folds the first `length` rows of `block` into the holder's single accumulator.
    fn aggregate(
        &self,
        length: usize,
        holder: &mut AggregationResultHolder,
        block: &Block,
    ) -> AggResult<()>;

    /// Folds row `r` into the accumulator of `group_keys[r]`.
    fn aggregate_group_by_sv(
        &self,
        length: usize,
        group_keys: &[u32],
        holder: &mut GroupByResultHolder,
        block: &Block,
    ) -> AggResult<()>;

    /// Folds row `r` into the accumulator of every key in `group_keys[r]`, once per listing.
    fn aggregate_group_by_mv(
        &self,
        length: usize,
        group_keys: &[Vec<u32>],
        holder: &mut GroupByResultHolder,
        block: &Block,
    ) -> AggResult<()>;

    fn extract_aggregation_result(&self, holder: &AggregationResultHolder) -> IntermediateResult {
        holder
            .result()
            .cloned()
            .unwrap_or_else(|| self.empty_intermediate_result())
    }

    fn extract_group_by_result(
        &self,
        holder: &GroupByResultHolder,
        group_key: u32,
    ) -> IntermediateResult {
        holder
            .result(group_key)
            .cloned()
            .unwrap_or_else(|| self.empty_intermediate_result())
    }

    /// Commutative, associative combination of two accumulators of this function.
    fn merge(
        &self,
        a: IntermediateResult,
        b: IntermediateResult,
    ) -> AggResult<IntermediateResult>;

    fn is_intermediate_result_comparable(&self) -> bool;

    fn intermediate_result_column_type(&self) -> ColumnDataType;

    fn final_result_column_type(&self) -> ColumnDataType;

    fn extract_final_result(&self, intermediate: IntermediateResult) -> AggResult<FinalResult>;
}

pub type AggregationFunctionRef = Arc<dyn AggregationFunction>;

/// Single entry point from the query layer into the aggregation core.
pub struct AggregationFunctionFactory;

impl AggregationFunctionFactory {
    pub fn create(
        function_type: AggregationFunctionType,
        arguments: &[&str],
    ) -> AggResult<AggregationFunctionRef> {
        use AggregationFunctionType as T;

        let function: AggregationFunctionRef = match function_type {
            T::Count | T::CountMv => {
                Arc::new(CountAggregationFunction::new(function_type, arguments)?)
            }
            T::Sum | T::SumMv => Arc::new(SumAggregationFunction::new(function_type, arguments)?),
            T::Min | T::MinMv => Arc::new(MinAggregationFunction::new(function_type, arguments)?),
            T::Max | T::MaxMv => Arc::new(MaxAggregationFunction::new(function_type, arguments)?),
            T::Avg | T::AvgMv => Arc::new(AvgAggregationFunction::new(function_type, arguments)?),
            T::MinMaxRange | T::MinMaxRangeMv => Arc::new(MinMaxRangeAggregationFunction::new(
                function_type,
                arguments,
            )?),
            T::DistinctCount | T::DistinctCountMv => Arc::new(
                DistinctCountAggregationFunction::new(function_type, arguments)?,
            ),
            T::DistinctCountHll | T::DistinctCountHllMv => Arc::new(
                DistinctCountHllAggregationFunction::new(function_type, arguments)?,
            ),
            T::Percentile | T::PercentileMv => Arc::new(PercentileAggregationFunction::new(
                function_type,
                arguments,
            )?),
        };
        log::trace!("created aggregation function {}", function.result_column_name());
        Ok(function)
    }

    /// Like [`Self::create`], resolving the kind by name.
    ///
    /// Percentile kinds may embed their percentile in the name (`percentile95`,
    /// `PERCENTILEMV50`); the embedded value is appended to `arguments`.
    pub fn create_by_name(name: &str, arguments: &[&str]) -> AggResult<AggregationFunctionRef> {
        let trimmed = name.trim();
        let upper = trimmed.to_ascii_uppercase();
        for function_type in [
            AggregationFunctionType::PercentileMv,
            AggregationFunctionType::Percentile,
        ] {
            let Some(suffix) = upper.strip_prefix(function_type.name()) else {
                continue;
            };
            if suffix.is_empty() {
                break;
            }
            if !suffix.chars().all(|c| c.is_ascii_digit() || c == '.') {
                continue;
            }
            let mut args: Vec<&str> = arguments.to_vec();
            args.push(suffix);
            return Self::create(function_type, &args);
        }

        Self::create(AggregationFunctionType::from_name(trimmed)?, arguments)
    }
}

/// Validates a one-column argument list and returns the column.
pub(crate) fn parse_column_argument(
    function_type: AggregationFunctionType,
    argument: Option<&&str>,
) -> AggResult<InputColumn> {
    let column = argument.map(|c| c.trim()).unwrap_or_default();
    if column.is_empty() {
        return Err(AggregationError::invalid_arguments(
            function_type,
            "expects a column name",
        ));
    }
    if column == "*" {
        return Err(AggregationError::invalid_arguments(
            function_type,
            "'*' is only valid for COUNT",
        ));
    }
    Ok(InputColumn {
        columns: vec![column.to_string()],
        multi_value: function_type.is_multi_value(),
    })
}

pub(crate) fn expect_arity(
    function_type: AggregationFunctionType,
    arguments: &[&str],
    allowed: std::ops::RangeInclusive<usize>,
) -> AggResult<()> {
    if allowed.contains(&arguments.len()) {
        return Ok(());
    }
    let expected = if allowed.start() == allowed.end() {
        allowed.start().to_string()
    } else {
        format!("{} to {}", allowed.start(), allowed.end())
    };
    Err(AggregationError::invalid_arguments(
        function_type,
        format!("expects {expected} arguments, got {}", arguments.len()),
    ))
}

/// `FUNC_column` style internal name.
pub(crate) fn default_column_name(function_type: AggregationFunctionType, column: &str) -> String {
    format!("{}_{}", function_type.name(), column)
}

/// `func(column)` style display name.
pub(crate) fn default_result_column_name(
    function_type: AggregationFunctionType,
    column: &str,
) -> String {
    format!("{}({})", function_type.name().to_ascii_lowercase(), column)
}

pub(crate) fn intermediate_mismatch(
    function_type: AggregationFunctionType,
    expected: &'static str,
    actual: &IntermediateResult,
) -> AggregationError {
    AggregationError::IntermediateTypeMismatch {
        function: function_type,
        expected,
        actual: actual.kind_name(),
    }
}

fn check_rows(requested: usize, available: usize) -> AggResult<()> {
    if requested > available {
        return Err(AggregationError::RowCountMismatch {
            requested,
            available,
        });
    }
    Ok(())
}

/// The one column a value-reading function is bound to, plus whether it reads it as MV.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct InputColumn {
    columns: Vec<String>,
    multi_value: bool,
}

impl InputColumn {
    pub(crate) fn name(&self) -> &str {
        &self.columns[0]
    }

    pub(crate) fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Checks type and arity from column metadata without reading values.
    pub(crate) fn validate(&self, block: &Block, allow_strings: bool) -> AggResult<()> {
        let val_set = block.val_set(self.name())?;
        let metadata = val_set.metadata();
        let type_ok = allow_strings || metadata.data_type.is_numeric();
        if type_ok && metadata.single_value != self.multi_value {
            return Ok(());
        }

        let shape = |data_type: &str, single_value: bool| {
            if single_value {
                data_type.to_string()
            } else {
                format!("{data_type} (multi-value)")
            }
        };
        let expected = if allow_strings { "any" } else { "numeric" };
        Err(BlockError::TypeMismatch {
            column: self.name().to_string(),
            expected: shape(expected, !self.multi_value),
            actual: shape(metadata.data_type.name(), metadata.single_value),
        }
        .into())
    }

    pub(crate) fn double_rows<'b>(&self, block: &'b Block, length: usize) -> AggResult<Rows<'b, f64>> {
        let val_set = block.val_set(self.name())?;
        let rows = if self.multi_value {
            Rows::Multi(val_set.to_double_values_mv()?)
        } else {
            Rows::Single(val_set.to_double_values_sv()?)
        };
        check_rows(length, rows.num_rows())?;
        Ok(rows)
    }

    pub(crate) fn string_rows<'b>(
        &self,
        block: &'b Block,
        length: usize,
    ) -> AggResult<Rows<'b, Arc<str>>> {
        let val_set = block.val_set(self.name())?;
        let rows = if self.multi_value {
            Rows::Multi(val_set.string_values_mv()?)
        } else {
            Rows::Single(Cow::Borrowed(val_set.string_values_sv()?))
        };
        check_rows(length, rows.num_rows())?;
        Ok(rows)
    }
}

/// Per-row view over an input column: one value per row (SV) or a slice per row (MV).
pub(crate) enum Rows<'a, T: Clone> {
    Single(Cow<'a, [T]>),
    Multi(MultiValues<'a, T>),
}

impl<'a, T: Clone> Rows<'a, T> {
    pub(crate) fn num_rows(&self) -> usize {
        match self {
            Rows::Single(values) => values.len(),
            Rows::Multi(values) => values.num_rows(),
        }
    }

    pub(crate) fn row(&self, row: usize) -> &[T] {
        match self {
            Rows::Single(values) => std::slice::from_ref(&values[row]),
            Rows::Multi(values) => values.row(row),
        }
    }

    /// Every value of the first `length` rows.
    pub(crate) fn for_each(&self, length: usize, mut f: impl FnMut(&T)) {
        match self {
            Rows::Single(values) => values[..length].iter().for_each(f),
            Rows::Multi(values) => {
                for row in 0..length {
                    values.row(row).iter().for_each(&mut f);
                }
            }
        }
    }

    /// Every value of row `r` paired with `group_keys[r]`.
    pub(crate) fn for_each_keyed(
        &self,
        length: usize,
        group_keys: &[u32],
        mut f: impl FnMut(u32, &T) -> AggResult<()>,
    ) -> AggResult<()> {
        check_rows(length, group_keys.len())?;
        for (row, &key) in group_keys[..length].iter().enumerate() {
            for value in self.row(row) {
                f(key, value)?;
            }
        }
        Ok(())
    }

    /// Every value of row `r` paired with each key listed in `group_keys[r]`.
    pub(crate) fn for_each_fanned(
        &self,
        length: usize,
        group_keys: &[Vec<u32>],
        mut f: impl FnMut(u32, &T) -> AggResult<()>,
    ) -> AggResult<()> {
        check_rows(length, group_keys.len())?;
        for (row, keys) in group_keys[..length].iter().enumerate() {
            let values = self.row(row);
            for &key in keys {
                for value in values {
                    f(key, value)?;
                }
            }
        }
        Ok(())
    }
}

pub(crate) fn check_group_keys_sv(length: usize, group_keys: &[u32]) -> AggResult<()> {
    check_rows(length, group_keys.len())
}

pub(crate) fn check_group_keys_mv(length: usize, group_keys: &[Vec<u32>]) -> AggResult<()> {
    check_rows(length, group_keys.len())
}

pub(crate) fn check_block_rows(length: usize, block: &Block) -> AggResult<()> {
    check_rows(length, block.length())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_round_trip_case_insensitively() {
        for function_type in AggregationFunctionType::ALL {
            assert_eq!(
                AggregationFunctionType::from_name(&function_type.name().to_ascii_lowercase())
                    .unwrap(),
                function_type
            );
        }
        assert_eq!(
            "distinctCountHll".parse::<AggregationFunctionType>().unwrap(),
            AggregationFunctionType::DistinctCountHll
        );
        assert!(matches!(
            AggregationFunctionType::from_name("median"),
            Err(AggregationError::UnknownFunction(_))
        ));
    }

    #[test]
    fn serde_names_match_registry_names() {
        let json = serde_json::to_string(&AggregationFunctionType::MinMaxRangeMv).unwrap();
        assert_eq!(json, "\"MINMAXRANGEMV\"");
    }

    #[test]
    fn percentile_can_be_embedded_in_the_name() {
        let f = AggregationFunctionFactory::create_by_name("percentile95", &["price"]).unwrap();
        assert_eq!(f.function_type(), AggregationFunctionType::Percentile);
        assert_eq!(f.column_name(), "PERCENTILE95_price");

        let f = AggregationFunctionFactory::create_by_name("PercentileMV50", &["tags"]).unwrap();
        assert_eq!(f.function_type(), AggregationFunctionType::PercentileMv);
        assert_eq!(f.result_column_name(), "percentilemv50(tags)");

        let f = AggregationFunctionFactory::create_by_name("percentile", &["price", "10"]).unwrap();
        assert_eq!(f.column_name(), "PERCENTILE10_price");
    }

    #[test]
    fn fan_out_visits_repeated_keys_once_per_listing() {
        let values = vec![7.0, 8.0];
        let rows = Rows::Single(Cow::Borrowed(values.as_slice()));
        let mut seen = Vec::new();
        rows.for_each_fanned(2, &[vec![2, 5, 5], vec![]], |key, v| {
            seen.push((key, *v));
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![(2, 7.0), (5, 7.0), (5, 7.0)]);
    }

    #[test]
    fn row_counts_beyond_available_are_rejected() {
        let values = vec![1.0];
        let rows = Rows::Single(Cow::Borrowed(values.as_slice()));
        assert!(matches!(
            rows.for_each_keyed(2, &[0], |_, _| Ok(())),
            Err(AggregationError::RowCountMismatch {
                requested: 2,
                available: 1
            })
        ));
    }
}
