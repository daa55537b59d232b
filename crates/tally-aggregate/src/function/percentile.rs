//! PERCENTILE / PERCENTILEMV: exact order statistic over every folded value.
//!
//! The accumulator is an append-only multiset of doubles. Nothing is ordered while
//! accumulating or merging; the order statistic is selected once, at finalize time.

use crate::error::{AggResult, AggregationError};
use crate::function::{
    expect_arity, intermediate_mismatch, parse_column_argument, AggregationFunction,
    AggregationFunctionType, InputColumn,
};
use crate::holder::{AggregationResultHolder, GroupByResultHolder};
use crate::types::{ColumnDataType, FinalResult, IntermediateResult};
use std::fmt;
use tally_columnar::Block;

/// Final result of a percentile over zero values.
pub const DEFAULT_FINAL_RESULT: f64 = f64::NEG_INFINITY;

/// Fractional digits accepted in a percentile literal.
const MAX_FRACTION_DIGITS: usize = 15;

#[derive(Clone, Debug, PartialEq)]
pub struct PercentileAggregationFunction {
    function_type: AggregationFunctionType,
    input: InputColumn,
    percentile: PercentileValue,
}

/// A percentile kept as the exact decimal `units / 10^scale`, with no trailing fractional zeros.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PercentileValue {
    units: u64,
    scale: u32,
}

impl PercentileValue {
    fn is_max(&self) -> bool {
        self.units == 100 * 10u64.pow(self.scale)
    }

    /// Index of this order statistic among `size` sorted values: `floor(size * p / 100)`.
    pub(crate) fn rank(&self, size: usize) -> usize {
        let denominator = 100 * 10u128.pow(self.scale);
        let rank = (size as u128 * u128::from(self.units) / denominator) as usize;
        rank.min(size.saturating_sub(1))
    }

    fn as_f64(&self) -> f64 {
        self.units as f64 / 10f64.powi(self.scale as i32)
    }
}

impl fmt::Display for PercentileValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let divisor = 10u64.pow(self.scale);
        let whole = self.units / divisor;
        if self.scale == 0 {
            write!(f, "{whole}")
        } else {
            let width = self.scale as usize;
            write!(f, "{whole}.{:0width$}", self.units % divisor)
        }
    }
}

/// Parses a decimal percentile literal (`"95"`, `"99.9"`) and checks it lies in `[0, 100]`.
pub(crate) fn parse_percentile(
    function_type: AggregationFunctionType,
    argument: &str,
) -> AggResult<PercentileValue> {
    let invalid = || {
        AggregationError::invalid_arguments(
            function_type,
            format!("invalid percentile '{argument}'"),
        )
    };
    let out_of_range = || {
        AggregationError::invalid_arguments(
            function_type,
            format!("percentile must be between 0 and 100, got '{argument}'"),
        )
    };

    let literal = argument.trim();
    let (negative, unsigned) = match literal.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, literal.strip_prefix('+').unwrap_or(literal)),
    };
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let is_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !is_digits(whole) || !is_digits(fraction) {
        return Err(invalid());
    }

    let whole = whole.trim_start_matches('0');
    let fraction = fraction.trim_end_matches('0');
    if whole.len() > 3 {
        return Err(out_of_range());
    }
    if fraction.len() > MAX_FRACTION_DIGITS {
        return Err(AggregationError::invalid_arguments(
            function_type,
            format!("percentile '{argument}' has more than {MAX_FRACTION_DIGITS} fractional digits"),
        ));
    }

    let digits = format!("{whole}{fraction}");
    let units = if digits.is_empty() {
        0
    } else {
        digits.parse::<u64>().map_err(|_| invalid())?
    };
    let value = PercentileValue {
        units,
        scale: fraction.len() as u32,
    };
    if (negative && units != 0) || units > 100 * 10u64.pow(value.scale) {
        return Err(out_of_range());
    }
    Ok(value)
}

impl PercentileAggregationFunction {
    /// Arguments: `[column, percentile]`.
    pub fn new(function_type: AggregationFunctionType, arguments: &[&str]) -> AggResult<Self> {
        expect_arity(function_type, arguments, 2..=2)?;
        let input = parse_column_argument(function_type, arguments.first())?;
        let percentile = parse_percentile(function_type, arguments[1])?;
        Ok(Self {
            function_type,
            input,
            percentile,
        })
    }

    pub fn percentile(&self) -> f64 {
        self.percentile.as_f64()
    }

    fn value_list<'r>(&self, result: &'r mut IntermediateResult) -> AggResult<&'r mut Vec<f64>> {
        match result {
            IntermediateResult::DoubleList(values) => Ok(values),
            other => Err(intermediate_mismatch(self.function_type, "DOUBLE_LIST", other)),
        }
    }

    fn order_statistic(&self, mut values: Vec<f64>) -> f64 {
        if values.is_empty() {
            return DEFAULT_FINAL_RESULT;
        }
        if self.percentile.is_max() {
            return values
                .iter()
                .copied()
                .max_by(f64::total_cmp)
                .unwrap_or(DEFAULT_FINAL_RESULT);
        }
        let rank = self.percentile.rank(values.len());
        let (_, value, _) = values.select_nth_unstable_by(rank, f64::total_cmp);
        *value
    }
}

fn empty_list() -> IntermediateResult {
    IntermediateResult::DoubleList(Vec::new())
}

impl AggregationFunction for PercentileAggregationFunction {
    fn function_type(&self) -> AggregationFunctionType {
        self.function_type
    }

    fn column_name(&self) -> String {
        format!(
            "{}{}_{}",
            self.function_type.name(),
            self.percentile,
            self.input.name()
        )
    }

    fn result_column_name(&self) -> String {
        format!(
            "{}{}({})",
            self.function_type.name().to_ascii_lowercase(),
            self.percentile,
            self.input.name()
        )
    }

    fn input_columns(&self) -> &[String] {
        self.input.columns()
    }

    fn empty_intermediate_result(&self) -> IntermediateResult {
        empty_list()
    }

    fn validate_block(&self, block: &Block) -> AggResult<()> {
        self.input.validate(block, false)
    }

    fn aggregate(
        &self,
        length: usize,
        holder: &mut AggregationResultHolder,
        block: &Block,
    ) -> AggResult<()> {
        let rows = self.input.double_rows(block, length)?;
        let values = self.value_list(holder.result_or_insert_with(empty_list))?;
        rows.for_each(length, |&v| values.push(v));
        Ok(())
    }

    fn aggregate_group_by_sv(
        &self,
        length: usize,
        group_keys: &[u32],
        holder: &mut GroupByResultHolder,
        block: &Block,
    ) -> AggResult<()> {
        let rows = self.input.double_rows(block, length)?;
        rows.for_each_keyed(length, group_keys, |key, &v| {
            self.value_list(holder.result_or_insert_with(key, empty_list)?)?
                .push(v);
            Ok(())
        })
    }

    fn aggregate_group_by_mv(
        &self,
        length: usize,
        group_keys: &[Vec<u32>],
        holder: &mut GroupByResultHolder,
        block: &Block,
    ) -> AggResult<()> {
        let rows = self.input.double_rows(block, length)?;
        rows.for_each_fanned(length, group_keys, |key, &v| {
            self.value_list(holder.result_or_insert_with(key, empty_list)?)?
                .push(v);
            Ok(())
        })
    }

    fn merge(
        &self,
        a: IntermediateResult,
        b: IntermediateResult,
    ) -> AggResult<IntermediateResult> {
        match (a, b) {
            (IntermediateResult::DoubleList(mut a), IntermediateResult::DoubleList(mut b)) => {
                if a.len() < b.len() {
                    std::mem::swap(&mut a, &mut b);
                }
                a.append(&mut b);
                Ok(IntermediateResult::DoubleList(a))
            }
            (IntermediateResult::DoubleList(_), other) | (other, _) => Err(intermediate_mismatch(
                self.function_type,
                "DOUBLE_LIST",
                &other,
            )),
        }
    }

    fn is_intermediate_result_comparable(&self) -> bool {
        false
    }

    fn intermediate_result_column_type(&self) -> ColumnDataType {
        ColumnDataType::Object
    }

    fn final_result_column_type(&self) -> ColumnDataType {
        ColumnDataType::Double
    }

    fn extract_final_result(&self, intermediate: IntermediateResult) -> AggResult<FinalResult> {
        match intermediate {
            IntermediateResult::DoubleList(values) => {
                Ok(FinalResult::Double(self.order_statistic(values)))
            }
            other => Err(intermediate_mismatch(
                self.function_type,
                "DOUBLE_LIST",
                &other,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_columnar::BlockBuilder;

    fn percentile(p: &str) -> PercentileAggregationFunction {
        PercentileAggregationFunction::new(AggregationFunctionType::Percentile, &["x", p]).unwrap()
    }

    fn finalize(p: &str, values: &[f64]) -> f64 {
        percentile(p)
            .extract_final_result(IntermediateResult::DoubleList(values.to_vec()))
            .unwrap()
            .as_f64()
    }

    fn rank(size: usize, p: &str) -> usize {
        parse_percentile(AggregationFunctionType::Percentile, p)
            .unwrap()
            .rank(size)
    }

    #[test]
    fn rank_is_floor_of_size_times_percentile() {
        assert_eq!(rank(4, "50"), 2);
        assert_eq!(rank(4, "0"), 0);
        assert_eq!(rank(10, "99"), 9);
        assert_eq!(rank(3, "33"), 0);
        assert_eq!(rank(1000, "99.9"), 999);
        assert_eq!(rank(7, "100"), 6);
    }

    #[test]
    fn fractional_ranks_are_exact() {
        // n * p / 100 is a whole number here, but not in binary floating point.
        assert_eq!(rank(750, "9.2"), 69);
        assert_eq!(rank(1500, "4.6"), 69);
        assert_eq!(rank(1375, "5.6"), 77);
        assert_eq!(rank(1000, "0.001"), 0);
        assert_eq!(rank(100_000, "0.001"), 1);

        let values: Vec<f64> = (0..750).map(f64::from).collect();
        assert_eq!(finalize("9.2", &values), 69.0);
    }

    #[test]
    fn equivalent_literals_parse_to_one_value() {
        let zero = parse_percentile(AggregationFunctionType::Percentile, "0").unwrap();
        for literal in ["-0", "+0", "0.000", "-0.0", "00", ".0"] {
            assert_eq!(
                parse_percentile(AggregationFunctionType::Percentile, literal).unwrap(),
                zero,
                "{literal}"
            );
        }
        let half = parse_percentile(AggregationFunctionType::Percentile, "5.5").unwrap();
        assert_eq!(
            parse_percentile(AggregationFunctionType::Percentile, "05.50").unwrap(),
            half
        );
        assert_eq!(half.to_string(), "5.5");
        assert_eq!(
            parse_percentile(AggregationFunctionType::Percentile, ".25")
                .unwrap()
                .to_string(),
            "0.25"
        );
        assert!(parse_percentile(AggregationFunctionType::Percentile, "100.0")
            .unwrap()
            .is_max());
    }

    #[test]
    fn median_and_max_of_four_values() {
        assert_eq!(finalize("50", &[40.0, 10.0, 30.0, 20.0]), 30.0);
        assert_eq!(finalize("100", &[40.0, 10.0, 30.0, 20.0]), 40.0);
        assert_eq!(finalize("0", &[40.0, 10.0, 30.0, 20.0]), 10.0);
    }

    #[test]
    fn empty_accumulator_finalizes_to_negative_infinity() {
        assert_eq!(finalize("50", &[]), f64::NEG_INFINITY);
        assert_eq!(finalize("100", &[]), f64::NEG_INFINITY);
    }

    #[test]
    fn invalid_percentiles_fail_construction() {
        for bad in [
            "101", "-1", "-0.5", "100.01", "abc", "", ".", "NaN", "inf", "1e2", "+-5", "5..0",
            "0.1234567890123456",
        ] {
            let err = PercentileAggregationFunction::new(
                AggregationFunctionType::Percentile,
                &["x", bad],
            )
            .unwrap_err();
            assert!(
                matches!(err, AggregationError::InvalidArguments { .. }),
                "{bad}: {err}"
            );
        }
        assert!(PercentileAggregationFunction::new(AggregationFunctionType::Percentile, &["x"])
            .is_err());
        assert!(
            PercentileAggregationFunction::new(AggregationFunctionType::Percentile, &["", "5"])
                .is_err()
        );
    }

    #[test]
    fn names_embed_the_percentile() {
        let f = PercentileAggregationFunction::new(
            AggregationFunctionType::Percentile,
            &["price", " 95 "],
        )
        .unwrap();
        assert_eq!(f.column_name(), "PERCENTILE95_price");
        assert_eq!(f.result_column_name(), "percentile95(price)");

        let f = PercentileAggregationFunction::new(
            AggregationFunctionType::Percentile,
            &["price", "99.9"],
        )
        .unwrap();
        assert_eq!(f.column_name(), "PERCENTILE99.9_price");

        for (literal, column_name) in [("-0", "PERCENTILE0_price"), ("95.00", "PERCENTILE95_price")] {
            let f = PercentileAggregationFunction::new(
                AggregationFunctionType::Percentile,
                &["price", literal],
            )
            .unwrap();
            assert_eq!(f.column_name(), column_name, "{literal}");
        }
    }

    #[test]
    fn merge_concatenates_and_keeps_duplicates() {
        let f = percentile("50");
        let merged = f
            .merge(
                IntermediateResult::DoubleList(vec![1.0, 1.0]),
                IntermediateResult::DoubleList(vec![1.0, 2.0, 3.0]),
            )
            .unwrap();
        let IntermediateResult::DoubleList(mut values) = merged else {
            panic!("expected a value list");
        };
        values.sort_by(f64::total_cmp);
        assert_eq!(values, vec![1.0, 1.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn merge_rejects_foreign_accumulators() {
        let f = percentile("50");
        let err = f
            .merge(IntermediateResult::Long(1), IntermediateResult::DoubleList(vec![]))
            .unwrap_err();
        assert!(matches!(
            err,
            AggregationError::IntermediateTypeMismatch {
                actual: "LONG",
                ..
            }
        ));
    }

    #[test]
    fn ungrouped_aggregate_appends_every_row() {
        let mut builder = BlockBuilder::new(4);
        builder.add_single_value("x", vec![10, 20, 30, 40]).unwrap();
        let block = builder.finish();

        let f = percentile("50");
        let mut holder = f.create_aggregation_result_holder();
        f.aggregate(block.length(), &mut holder, &block).unwrap();
        f.aggregate(2, &mut holder, &block).unwrap();

        assert_eq!(
            f.extract_aggregation_result(&holder),
            IntermediateResult::DoubleList(vec![10.0, 20.0, 30.0, 40.0, 10.0, 20.0])
        );
    }

    #[test]
    fn single_value_percentile_rejects_multi_value_columns() {
        let mut builder = BlockBuilder::new(1);
        builder.add_multi_value_rows("x", vec![vec![1.0, 2.0]]).unwrap();
        let block = builder.finish();

        let f = percentile("50");
        let mut holder = f.create_aggregation_result_holder();
        assert!(matches!(
            f.aggregate(1, &mut holder, &block),
            Err(AggregationError::Block(_))
        ));
        assert!(f.validate_block(&block).is_err());
        assert!(holder.result().is_none());
    }
}
