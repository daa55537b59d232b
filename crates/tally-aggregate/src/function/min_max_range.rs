//! MINMAXRANGE / MINMAXRANGEMV: `max - min` over every folded value.

use crate::error::AggResult;
use crate::function::{
    default_column_name, default_result_column_name, expect_arity, intermediate_mismatch,
    parse_column_argument, AggregationFunction, AggregationFunctionType, InputColumn,
};
use crate::holder::{AggregationResultHolder, GroupByResultHolder};
use crate::types::{ColumnDataType, FinalResult, IntermediateResult, MinMaxRangePair};
use tally_columnar::Block;

/// Final result of a range over zero values.
pub const DEFAULT_FINAL_RESULT: f64 = f64::NEG_INFINITY;

#[derive(Clone, Debug, PartialEq)]
pub struct MinMaxRangeAggregationFunction {
    function_type: AggregationFunctionType,
    input: InputColumn,
}

fn empty_pair() -> IntermediateResult {
    IntermediateResult::MinMaxRange(MinMaxRangePair::default())
}

impl MinMaxRangeAggregationFunction {
    pub fn new(function_type: AggregationFunctionType, arguments: &[&str]) -> AggResult<Self> {
        expect_arity(function_type, arguments, 1..=1)?;
        Ok(Self {
            function_type,
            input: parse_column_argument(function_type, arguments.first())?,
        })
    }

    fn pair<'r>(&self, result: &'r mut IntermediateResult) -> AggResult<&'r mut MinMaxRangePair> {
        match result {
            IntermediateResult::MinMaxRange(pair) => Ok(pair),
            other => Err(intermediate_mismatch(
                self.function_type,
                "MIN_MAX_RANGE_PAIR",
                other,
            )),
        }
    }
}

impl AggregationFunction for MinMaxRangeAggregationFunction {
    fn function_type(&self) -> AggregationFunctionType {
        self.function_type
    }

    fn column_name(&self) -> String {
        default_column_name(self.function_type, self.input.name())
    }

    fn result_column_name(&self) -> String {
        default_result_column_name(self.function_type, self.input.name())
    }

    fn input_columns(&self) -> &[String] {
        self.input.columns()
    }

    fn empty_intermediate_result(&self) -> IntermediateResult {
        empty_pair()
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
        let mut local = MinMaxRangePair::default();
        rows.for_each(length, |&v| local.apply(v));
        self.pair(holder.result_or_insert_with(empty_pair))?
            .merge(&local);
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
            self.pair(holder.result_or_insert_with(key, empty_pair)?)?
                .apply(v);
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
            self.pair(holder.result_or_insert_with(key, empty_pair)?)?
                .apply(v);
            Ok(())
        })
    }

    fn merge(
        &self,
        a: IntermediateResult,
        b: IntermediateResult,
    ) -> AggResult<IntermediateResult> {
        match (a, b) {
            (IntermediateResult::MinMaxRange(mut a), IntermediateResult::MinMaxRange(b)) => {
                a.merge(&b);
                Ok(IntermediateResult::MinMaxRange(a))
            }
            (IntermediateResult::MinMaxRange(_), other) | (other, _) => Err(
                intermediate_mismatch(self.function_type, "MIN_MAX_RANGE_PAIR", &other),
            ),
        }
    }

    fn is_intermediate_result_comparable(&self) -> bool {
        true
    }

    fn intermediate_result_column_type(&self) -> ColumnDataType {
        ColumnDataType::Object
    }

    fn final_result_column_type(&self) -> ColumnDataType {
        ColumnDataType::Double
    }

    fn extract_final_result(&self, intermediate: IntermediateResult) -> AggResult<FinalResult> {
        match intermediate {
            IntermediateResult::MinMaxRange(pair) if pair.min > pair.max => {
                Ok(FinalResult::Double(DEFAULT_FINAL_RESULT))
            }
            IntermediateResult::MinMaxRange(pair) => Ok(FinalResult::Double(pair.range())),
            other => Err(intermediate_mismatch(
                self.function_type,
                "MIN_MAX_RANGE_PAIR",
                &other,
            )),
        }
    }
}
