//! Shared machinery for aggregations whose accumulator is a single double folded with a
//! commutative operator (SUM, MIN, MAX and their MV variants).

use crate::error::AggResult;
use crate::function::{expect_arity, intermediate_mismatch, parse_column_argument};
use crate::function::{AggregationFunctionType, InputColumn};
use crate::holder::{AggregationResultHolder, GroupByResultHolder};
use crate::types::{FinalResult, IntermediateResult};
use tally_columnar::Block;

#[derive(Clone, Debug)]
pub(crate) struct DoubleFold {
    function_type: AggregationFunctionType,
    input: InputColumn,
    identity: f64,
    combine: fn(f64, f64) -> f64,
}

impl DoubleFold {
    pub(crate) fn new(
        function_type: AggregationFunctionType,
        arguments: &[&str],
        identity: f64,
        combine: fn(f64, f64) -> f64,
    ) -> AggResult<Self> {
        expect_arity(function_type, arguments, 1..=1)?;
        Ok(Self {
            function_type,
            input: parse_column_argument(function_type, arguments.first())?,
            identity,
            combine,
        })
    }

    pub(crate) fn function_type(&self) -> AggregationFunctionType {
        self.function_type
    }

    pub(crate) fn input(&self) -> &InputColumn {
        &self.input
    }

    pub(crate) fn empty(&self) -> IntermediateResult {
        IntermediateResult::Double(self.identity)
    }

    fn value<'r>(&self, result: &'r mut IntermediateResult) -> AggResult<&'r mut f64> {
        match result {
            IntermediateResult::Double(value) => Ok(value),
            other => Err(intermediate_mismatch(self.function_type, "DOUBLE", other)),
        }
    }

    pub(crate) fn aggregate(
        &self,
        length: usize,
        holder: &mut AggregationResultHolder,
        block: &Block,
    ) -> AggResult<()> {
        let rows = self.input.double_rows(block, length)?;
        let mut acc = self.identity;
        rows.for_each(length, |&v| acc = (self.combine)(acc, v));

        let slot = self.value(holder.result_or_insert_with(|| self.empty()))?;
        *slot = (self.combine)(*slot, acc);
        Ok(())
    }

    pub(crate) fn aggregate_group_by_sv(
        &self,
        length: usize,
        group_keys: &[u32],
        holder: &mut GroupByResultHolder,
        block: &Block,
    ) -> AggResult<()> {
        let rows = self.input.double_rows(block, length)?;
        rows.for_each_keyed(length, group_keys, |key, &v| {
            let slot = self.value(holder.result_or_insert_with(key, || self.empty())?)?;
            *slot = (self.combine)(*slot, v);
            Ok(())
        })
    }

    pub(crate) fn aggregate_group_by_mv(
        &self,
        length: usize,
        group_keys: &[Vec<u32>],
        holder: &mut GroupByResultHolder,
        block: &Block,
    ) -> AggResult<()> {
        let rows = self.input.double_rows(block, length)?;
        rows.for_each_fanned(length, group_keys, |key, &v| {
            let slot = self.value(holder.result_or_insert_with(key, || self.empty())?)?;
            *slot = (self.combine)(*slot, v);
            Ok(())
        })
    }

    pub(crate) fn merge(
        &self,
        a: IntermediateResult,
        b: IntermediateResult,
    ) -> AggResult<IntermediateResult> {
        match (a, b) {
            (IntermediateResult::Double(a), IntermediateResult::Double(b)) => {
                Ok(IntermediateResult::Double((self.combine)(a, b)))
            }
            (IntermediateResult::Double(_), other) | (other, _) => {
                Err(intermediate_mismatch(self.function_type, "DOUBLE", &other))
            }
        }
    }

    pub(crate) fn extract_final_result(
        &self,
        intermediate: IntermediateResult,
    ) -> AggResult<FinalResult> {
        match intermediate {
            IntermediateResult::Double(value) => Ok(FinalResult::Double(value)),
            other => Err(intermediate_mismatch(self.function_type, "DOUBLE", &other)),
        }
    }
}

/// Implements [`AggregationFunction`](crate::function::AggregationFunction) for a newtype over
/// [`DoubleFold`]. Intermediate and final results are both `DOUBLE` and comparable.
macro_rules! double_fold_function {
    ($name:ident) => {
        impl $crate::function::AggregationFunction for $name {
            fn function_type(&self) -> $crate::function::AggregationFunctionType {
                self.0.function_type()
            }

            fn column_name(&self) -> String {
                $crate::function::default_column_name(self.0.function_type(), self.0.input().name())
            }

            fn result_column_name(&self) -> String {
                $crate::function::default_result_column_name(
                    self.0.function_type(),
                    self.0.input().name(),
                )
            }

            fn input_columns(&self) -> &[String] {
                self.0.input().columns()
            }

            fn empty_intermediate_result(&self) -> $crate::types::IntermediateResult {
                self.0.empty()
            }

            fn validate_block(&self, block: &tally_columnar::Block) -> $crate::error::AggResult<()> {
                self.0.input().validate(block, false)
            }

            fn aggregate(
                &self,
                length: usize,
                holder: &mut $crate::holder::AggregationResultHolder,
                block: &tally_columnar::Block,
            ) -> $crate::error::AggResult<()> {
                self.0.aggregate(length, holder, block)
            }

            fn aggregate_group_by_sv(
                &self,
                length: usize,
                group_keys: &[u32],
                holder: &mut $crate::holder::GroupByResultHolder,
                block: &tally_columnar::Block,
            ) -> $crate::error::AggResult<()> {
                self.0.aggregate_group_by_sv(length, group_keys, holder, block)
            }

            fn aggregate_group_by_mv(
                &self,
                length: usize,
                group_keys: &[Vec<u32>],
                holder: &mut $crate::holder::GroupByResultHolder,
                block: &tally_columnar::Block,
            ) -> $crate::error::AggResult<()> {
                self.0.aggregate_group_by_mv(length, group_keys, holder, block)
            }

            fn merge(
                &self,
                a: $crate::types::IntermediateResult,
                b: $crate::types::IntermediateResult,
            ) -> $crate::error::AggResult<$crate::types::IntermediateResult> {
                self.0.merge(a, b)
            }

            fn is_intermediate_result_comparable(&self) -> bool {
                true
            }

            fn intermediate_result_column_type(&self) -> $crate::types::ColumnDataType {
                $crate::types::ColumnDataType::Double
            }

            fn final_result_column_type(&self) -> $crate::types::ColumnDataType {
                $crate::types::ColumnDataType::Double
            }

            fn extract_final_result(
                &self,
                intermediate: $crate::types::IntermediateResult,
            ) -> $crate::error::AggResult<$crate::types::FinalResult> {
                self.0.extract_final_result(intermediate)
            }
        }
    };
}

pub(crate) use double_fold_function;
