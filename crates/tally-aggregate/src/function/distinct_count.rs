//! DISTINCTCOUNT and DISTINCTCOUNTHLL with their MV variants.
//!
//! Both accept numeric and string columns. Numbers are counted by value regardless of their
//! column width, so `INT 3` and `DOUBLE 3.0` are the same distinct value.

use crate::error::{AggResult, AggregationError};
use crate::function::{
    default_column_name, default_result_column_name, expect_arity, intermediate_mismatch,
    parse_column_argument, AggregationFunction, AggregationFunctionType, InputColumn, Rows,
};
use crate::hll::{HyperLogLog, DEFAULT_LOG2M, MAX_LOG2M, MIN_LOG2M};
use crate::holder::{AggregationResultHolder, GroupByResultHolder};
use crate::types::{ColumnDataType, DistinctKey, FinalResult, IntermediateResult};
use ordered_float::OrderedFloat;
use std::collections::HashSet;
use std::sync::Arc;
use tally_columnar::{Block, DataType};

/// Input column read either as doubles or as strings, depending on its stored type.
enum DistinctRows<'b> {
    Numbers(Rows<'b, f64>),
    Strings(Rows<'b, Arc<str>>),
}

fn distinct_rows<'b>(
    input: &InputColumn,
    block: &'b Block,
    length: usize,
) -> AggResult<DistinctRows<'b>> {
    if block.val_set(input.name())?.data_type() == DataType::String {
        Ok(DistinctRows::Strings(input.string_rows(block, length)?))
    } else {
        Ok(DistinctRows::Numbers(input.double_rows(block, length)?))
    }
}

fn number_key(value: f64) -> DistinctKey {
    DistinctKey::Number(OrderedFloat(value))
}

fn text_key(value: &Arc<str>) -> DistinctKey {
    DistinctKey::Text(Arc::clone(value))
}

/// Exact distinct count backed by a hash set of the values seen.
#[derive(Clone, Debug, PartialEq)]
pub struct DistinctCountAggregationFunction {
    function_type: AggregationFunctionType,
    input: InputColumn,
}

fn empty_set() -> IntermediateResult {
    IntermediateResult::DistinctSet(HashSet::new())
}

impl DistinctCountAggregationFunction {
    pub fn new(function_type: AggregationFunctionType, arguments: &[&str]) -> AggResult<Self> {
        expect_arity(function_type, arguments, 1..=1)?;
        Ok(Self {
            function_type,
            input: parse_column_argument(function_type, arguments.first())?,
        })
    }

    fn set<'r>(
        &self,
        result: &'r mut IntermediateResult,
    ) -> AggResult<&'r mut HashSet<DistinctKey>> {
        match result {
            IntermediateResult::DistinctSet(set) => Ok(set),
            other => Err(intermediate_mismatch(self.function_type, "DISTINCT_SET", other)),
        }
    }

    fn insert_keyed(
        &self,
        holder: &mut GroupByResultHolder,
        key: u32,
        value: DistinctKey,
    ) -> AggResult<()> {
        self.set(holder.result_or_insert_with(key, empty_set)?)?
            .insert(value);
        Ok(())
    }
}

impl AggregationFunction for DistinctCountAggregationFunction {
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
        empty_set()
    }

    fn validate_block(&self, block: &Block) -> AggResult<()> {
        self.input.validate(block, true)
    }

    fn aggregate(
        &self,
        length: usize,
        holder: &mut AggregationResultHolder,
        block: &Block,
    ) -> AggResult<()> {
        let rows = distinct_rows(&self.input, block, length)?;
        let set = self.set(holder.result_or_insert_with(empty_set))?;
        match rows {
            DistinctRows::Numbers(rows) => rows.for_each(length, |&v| {
                set.insert(number_key(v));
            }),
            DistinctRows::Strings(rows) => rows.for_each(length, |v| {
                set.insert(text_key(v));
            }),
        }
        Ok(())
    }

    fn aggregate_group_by_sv(
        &self,
        length: usize,
        group_keys: &[u32],
        holder: &mut GroupByResultHolder,
        block: &Block,
    ) -> AggResult<()> {
        match distinct_rows(&self.input, block, length)? {
            DistinctRows::Numbers(rows) => rows.for_each_keyed(length, group_keys, |key, &v| {
                self.insert_keyed(holder, key, number_key(v))
            }),
            DistinctRows::Strings(rows) => rows.for_each_keyed(length, group_keys, |key, v| {
                self.insert_keyed(holder, key, text_key(v))
            }),
        }
    }

    fn aggregate_group_by_mv(
        &self,
        length: usize,
        group_keys: &[Vec<u32>],
        holder: &mut GroupByResultHolder,
        block: &Block,
    ) -> AggResult<()> {
        match distinct_rows(&self.input, block, length)? {
            DistinctRows::Numbers(rows) => rows.for_each_fanned(length, group_keys, |key, &v| {
                self.insert_keyed(holder, key, number_key(v))
            }),
            DistinctRows::Strings(rows) => rows.for_each_fanned(length, group_keys, |key, v| {
                self.insert_keyed(holder, key, text_key(v))
            }),
        }
    }

    fn merge(
        &self,
        a: IntermediateResult,
        b: IntermediateResult,
    ) -> AggResult<IntermediateResult> {
        match (a, b) {
            (IntermediateResult::DistinctSet(mut a), IntermediateResult::DistinctSet(mut b)) => {
                if a.len() < b.len() {
                    std::mem::swap(&mut a, &mut b);
                }
                a.extend(b);
                Ok(IntermediateResult::DistinctSet(a))
            }
            (IntermediateResult::DistinctSet(_), other) | (other, _) => Err(
                intermediate_mismatch(self.function_type, "DISTINCT_SET", &other),
            ),
        }
    }

    fn is_intermediate_result_comparable(&self) -> bool {
        false
    }

    fn intermediate_result_column_type(&self) -> ColumnDataType {
        ColumnDataType::Object
    }

    fn final_result_column_type(&self) -> ColumnDataType {
        ColumnDataType::Long
    }

    fn extract_final_result(&self, intermediate: IntermediateResult) -> AggResult<FinalResult> {
        match intermediate {
            IntermediateResult::DistinctSet(set) => Ok(FinalResult::Long(set.len() as i64)),
            other => Err(intermediate_mismatch(
                self.function_type,
                "DISTINCT_SET",
                &other,
            )),
        }
    }
}

/// Approximate distinct count backed by a HyperLogLog sketch.
///
/// Arguments: `[column]` or `[column, log2m]`, where `log2m` selects `2^log2m` registers.
#[derive(Clone, Debug, PartialEq)]
pub struct DistinctCountHllAggregationFunction {
    function_type: AggregationFunctionType,
    input: InputColumn,
    log2m: u8,
}

impl DistinctCountHllAggregationFunction {
    pub fn new(function_type: AggregationFunctionType, arguments: &[&str]) -> AggResult<Self> {
        expect_arity(function_type, arguments, 1..=2)?;
        let input = parse_column_argument(function_type, arguments.first())?;
        let log2m = match arguments.get(1) {
            None => DEFAULT_LOG2M,
            Some(raw) => raw
                .trim()
                .parse::<u8>()
                .ok()
                .filter(|p| (MIN_LOG2M..=MAX_LOG2M).contains(p))
                .ok_or_else(|| {
                    AggregationError::invalid_arguments(
                        function_type,
                        format!("log2m must be between {MIN_LOG2M} and {MAX_LOG2M}, got '{raw}'"),
                    )
                })?,
        };
        Ok(Self {
            function_type,
            input,
            log2m,
        })
    }

    pub fn log2m(&self) -> u8 {
        self.log2m
    }

    fn empty(&self) -> IntermediateResult {
        IntermediateResult::Hll(HyperLogLog::with_precision(self.log2m))
    }

    fn sketch<'r>(&self, result: &'r mut IntermediateResult) -> AggResult<&'r mut HyperLogLog> {
        match result {
            IntermediateResult::Hll(sketch) => Ok(sketch),
            other => Err(intermediate_mismatch(self.function_type, "HYPER_LOG_LOG", other)),
        }
    }

    fn keyed_sketch<'h>(
        &self,
        holder: &'h mut GroupByResultHolder,
        key: u32,
    ) -> AggResult<&'h mut HyperLogLog> {
        self.sketch(holder.result_or_insert_with(key, || self.empty())?)
    }
}

impl AggregationFunction for DistinctCountHllAggregationFunction {
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
        self.empty()
    }

    fn validate_block(&self, block: &Block) -> AggResult<()> {
        self.input.validate(block, true)
    }

    fn aggregate(
        &self,
        length: usize,
        holder: &mut AggregationResultHolder,
        block: &Block,
    ) -> AggResult<()> {
        let rows = distinct_rows(&self.input, block, length)?;
        let sketch = self.sketch(holder.result_or_insert_with(|| self.empty()))?;
        match rows {
            DistinctRows::Numbers(rows) => rows.for_each(length, |&v| sketch.insert_f64(v)),
            DistinctRows::Strings(rows) => rows.for_each(length, |v| sketch.insert_str(v)),
        }
        Ok(())
    }

    fn aggregate_group_by_sv(
        &self,
        length: usize,
        group_keys: &[u32],
        holder: &mut GroupByResultHolder,
        block: &Block,
    ) -> AggResult<()> {
        match distinct_rows(&self.input, block, length)? {
            DistinctRows::Numbers(rows) => rows.for_each_keyed(length, group_keys, |key, &v| {
                self.keyed_sketch(holder, key)?.insert_f64(v);
                Ok(())
            }),
            DistinctRows::Strings(rows) => rows.for_each_keyed(length, group_keys, |key, v| {
                self.keyed_sketch(holder, key)?.insert_str(v);
                Ok(())
            }),
        }
    }

    fn aggregate_group_by_mv(
        &self,
        length: usize,
        group_keys: &[Vec<u32>],
        holder: &mut GroupByResultHolder,
        block: &Block,
    ) -> AggResult<()> {
        match distinct_rows(&self.input, block, length)? {
            DistinctRows::Numbers(rows) => rows.for_each_fanned(length, group_keys, |key, &v| {
                self.keyed_sketch(holder, key)?.insert_f64(v);
                Ok(())
            }),
            DistinctRows::Strings(rows) => rows.for_each_fanned(length, group_keys, |key, v| {
                self.keyed_sketch(holder, key)?.insert_str(v);
                Ok(())
            }),
        }
    }

    fn merge(
        &self,
        a: IntermediateResult,
        b: IntermediateResult,
    ) -> AggResult<IntermediateResult> {
        match (a, b) {
            (IntermediateResult::Hll(mut a), IntermediateResult::Hll(b)) => {
                a.merge(&b)?;
                Ok(IntermediateResult::Hll(a))
            }
            (IntermediateResult::Hll(_), other) | (other, _) => Err(intermediate_mismatch(
                self.function_type,
                "HYPER_LOG_LOG",
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
        ColumnDataType::Long
    }

    fn extract_final_result(&self, intermediate: IntermediateResult) -> AggResult<FinalResult> {
        match intermediate {
            IntermediateResult::Hll(sketch) => Ok(FinalResult::Long(
                i64::try_from(sketch.estimate()).unwrap_or(i64::MAX),
            )),
            other => Err(intermediate_mismatch(
                self.function_type,
                "HYPER_LOG_LOG",
                &other,
            )),
        }
    }
}
