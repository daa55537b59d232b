//! COUNT / COUNTMV.
//!
//! COUNT counts rows and never reads values, so `COUNT(*)` needs no input column. COUNTMV counts
//! the entries of a multi-value column, so an empty row contributes nothing.

use crate::error::{AggResult, AggregationError};
use crate::function::{
    check_block_rows, check_group_keys_mv, check_group_keys_sv, default_column_name,
    default_result_column_name, expect_arity, intermediate_mismatch, AggregationFunction,
    AggregationFunctionType,
};
use crate::holder::{AggregationResultHolder, GroupByResultHolder};
use crate::types::{ColumnDataType, FinalResult, IntermediateResult};
use tally_columnar::{Block, BlockError};

const STAR: &str = "*";

#[derive(Clone, Debug, PartialEq)]
pub struct CountAggregationFunction {
    function_type: AggregationFunctionType,
    /// Empty for `COUNT(*)`.
    columns: Vec<String>,
}

fn zero() -> IntermediateResult {
    IntermediateResult::Long(0)
}

impl CountAggregationFunction {
    /// COUNT takes `*` or one column (an empty argument list means `*`); COUNTMV takes one
    /// multi-value column.
    pub fn new(function_type: AggregationFunctionType, arguments: &[&str]) -> AggResult<Self> {
        let multi_value = function_type.is_multi_value();
        expect_arity(function_type, arguments, if multi_value { 1..=1 } else { 0..=1 })?;

        let column = arguments.first().map(|c| c.trim()).unwrap_or(STAR);
        if column.is_empty() {
            return Err(AggregationError::invalid_arguments(
                function_type,
                "expects a column name",
            ));
        }
        let columns = match (column, multi_value) {
            (STAR, true) => {
                return Err(AggregationError::invalid_arguments(
                    function_type,
                    "'*' is only valid for COUNT",
                ))
            }
            (STAR, false) => Vec::new(),
            (column, _) => vec![column.to_string()],
        };

        Ok(Self {
            function_type,
            columns,
        })
    }

    fn display_column(&self) -> &str {
        self.columns.first().map(String::as_str).unwrap_or(STAR)
    }

    fn count<'r>(&self, result: &'r mut IntermediateResult) -> AggResult<&'r mut i64> {
        match result {
            IntermediateResult::Long(count) => Ok(count),
            other => Err(intermediate_mismatch(self.function_type, "LONG", other)),
        }
    }

    /// Entry count of every row of the multi-value input column.
    fn mv_entries(&self, block: &Block, length: usize) -> AggResult<Vec<usize>> {
        let val_set = block.val_set(self.display_column())?;
        let entries = val_set.num_mv_entries()?;
        if length > entries.len() {
            return Err(AggregationError::RowCountMismatch {
                requested: length,
                available: entries.len(),
            });
        }
        Ok(entries)
    }
}

impl AggregationFunction for CountAggregationFunction {
    fn function_type(&self) -> AggregationFunctionType {
        self.function_type
    }

    /// `COUNT_star` for `COUNT(*)`.
    fn column_name(&self) -> String {
        match self.columns.first() {
            Some(column) => default_column_name(self.function_type, column),
            None => default_column_name(self.function_type, "star"),
        }
    }

    fn result_column_name(&self) -> String {
        default_result_column_name(self.function_type, self.display_column())
    }

    fn input_columns(&self) -> &[String] {
        &self.columns
    }

    fn empty_intermediate_result(&self) -> IntermediateResult {
        zero()
    }

    fn validate_block(&self, block: &Block) -> AggResult<()> {
        let Some(column) = self.columns.first() else {
            return Ok(());
        };
        let val_set = block.val_set(column)?;
        if self.function_type.is_multi_value() && val_set.is_single_value() {
            return Err(BlockError::TypeMismatch {
                column: column.clone(),
                expected: "any (multi-value)".to_string(),
                actual: val_set.data_type().name().to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn aggregate(
        &self,
        length: usize,
        holder: &mut AggregationResultHolder,
        block: &Block,
    ) -> AggResult<()> {
        check_block_rows(length, block)?;
        let added = if self.function_type.is_multi_value() {
            self.mv_entries(block, length)?[..length].iter().sum::<usize>()
        } else {
            length
        };
        *self.count(holder.result_or_insert_with(zero))? += added as i64;
        Ok(())
    }

    fn aggregate_group_by_sv(
        &self,
        length: usize,
        group_keys: &[u32],
        holder: &mut GroupByResultHolder,
        block: &Block,
    ) -> AggResult<()> {
        check_block_rows(length, block)?;
        check_group_keys_sv(length, group_keys)?;
        if self.function_type.is_multi_value() {
            let entries = self.mv_entries(block, length)?;
            for (&key, &n) in group_keys[..length].iter().zip(&entries) {
                *self.count(holder.result_or_insert_with(key, zero)?)? += n as i64;
            }
        } else {
            for &key in &group_keys[..length] {
                *self.count(holder.result_or_insert_with(key, zero)?)? += 1;
            }
        }
        Ok(())
    }

    fn aggregate_group_by_mv(
        &self,
        length: usize,
        group_keys: &[Vec<u32>],
        holder: &mut GroupByResultHolder,
        block: &Block,
    ) -> AggResult<()> {
        check_block_rows(length, block)?;
        check_group_keys_mv(length, group_keys)?;
        let entries = if self.function_type.is_multi_value() {
            Some(self.mv_entries(block, length)?)
        } else {
            None
        };
        for (row, keys) in group_keys[..length].iter().enumerate() {
            let added = entries.as_ref().map_or(1, |entries| entries[row]) as i64;
            for &key in keys {
                *self.count(holder.result_or_insert_with(key, zero)?)? += added;
            }
        }
        Ok(())
    }

    fn merge(
        &self,
        a: IntermediateResult,
        b: IntermediateResult,
    ) -> AggResult<IntermediateResult> {
        match (a, b) {
            (IntermediateResult::Long(a), IntermediateResult::Long(b)) => {
                Ok(IntermediateResult::Long(a + b))
            }
            (IntermediateResult::Long(_), other) | (other, _) => {
                Err(intermediate_mismatch(self.function_type, "LONG", &other))
            }
        }
    }

    fn is_intermediate_result_comparable(&self) -> bool {
        true
    }

    fn intermediate_result_column_type(&self) -> ColumnDataType {
        ColumnDataType::Long
    }

    fn final_result_column_type(&self) -> ColumnDataType {
        ColumnDataType::Long
    }

    fn extract_final_result(&self, intermediate: IntermediateResult) -> AggResult<FinalResult> {
        match intermediate {
            IntermediateResult::Long(count) => Ok(FinalResult::Long(count)),
            other => Err(intermediate_mismatch(self.function_type, "LONG", &other)),
        }
    }
}
