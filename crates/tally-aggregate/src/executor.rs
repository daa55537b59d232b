#![forbid(unsafe_code)]

//! Per-worker drivers that feed blocks through a fixed list of aggregation functions.
//!
//! Every block is checked against all functions (and, for grouped execution, against the group
//! key capacity) before anything is folded, so a rejected block leaves all holders untouched.

use crate::config::GroupByOptions;
use crate::error::{AggResult, AggregationError};
use crate::function::{check_group_keys_mv, check_group_keys_sv, AggregationFunctionRef};
use crate::holder::{AggregationResultHolder, GroupByResultHolder};
use crate::types::{FinalResult, IntermediateResult};
use tally_columnar::Block;

fn validate_all(functions: &[AggregationFunctionRef], block: &Block) -> AggResult<()> {
    for function in functions {
        function.validate_block(block)?;
    }
    Ok(())
}

/// Ungrouped aggregation: one accumulator per function for the whole query.
#[derive(Debug)]
pub struct AggregationExecutor {
    functions: Vec<AggregationFunctionRef>,
    holders: Vec<AggregationResultHolder>,
    num_rows: usize,
}

impl AggregationExecutor {
    pub fn new(functions: Vec<AggregationFunctionRef>) -> Self {
        let holders = functions
            .iter()
            .map(|f| f.create_aggregation_result_holder())
            .collect();
        Self {
            functions,
            holders,
            num_rows: 0,
        }
    }

    pub fn functions(&self) -> &[AggregationFunctionRef] {
        &self.functions
    }

    /// Rows folded so far.
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn process(&mut self, block: &Block) -> AggResult<()> {
        validate_all(&self.functions, block)?;
        log::trace!(
            "aggregating {} rows into {} functions",
            block.length(),
            self.functions.len()
        );
        for (function, holder) in self.functions.iter().zip(&mut self.holders) {
            function.aggregate(block.length(), holder, block)?;
        }
        self.num_rows += block.length();
        Ok(())
    }

    /// One mergeable partial per function, in function order.
    pub fn intermediate_results(&self) -> Vec<IntermediateResult> {
        self.functions
            .iter()
            .zip(&self.holders)
            .map(|(function, holder)| function.extract_aggregation_result(holder))
            .collect()
    }

    /// Final values of this executor's partials, for a query served by one worker.
    pub fn finalize(&self) -> AggResult<Vec<FinalResult>> {
        self.functions
            .iter()
            .zip(self.intermediate_results())
            .map(|(function, intermediate)| function.extract_final_result(intermediate))
            .collect()
    }
}

/// Grouped aggregation over dense group keys assigned upstream.
#[derive(Debug)]
pub struct GroupByExecutor {
    functions: Vec<AggregationFunctionRef>,
    holders: Vec<GroupByResultHolder>,
    max_capacity: usize,
    num_groups: usize,
}

impl GroupByExecutor {
    pub fn new(functions: Vec<AggregationFunctionRef>, options: &GroupByOptions) -> AggResult<Self> {
        options.validate()?;
        let holders = functions
            .iter()
            .map(|f| f.create_group_by_result_holder(options.initial_capacity, options.max_capacity))
            .collect::<AggResult<Vec<_>>>()?;
        log::debug!(
            "group-by executor with {} functions, capacity {} (max {})",
            functions.len(),
            options.initial_capacity,
            options.max_capacity
        );
        Ok(Self {
            functions,
            holders,
            max_capacity: options.max_capacity,
            num_groups: 0,
        })
    }

    pub fn functions(&self) -> &[AggregationFunctionRef] {
        &self.functions
    }

    /// One past the largest group key seen so far.
    pub fn num_groups(&self) -> usize {
        self.num_groups
    }

    /// Makes keys up to `max_key` addressable in every holder, or fails before any folding.
    fn reserve(&mut self, max_key: Option<u32>) -> AggResult<()> {
        let Some(max_key) = max_key else {
            return Ok(());
        };
        let needed = max_key as usize + 1;
        if needed > self.max_capacity {
            log::warn!(
                "group key {max_key} exceeds the group-by capacity of {}",
                self.max_capacity
            );
            return Err(AggregationError::Capacity {
                requested: needed,
                max: self.max_capacity,
            });
        }
        for holder in &mut self.holders {
            holder.ensure_capacity(needed)?;
        }
        self.num_groups = self.num_groups.max(needed);
        Ok(())
    }

    /// Folds row `r` of `block` into group `group_keys[r]`.
    pub fn process_sv(&mut self, block: &Block, group_keys: &[u32]) -> AggResult<()> {
        let length = block.length();
        check_group_keys_sv(length, group_keys)?;
        validate_all(&self.functions, block)?;
        self.reserve(group_keys[..length].iter().copied().max())?;

        log::trace!("grouping {length} rows (single-value keys)");
        for (function, holder) in self.functions.iter().zip(&mut self.holders) {
            function.aggregate_group_by_sv(length, group_keys, holder, block)?;
        }
        Ok(())
    }

    /// Folds row `r` of `block` into every group listed in `group_keys[r]`.
    pub fn process_mv(&mut self, block: &Block, group_keys: &[Vec<u32>]) -> AggResult<()> {
        let length = block.length();
        check_group_keys_mv(length, group_keys)?;
        validate_all(&self.functions, block)?;
        self.reserve(group_keys[..length].iter().flatten().copied().max())?;

        log::trace!("grouping {length} rows (multi-value keys)");
        for (function, holder) in self.functions.iter().zip(&mut self.holders) {
            function.aggregate_group_by_mv(length, group_keys, holder, block)?;
        }
        Ok(())
    }

    /// One mergeable partial per function for `group_key`, in function order.
    pub fn group_intermediate_results(&self, group_key: u32) -> Vec<IntermediateResult> {
        self.functions
            .iter()
            .zip(&self.holders)
            .map(|(function, holder)| function.extract_group_by_result(holder, group_key))
            .collect()
    }

    /// Final values indexed by group key, then by function.
    pub fn finalize_groups(&self) -> AggResult<Vec<Vec<FinalResult>>> {
        (0..self.num_groups as u32)
            .map(|group_key| {
                self.functions
                    .iter()
                    .zip(self.group_intermediate_results(group_key))
                    .map(|(function, intermediate)| function.extract_final_result(intermediate))
                    .collect::<AggResult<Vec<_>>>()
            })
            .collect()
    }
}
