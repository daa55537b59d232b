#![forbid(unsafe_code)]

use crate::error::{AggResult, AggregationError};
use crate::types::IntermediateResult;

/// Accumulator storage for an ungrouped aggregation: one slot for the whole query.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AggregationResultHolder {
    result: Option<IntermediateResult>,
}

impl AggregationResultHolder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn result(&self) -> Option<&IntermediateResult> {
        self.result.as_ref()
    }

    pub fn set_value(&mut self, value: IntermediateResult) {
        self.result = Some(value);
    }

    pub fn result_or_insert_with(
        &mut self,
        init: impl FnOnce() -> IntermediateResult,
    ) -> &mut IntermediateResult {
        self.result.get_or_insert_with(init)
    }
}

/// Accumulator storage for a grouped aggregation, addressed by dense group key.
///
/// Slots live in one arena indexed by group key, so growth may move accumulators in memory but
/// never changes which key they belong to. Capacity doubles on demand up to `max_capacity`;
/// addressing a key past the maximum fails instead of dropping the group.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupByResultHolder {
    results: Vec<Option<IntermediateResult>>,
    max_capacity: usize,
}

impl GroupByResultHolder {
    pub fn new(initial_capacity: usize, max_capacity: usize) -> AggResult<Self> {
        if initial_capacity > max_capacity {
            return Err(AggregationError::Capacity {
                requested: initial_capacity,
                max: max_capacity,
            });
        }
        let mut results = Vec::with_capacity(initial_capacity);
        results.resize_with(initial_capacity, || None);
        Ok(Self {
            results,
            max_capacity,
        })
    }

    /// Number of addressable slots before the next growth.
    pub fn capacity(&self) -> usize {
        self.results.len()
    }

    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Number of group keys that hold an accumulator.
    pub fn num_populated(&self) -> usize {
        self.results.iter().filter(|r| r.is_some()).count()
    }

    /// Make keys `0..capacity` addressable.
    pub fn ensure_capacity(&mut self, capacity: usize) -> AggResult<()> {
        let current = self.results.len();
        if capacity <= current {
            return Ok(());
        }
        if capacity > self.max_capacity {
            log::warn!(
                "group-by result holder cannot grow to {capacity} slots (maximum {})",
                self.max_capacity
            );
            return Err(AggregationError::Capacity {
                requested: capacity,
                max: self.max_capacity,
            });
        }

        let new_capacity = current
            .saturating_mul(2)
            .max(capacity)
            .min(self.max_capacity);
        log::debug!("growing group-by result holder from {current} to {new_capacity} slots");
        self.results.resize_with(new_capacity, || None);
        Ok(())
    }

    pub fn result(&self, group_key: u32) -> Option<&IntermediateResult> {
        self.results.get(group_key as usize)?.as_ref()
    }

    pub fn set_value_for_key(&mut self, group_key: u32, value: IntermediateResult) -> AggResult<()> {
        let idx = group_key as usize;
        self.ensure_capacity(idx + 1)?;
        self.results[idx] = Some(value);
        Ok(())
    }

    pub fn result_or_insert_with(
        &mut self,
        group_key: u32,
        init: impl FnOnce() -> IntermediateResult,
    ) -> AggResult<&mut IntermediateResult> {
        let idx = group_key as usize;
        self.ensure_capacity(idx + 1)?;
        Ok(self.results[idx].get_or_insert_with(init))
    }
}
