#![forbid(unsafe_code)]

use crate::error::{AggResult, AggregationError};
use serde::{Deserialize, Serialize};

/// Sizing for grouped result holders.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GroupByOptions {
    /// Slots preallocated per holder.
    pub initial_capacity: usize,
    /// Hard limit on the number of distinct group keys per holder.
    pub max_capacity: usize,
}

impl Default for GroupByOptions {
    fn default() -> Self {
        Self {
            initial_capacity: 10_000,
            max_capacity: 100_000,
        }
    }
}

impl GroupByOptions {
    pub fn from_json(json: &str) -> AggResult<Self> {
        let options: GroupByOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> AggResult<()> {
        if self.max_capacity == 0 {
            return Err(AggregationError::InvalidConfig(
                "maxCapacity must be positive".to_string(),
            ));
        }
        if self.initial_capacity > self.max_capacity {
            return Err(AggregationError::InvalidConfig(format!(
                "initialCapacity {} exceeds maxCapacity {}",
                self.initial_capacity, self.max_capacity
            )));
        }
        Ok(())
    }
}
