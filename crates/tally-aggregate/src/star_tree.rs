#![forbid(unsafe_code)]

//! Declarative star-tree index configuration.
//!
//! Only the configuration shape is parsed and validated here; building the tree is the storage
//! layer's job.

use crate::error::{AggResult, AggregationError};
use crate::function::AggregationFunctionType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Used by the storage layer when `maxLeafRecords` is left at 0.
pub const DEFAULT_MAX_LEAF_RECORDS: usize = 10_000;

/// A pre-aggregated metric stored in the star-tree: a function applied to one column.
///
/// Serialized as `<FUNCTION>__<column>`, e.g. `SUM__price` or `COUNT__*`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AggregationFunctionColumnPair {
    function_type: AggregationFunctionType,
    column: String,
}

impl AggregationFunctionColumnPair {
    pub const DELIMITER: &'static str = "__";
    pub const STAR: &'static str = "*";

    pub fn new(function_type: AggregationFunctionType, column: impl Into<String>) -> AggResult<Self> {
        let column = column.into();
        let invalid = |reason: String| {
            AggregationError::InvalidConfig(format!(
                "invalid function column pair {}{}{column}: {reason}",
                function_type.name(),
                Self::DELIMITER
            ))
        };

        match function_type {
            AggregationFunctionType::Count => {
                if column != Self::STAR {
                    return Err(invalid("COUNT is only stored for '*'".to_string()));
                }
            }
            AggregationFunctionType::Min
            | AggregationFunctionType::Max
            | AggregationFunctionType::Sum
            | AggregationFunctionType::Avg
            | AggregationFunctionType::MinMaxRange
            | AggregationFunctionType::DistinctCountHll => {
                if column.is_empty() || column == Self::STAR {
                    return Err(invalid("expects a column name".to_string()));
                }
            }
            other => {
                return Err(invalid(format!(
                    "{other} cannot be pre-aggregated in a star-tree"
                )))
            }
        }

        Ok(Self {
            function_type,
            column,
        })
    }

    pub fn from_column_name(name: &str) -> AggResult<Self> {
        let (function, column) = name.trim().split_once(Self::DELIMITER).ok_or_else(|| {
            AggregationError::InvalidConfig(format!(
                "function column pair '{name}' is missing the '{}' delimiter",
                Self::DELIMITER
            ))
        })?;
        let function_type = AggregationFunctionType::from_name(function).map_err(|_| {
            AggregationError::InvalidConfig(format!(
                "unknown function '{function}' in function column pair '{name}'"
            ))
        })?;
        Self::new(function_type, column)
    }

    pub fn function_type(&self) -> AggregationFunctionType {
        self.function_type
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn to_column_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AggregationFunctionColumnPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.function_type.name(),
            Self::DELIMITER,
            self.column
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StarTreeIndexConfig {
    /// Dimensions in the order the tree splits on them.
    pub dimensions_split_order: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_star_node_creation_for_dimensions: Option<Vec<String>>,
    pub function_column_pairs: Vec<String>,
    /// 0 selects [`DEFAULT_MAX_LEAF_RECORDS`].
    #[serde(default)]
    pub max_leaf_records: usize,
}

impl StarTreeIndexConfig {
    pub fn from_json(json: &str) -> AggResult<Self> {
        let config: StarTreeIndexConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AggResult<()> {
        if self.dimensions_split_order.is_empty() {
            return Err(AggregationError::InvalidConfig(
                "dimensionsSplitOrder must not be empty".to_string(),
            ));
        }
        let mut dimensions = HashSet::new();
        for dimension in &self.dimensions_split_order {
            if !dimensions.insert(dimension.as_str()) {
                return Err(AggregationError::InvalidConfig(format!(
                    "dimension '{dimension}' appears twice in dimensionsSplitOrder"
                )));
            }
        }
        for dimension in self.skip_star_node_creation_for_dimensions.iter().flatten() {
            if !dimensions.contains(dimension.as_str()) {
                return Err(AggregationError::InvalidConfig(format!(
                    "skipStarNodeCreationForDimensions entry '{dimension}' is not in dimensionsSplitOrder"
                )));
            }
        }

        if self.function_column_pairs.is_empty() {
            return Err(AggregationError::InvalidConfig(
                "functionColumnPairs must not be empty".to_string(),
            ));
        }
        self.parsed_function_column_pairs()?;
        Ok(())
    }

    /// Parses `functionColumnPairs`, dropping exact duplicates while keeping first-seen order.
    pub fn parsed_function_column_pairs(&self) -> AggResult<Vec<AggregationFunctionColumnPair>> {
        let mut seen = HashSet::new();
        let mut pairs = Vec::with_capacity(self.function_column_pairs.len());
        for raw in &self.function_column_pairs {
            let pair = AggregationFunctionColumnPair::from_column_name(raw)?;
            if seen.insert(pair.clone()) {
                pairs.push(pair);
            }
        }
        Ok(pairs)
    }

    pub fn effective_max_leaf_records(&self) -> usize {
        if self.max_leaf_records == 0 {
            DEFAULT_MAX_LEAF_RECORDS
        } else {
            self.max_leaf_records
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_names_round_trip() {
        let pair = AggregationFunctionColumnPair::from_column_name("sum__price").unwrap();
        assert_eq!(pair.function_type(), AggregationFunctionType::Sum);
        assert_eq!(pair.column(), "price");
        assert_eq!(pair.to_column_name(), "SUM__price");

        let pair = AggregationFunctionColumnPair::from_column_name("COUNT__*").unwrap();
        assert_eq!(pair.to_string(), "COUNT__*");
    }

    #[test]
    fn unsupported_pairs_are_rejected() {
        for bad in [
            "SUM",
            "MEDIAN__x",
            "PERCENTILE__x",
            "DISTINCTCOUNT__x",
            "SUMMV__x",
            "COUNT__x",
            "MAX__*",
            "MAX__",
        ] {
            assert!(
                AggregationFunctionColumnPair::from_column_name(bad).is_err(),
                "{bad}"
            );
        }
    }

    #[test]
    fn max_leaf_records_defaults() {
        let config = StarTreeIndexConfig::from_json(
            r#"{"dimensionsSplitOrder": ["country"], "functionColumnPairs": ["COUNT__*"]}"#,
        )
        .unwrap();
        assert_eq!(config.max_leaf_records, 0);
        assert_eq!(config.effective_max_leaf_records(), DEFAULT_MAX_LEAF_RECORDS);
        assert_eq!(config.skip_star_node_creation_for_dimensions, None);
    }
}
