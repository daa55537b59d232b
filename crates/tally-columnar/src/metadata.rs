#![forbid(unsafe_code)]

use crate::types::DataType;
use serde::Serialize;

/// Static facts about one column of a block.
///
/// `sorted` and `max_number_of_multi_values` are derived from the values when the column is
/// added to a [`crate::BlockBuilder`]; the index flags are declared by the producer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BlockMetadata {
    /// Number of rows in the block.
    pub length: usize,
    pub data_type: DataType,
    pub single_value: bool,
    /// Values are in non-decreasing row order. Always `false` for multi-value columns.
    pub sorted: bool,
    pub has_dictionary: bool,
    pub has_inverted_index: bool,
    pub sparse: bool,
    /// Largest number of entries in any row; `1` for single-value columns.
    pub max_number_of_multi_values: usize,
}

impl BlockMetadata {
    pub(crate) fn single_value(length: usize, data_type: DataType, sorted: bool) -> Self {
        Self {
            length,
            data_type,
            single_value: true,
            sorted,
            has_dictionary: false,
            has_inverted_index: false,
            sparse: false,
            max_number_of_multi_values: 1,
        }
    }

    pub(crate) fn multi_value(length: usize, data_type: DataType, max_entries: usize) -> Self {
        Self {
            length,
            data_type,
            single_value: false,
            sorted: false,
            has_dictionary: false,
            has_inverted_index: false,
            sparse: false,
            max_number_of_multi_values: max_entries,
        }
    }
}
