#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Stored (physical) type of a block column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    Int,
    Long,
    Float,
    Double,
    String,
}

impl DataType {
    pub fn name(self) -> &'static str {
        match self {
            DataType::Int => "INT",
            DataType::Long => "LONG",
            DataType::Float => "FLOAT",
            DataType::Double => "DOUBLE",
            DataType::String => "STRING",
        }
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, DataType::String)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Flattened values of one block column.
///
/// For multi-value columns this holds every entry of every row back to back; row boundaries
/// live next to it in the owning [`crate::BlockValSet`].
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnValues {
    Int(Vec<i32>),
    Long(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    String(Vec<Arc<str>>),
}

impl ColumnValues {
    pub fn data_type(&self) -> DataType {
        match self {
            ColumnValues::Int(_) => DataType::Int,
            ColumnValues::Long(_) => DataType::Long,
            ColumnValues::Float(_) => DataType::Float,
            ColumnValues::Double(_) => DataType::Double,
            ColumnValues::String(_) => DataType::String,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Int(v) => v.len(),
            ColumnValues::Long(v) => v.len(),
            ColumnValues::Float(v) => v.len(),
            ColumnValues::Double(v) => v.len(),
            ColumnValues::String(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the values are in non-decreasing order. NaN breaks ordering.
    pub(crate) fn is_sorted(&self) -> bool {
        fn non_decreasing<T: PartialOrd>(values: &[T]) -> bool {
            values.windows(2).all(|w| w[0] <= w[1])
        }

        match self {
            ColumnValues::Int(v) => non_decreasing(v),
            ColumnValues::Long(v) => non_decreasing(v),
            ColumnValues::Float(v) => non_decreasing(v),
            ColumnValues::Double(v) => non_decreasing(v),
            ColumnValues::String(v) => non_decreasing(v),
        }
    }
}

impl From<Vec<i32>> for ColumnValues {
    fn from(values: Vec<i32>) -> Self {
        ColumnValues::Int(values)
    }
}

impl From<Vec<i64>> for ColumnValues {
    fn from(values: Vec<i64>) -> Self {
        ColumnValues::Long(values)
    }
}

impl From<Vec<f32>> for ColumnValues {
    fn from(values: Vec<f32>) -> Self {
        ColumnValues::Float(values)
    }
}

impl From<Vec<f64>> for ColumnValues {
    fn from(values: Vec<f64>) -> Self {
        ColumnValues::Double(values)
    }
}

impl From<Vec<Arc<str>>> for ColumnValues {
    fn from(values: Vec<Arc<str>>) -> Self {
        ColumnValues::String(values)
    }
}

impl From<Vec<&str>> for ColumnValues {
    fn from(values: Vec<&str>) -> Self {
        ColumnValues::String(values.into_iter().map(Arc::from).collect())
    }
}
