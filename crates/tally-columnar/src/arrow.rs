//! Arrow interoperability for block sources.
//!
//! Storage layers that already materialize Arrow record batches can hand them to the
//! aggregation core through [`record_batch_to_block`]. Supported column types:
//! - `Int32`, `Int64`, `Float32`, `Float64`, `Utf8` as single-value columns
//! - `List<T>` of the above as multi-value columns
//!
//! Nulls are rejected: default-value substitution belongs to ingestion, not to aggregation.

use crate::{Block, BlockBuilder, BlockError, BlockResult, ColumnValues};
use arrow_array::cast::AsArray;
use arrow_array::types::{Float32Type, Float64Type, Int32Type, Int64Type};
use arrow_array::{Array, RecordBatch};
use arrow_schema::DataType as ArrowDataType;
use std::sync::Arc;

fn reject_nulls(column: &str, array: &dyn Array) -> BlockResult<()> {
    if array.null_count() == 0 {
        return Ok(());
    }
    let row = (0..array.len()).find(|&i| array.is_null(i)).unwrap_or(0);
    Err(BlockError::NullValue {
        column: column.to_string(),
        row,
    })
}

fn column_values(column: &str, array: &dyn Array) -> BlockResult<ColumnValues> {
    reject_nulls(column, array)?;
    match array.data_type() {
        ArrowDataType::Int32 => Ok(ColumnValues::Int(
            array.as_primitive::<Int32Type>().values().to_vec(),
        )),
        ArrowDataType::Int64 => Ok(ColumnValues::Long(
            array.as_primitive::<Int64Type>().values().to_vec(),
        )),
        ArrowDataType::Float32 => Ok(ColumnValues::Float(
            array.as_primitive::<Float32Type>().values().to_vec(),
        )),
        ArrowDataType::Float64 => Ok(ColumnValues::Double(
            array.as_primitive::<Float64Type>().values().to_vec(),
        )),
        ArrowDataType::Utf8 => Ok(ColumnValues::String(
            array
                .as_string::<i32>()
                .iter()
                .map(|v| Arc::<str>::from(v.unwrap_or_default()))
                .collect(),
        )),
        other => Err(BlockError::UnsupportedArrowType {
            column: column.to_string(),
            data_type: other.to_string(),
        }),
    }
}

/// Convert a record batch into a [`Block`], one block column per batch column.
pub fn record_batch_to_block(batch: &RecordBatch) -> BlockResult<Block> {
    let schema = batch.schema();
    let mut builder = BlockBuilder::new(batch.num_rows());

    for (field, array) in schema.fields().iter().zip(batch.columns()) {
        let name = field.name();
        match array.data_type() {
            ArrowDataType::List(_) => {
                reject_nulls(name, array.as_ref())?;
                let list = array.as_list::<i32>();
                let offsets = list.value_offsets();
                let start = offsets.first().copied().unwrap_or(0) as usize;
                let end = offsets.last().copied().unwrap_or(0) as usize;
                let child = list.values().slice(start, end - start);
                let values = column_values(name, child.as_ref())?;
                let lengths: Vec<usize> = offsets
                    .windows(2)
                    .map(|w| (w[1] - w[0]) as usize)
                    .collect();
                builder.add_multi_value(name.as_str(), values, &lengths)?;
            }
            _ => {
                let values = column_values(name, array.as_ref())?;
                builder.add_single_value(name.as_str(), values)?;
            }
        }
    }

    log::trace!(
        "converted record batch with {} rows and {} columns",
        batch.num_rows(),
        batch.num_columns()
    );
    Ok(builder.finish())
}
