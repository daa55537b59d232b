#![forbid(unsafe_code)]

use crate::error::{BlockError, BlockResult};
use crate::metadata::BlockMetadata;
use crate::types::{ColumnValues, DataType};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

/// Row view over a flattened multi-value column.
///
/// `offsets` has `rows + 1` entries; row `r` spans `values[offsets[r]..offsets[r + 1]]`.
#[derive(Clone, Debug, PartialEq)]
pub struct MultiValues<'a, T: Clone> {
    values: Cow<'a, [T]>,
    offsets: &'a [usize],
}

impl<'a, T: Clone> MultiValues<'a, T> {
    pub fn num_rows(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Entries of one row. Panics if `row >= num_rows()`, like slice indexing.
    pub fn row(&self, row: usize) -> &[T] {
        &self.values[self.offsets[row]..self.offsets[row + 1]]
    }

    pub fn num_entries(&self, row: usize) -> usize {
        self.offsets[row + 1] - self.offsets[row]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[T]> + '_ {
        self.offsets
            .windows(2)
            .map(move |w| &self.values[w[0]..w[1]])
    }

    /// Every entry of every row, in row order.
    pub fn flat_values(&self) -> &[T] {
        &self.values
    }
}

/// One column of a [`Block`]: flattened values, optional multi-value offsets and metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockValSet {
    name: String,
    metadata: BlockMetadata,
    values: ColumnValues,
    offsets: Option<Vec<usize>>,
}

fn describe(data_type: DataType, single_value: bool) -> String {
    if single_value {
        data_type.name().to_string()
    } else {
        format!("{} (multi-value)", data_type.name())
    }
}

impl BlockValSet {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metadata(&self) -> &BlockMetadata {
        &self.metadata
    }

    pub fn data_type(&self) -> DataType {
        self.metadata.data_type
    }

    pub fn is_single_value(&self) -> bool {
        self.metadata.single_value
    }

    pub fn set_has_dictionary(&mut self, value: bool) -> &mut Self {
        self.metadata.has_dictionary = value;
        self
    }

    pub fn set_has_inverted_index(&mut self, value: bool) -> &mut Self {
        self.metadata.has_inverted_index = value;
        self
    }

    pub fn set_sparse(&mut self, value: bool) -> &mut Self {
        self.metadata.sparse = value;
        self
    }

    fn mismatch(&self, expected: impl Into<String>) -> BlockError {
        BlockError::TypeMismatch {
            column: self.name.clone(),
            expected: expected.into(),
            actual: describe(self.metadata.data_type, self.metadata.single_value),
        }
    }

    pub fn int_values_sv(&self) -> BlockResult<&[i32]> {
        match (&self.values, &self.offsets) {
            (ColumnValues::Int(v), None) => Ok(v.as_slice()),
            _ => Err(self.mismatch(describe(DataType::Int, true))),
        }
    }

    pub fn long_values_sv(&self) -> BlockResult<&[i64]> {
        match (&self.values, &self.offsets) {
            (ColumnValues::Long(v), None) => Ok(v.as_slice()),
            _ => Err(self.mismatch(describe(DataType::Long, true))),
        }
    }

    pub fn float_values_sv(&self) -> BlockResult<&[f32]> {
        match (&self.values, &self.offsets) {
            (ColumnValues::Float(v), None) => Ok(v.as_slice()),
            _ => Err(self.mismatch(describe(DataType::Float, true))),
        }
    }

    pub fn double_values_sv(&self) -> BlockResult<&[f64]> {
        match (&self.values, &self.offsets) {
            (ColumnValues::Double(v), None) => Ok(v.as_slice()),
            _ => Err(self.mismatch(describe(DataType::Double, true))),
        }
    }

    pub fn string_values_sv(&self) -> BlockResult<&[Arc<str>]> {
        match (&self.values, &self.offsets) {
            (ColumnValues::String(v), None) => Ok(v.as_slice()),
            _ => Err(self.mismatch(describe(DataType::String, true))),
        }
    }

    pub fn int_values_mv(&self) -> BlockResult<MultiValues<'_, i32>> {
        match (&self.values, &self.offsets) {
            (ColumnValues::Int(v), Some(offsets)) => Ok(MultiValues {
                values: Cow::Borrowed(v.as_slice()),
                offsets,
            }),
            _ => Err(self.mismatch(describe(DataType::Int, false))),
        }
    }

    pub fn long_values_mv(&self) -> BlockResult<MultiValues<'_, i64>> {
        match (&self.values, &self.offsets) {
            (ColumnValues::Long(v), Some(offsets)) => Ok(MultiValues {
                values: Cow::Borrowed(v.as_slice()),
                offsets,
            }),
            _ => Err(self.mismatch(describe(DataType::Long, false))),
        }
    }

    pub fn float_values_mv(&self) -> BlockResult<MultiValues<'_, f32>> {
        match (&self.values, &self.offsets) {
            (ColumnValues::Float(v), Some(offsets)) => Ok(MultiValues {
                values: Cow::Borrowed(v.as_slice()),
                offsets,
            }),
            _ => Err(self.mismatch(describe(DataType::Float, false))),
        }
    }

    pub fn double_values_mv(&self) -> BlockResult<MultiValues<'_, f64>> {
        match (&self.values, &self.offsets) {
            (ColumnValues::Double(v), Some(offsets)) => Ok(MultiValues {
                values: Cow::Borrowed(v.as_slice()),
                offsets,
            }),
            _ => Err(self.mismatch(describe(DataType::Double, false))),
        }
    }

    pub fn string_values_mv(&self) -> BlockResult<MultiValues<'_, Arc<str>>> {
        match (&self.values, &self.offsets) {
            (ColumnValues::String(v), Some(offsets)) => Ok(MultiValues {
                values: Cow::Borrowed(v.as_slice()),
                offsets,
            }),
            _ => Err(self.mismatch(describe(DataType::String, false))),
        }
    }

    /// Per-row entry counts of a multi-value column.
    pub fn num_mv_entries(&self) -> BlockResult<Vec<usize>> {
        match &self.offsets {
            Some(offsets) => Ok(offsets.windows(2).map(|w| w[1] - w[0]).collect()),
            None => Err(self.mismatch(format!("{} (multi-value)", self.metadata.data_type))),
        }
    }

    fn widened(&self) -> Option<Cow<'_, [f64]>> {
        match &self.values {
            ColumnValues::Double(v) => Some(Cow::Borrowed(v.as_slice())),
            ColumnValues::Int(v) => Some(Cow::Owned(v.iter().map(|&x| f64::from(x)).collect())),
            ColumnValues::Long(v) => Some(Cow::Owned(v.iter().map(|&x| x as f64).collect())),
            ColumnValues::Float(v) => Some(Cow::Owned(v.iter().map(|&x| f64::from(x)).collect())),
            ColumnValues::String(_) => None,
        }
    }

    /// Single-value numeric column read as doubles. Borrows DOUBLE columns; converts the rest.
    pub fn to_double_values_sv(&self) -> BlockResult<Cow<'_, [f64]>> {
        if self.offsets.is_some() {
            return Err(self.mismatch("numeric"));
        }
        self.widened().ok_or_else(|| self.mismatch("numeric"))
    }

    /// Multi-value numeric column read as doubles.
    pub fn to_double_values_mv(&self) -> BlockResult<MultiValues<'_, f64>> {
        let Some(offsets) = &self.offsets else {
            return Err(self.mismatch("numeric (multi-value)"));
        };
        let values = self
            .widened()
            .ok_or_else(|| self.mismatch("numeric (multi-value)"))?;
        Ok(MultiValues { values, offsets })
    }
}

/// An immutable batch of `length` rows over a set of named columns.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    length: usize,
    columns: Vec<BlockValSet>,
    column_index: HashMap<String, usize>,
}

impl Block {
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn contains_column(&self, column: &str) -> bool {
        self.column_index.contains_key(column)
    }

    pub fn val_set(&self, column: &str) -> BlockResult<&BlockValSet> {
        self.column_index
            .get(column)
            .and_then(|&idx| self.columns.get(idx))
            .ok_or_else(|| BlockError::UnknownColumn(column.to_string()))
    }

    pub fn metadata(&self, column: &str) -> BlockResult<&BlockMetadata> {
        Ok(self.val_set(column)?.metadata())
    }
}

/// Assembles a [`Block`] column by column, checking every column against the row count.
pub struct BlockBuilder {
    length: usize,
    columns: Vec<BlockValSet>,
    column_index: HashMap<String, usize>,
}

impl BlockBuilder {
    pub fn new(length: usize) -> Self {
        Self {
            length,
            columns: Vec::new(),
            column_index: HashMap::new(),
        }
    }

    fn push(&mut self, column: BlockValSet) -> &mut BlockValSet {
        let idx = self.columns.len();
        self.column_index.insert(column.name.clone(), idx);
        self.columns.push(column);
        &mut self.columns[idx]
    }

    fn check_new(&self, name: &str) -> BlockResult<()> {
        if self.column_index.contains_key(name) {
            return Err(BlockError::DuplicateColumn(name.to_string()));
        }
        Ok(())
    }

    pub fn add_single_value(
        &mut self,
        name: impl Into<String>,
        values: impl Into<ColumnValues>,
    ) -> BlockResult<&mut BlockValSet> {
        let name = name.into();
        let values = values.into();
        self.check_new(&name)?;
        if values.len() != self.length {
            return Err(BlockError::ColumnLengthMismatch {
                column: name,
                expected: self.length,
                actual: values.len(),
            });
        }

        let metadata =
            BlockMetadata::single_value(self.length, values.data_type(), values.is_sorted());
        Ok(self.push(BlockValSet {
            name,
            metadata,
            values,
            offsets: None,
        }))
    }

    /// Adds a multi-value column from flattened `values` plus the entry count of every row.
    pub fn add_multi_value(
        &mut self,
        name: impl Into<String>,
        values: impl Into<ColumnValues>,
        lengths: &[usize],
    ) -> BlockResult<&mut BlockValSet> {
        let name = name.into();
        let values = values.into();
        self.check_new(&name)?;
        if lengths.len() != self.length {
            return Err(BlockError::ColumnLengthMismatch {
                column: name,
                expected: self.length,
                actual: lengths.len(),
            });
        }

        let mut offsets = Vec::with_capacity(lengths.len() + 1);
        offsets.push(0usize);
        let mut total = 0usize;
        for len in lengths {
            total += len;
            offsets.push(total);
        }
        if total != values.len() {
            return Err(BlockError::MultiValueLengthMismatch {
                column: name,
                entries: total,
                values: values.len(),
            });
        }

        let max_entries = lengths.iter().copied().max().unwrap_or(0);
        let metadata = BlockMetadata::multi_value(self.length, values.data_type(), max_entries);
        Ok(self.push(BlockValSet {
            name,
            metadata,
            values,
            offsets: Some(offsets),
        }))
    }

    /// Adds a multi-value column given as one `Vec` per row.
    pub fn add_multi_value_rows<T>(
        &mut self,
        name: impl Into<String>,
        rows: Vec<Vec<T>>,
    ) -> BlockResult<&mut BlockValSet>
    where
        Vec<T>: Into<ColumnValues>,
    {
        let lengths: Vec<usize> = rows.iter().map(Vec::len).collect();
        let flat: Vec<T> = rows.into_iter().flatten().collect();
        self.add_multi_value(name, flat, &lengths)
    }

    pub fn finish(self) -> Block {
        log::trace!(
            "built block with {} rows and {} columns",
            self.length,
            self.columns.len()
        );
        Block {
            length: self.length,
            columns: self.columns,
            column_index: self.column_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block() -> Block {
        let mut builder = BlockBuilder::new(3);
        builder.add_single_value("x", vec![1, 2, 3]).unwrap();
        builder
            .add_multi_value_rows("tags", vec![vec![1.5, 2.5], vec![], vec![4.0]])
            .unwrap();
        builder.finish()
    }

    #[test]
    fn multi_value_rows_and_entry_counts() {
        let block = sample_block();
        let tags = block.val_set("tags").unwrap();
        let mv = tags.double_values_mv().unwrap();

        assert_eq!(mv.num_rows(), 3);
        assert_eq!(mv.row(0), &[1.5, 2.5]);
        assert!(mv.row(1).is_empty());
        assert_eq!(mv.rows().count(), 3);
        assert_eq!(tags.num_mv_entries().unwrap(), vec![2, 0, 1]);
        assert_eq!(tags.metadata().max_number_of_multi_values, 2);
        assert!(!tags.metadata().single_value);
    }

    #[test]
    fn strict_accessors_reject_other_types_and_arity() {
        let block = sample_block();
        let x = block.val_set("x").unwrap();

        assert_eq!(x.int_values_sv().unwrap(), &[1, 2, 3]);
        assert!(matches!(
            x.long_values_sv(),
            Err(BlockError::TypeMismatch { .. })
        ));
        assert!(matches!(x.int_values_mv(), Err(BlockError::TypeMismatch { .. })));
        assert!(x.num_mv_entries().is_err());

        let tags = block.val_set("tags").unwrap();
        assert!(tags.double_values_sv().is_err());
        assert!(tags.to_double_values_sv().is_err());
    }

    #[test]
    fn widening_borrows_doubles_and_converts_ints() {
        let block = sample_block();
        let widened = block.val_set("x").unwrap().to_double_values_sv().unwrap();
        assert!(matches!(widened, Cow::Owned(_)));
        assert_eq!(&*widened, &[1.0, 2.0, 3.0]);

        let mv = block.val_set("tags").unwrap().to_double_values_mv().unwrap();
        assert_eq!(mv.flat_values(), &[1.5, 2.5, 4.0]);
    }

    #[test]
    fn builder_validates_lengths_and_duplicates() {
        let mut builder = BlockBuilder::new(2);
        assert!(matches!(
            builder.add_single_value("a", vec![1i64]),
            Err(BlockError::ColumnLengthMismatch { expected: 2, actual: 1, .. })
        ));
        builder.add_single_value("a", vec![1i64, 2]).unwrap();
        assert!(matches!(
            builder.add_single_value("a", vec![3i64, 4]),
            Err(BlockError::DuplicateColumn(_))
        ));
        assert!(matches!(
            builder.add_multi_value("m", vec![1, 2, 3], &[1, 1]),
            Err(BlockError::MultiValueLengthMismatch { entries: 2, values: 3, .. })
        ));
    }

    #[test]
    fn unknown_column_is_reported() {
        let block = sample_block();
        assert_eq!(
            block.val_set("nope"),
            Err(BlockError::UnknownColumn("nope".to_string()))
        );
    }
}
