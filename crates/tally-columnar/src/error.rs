pub type BlockResult<T> = Result<T, BlockError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BlockError {
    #[error("type mismatch for column {column}: requested {expected}, column is {actual}")]
    TypeMismatch {
        column: String,
        expected: String,
        actual: String,
    },

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("duplicate column: {0}")]
    DuplicateColumn(String),

    #[error("column length mismatch for {column}: expected {expected} rows, got {actual}")]
    ColumnLengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("multi-value entries for {column} cover {entries} values, but {values} were supplied")]
    MultiValueLengthMismatch {
        column: String,
        entries: usize,
        values: usize,
    },

    #[cfg(feature = "arrow")]
    #[error("unsupported arrow type for column {column}: {data_type}")]
    UnsupportedArrowType { column: String, data_type: String },

    #[cfg(feature = "arrow")]
    #[error("null value in column {column} at row {row}")]
    NullValue { column: String, row: usize },
}
