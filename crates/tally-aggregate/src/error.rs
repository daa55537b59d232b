use crate::function::AggregationFunctionType;
use tally_columnar::BlockError;

pub type AggResult<T> = Result<T, AggregationError>;

#[derive(Debug, thiserror::Error)]
pub enum AggregationError {
    #[error("invalid arguments for {function}: {reason}")]
    InvalidArguments {
        function: AggregationFunctionType,
        reason: String,
    },

    #[error("unknown aggregation function: {0}")]
    UnknownFunction(String),

    #[error(transparent)]
    Block(#[from] BlockError),

    #[error("requested {requested} rows, but only {available} are available")]
    RowCountMismatch { requested: usize, available: usize },

    #[error("group key capacity exceeded: requested {requested}, maximum is {max}")]
    Capacity { requested: usize, max: usize },

    #[error("{function} cannot use a {actual} intermediate result (expected {expected})")]
    IntermediateTypeMismatch {
        function: AggregationFunctionType,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("cannot merge HyperLogLog sketches with log2m {left} and {right}")]
    SketchPrecisionMismatch { left: u8, right: u8 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

impl AggregationError {
    pub(crate) fn invalid_arguments(
        function: AggregationFunctionType,
        reason: impl Into<String>,
    ) -> Self {
        AggregationError::InvalidArguments {
            function,
            reason: reason.into(),
        }
    }
}
