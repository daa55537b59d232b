//! MIN / MAX and their MV variants.

use crate::error::AggResult;
use crate::function::fold::{double_fold_function, DoubleFold};
use crate::function::AggregationFunctionType;

/// Smallest folded value; `+inf` when nothing was folded.
#[derive(Clone, Debug)]
pub struct MinAggregationFunction(DoubleFold);

impl MinAggregationFunction {
    pub fn new(function_type: AggregationFunctionType, arguments: &[&str]) -> AggResult<Self> {
        DoubleFold::new(function_type, arguments, f64::INFINITY, f64::min).map(Self)
    }
}

double_fold_function!(MinAggregationFunction);

/// Largest folded value; `-inf` when nothing was folded.
#[derive(Clone, Debug)]
pub struct MaxAggregationFunction(DoubleFold);

impl MaxAggregationFunction {
    pub fn new(function_type: AggregationFunctionType, arguments: &[&str]) -> AggResult<Self> {
        DoubleFold::new(function_type, arguments, f64::NEG_INFINITY, f64::max).map(Self)
    }
}

double_fold_function!(MaxAggregationFunction);
