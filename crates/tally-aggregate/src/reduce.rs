#![forbid(unsafe_code)]

//! Combining partial results from blocks, segments or shards, and finalizing them.
//!
//! Partials are only combined through [`AggregationFunction::merge`], which is commutative and
//! associative, so any merge order produces the same final result.

use crate::error::AggResult;
use crate::function::AggregationFunction;
use crate::types::{FinalResult, IntermediateResult};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Left fold of `partials` starting from the function's empty accumulator.
pub fn merge_intermediate_results<I>(
    function: &dyn AggregationFunction,
    partials: I,
) -> AggResult<IntermediateResult>
where
    I: IntoIterator<Item = IntermediateResult>,
{
    partials
        .into_iter()
        .try_fold(function.empty_intermediate_result(), |acc, partial| {
            function.merge(acc, partial)
        })
}

/// Pairwise tree reduction of `partials`.
///
/// With the `parallel` feature, levels of the tree run on the rayon pool. Returns the empty
/// accumulator when `partials` is empty.
pub fn merge_tree(
    function: &dyn AggregationFunction,
    partials: Vec<IntermediateResult>,
) -> AggResult<IntermediateResult> {
    log::debug!(
        "merging {} partial results for {}",
        partials.len(),
        function.result_column_name()
    );

    #[cfg(feature = "parallel")]
    {
        partials
            .into_par_iter()
            .map(Ok::<_, crate::error::AggregationError>)
            .try_reduce(|| function.empty_intermediate_result(), |a, b| {
                function.merge(a, b)
            })
    }

    #[cfg(not(feature = "parallel"))]
    {
        merge_pairwise(function, partials)
    }
}

#[cfg_attr(feature = "parallel", allow(dead_code))]
fn merge_pairwise(
    function: &dyn AggregationFunction,
    mut level: Vec<IntermediateResult>,
) -> AggResult<IntermediateResult> {
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        let mut partials = level.into_iter();
        while let Some(a) = partials.next() {
            match partials.next() {
                Some(b) => next.push(function.merge(a, b)?),
                None => next.push(a),
            }
        }
        level = next;
    }
    Ok(level
        .pop()
        .unwrap_or_else(|| function.empty_intermediate_result()))
}

/// Converts a fully merged accumulator into the externally visible value. Call once per result.
pub fn finalize(
    function: &dyn AggregationFunction,
    intermediate: IntermediateResult,
) -> AggResult<FinalResult> {
    function.extract_final_result(intermediate)
}
