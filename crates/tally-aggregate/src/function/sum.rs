//! SUM / SUMMV.

use crate::error::AggResult;
use crate::function::fold::{double_fold_function, DoubleFold};
use crate::function::AggregationFunctionType;

/// Sum of every folded value as a double; `0.0` when nothing was folded.
#[derive(Clone, Debug)]
pub struct SumAggregationFunction(DoubleFold);

impl SumAggregationFunction {
    pub fn new(function_type: AggregationFunctionType, arguments: &[&str]) -> AggResult<Self> {
        DoubleFold::new(function_type, arguments, 0.0, |a, b| a + b).map(Self)
    }
}

double_fold_function!(SumAggregationFunction);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::AggregationFunction;
    use crate::types::{FinalResult, IntermediateResult};
    use tally_columnar::BlockBuilder;

    #[test]
    fn sums_single_and_multi_value_columns() {
        let mut builder = BlockBuilder::new(3);
        builder.add_single_value("x", vec![1i64, 2, 3]).unwrap();
        builder
            .add_multi_value_rows("tags", vec![vec![1.5f32], vec![], vec![2.5, 3.0]])
            .unwrap();
        let block = builder.finish();

        let sum = SumAggregationFunction::new(AggregationFunctionType::Sum, &["x"]).unwrap();
        let mut holder = sum.create_aggregation_result_holder();
        sum.aggregate(3, &mut holder, &block).unwrap();
        assert_eq!(sum.extract_aggregation_result(&holder), IntermediateResult::Double(6.0));

        let sum_mv =
            SumAggregationFunction::new(AggregationFunctionType::SumMv, &["tags"]).unwrap();
        let mut holder = sum_mv.create_aggregation_result_holder();
        sum_mv.aggregate(3, &mut holder, &block).unwrap();
        assert_eq!(
            sum_mv
                .extract_final_result(sum_mv.extract_aggregation_result(&holder))
                .unwrap(),
            FinalResult::Double(7.0)
        );
    }

    #[test]
    fn empty_sum_is_zero() {
        let sum = SumAggregationFunction::new(AggregationFunctionType::Sum, &["x"]).unwrap();
        let holder = sum.create_aggregation_result_holder();
        assert_eq!(sum.extract_aggregation_result(&holder), IntermediateResult::Double(0.0));
        assert_eq!(sum.column_name(), "SUM_x");
        assert_eq!(sum.result_column_name(), "sum(x)");
    }

    #[test]
    fn sum_rejects_string_columns() {
        let mut builder = BlockBuilder::new(1);
        builder.add_single_value("s", vec!["a"]).unwrap();
        let block = builder.finish();

        let sum = SumAggregationFunction::new(AggregationFunctionType::Sum, &["s"]).unwrap();
        assert!(sum.validate_block(&block).is_err());
    }
}
