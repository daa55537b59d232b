use proptest::prelude::*;
use tally_aggregate::reduce::{finalize, merge_tree};
use tally_aggregate::{
    AggregationFunction, AggregationFunctionFactory, AggregationFunctionRef,
    AggregationFunctionType, Block, BlockBuilder, GroupByExecutor, GroupByOptions,
    IntermediateResult,
};

fn block_of(values: &[i32]) -> Block {
    let mut builder = BlockBuilder::new(values.len());
    builder.add_single_value("v", values.to_vec()).unwrap();
    builder.finish()
}

fn functions() -> Vec<AggregationFunctionRef> {
    use AggregationFunctionType as T;
    let cases: [(T, &[&str]); 11] = [
        (T::Count, &["*"]),
        (T::Sum, &["v"]),
        (T::Min, &["v"]),
        (T::Max, &["v"]),
        (T::Avg, &["v"]),
        (T::MinMaxRange, &["v"]),
        (T::DistinctCount, &["v"]),
        (T::DistinctCountHll, &["v", "6"]),
        (T::Percentile, &["v", "50"]),
        (T::Percentile, &["v", "99.5"]),
        (T::Percentile, &["v", "100"]),
    ];
    cases
        .into_iter()
        .map(|(t, args)| AggregationFunctionFactory::create(t, args).unwrap())
        .collect()
}

fn partial(function: &dyn AggregationFunction, values: &[i32]) -> IntermediateResult {
    let block = block_of(values);
    let mut holder = function.create_aggregation_result_holder();
    function.aggregate(values.len(), &mut holder, &block).unwrap();
    function.extract_aggregation_result(&holder)
}

fn values() -> impl Strategy<Value = Vec<i32>> {
    proptest::collection::vec(-1000i32..1000, 0..48)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        failure_persistence: None,
        .. ProptestConfig::default()
    })]

    #[test]
    fn split_blocks_finalize_like_one_block(
        values in values(),
        cut_a in 0usize..48,
        cut_b in 0usize..48,
    ) {
        let n = values.len();
        let (a, b) = (cut_a.min(n).min(cut_b.min(n)), cut_a.min(n).max(cut_b.min(n)));
        for f in functions() {
            let whole = finalize(f.as_ref(), partial(f.as_ref(), &values)).unwrap();
            let parts = vec![
                partial(f.as_ref(), &values[..a]),
                partial(f.as_ref(), &values[a..b]),
                partial(f.as_ref(), &values[b..]),
            ];
            let merged = merge_tree(f.as_ref(), parts).unwrap();
            prop_assert_eq!(finalize(f.as_ref(), merged).unwrap(), whole, "{}", f.column_name());
        }
    }

    #[test]
    fn merge_is_commutative_and_associative(a in values(), b in values(), c in values()) {
        for f in functions() {
            let f = f.as_ref();
            let (pa, pb, pc) = (partial(f, &a), partial(f, &b), partial(f, &c));

            let ab = f.merge(pa.clone(), pb.clone()).unwrap();
            let ba = f.merge(pb.clone(), pa.clone()).unwrap();
            prop_assert_eq!(
                finalize(f, ab.clone()).unwrap(),
                finalize(f, ba).unwrap(),
                "{}",
                f.column_name()
            );

            let left = f.merge(ab, pc.clone()).unwrap();
            let right = f.merge(pa, f.merge(pb, pc).unwrap()).unwrap();
            prop_assert_eq!(
                finalize(f, left).unwrap(),
                finalize(f, right).unwrap(),
                "{}",
                f.column_name()
            );
        }
    }

    #[test]
    fn percentile_selects_the_floor_rank(
        values in proptest::collection::vec(-1000i32..1000, 1..64),
        p in 0u32..=100,
    ) {
        let p_arg = p.to_string();
        let f = AggregationFunctionFactory::create(
            AggregationFunctionType::Percentile,
            &["v", p_arg.as_str()],
        )
        .unwrap();
        let mut sorted = values.clone();
        sorted.sort_unstable();
        let expected = if p == 100 {
            sorted[sorted.len() - 1]
        } else {
            sorted[sorted.len() * p as usize / 100]
        };

        let actual = finalize(f.as_ref(), partial(f.as_ref(), &values)).unwrap().as_f64();
        prop_assert_eq!(actual, f64::from(expected));
        prop_assert!(actual <= f64::from(sorted[sorted.len() - 1]));
    }

    #[test]
    fn fractional_percentile_selects_the_exact_floor_rank(
        n in 1usize..2000,
        tenths in 0u32..1000,
    ) {
        let p_arg = format!("{}.{}", tenths / 10, tenths % 10);
        let f = AggregationFunctionFactory::create(
            AggregationFunctionType::Percentile,
            &["v", p_arg.as_str()],
        )
        .unwrap();
        // Rank floor(n * tenths / 1000) over the values 0..n, reversed so selection has work to do.
        let expected = (n * tenths as usize / 1000) as f64;
        let values: Vec<f64> = (0..n).rev().map(|v| v as f64).collect();

        let actual = finalize(f.as_ref(), IntermediateResult::DoubleList(values)).unwrap().as_f64();
        prop_assert_eq!(actual, expected, "n={} p={}", n, p_arg);
    }

    #[test]
    fn holder_growth_does_not_change_group_results(
        rows in proptest::collection::vec((0u32..200, -1000i32..1000), 0..96),
        block_rows in 1usize..17,
    ) {
        let (keys, values): (Vec<u32>, Vec<i32>) = rows.into_iter().unzip();

        // Starting at capacity 1 and feeding small blocks forces growth while earlier groups
        // already hold accumulators; keys first appear in random order.
        let mut grown = GroupByExecutor::new(
            functions(),
            &GroupByOptions { initial_capacity: 1, max_capacity: 256 },
        )
        .unwrap();
        for (key_chunk, value_chunk) in keys.chunks(block_rows).zip(values.chunks(block_rows)) {
            grown.process_sv(&block_of(value_chunk), key_chunk).unwrap();
        }

        let mut presized = GroupByExecutor::new(
            functions(),
            &GroupByOptions { initial_capacity: 256, max_capacity: 256 },
        )
        .unwrap();
        presized.process_sv(&block_of(&values), &keys).unwrap();

        prop_assert_eq!(grown.num_groups(), presized.num_groups());
        prop_assert_eq!(grown.finalize_groups().unwrap(), presized.finalize_groups().unwrap());
    }
}
