use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tally_aggregate::reduce::{finalize, merge_tree};
use tally_aggregate::{
    AggregationFunctionFactory, AggregationFunctionType, Block, BlockBuilder, GroupByExecutor,
    GroupByOptions, IntermediateResult,
};

fn bench_rows() -> usize {
    std::env::var("TALLY_PERCENTILE_BENCH_ROWS")
        .ok()
        .and_then(|v| v.replace('_', "").parse::<usize>().ok())
        .filter(|&v| (10_000..=10_000_000).contains(&v))
        .unwrap_or(1_000_000)
}

/// Deterministic pseudo-random doubles.
fn values(rows: usize) -> Vec<f64> {
    let mut state = 0x2545_F491_4F6C_DD1Du64;
    (0..rows)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state % 1_000_000) as f64 / 100.0
        })
        .collect()
}

fn build_block(rows: usize, groups: u32) -> (Block, Vec<u32>) {
    let mut builder = BlockBuilder::new(rows);
    builder.add_single_value("latency", values(rows)).unwrap();
    let keys = (0..rows as u32).map(|r| r % groups).collect();
    (builder.finish(), keys)
}

fn bench_percentile_finalize(c: &mut Criterion) {
    let rows = bench_rows();
    let f = AggregationFunctionFactory::create(
        AggregationFunctionType::Percentile,
        &["latency", "99"],
    )
    .unwrap();

    let shards: Vec<IntermediateResult> = values(rows)
        .chunks(rows / 16)
        .map(|chunk| IntermediateResult::DoubleList(chunk.to_vec()))
        .collect();

    let mut group = c.benchmark_group("percentile_finalize");
    group.sample_size(10);
    group.throughput(Throughput::Elements(rows as u64));

    group.bench_with_input(BenchmarkId::new("merge_and_finalize", rows), &rows, |b, _| {
        b.iter(|| {
            let merged = merge_tree(f.as_ref(), shards.clone()).unwrap();
            black_box(finalize(f.as_ref(), merged).unwrap());
        })
    });

    let (block, keys) = build_block(rows, 1_000);
    group.bench_with_input(BenchmarkId::new("group_by_1000", rows), &rows, |b, _| {
        b.iter(|| {
            let mut executor = GroupByExecutor::new(vec![f.clone()], &GroupByOptions::default())
                .unwrap();
            executor.process_sv(&block, &keys).unwrap();
            black_box(executor.finalize_groups().unwrap());
        })
    });

    group.finish();
}

criterion_group!(benches, bench_percentile_finalize);
criterion_main!(benches);
