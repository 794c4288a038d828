use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use skfuse::build::graph_from_source;
use skfuse::graph::Graph;
use skfuse::pass::StageId;
use skfuse::pipeline::{run_pipeline, FusionConfig, FusionState};

// KPI-aligned benchmark scenarios.
// Every generated graph is valid and fuses under the default policy.

const SINGLE_STREAM: &str = "\
node x : Data
node a : Conv (scope = \"S\", fusion = true)
node b : Relu (scope = \"S\", fusion = true)
node c : Add (scope = \"S\", fusion = true)
node q : Relu
x.0 -> a.0
a.0 -> b.0
b.0 -> c.0
x.0 -> c.1
c.0 -> q.0
";

const TWO_STREAMS: &str = include_str!("../demos/two_streams.sgd");
const BROKEN_SCOPE: &str = include_str!("../demos/broken_scope.sgd");

fn scenarios() -> [(&'static str, &'static str); 3] {
    [
        ("single_stream", SINGLE_STREAM),
        ("two_streams", TWO_STREAMS),
        ("broken_scope", BROKEN_SCOPE),
    ]
}

/// Chain of `n_blocks` two-stream scopes, each with one cross-stream pair.
/// Every third block carries a foreign node that forces a split.
fn generate_blocks(n_blocks: usize) -> String {
    let mut src = String::from("node d : Data (stream = 0)\n");
    let mut edges = String::new();
    let mut prev = "d".to_string();

    for b in 0..n_blocks {
        let ev = b + 1;
        src.push_str(&format!(
            "node a{b} : MatMul (stream = 0, scope = \"blk{b}\", fusion = true)\n\
             node s{b} : Send (stream = 0, event = {ev})\n\
             node r{b} : Recv (stream = 1, event = {ev})\n\
             node c{b} : Relu (stream = 1, scope = \"blk{b}\", fusion = true)\n\
             node t{b} : Relu (stream = 1)\n"
        ));
        edges.push_str(&format!(
            "{prev}.0 -> a{b}.0\na{b}.0 -> c{b}.0\nc{b}.0 -> t{b}.0\na{b} => s{b}\nr{b} => c{b}\n"
        ));
        if b % 3 == 0 {
            src.push_str(&format!(
                "node e{b} : Relu (stream = 0)\n\
                 node g{b} : Add (stream = 0, scope = \"blk{b}\", fusion = true)\n"
            ));
            edges.push_str(&format!("a{b}.0 -> e{b}.0\ne{b}.0 -> g{b}.0\n"));
        }
        prev = format!("t{b}");
    }

    src.push_str(&edges);
    src
}

fn load(source: &str) -> Graph {
    graph_from_source(source).expect("benchmark scenario must build")
}

fn fuse_full(graph: Graph) {
    let mut state = FusionState::new(graph);
    run_pipeline(&mut state, StageId::Refresh, &FusionConfig::default(), |_, _| {})
        .expect("benchmark scenario must fuse");
    black_box(state.graph);
}

// KPI: front-end latency (lex -> parse -> build).
fn bench_kpi_load_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("kpi/load_latency");

    for (name, source) in scenarios() {
        group.bench_with_input(BenchmarkId::from_parameter(name), source, |b, source| {
            b.iter(|| black_box(load(black_box(source))));
        });
    }

    group.finish();
}

// KPI: full pass latency (collect -> check -> split -> fuse -> refresh).
fn bench_kpi_full_fusion_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("kpi/full_fusion_latency");

    for (name, source) in scenarios() {
        let graph = load(source);
        group.bench_with_input(BenchmarkId::from_parameter(name), &graph, |b, graph| {
            b.iter_batched(|| graph.clone(), fuse_full, BatchSize::SmallInput);
        });
    }

    group.finish();
}

// KPI: without certificate checks, to isolate verification overhead.
fn bench_kpi_unverified_latency(c: &mut Criterion) {
    let graph = load(&generate_blocks(32));
    let config = FusionConfig {
        verify: false,
        ..FusionConfig::default()
    };
    c.bench_function("kpi/unverified_latency/32_blocks", |b| {
        b.iter_batched(
            || FusionState::new(graph.clone()),
            |mut state| {
                run_pipeline(&mut state, StageId::Refresh, &config, |_, _| {})
                    .expect("benchmark scenario must fuse");
                black_box(state.graph);
            },
            BatchSize::SmallInput,
        );
    });
}

// KPI: scaling with the number of scopes.
fn bench_kpi_fusion_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("kpi/fusion_scaling");

    for n_blocks in [1usize, 8, 32, 128] {
        let graph = load(&generate_blocks(n_blocks));
        group.bench_with_input(BenchmarkId::from_parameter(n_blocks), &graph, |b, graph| {
            b.iter_batched(|| graph.clone(), fuse_full, BatchSize::SmallInput);
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_kpi_load_latency,
    bench_kpi_full_fusion_latency,
    bench_kpi_unverified_latency,
    bench_kpi_fusion_scaling
);
criterion_main!(benches);
