// Snapshot tests for the textual reports of a full fusion run.
//
// Uses insta inline snapshots over the demo graphs. Run
// `cargo insta review` after an intentional report change.

use std::path::Path;

use skfuse::pass::StageId;
use skfuse::pipeline::{load_graph, render_scopes, render_summary, run_pipeline};
use skfuse::pipeline::{FusionConfig, FusionState};

const TWO_STREAMS: &str = include_str!("../../demos/two_streams.sgd");
const BROKEN_SCOPE: &str = include_str!("../../demos/broken_scope.sgd");

fn run(file: &str, source: &str, terminal: StageId) -> FusionState {
    let graph = load_graph(Path::new(file), source).unwrap();
    let mut state = FusionState::new(graph);
    run_pipeline(&mut state, terminal, &FusionConfig::default(), |_, _| {}).unwrap();
    state
}

#[test]
fn snapshot_two_streams_summary() {
    let state = run("two_streams.sgd", TWO_STREAMS, StageId::Refresh);
    insta::assert_snapshot!(render_summary(&state).trim_end(), @r"
    graph 'two_streams'
      stripped: 0
      splits: 0
      fused: 1
        super_kernel_blk <- 'blk': 2 member(s), 2 in, 1 out, stream 0, events -2 +0
      topo ids: 9
    ");
}

#[test]
fn snapshot_broken_scope_summary() {
    let state = run("broken_scope.sgd", BROKEN_SCOPE, StageId::Refresh);
    insta::assert_snapshot!(render_summary(&state).trim_end(), @r"
    graph 'broken_scope'
      stripped: 0
      splits: 1
        S -> S_0_3, S_3_5
      fused: 2
        super_kernel_S_0_3 <- 'S_0_3': 2 member(s), 1 in, 1 out, stream 0, events -0 +0
        super_kernel_S_3_5 <- 'S_3_5': 1 member(s), 1 in, 0 out, stream 0, events -0 +0
      topo ids: 10
    ");
}

#[test]
fn snapshot_two_streams_scopes() {
    let state = run("two_streams.sgd", TWO_STREAMS, StageId::Split);
    insta::assert_snapshot!(render_scopes(&state).trim_end(), @"blk: [mm, act] streams [0, 1] fusable");
}
