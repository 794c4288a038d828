// Command-line tests for the skfuse binary.
//
// Runs the built binary on the graphs under demos/ and checks the emitted
// stages, exit codes and output file handling.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use skfuse::graph::{Graph, OpKind};

fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("compiler crate lives one level below the project root")
        .to_path_buf()
}

fn demo(name: &str) -> PathBuf {
    project_root().join("demos").join(name)
}

fn skfuse(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_skfuse"))
        .args(args)
        .output()
        .expect("failed to spawn skfuse")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

fn scratch(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("skfuse_cli_{}_{}", std::process::id(), name))
}

// ── Emit stages ─────────────────────────────────────────────────────────────

#[test]
fn summary_is_default_emit() {
    let path = demo("two_streams.sgd");
    let out = skfuse(&[path.to_str().unwrap()]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let text = stdout(&out);
    assert!(text.starts_with("graph 'two_streams'"), "{}", text);
    assert!(text.contains("  fused: 1"));
    assert!(text.contains("super_kernel_blk <- 'blk': 2 member(s)"));
}

#[test]
fn emit_scopes_shows_derived_parts() {
    let path = demo("broken_scope.sgd");
    let out = skfuse(&[path.to_str().unwrap(), "--emit", "scopes"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let text = stdout(&out);
    assert!(text.contains("S_0_3: [m1, m2] streams [0] fusable"), "{}", text);
    assert!(text.contains("S_3_5: [m4] streams [0] fusable"), "{}", text);
}

#[test]
fn emit_json_round_trips_through_loader() {
    let path = demo("two_streams.sgd");
    let out = skfuse(&[path.to_str().unwrap(), "--emit", "json"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let graph: Graph = serde_json::from_str(&stdout(&out)).expect("invalid JSON graph");
    graph.validate().unwrap();
    let sk = graph.find("super_kernel_blk").unwrap();
    assert_eq!(graph.get(sk).unwrap().kind(), OpKind::SuperKernel);

    // A fused graph fed back in has nothing left to fuse.
    let json_path = scratch("fused.json");
    std::fs::write(&json_path, stdout(&out)).unwrap();
    let again = skfuse(&[json_path.to_str().unwrap()]);
    let _ = std::fs::remove_file(&json_path);
    assert!(again.status.success(), "stderr: {}", stderr(&again));
    assert!(stdout(&again).contains("  fused: 0"));
}

#[test]
fn emit_dot_and_graph() {
    let path = demo("two_streams.sgd");
    let dot = skfuse(&[path.to_str().unwrap(), "--emit", "dot"]);
    assert!(dot.status.success());
    let dot = stdout(&dot);
    assert!(dot.starts_with("digraph two_streams {"));
    assert!(dot.contains("label=\"super: super_kernel_blk\""));

    let text = skfuse(&[path.to_str().unwrap(), "--emit", "graph"]);
    assert!(text.status.success());
    assert!(stdout(&text).contains("super_kernel_blk"));
}

#[test]
fn build_info_is_stable() {
    let path = demo("two_streams.sgd");
    let a = skfuse(&[path.to_str().unwrap(), "--emit", "build-info"]);
    let b = skfuse(&[path.to_str().unwrap(), "--emit", "build-info"]);
    assert!(a.status.success());
    assert_eq!(stdout(&a), stdout(&b));
    let info: serde_json::Value = serde_json::from_str(&stdout(&a)).unwrap();
    assert_eq!(info["source_hash"].as_str().map(str::len), Some(64));
}

#[test]
fn event_base_flag_reaches_allocator() {
    let source = "\
node a : MatMul (stream = 0, scope = \"S\", fusion = true)
node s : Send (stream = 0, event = 12)
node r : Recv (stream = 1, event = 12)
node z : Relu (stream = 1)
a => s
r => z
";
    let path = scratch("event_base.sgd");
    std::fs::write(&path, source).unwrap();
    let out = skfuse(&[path.to_str().unwrap(), "--emit", "graph", "--event-base", "500"]);
    let _ = std::fs::remove_file(&path);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert!(stdout(&out).contains("signal_500"), "{}", stdout(&out));
}

// ── Output and failures ─────────────────────────────────────────────────────

#[test]
fn output_flag_writes_file() {
    let path = demo("two_streams.sgd");
    let target = scratch("summary.txt");
    let out = skfuse(&[path.to_str().unwrap(), "-o", target.to_str().unwrap()]);
    assert!(out.status.success());
    assert!(stdout(&out).is_empty());
    let written = std::fs::read_to_string(&target).unwrap();
    let _ = std::fs::remove_file(&target);
    assert!(written.starts_with("graph 'two_streams'"));
}

#[test]
fn abort_policy_exits_with_failure() {
    let source = std::fs::read_to_string(demo("broken_scope.sgd"))
        .unwrap()
        .replace(
            "node m1 : Relu (scope = \"S\", fusion = true)",
            "node m1 : Relu (scope = \"S\", fusion = true, options = \"strict-scope-check=abort\")",
        );
    let path = scratch("abort.sgd");
    std::fs::write(&path, source).unwrap();
    let out = skfuse(&[path.to_str().unwrap()]);
    let _ = std::fs::remove_file(&path);
    assert_eq!(out.status.code(), Some(1));
    let err = stderr(&out);
    assert!(err.contains("E0102"), "{}", err);
    assert!(err.contains("check stage failed"), "{}", err);
}

#[test]
fn missing_input_exits_with_io_code() {
    let out = skfuse(&["/nonexistent/graph.sgd"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr(&out).contains("/nonexistent/graph.sgd"));
}

#[test]
fn syntax_error_exits_with_failure() {
    let path = scratch("bad.sgd");
    std::fs::write(&path, "node a : \n").unwrap();
    let out = skfuse(&[path.to_str().unwrap()]);
    let _ = std::fs::remove_file(&path);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("E0300"), "{}", stderr(&out));
}
