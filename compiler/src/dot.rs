// dot.rs — Graphviz DOT output for fused compute graphs
//
// Transforms a `Graph` into DOT format suitable for rendering with `dot`
// or other Graphviz layout engines. Each super node's subgraph becomes a
// nested cluster; signal/wait pairs are drawn as red dashed edges between
// their halves, across nesting levels.
//
// Preconditions: `graph` passes `Graph::validate`.
// Postconditions: returns a valid DOT string representing the graph.
// Failure modes: none (pure string formatting).
// Side effects: none.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::graph::{Graph, Node, OpKind};
use crate::id::{EventId, NodeId};

/// Signal and wait DOT ids recorded per event while walking the hierarchy.
type EventEnds = BTreeMap<EventId, (Vec<String>, Vec<String>)>;

/// Emit the graph (with every nested subgraph) as a Graphviz DOT string.
pub fn emit_dot(graph: &Graph) -> String {
    let mut buf = String::new();
    writeln!(buf, "digraph {} {{", sanitize(&graph.name)).unwrap();
    writeln!(buf, "    rankdir=TB;").unwrap();
    writeln!(buf, "    node [fontname=\"Helvetica\", fontsize=10];").unwrap();
    writeln!(buf, "    edge [fontname=\"Helvetica\", fontsize=9];").unwrap();

    let mut events = EventEnds::new();
    write_graph_contents(&mut buf, graph, "g", "    ", &mut events);

    // Event edges (outside any cluster)
    if !events.is_empty() {
        writeln!(buf).unwrap();
        writeln!(buf, "    // Event edges").unwrap();
        for (event, (signals, waits)) in &events {
            for signal in signals {
                for wait in waits {
                    writeln!(
                        buf,
                        "    {signal} -> {wait} [label=\"ev {event}\", style=dashed, color=red, constraint=false];"
                    )
                    .unwrap();
                }
            }
        }
    }

    writeln!(buf, "}}").unwrap();
    buf
}

// ── Helpers ─────────────────────────────────────────────────────────────────

/// Sanitize a name to valid DOT identifier characters.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Build the DOT node ID: `<prefix>_n<id>`. Prefixes nest with each super node.
fn dot_node_id(prefix: &str, node: NodeId) -> String {
    format!("{prefix}_n{}", node.0)
}

/// Return the node label: name, op type and stream, plus the event id of a
/// signal/wait node.
fn node_label(node: &Node) -> String {
    let mut label = format!(
        "{}\\n{} @{}",
        node.op.name, node.op.op_type, node.op.stream
    );
    if let Some(event) = node.op.attrs.event_id() {
        write!(label, "\\nev {}", event).unwrap();
    }
    label
}

/// Return DOT attributes string for a node.
fn node_attrs(node: &Node) -> String {
    let kind = node.kind();
    let (shape, color) = match kind {
        OpKind::SuperKernel => ("box3d", "gold"),
        OpKind::InnerData | OpKind::InnerNetOutput => ("invhouse", "gray90"),
        OpKind::Data | OpKind::Variable | OpKind::Const => ("cylinder", "lightsalmon"),
        k if k.is_signal() => ("rarrow", "pink"),
        k if k.is_wait() => ("larrow", "pink"),
        _ => ("box", "lightblue"),
    };
    let label = node_label(node);
    format!("shape={shape}, style=filled, fillcolor={color}, label=\"{label}\"")
}

/// Write all nodes, nested clusters and edges of one graph level.
fn write_graph_contents(
    buf: &mut String,
    graph: &Graph,
    prefix: &str,
    indent: &str,
    events: &mut EventEnds,
) {
    // Nodes
    for (id, node) in graph.nodes() {
        let dot_id = dot_node_id(prefix, id);
        writeln!(buf, "{indent}{dot_id} [{}];", node_attrs(node)).unwrap();

        let kind = node.kind();
        if let (true, Some(event)) = (kind.is_sync(), node.op.attrs.event_id()) {
            let ends = events.entry(event).or_default();
            if kind.is_signal() {
                ends.0.push(dot_id.clone());
            } else {
                ends.1.push(dot_id.clone());
            }
        }

        if let Some(sub) = &node.subgraph {
            let inner_prefix = dot_id.clone();
            let inner_indent = format!("{indent}    ");
            writeln!(buf).unwrap();
            writeln!(buf, "{indent}subgraph cluster_{dot_id} {{").unwrap();
            writeln!(buf, "{inner_indent}label=\"super: {}\";", node.op.name).unwrap();
            writeln!(buf, "{inner_indent}style=rounded;").unwrap();
            writeln!(buf, "{inner_indent}color=gray50;").unwrap();
            write_graph_contents(buf, sub, &inner_prefix, &inner_indent, events);
            writeln!(buf, "{indent}}}").unwrap();
        }
    }

    // Edges
    writeln!(buf).unwrap();
    for (src, dst) in graph.data_edges() {
        let from = dot_node_id(prefix, src.node);
        let to = dot_node_id(prefix, dst.node);
        writeln!(
            buf,
            "{indent}{from} -> {to} [taillabel=\"{}\", headlabel=\"{}\"];",
            src.port, dst.port
        )
        .unwrap();
    }
    for (from, to) in graph.control_edges() {
        let from = dot_node_id(prefix, from);
        let to = dot_node_id(prefix, to);
        writeln!(buf, "{indent}{from} -> {to} [style=dotted, arrowhead=empty];").unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::graph_from_source;
    use crate::collect::collect_scopes;
    use crate::fuse::fuse_scopes;
    use crate::id::FRESH_EVENT_BASE;
    use std::collections::HashSet;

    const SRC: &str = "\
node x : Data (stream = 0)
node a : Relu (stream = 0, scope = \"S\", fusion = true)
node s : Send (stream = 0, event = 3)
node r : Recv (stream = 1, event = 3)
node z : Relu (stream = 1)
x.0 -> a.0
a => s
r => z
";

    fn fused_dot(source: &str) -> String {
        let mut g = graph_from_source(source).unwrap();
        let ctx = collect_scopes(&mut g).unwrap().context;
        fuse_scopes(&mut g, &ctx, FRESH_EVENT_BASE).unwrap();
        emit_dot(&g)
    }

    #[test]
    fn valid_dot_structure() {
        let dot = emit_dot(&graph_from_source(SRC).unwrap());
        assert!(dot.starts_with("digraph main {"));
        assert!(dot.trim_end().ends_with('}'));
        assert!(dot.contains("shape=cylinder"), "missing data cylinder shape");
        assert!(dot.contains("shape=rarrow"), "missing signal shape");
        assert!(dot.contains("shape=larrow"), "missing wait shape");
        assert!(dot.contains("style=dotted"), "missing control edge");
    }

    #[test]
    fn super_node_gets_nested_cluster() {
        let dot = fused_dot(SRC);
        assert!(dot.contains("shape=box3d"), "missing super node shape");
        assert!(dot.contains("subgraph cluster_g_n"), "missing super cluster");
        assert!(dot.contains("label=\"super: super_kernel_S\""));
        assert!(dot.contains("shape=invhouse"), "missing placeholder shape");
    }

    #[test]
    fn event_edges_join_pair_halves() {
        let dot = emit_dot(&graph_from_source(SRC).unwrap());
        assert!(dot.contains("// Event edges"));
        assert!(dot.contains("label=\"ev 3\", style=dashed, color=red"));
    }

    #[test]
    fn unique_node_ids() {
        let dot = fused_dot(SRC);
        let node_ids: Vec<&str> = dot
            .lines()
            .filter_map(|line| {
                let trimmed = line.trim();
                if trimmed.contains('[') && trimmed.contains("shape=") {
                    trimmed.split_whitespace().next()
                } else {
                    None
                }
            })
            .collect();
        let unique: HashSet<&&str> = node_ids.iter().collect();
        assert_eq!(
            node_ids.len(),
            unique.len(),
            "duplicate node IDs found: {:?}",
            node_ids
        );
    }

    #[test]
    fn deterministic_output() {
        assert_eq!(fused_dot(SRC), fused_dot(SRC), "DOT output is not deterministic");
    }
}
