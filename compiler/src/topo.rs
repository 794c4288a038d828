// topo.rs — Topological id refresher
//
// Assigns dense execution-order ids across the root graph in listing order.
// A node owning a subgraph is immediately followed by the subgraph's nodes,
// numbered recursively, before the walk continues at the parent level.
//
// Preconditions: none.
// Postconditions: ids over the whole hierarchy are exactly `0..N`.
// Failure modes: none.
// Side effects: rewrites `topo_id` of every node.

use crate::graph::Graph;

/// Renumber every node of `graph` and its nested subgraphs. Returns the
/// number of ids assigned.
pub fn refresh_topo_ids(graph: &mut Graph) -> usize {
    let mut next = 0i64;
    renumber(graph, &mut next);
    next as usize
}

fn renumber(graph: &mut Graph, next: &mut i64) {
    let order = graph.order().to_vec();
    for id in order {
        let Some(node) = graph.node_mut(id) else {
            continue;
        };
        node.op.topo_id = *next;
        *next += 1;
        if let Some(sub) = node.subgraph.as_deref_mut() {
            renumber(sub, next);
        }
    }
}

/// Every topo id in the hierarchy, in walk order.
pub fn collect_topo_ids(graph: &Graph) -> Vec<i64> {
    let mut ids = Vec::with_capacity(graph.total_len());
    walk(graph, &mut ids);
    ids
}

fn walk(graph: &Graph, ids: &mut Vec<i64>) {
    for (_, node) in graph.nodes() {
        ids.push(node.op.topo_id);
        if let Some(sub) = &node.subgraph {
            walk(sub, ids);
        }
    }
}
