// verify.rs — Postcondition certificates for the fusion stages
//
// Each stage that rewrites the graph has a certificate: a set of boolean
// obligations recomputed from the artifacts after the stage ran. The
// pipeline turns a failed obligation into an error diagnostic.
//
// Preconditions: artifacts of the certified stage are populated.
// Postconditions: every obligation is a pure function of its inputs.
// Failure modes: none (a broken artifact yields `false`, never a panic).
// Side effects: none.

use std::collections::{BTreeMap, BTreeSet};

use crate::collect::ScopeContext;
use crate::fuse::FusionOutcome;
use crate::graph::{Graph, OpKind};
use crate::id::{EventId, NodeId};
use crate::options::StrictPolicy;
use crate::topo::collect_topo_ids;

// ── Split certificate ───────────────────────────────────────────────────────

/// Evidence that every scope handed to the engine is contiguous (C1).
#[derive(Debug, Clone)]
pub struct SplitCert {
    /// C1: every non-bypass scope has only members or pass-through nodes
    /// between its first and last member on each stream.
    pub c1_scopes_contiguous: bool,
}

impl crate::pass::StageCert for SplitCert {
    fn all_pass(&self) -> bool {
        self.c1_scopes_contiguous
    }

    fn obligations(&self) -> Vec<(&'static str, bool)> {
        vec![("C1_scopes_contiguous", self.c1_scopes_contiguous)]
    }
}

pub fn verify_split(graph: &Graph, ctx: &ScopeContext) -> SplitCert {
    SplitCert {
        c1_scopes_contiguous: verify_c1_contiguous(graph, ctx),
    }
}

fn verify_c1_contiguous(graph: &Graph, ctx: &ScopeContext) -> bool {
    for (scope, members) in &ctx.scopes {
        if ctx.policy(scope) == StrictPolicy::Bypass {
            continue;
        }
        if !scope_is_contiguous(graph, members) {
            return false;
        }
    }
    true
}

/// True when, on every stream, the listing between a scope's first and last
/// member holds only members and pass-through nodes.
pub fn scope_is_contiguous(graph: &Graph, members: &[NodeId]) -> bool {
    let member_set: BTreeSet<NodeId> = members.iter().copied().collect();
    for list in graph.stream_lists().values() {
        let positions: Vec<usize> = list
            .iter()
            .enumerate()
            .filter(|(_, id)| member_set.contains(id))
            .map(|(i, _)| i)
            .collect();
        let (Some(&lo), Some(&hi)) = (positions.first(), positions.last()) else {
            continue;
        };
        for id in &list[lo..=hi] {
            if member_set.contains(id) {
                continue;
            }
            match graph.node(*id) {
                Some(node) if node.kind().is_pass_through() => {}
                _ => return false,
            }
        }
    }
    true
}

// ── Fuse certificate ────────────────────────────────────────────────────────

/// Evidence for the engine's postconditions (F1-F4).
#[derive(Debug, Clone)]
pub struct FuseCert {
    /// F1: every event id has exactly one signal and one wait across the
    /// whole graph hierarchy.
    pub f1_events_paired: bool,
    /// F2: no root node still carries the scope of a fused scope.
    pub f2_members_rehosted: bool,
    /// F3: every super-node anchor is bound to a matching placeholder and
    /// carries the placeholder's descriptor.
    pub f3_boundary_preserved: bool,
    /// F4: both sides of every edge agree at every nesting level.
    pub f4_edges_consistent: bool,
}

impl crate::pass::StageCert for FuseCert {
    fn all_pass(&self) -> bool {
        self.f1_events_paired
            && self.f2_members_rehosted
            && self.f3_boundary_preserved
            && self.f4_edges_consistent
    }

    fn obligations(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("F1_events_paired", self.f1_events_paired),
            ("F2_members_rehosted", self.f2_members_rehosted),
            ("F3_boundary_preserved", self.f3_boundary_preserved),
            ("F4_edges_consistent", self.f4_edges_consistent),
        ]
    }
}

pub fn verify_fuse(graph: &Graph, outcomes: &[FusionOutcome]) -> FuseCert {
    FuseCert {
        f1_events_paired: verify_f1_paired(graph),
        f2_members_rehosted: verify_f2_rehosted(graph, outcomes),
        f3_boundary_preserved: verify_f3_boundary(graph, outcomes),
        f4_edges_consistent: graph.validate().is_ok(),
    }
}

/// Signal and wait counts per event id over `graph` and every nested
/// subgraph. Sync nodes without an event id are counted under `None`.
pub fn event_census(graph: &Graph) -> BTreeMap<Option<EventId>, (usize, usize)> {
    let mut census = BTreeMap::new();
    census_into(graph, &mut census);
    census
}

fn census_into(graph: &Graph, census: &mut BTreeMap<Option<EventId>, (usize, usize)>) {
    for (_, node) in graph.nodes() {
        let kind = node.kind();
        if kind.is_sync() {
            let entry = census.entry(node.op.attrs.event_id()).or_insert((0, 0));
            if kind.is_signal() {
                entry.0 += 1;
            } else {
                entry.1 += 1;
            }
        }
        if let Some(sub) = &node.subgraph {
            census_into(sub, census);
        }
    }
}

fn verify_f1_paired(graph: &Graph) -> bool {
    event_census(graph)
        .iter()
        .all(|(event, &counts)| event.is_some() && counts == (1, 1))
}

fn verify_f2_rehosted(graph: &Graph, outcomes: &[FusionOutcome]) -> bool {
    let fused: BTreeSet<&str> = outcomes.iter().map(|o| o.scope.as_str()).collect();
    graph.nodes().all(|(_, node)| {
        node.op
            .attrs
            .scope()
            .map_or(true, |scope| !fused.contains(scope))
    })
}

fn verify_f3_boundary(graph: &Graph, outcomes: &[FusionOutcome]) -> bool {
    outcomes.iter().all(|outcome| {
        let Some(node) = graph.node(outcome.super_node) else {
            return false;
        };
        let Some(sub) = node.subgraph.as_deref() else {
            return false;
        };
        if node.kind() != OpKind::SuperKernel
            || node.inputs.len() != outcome.inputs
            || node.outputs.len() != outcome.outputs
        {
            return false;
        }

        let mut data = BTreeMap::new();
        let mut net_outputs = BTreeMap::new();
        for (id, inner) in sub.nodes() {
            let Some(k) = inner.op.attrs.parent_index() else {
                continue;
            };
            match inner.kind() {
                OpKind::InnerData => {
                    data.insert(k as usize, id);
                }
                OpKind::InnerNetOutput => {
                    net_outputs.insert(k as usize, id);
                }
                _ => {}
            }
        }
        if data.len() != node.inputs.len() || net_outputs.len() != node.outputs.len() {
            return false;
        }

        let inputs_ok = node.inputs.iter().enumerate().all(|(k, src)| {
            src.is_some()
                && data.get(&k).and_then(|&id| sub.node(id)).is_some_and(|p| {
                    p.op.output_descs.first() == node.op.input_descs.get(k)
                        && p.outputs.first().is_some_and(|d| !d.is_empty())
                })
        });
        let outputs_ok = node.outputs.iter().enumerate().all(|(j, dests)| {
            !dests.is_empty()
                && net_outputs
                    .get(&j)
                    .and_then(|&id| sub.node(id))
                    .is_some_and(|p| {
                        p.op.input_descs.first() == node.op.output_descs.get(j)
                            && p.inputs.first().is_some_and(Option::is_some)
                    })
        });
        inputs_ok && outputs_ok
    })
}

// ── Refresh certificate ─────────────────────────────────────────────────────

/// Evidence that topological ids are dense after refresh (T1).
#[derive(Debug, Clone)]
pub struct RefreshCert {
    /// T1: ids over the whole hierarchy, in walk order, are exactly `0..N`.
    pub t1_ids_dense: bool,
}

impl crate::pass::StageCert for RefreshCert {
    fn all_pass(&self) -> bool {
        self.t1_ids_dense
    }

    fn obligations(&self) -> Vec<(&'static str, bool)> {
        vec![("T1_ids_dense", self.t1_ids_dense)]
    }
}

pub fn verify_refresh(graph: &Graph) -> RefreshCert {
    let ids = collect_topo_ids(graph);
    RefreshCert {
        t1_ids_dense: ids.iter().enumerate().all(|(i, &t)| t == i as i64),
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
