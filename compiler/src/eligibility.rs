// eligibility.rs — Fusion eligibility checker
//
// For every scope and every stream it touches, scans the stream's node list
// from the first to the last member position. A node in that range that is
// neither a member nor a pass-through kind breaks contiguity; the scope's
// policy decides whether it becomes a cut point, is tolerated, or aborts the
// pass. Cut points recorded by the collector for stripped members are merged
// in.
//
// Preconditions: `ctx` was produced by `collect_scopes` on `graph`.
// Postconditions: every scope in `ctx.scopes` is either fusable or listed in
//                 `needs_split` with a sorted, deduplicated cut list.
// Failure modes: a contiguity break under `strict-scope-check=abort`
//                → `FusionError::ScopeBroken`.
// Side effects: none.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::{debug, warn};

use crate::collect::ScopeContext;
use crate::diag::{codes, Diagnostic};
use crate::error::FusionError;
use crate::graph::Graph;
use crate::id::NodeId;
use crate::options::StrictPolicy;

// ── Public types ────────────────────────────────────────────────────────────

/// Outcome of the eligibility check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EligibilityReport {
    /// Scopes that must be split, with their ordered cut points.
    pub needs_split: BTreeMap<String, Vec<i64>>,
    /// Scopes that can be fused as they are.
    pub fusable: BTreeSet<String>,
    /// Fusable scopes whose span holds foreign nodes tolerated under bypass.
    pub tolerated: BTreeSet<String>,
}

#[derive(Debug)]
pub struct CheckResult {
    pub report: EligibilityReport,
    pub diagnostics: Vec<Diagnostic>,
}

// ── Public entry point ──────────────────────────────────────────────────────

/// Check every collected scope for per-stream contiguity.
pub fn check_eligibility(graph: &Graph, ctx: &ScopeContext) -> Result<CheckResult, FusionError> {
    let mut report = EligibilityReport::default();
    let mut diagnostics = Vec::new();

    for (scope, members) in &ctx.scopes {
        let member_set: HashSet<NodeId> = members.iter().copied().collect();
        let policy = ctx.policy(scope);
        let mut cuts: Vec<i64> = ctx.unsupported.get(scope).cloned().unwrap_or_default();
        let mut tolerated = false;

        if policy == StrictPolicy::Abort {
            if let Some(stripped) = ctx.stripped.iter().find(|s| s.scope == *scope) {
                return Err(FusionError::ScopeBroken {
                    scope: scope.clone(),
                    node: stripped.name.clone(),
                    topo_id: stripped.topo_id,
                    stream: graph.get(stripped.node)?.op.stream.0,
                });
            }
        }

        let Some(per_stream) = ctx.scope_streams.get(scope) else {
            continue;
        };
        for (stream, positions) in per_stream {
            let (Some(&lo), Some(&hi)) = (positions.iter().min(), positions.iter().max()) else {
                continue;
            };
            let Some(list) = ctx.stream_nodes.get(stream) else {
                continue;
            };
            for &id in &list[lo..=hi.min(list.len().saturating_sub(1))] {
                if member_set.contains(&id) {
                    continue;
                }
                let node = graph.get(id)?;
                if node.kind().is_pass_through() {
                    continue;
                }
                match policy {
                    StrictPolicy::Abort => {
                        return Err(FusionError::ScopeBroken {
                            scope: scope.clone(),
                            node: node.op.name.clone(),
                            topo_id: node.op.topo_id,
                            stream: stream.0,
                        });
                    }
                    StrictPolicy::Bypass => {
                        warn!(
                            scope = %scope,
                            node = %node.op.name,
                            topo_id = node.op.topo_id,
                            "tolerating foreign node inside scope"
                        );
                        diagnostics.push(
                            Diagnostic::warning(
                                codes::W0101,
                                format!(
                                    "scope '{}': node '{}' (topo {}, stream {}) breaks contiguity; tolerated by strict-scope-check=bypass",
                                    scope, node.op.name, node.op.topo_id, stream
                                ),
                            )
                            .with_note(format!("scope '{}' is not fully fusable", scope)),
                        );
                        tolerated = true;
                    }
                    StrictPolicy::Split => {
                        debug!(scope = %scope, node = %node.op.name, topo_id = node.op.topo_id, "cut point");
                        cuts.push(node.op.topo_id);
                    }
                }
            }
        }

        cuts.sort_unstable();
        cuts.dedup();
        if cuts.is_empty() {
            report.fusable.insert(scope.clone());
            if tolerated {
                report.tolerated.insert(scope.clone());
            }
        } else {
            report.needs_split.insert(scope.clone(), cuts);
        }
    }

    Ok(CheckResult {
        report,
        diagnostics,
    })
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::graph_from_source;
    use crate::collect::collect_scopes;

    fn check(source: &str) -> Result<CheckResult, FusionError> {
        let mut g = graph_from_source(source).unwrap();
        let ctx = collect_scopes(&mut g).unwrap().context;
        check_eligibility(&g, &ctx)
    }

    fn broken(options: &str) -> String {
        format!(
            "node x : Data\n\
             node a : Relu (scope = \"S\", fusion = true{options})\n\
             node b : Relu (scope = \"S\", fusion = true)\n\
             node f : Relu\n\
             node c : Relu (scope = \"S\", fusion = true)\n"
        )
    }

    #[test]
    fn contiguous_scope_is_fusable() {
        let result = check(
            "node a : Relu (scope = \"S\", fusion = true)\n\
             node d : Const\n\
             node b : Relu (scope = \"S\", fusion = true)\n",
        )
        .unwrap();
        assert!(result.report.fusable.contains("S"));
        assert!(result.report.needs_split.is_empty());
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn foreign_node_becomes_cut_point() {
        let result = check(&broken("")).unwrap();
        assert_eq!(result.report.needs_split["S"], vec![3]);
        assert!(!result.report.fusable.contains("S"));
    }

    #[test]
    fn abort_policy_is_fatal() {
        let err = check(&broken(", options = \"strict-scope-check=abort\"")).unwrap_err();
        assert_eq!(
            err,
            FusionError::ScopeBroken {
                scope: "S".into(),
                node: "f".into(),
                topo_id: 3,
                stream: 0,
            }
        );
    }

    #[test]
    fn bypass_policy_tolerates_without_cut() {
        let result = check(&broken(", options = \"strict-scope-check=bypass\"")).unwrap();
        assert!(result.report.fusable.contains("S"));
        assert!(result.report.tolerated.contains("S"));
        assert!(result.report.needs_split.is_empty());
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].code, Some(codes::W0101));
    }

    #[test]
    fn stripped_members_contribute_cuts() {
        let result = check(
            "node a : Relu (scope = \"S\", fusion = true)\n\
             node b : Relu (scope = \"S\", fusion = true)\n\
             node c : Relu (scope = \"S\", fusion = false)\n",
        )
        .unwrap();
        assert_eq!(result.report.needs_split["S"], vec![2]);
    }

    #[test]
    fn other_streams_do_not_break_contiguity() {
        let result = check(
            "node a : Relu (stream = 0, scope = \"S\", fusion = true)\n\
             node f : Relu (stream = 1)\n\
             node b : Relu (stream = 0, scope = \"S\", fusion = true)\n",
        )
        .unwrap();
        assert!(result.report.fusable.contains("S"));
    }

    #[test]
    fn cuts_are_sorted_and_deduplicated() {
        let result = check(
            "node a : Relu (stream = 0, scope = \"S\", fusion = true)\n\
             node b : Relu (stream = 1, scope = \"S\", fusion = true)\n\
             node f : Relu (stream = 1, topo = 5)\n\
             node g : Relu (stream = 0, topo = 4)\n\
             node c : Relu (stream = 0, scope = \"S\", fusion = true, topo = 6)\n\
             node d : Relu (stream = 1, scope = \"S\", fusion = true, topo = 7)\n",
        )
        .unwrap();
        assert_eq!(result.report.needs_split["S"], vec![4, 5]);
    }

    #[test]
    fn stripped_edge_member_is_fatal_under_abort() {
        let err = check(
            "node a : Custom (scope = \"S\", options = \"strict-scope-check=abort\")\n\
             node b : Relu (scope = \"S\", fusion = true)\n\
             node c : Relu (scope = \"S\", fusion = true)\n",
        )
        .unwrap_err();
        assert_eq!(
            err,
            FusionError::ScopeBroken {
                scope: "S".into(),
                node: "a".into(),
                topo_id: 0,
                stream: 0,
            }
        );
    }
}
