// split.rs — Automatic scope splitting
//
// Each scope with cut points is partitioned into the open intervals between
// consecutive boundaries (sorted cuts plus a sentinel just below the first
// member and one just above the last member). Members are re-tagged with the
// derived scope name `{scope}_{lo}_{hi}`; empty intervals produce nothing and
// the original name disappears.
//
// Preconditions: `report` was computed from `ctx` and `graph`.
// Postconditions: no scope in `ctx` has cut points; every derived scope is
//                 contiguous on every stream it touches.
// Failure modes: dangling member handles → `FusionError`.
// Side effects: rewrites scope attributes of split members.

use std::collections::BTreeMap;

use tracing::info;

use crate::collect::ScopeContext;
use crate::diag::{codes, Diagnostic};
use crate::eligibility::EligibilityReport;
use crate::error::FusionError;
use crate::graph::Graph;
use crate::id::NodeId;

/// One performed split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitRecord {
    pub scope: String,
    pub cuts: Vec<i64>,
    /// Derived scope names with their member counts, in interval order.
    pub parts: Vec<(String, usize)>,
}

#[derive(Debug)]
pub struct SplitResult {
    pub splits: Vec<SplitRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Name of the scope derived from `scope` for the interval `(lo, hi)`.
pub fn derived_scope_name(scope: &str, lo: i64, hi: i64) -> String {
    format!("{}_{}_{}", scope, lo, hi)
}

/// Split every scope listed in `report.needs_split`.
pub fn split_scopes(
    graph: &mut Graph,
    ctx: &mut ScopeContext,
    report: &EligibilityReport,
) -> Result<SplitResult, FusionError> {
    let mut splits = Vec::new();
    let mut diagnostics = Vec::new();

    for (scope, cuts) in &report.needs_split {
        if cuts.is_empty() {
            continue;
        }
        let Some(members) = ctx.scopes.remove(scope) else {
            continue;
        };
        ctx.scope_streams.remove(scope);
        let options = ctx.options.remove(scope);

        let mut topo: Vec<(NodeId, i64)> = Vec::with_capacity(members.len());
        for &id in &members {
            topo.push((id, graph.get(id)?.op.topo_id));
        }
        let (Some(first), Some(last)) = (
            topo.iter().map(|&(_, t)| t).min(),
            topo.iter().map(|&(_, t)| t).max(),
        ) else {
            continue;
        };

        let mut bounds = cuts.clone();
        bounds.push(first - 1);
        bounds.push(last + 1);
        bounds.sort_unstable();
        bounds.dedup();

        let mut assigned: BTreeMap<NodeId, String> = BTreeMap::new();
        let mut parts = Vec::new();
        for pair in bounds.windows(2) {
            let (lo, hi) = (pair[0], pair[1]);
            let inside: Vec<NodeId> = topo
                .iter()
                .filter(|&&(_, t)| lo < t && t < hi)
                .map(|&(id, _)| id)
                .collect();
            if inside.is_empty() {
                continue;
            }
            let name = derived_scope_name(scope, lo, hi);
            for &id in &inside {
                assigned.insert(id, name.clone());
            }
            parts.push((name.clone(), inside.len()));
            if let Some(opts) = &options {
                ctx.options.insert(name.clone(), opts.clone());
            }
            ctx.scopes.insert(name, inside);
        }

        for &id in &members {
            let attrs = &mut graph.get_mut(id)?.op.attrs;
            match assigned.get(&id) {
                Some(name) => attrs.set_scope(name.clone()),
                None => {
                    attrs.remove_scope();
                }
            }
        }
        for (name, _) in &parts {
            ctx.reindex_scope(graph, name)?;
        }

        let names: Vec<&str> = parts.iter().map(|(n, _)| n.as_str()).collect();
        info!(scope = %scope, ?cuts, parts = ?names, "split scope");
        diagnostics.push(
            Diagnostic::info(
                codes::I0100,
                format!(
                    "scope '{}' split into {} scope(s): {}",
                    scope,
                    parts.len(),
                    names.join(", ")
                ),
            )
            .with_note(format!(
                "cut points: {}",
                cuts.iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        );
        splits.push(SplitRecord {
            scope: scope.clone(),
            cuts: cuts.clone(),
            parts,
        });
    }

    Ok(SplitResult {
        splits,
        diagnostics,
    })
}

// ── Tests ───────────────────────────────────────────────────────────────────
