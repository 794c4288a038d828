// collect.rs — Scope collection
//
// One forward scan of the root graph. Buckets nodes by stream and by scope,
// records every signal/wait node (including those nested in existing super
// nodes) by event id, and strips the scope attribute from members that do
// not support fusion.
//
// Preconditions: `graph` is a structurally valid root graph.
// Postconditions: returns a `ScopeContext` consistent with the (possibly
//                 stripped) graph, plus audit diagnostics for every strip.
// Failure modes: dangling handles, malformed sync nodes, bad scope options
//                → `FusionError`.
// Side effects: removes scope attributes from non-fusable nodes.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::diag::{codes, Diagnostic};
use crate::error::FusionError;
use crate::graph::{Graph, Node, OpKind};
use crate::id::{EventId, NodeId, StreamId};
use crate::options::{parse_scope_options, ScopeOptions, StrictPolicy};

// ── Public types ────────────────────────────────────────────────────────────

/// One signal or wait node found while collecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOccurrence {
    /// Super nodes leading from the root graph to the graph holding `node`.
    /// Empty for root-level nodes.
    pub path: Vec<NodeId>,
    pub node: NodeId,
    pub kind: OpKind,
    /// Producer (for a signal) or consumer (for a wait).
    pub peer: NodeId,
    pub stream: StreamId,
}

/// All signal and wait nodes sharing one event id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventRecord {
    pub signals: Vec<SyncOccurrence>,
    pub waits: Vec<SyncOccurrence>,
}

/// A member whose scope attribute was removed because it cannot be fused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrippedNode {
    pub node: NodeId,
    pub name: String,
    pub scope: String,
    pub topo_id: i64,
}

/// Scope and stream bookkeeping threaded through checker, splitter and engine.
#[derive(Debug, Clone, Default)]
pub struct ScopeContext {
    /// Root nodes of each stream, in listing order.
    pub stream_nodes: BTreeMap<StreamId, Vec<NodeId>>,
    /// Members of each scope, in listing order.
    pub scopes: BTreeMap<String, Vec<NodeId>>,
    /// Positions of each scope's members inside `stream_nodes[stream]`.
    pub scope_streams: BTreeMap<String, BTreeMap<StreamId, Vec<usize>>>,
    /// Parsed options of each scope (first member carrying options wins).
    pub options: BTreeMap<String, ScopeOptions>,
    pub events: BTreeMap<EventId, EventRecord>,
    /// Topological ids of stripped members, per scope.
    pub unsupported: BTreeMap<String, Vec<i64>>,
    pub stripped: Vec<StrippedNode>,
}

impl ScopeContext {
    pub fn max_event_id(&self) -> Option<EventId> {
        self.events.keys().next_back().copied()
    }

    pub fn members(&self, scope: &str) -> &[NodeId] {
        self.scopes.get(scope).map_or(&[], Vec::as_slice)
    }

    pub fn policy(&self, scope: &str) -> StrictPolicy {
        self.options.get(scope).map(|o| o.strict).unwrap_or_default()
    }

    /// Rebuild `scope_streams` for `scope` from its member list.
    pub fn reindex_scope(&mut self, graph: &Graph, scope: &str) -> Result<(), FusionError> {
        let mut per_stream: BTreeMap<StreamId, Vec<usize>> = BTreeMap::new();
        for &id in self.members(scope) {
            let stream = graph.get(id)?.op.stream;
            let pos = self
                .stream_nodes
                .get(&stream)
                .and_then(|list| list.iter().position(|&n| n == id))
                .ok_or_else(|| FusionError::MissingNode {
                    graph: graph.name.clone(),
                    node: id,
                })?;
            per_stream.entry(stream).or_default().push(pos);
        }
        self.scope_streams.insert(scope.to_string(), per_stream);
        Ok(())
    }
}

/// Result of scope collection.
#[derive(Debug)]
pub struct CollectResult {
    pub context: ScopeContext,
    pub diagnostics: Vec<Diagnostic>,
}

// ── Public entry point ──────────────────────────────────────────────────────

/// Collect scopes, streams and sync nodes of `graph`.
pub fn collect_scopes(graph: &mut Graph) -> Result<CollectResult, FusionError> {
    let mut ctx = ScopeContext::default();
    let mut diagnostics = Vec::new();

    collect_options(graph, &mut ctx, &mut diagnostics)?;

    let order: Vec<NodeId> = graph.order().to_vec();
    for id in order {
        strip_if_unfusable(graph, id, &mut ctx, &mut diagnostics)?;

        let node = graph.get(id)?;
        let stream = node.op.stream;
        let list = ctx.stream_nodes.entry(stream).or_default();
        let pos = list.len();
        list.push(id);

        if let Some(scope) = node.op.attrs.scope() {
            ctx.scopes.entry(scope.to_string()).or_default().push(id);
            ctx.scope_streams
                .entry(scope.to_string())
                .or_default()
                .entry(stream)
                .or_default()
                .push(pos);
        }

        if node.kind().is_sync() {
            record_sync(graph, &[], id, node, &mut ctx.events)?;
        }
        if let Some(sub) = &node.subgraph {
            collect_nested_sync(sub, vec![id], &mut ctx.events)?;
        }
    }

    debug!(
        scopes = ctx.scopes.len(),
        streams = ctx.stream_nodes.len(),
        events = ctx.events.len(),
        "scope collection complete"
    );
    Ok(CollectResult {
        context: ctx,
        diagnostics,
    })
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn collect_options(
    graph: &Graph,
    ctx: &mut ScopeContext,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<(), FusionError> {
    for (_, node) in graph.nodes() {
        let (Some(scope), Some(raw)) = (node.op.attrs.scope(), node.op.attrs.scope_options())
        else {
            continue;
        };
        if ctx.options.contains_key(scope) {
            continue;
        }
        let opts = parse_scope_options(scope, raw)?;
        for key in &opts.unknown_keys {
            warn!(scope, key = %key, "ignoring unknown scope option");
            diagnostics.push(Diagnostic::warning(
                codes::W0102,
                format!("scope '{}': ignoring unknown option '{}'", scope, key),
            ));
        }
        ctx.options.insert(scope.to_string(), opts);
    }
    Ok(())
}

fn strip_if_unfusable(
    graph: &mut Graph,
    id: NodeId,
    ctx: &mut ScopeContext,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<(), FusionError> {
    let node = graph.get(id)?;
    let Some(scope) = node.op.attrs.scope() else {
        return Ok(());
    };
    if node.kind().is_sync() {
        // Pairs touching members are rebuilt by the engine; sync nodes never join.
        let name = node.op.name.clone();
        if let Some(scope) = graph.get_mut(id)?.op.attrs.remove_scope() {
            debug!(scope = %scope, node = %name, "dropping scope from signal/wait node");
        }
        return Ok(());
    }
    if node.op.supports_fusion() || ctx.policy(scope) == StrictPolicy::Bypass {
        return Ok(());
    }

    let name = node.op.name.clone();
    let topo_id = node.op.topo_id;
    let node = graph.get_mut(id)?;
    let Some(scope) = node.op.attrs.remove_scope() else {
        return Ok(());
    };

    warn!(scope = %scope, node = %name, topo_id, "removing scope from node without fusion support");
    diagnostics.push(
        Diagnostic::warning(
            codes::W0100,
            format!(
                "node '{}' (topo {}) does not support super-kernel fusion; removed from scope '{}'",
                name, topo_id, scope
            ),
        )
        .with_note(format!("scope '{}' will be split at topo {}", scope, topo_id)),
    );
    ctx.unsupported
        .entry(scope.clone())
        .or_default()
        .push(topo_id);
    ctx.stripped.push(StrippedNode {
        node: id,
        name,
        scope,
        topo_id,
    });
    Ok(())
}

/// Resolve the single control peer of a sync node.
pub(crate) fn sync_peer(node: &Node) -> Result<NodeId, FusionError> {
    let peers = if node.kind().is_signal() {
        &node.ctrl_in
    } else {
        &node.ctrl_out
    };
    match peers.as_slice() {
        [peer] => Ok(*peer),
        _ => Err(FusionError::MissingControlPeer {
            node: node.op.name.clone(),
            count: peers.len(),
        }),
    }
}

fn record_sync(
    graph: &Graph,
    path: &[NodeId],
    id: NodeId,
    node: &Node,
    events: &mut BTreeMap<EventId, EventRecord>,
) -> Result<(), FusionError> {
    let event = node
        .op
        .attrs
        .event_id()
        .ok_or_else(|| FusionError::MissingEventId {
            node: node.op.name.clone(),
        })?;
    let peer = sync_peer(node)?;
    graph.get(peer)?;
    let occurrence = SyncOccurrence {
        path: path.to_vec(),
        node: id,
        kind: node.kind(),
        peer,
        stream: node.op.stream,
    };
    let record = events.entry(event).or_default();
    if node.kind().is_signal() {
        record.signals.push(occurrence);
    } else {
        record.waits.push(occurrence);
    }
    Ok(())
}

fn collect_nested_sync(
    graph: &Graph,
    path: Vec<NodeId>,
    events: &mut BTreeMap<EventId, EventRecord>,
) -> Result<(), FusionError> {
    for &id in graph.order() {
        let node = graph.get(id)?;
        if node.kind().is_sync() {
            record_sync(graph, &path, id, node, events)?;
        }
        if let Some(sub) = &node.subgraph {
            let mut nested = path.clone();
            nested.push(id);
            collect_nested_sync(sub, nested, events)?;
        }
    }
    Ok(())
}

// ── Tests ───────────────────────────────────────────────────────────────────
