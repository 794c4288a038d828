// fuse.rs — Super-kernel fusion engine
//
// Rewrites one eligible scope at a time: analyzes the scope boundary, builds
// a `SuperKernel` node with one input per external source anchor and one
// output per externally consumed member anchor, moves the members into the
// super node's private subgraph behind `InnerData`/`InnerNetOutput`
// placeholders, and rebuilds every cross-stream ordering that crossed the new
// boundary.
//
// Preconditions: every scope handed to the engine is contiguous on every
//                stream it touches; the graph passes `Graph::validate`.
// Postconditions: members live only inside the new subgraph; every external
//                 data path runs through the super node; signal/wait pairs
//                 are one-to-one.
// Failure modes: dangling handles, malformed anchors, inconsistent pairs,
//                descriptor/offset/memory-type count mismatches, exhausted
//                event blocks → `FusionError`. The graph is left partially
//                rewritten on failure.
// Side effects: mutates `graph` and advances the event allocator.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use tracing::{debug, info};

use crate::attr::{Attr, Attrs};
use crate::collect::ScopeContext;
use crate::diag::{codes, Diagnostic};
use crate::error::FusionError;
use crate::graph::{
    Endpoint, Graph, Node, OpDesc, TensorDesc, INNER_DATA, INNER_NET_OUTPUT, RECV, SEND,
    SUPER_KERNEL, UNPLACED_OFFSET,
};
use crate::id::{EventAllocator, EventBlock, EventId, NodeId, StreamId};
use crate::sync::{discover_pairs, insert_signal, insert_wait, pair_op_types, remove_pair};

// ── Public types ────────────────────────────────────────────────────────────

/// Summary of one fused scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FusionOutcome {
    pub scope: String,
    pub super_node: NodeId,
    pub stream: StreamId,
    pub members: usize,
    pub inputs: usize,
    pub outputs: usize,
    /// Ids of pairs destroyed because one or both ends moved into the scope.
    pub removed_events: Vec<EventId>,
    /// Ids of pairs created across the new boundary.
    pub added_events: Vec<EventId>,
    /// Same-stream orderings expressed as plain control edges.
    pub control_links: usize,
}

#[derive(Debug)]
pub struct FuseResult {
    pub outcomes: Vec<FusionOutcome>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Name of the super node built for `scope`.
pub fn super_node_name(scope: &str) -> String {
    format!("super_kernel_{}", scope)
}

// ── Public entry point ──────────────────────────────────────────────────────

/// Fuse every scope in `ctx`, in scope-name order.
pub fn fuse_scopes(
    graph: &mut Graph,
    ctx: &ScopeContext,
    event_base: u32,
) -> Result<FuseResult, FusionError> {
    let mut events = EventAllocator::new(event_base, ctx.max_event_id());
    let mut outcomes = Vec::new();
    let mut diagnostics = Vec::new();

    for (scope, members) in &ctx.scopes {
        if members.is_empty() {
            continue;
        }
        let outcome = fuse_scope(graph, scope, members, &mut events)?;
        info!(
            scope = %scope,
            members = outcome.members,
            inputs = outcome.inputs,
            outputs = outcome.outputs,
            stream = %outcome.stream,
            "fused scope"
        );
        let mut diag = Diagnostic::info(
            codes::I0101,
            format!(
                "scope '{}' fused into '{}' ({} member(s), {} input(s), {} output(s), stream {})",
                scope,
                super_node_name(scope),
                outcome.members,
                outcome.inputs,
                outcome.outputs,
                outcome.stream
            ),
        );
        if !outcome.removed_events.is_empty() {
            diag = diag.with_note(format!("removed events: {}", join_ids(&outcome.removed_events)));
        }
        if !outcome.added_events.is_empty() {
            diag = diag.with_note(format!("added events: {}", join_ids(&outcome.added_events)));
        }
        diagnostics.push(diag);
        outcomes.push(outcome);
    }

    Ok(FuseResult {
        outcomes,
        diagnostics,
    })
}

fn join_ids(ids: &[EventId]) -> String {
    ids.iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Fuse a single scope whose members are `members` (root-level handles).
pub fn fuse_scope(
    graph: &mut Graph,
    scope: &str,
    members: &[NodeId],
    events: &mut EventAllocator,
) -> Result<FusionOutcome, FusionError> {
    let plan = ScopePlan::analyze(graph, scope, members)?;
    let mut block = events.reserve(plan.event_capacity());
    let outcome = plan.apply(graph, &mut block)?;
    events.commit(&block);
    Ok(outcome)
}

// ── Boundary analysis ───────────────────────────────────────────────────────

/// An external producer anchor and the member anchors it feeds.
#[derive(Debug, Clone)]
struct ExternalInput {
    src: Endpoint,
    consumers: Vec<Endpoint>,
}

/// A member output anchor and its external consumers.
#[derive(Debug, Clone)]
struct ExternalOutput {
    src: Endpoint,
    dests: Vec<Endpoint>,
}

/// Nearest real nodes around a non-selected stream's member span.
#[derive(Debug, Clone)]
struct StreamSpan {
    stream: StreamId,
    before: Option<NodeId>,
    after: Option<NodeId>,
}

/// A recorded pair with one end inside the scope and one outside.
#[derive(Debug, Clone)]
struct CrossPair {
    event: EventId,
    plain: bool,
    signal_type: String,
    wait_type: String,
    member: NodeId,
    external: NodeId,
    member_is_producer: bool,
}

/// A half pair whose companion lives in another graph container.
#[derive(Debug, Clone)]
struct ForeignHalf {
    event: EventId,
    op_type: String,
    member: NodeId,
    is_signal: bool,
}

/// Everything learned about a scope before the graph is touched.
struct ScopePlan {
    scope: String,
    /// Members in listing order.
    members: Vec<NodeId>,
    member_set: HashSet<NodeId>,
    stream: StreamId,
    topo_first: NodeId,
    topo_last: NodeId,
    inputs: Vec<ExternalInput>,
    outputs: Vec<ExternalOutput>,
    internal_data: Vec<(Endpoint, Endpoint)>,
    internal_control: Vec<(NodeId, NodeId)>,
    control_in: Vec<NodeId>,
    control_out: Vec<NodeId>,
    spans: Vec<StreamSpan>,
    touching: Vec<EventId>,
}

impl ScopePlan {
    fn analyze(graph: &Graph, scope: &str, members: &[NodeId]) -> Result<Self, FusionError> {
        let mut ordered: Vec<(usize, NodeId)> = Vec::with_capacity(members.len());
        for &m in members {
            let pos = graph.position(m).ok_or_else(|| FusionError::MissingNode {
                graph: graph.name.clone(),
                node: m,
            })?;
            ordered.push((pos, m));
        }
        ordered.sort_unstable();
        ordered.dedup();
        let members: Vec<NodeId> = ordered.into_iter().map(|(_, m)| m).collect();
        let member_set: HashSet<NodeId> = members.iter().copied().collect();
        let Some(&first) = members.first() else {
            return Err(FusionError::EmptyScope {
                scope: scope.to_string(),
            });
        };

        let stream = select_stream(graph, &members)?;

        let mut topo_first = first;
        let mut topo_last = first;
        for &m in &members {
            let t = graph.get(m)?.op.topo_id;
            if t < graph.get(topo_first)?.op.topo_id {
                topo_first = m;
            }
            if t >= graph.get(topo_last)?.op.topo_id {
                topo_last = m;
            }
        }

        let mut plan = ScopePlan {
            scope: scope.to_string(),
            members,
            member_set,
            stream,
            topo_first,
            topo_last,
            inputs: Vec::new(),
            outputs: Vec::new(),
            internal_data: Vec::new(),
            internal_control: Vec::new(),
            control_in: Vec::new(),
            control_out: Vec::new(),
            spans: Vec::new(),
            touching: Vec::new(),
        };
        plan.collect_data_edges(graph)?;
        plan.collect_control_edges(graph)?;
        plan.collect_spans(graph)?;

        let pairs = discover_pairs(graph)?;
        let mut seen = HashSet::new();
        for &m in &plan.members {
            for event in pairs.touching(m) {
                if seen.insert(event) {
                    plan.touching.push(event);
                }
            }
        }
        Ok(plan)
    }

    fn is_member(&self, id: NodeId) -> bool {
        self.member_set.contains(&id)
    }

    fn collect_data_edges(&mut self, graph: &Graph) -> Result<(), FusionError> {
        let mut input_index: HashMap<Endpoint, usize> = HashMap::new();
        for &m in &self.members {
            let node = graph.get(m)?;
            for (port, src) in node.inputs.iter().enumerate() {
                let Some(src) = *src else { continue };
                let dst = Endpoint::new(m, port as u32);
                if self.is_member(src.node) {
                    self.internal_data.push((src, dst));
                    continue;
                }
                match input_index.get(&src) {
                    Some(&k) => self.inputs[k].consumers.push(dst),
                    None => {
                        input_index.insert(src, self.inputs.len());
                        self.inputs.push(ExternalInput {
                            src,
                            consumers: vec![dst],
                        });
                    }
                }
            }
            for (port, dests) in node.outputs.iter().enumerate() {
                let external: Vec<Endpoint> = dests
                    .iter()
                    .copied()
                    .filter(|d| !self.is_member(d.node))
                    .collect();
                if !external.is_empty() {
                    self.outputs.push(ExternalOutput {
                        src: Endpoint::new(m, port as u32),
                        dests: external,
                    });
                }
            }
        }
        Ok(())
    }

    fn collect_control_edges(&mut self, graph: &Graph) -> Result<(), FusionError> {
        for &m in &self.members {
            let node = graph.get(m)?;
            for &pred in &node.ctrl_in {
                if self.is_member(pred) || graph.get(pred)?.kind().is_sync() {
                    continue;
                }
                if !self.control_in.contains(&pred) {
                    self.control_in.push(pred);
                }
            }
            for &succ in &node.ctrl_out {
                if self.is_member(succ) {
                    self.internal_control.push((m, succ));
                    continue;
                }
                if graph.get(succ)?.kind().is_sync() {
                    continue;
                }
                if !self.control_out.contains(&succ) {
                    self.control_out.push(succ);
                }
            }
        }
        Ok(())
    }

    /// For every non-selected stream, find the nearest real node before and
    /// after that stream's member span.
    fn collect_spans(&mut self, graph: &Graph) -> Result<(), FusionError> {
        let mut streams = BTreeSet::new();
        for &m in &self.members {
            streams.insert(graph.get(m)?.op.stream);
        }
        let lists = graph.stream_lists();
        for stream in streams {
            if stream == self.stream {
                continue;
            }
            let Some(list) = lists.get(&stream) else {
                continue;
            };
            let positions: Vec<usize> = list
                .iter()
                .enumerate()
                .filter(|(_, id)| self.is_member(**id))
                .map(|(i, _)| i)
                .collect();
            let (Some(&lo), Some(&hi)) = (positions.first(), positions.last()) else {
                continue;
            };
            let mut before = None;
            for &id in list[..lo].iter().rev() {
                if self.is_real_neighbor(graph, id)? {
                    before = Some(id);
                    break;
                }
            }
            let mut after = None;
            for &id in &list[hi + 1..] {
                if self.is_real_neighbor(graph, id)? {
                    after = Some(id);
                    break;
                }
            }
            self.spans.push(StreamSpan {
                stream,
                before,
                after,
            });
        }
        Ok(())
    }

    fn is_real_neighbor(&self, graph: &Graph, id: NodeId) -> Result<bool, FusionError> {
        Ok(!self.is_member(id) && !graph.get(id)?.kind().is_pass_through())
    }

    /// Worst-case number of fresh ids this scope can consume.
    fn event_capacity(&self) -> u32 {
        let dests: usize = self.outputs.iter().map(|o| o.dests.len()).sum();
        let total = self.touching.len() + 2 * self.spans.len() + self.inputs.len() + dests;
        u32::try_from(total).unwrap_or(u32::MAX)
    }

    // ── Rewrite ─────────────────────────────────────────────────────────

    fn apply(self, graph: &mut Graph, block: &mut EventBlock) -> Result<FusionOutcome, FusionError> {
        let super_id = self.insert_super_node(graph)?;

        let mut removed_events = Vec::new();
        let mut reclaimed: VecDeque<EventId> = VecDeque::new();
        let mut cross = Vec::new();
        let mut foreign = Vec::new();
        self.detach_pairs(graph, &mut removed_events, &mut reclaimed, &mut cross, &mut foreign)?;

        let mut sub = Graph::new(super_node_name(&self.scope));
        let mut rehosted: HashMap<NodeId, NodeId> = HashMap::new();
        for &m in &self.members {
            let Node { op, subgraph, .. } = graph.remove_node(m)?;
            let id = sub.add_node(op);
            sub.get_mut(id)?.subgraph = subgraph;
            rehosted.insert(m, id);
        }
        debug!(scope = %self.scope, members = rehosted.len(), "members re-hosted");

        self.rewire(graph, &mut sub, super_id, &rehosted)?;

        let mut rebuild = SyncRebuild {
            plan: &self,
            super_id,
            rehosted: &rehosted,
            reclaimed,
            block,
            synced_in: HashSet::new(),
            synced_out: HashSet::new(),
            added: Vec::new(),
            control_links: 0,
        };
        rebuild.cross_pairs(graph, &mut sub, &cross)?;
        rebuild.foreign_halves(graph, &mut sub, &foreign)?;
        rebuild.stream_spans(graph)?;
        rebuild.data_lanes(graph)?;
        let added_events = rebuild.added;
        let control_links = rebuild.control_links;

        graph.get_mut(super_id)?.subgraph = Some(Box::new(sub));

        Ok(FusionOutcome {
            scope: self.scope,
            super_node: super_id,
            stream: self.stream,
            members: self.members.len(),
            inputs: self.inputs.len(),
            outputs: self.outputs.len(),
            removed_events,
            added_events,
            control_links,
        })
    }

    fn insert_super_node(&self, graph: &mut Graph) -> Result<NodeId, FusionError> {
        let first = self.members[0];
        let mut op = OpDesc::new(super_node_name(&self.scope), SUPER_KERNEL)
            .on_stream(self.stream)
            .with_topo(graph.get(first)?.op.topo_id)
            .with_attrs(Attrs::new().with(Attr::FusedScope(self.scope.clone())));

        let mut offsets = Vec::with_capacity(self.inputs.len());
        let mut mem_types = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            let src = graph.get(input.src.node)?;
            let port = input.src.port as usize;
            let name = &src.op.name;
            let anchors = src.outputs.len();
            op.input_descs
                .push(anchor_desc(&src.op.output_descs, port, name, "output_descs")?);
            offsets.push(slot_value(
                &src.op.output_offsets,
                port,
                anchors,
                name,
                "output_offsets",
            )?);
            mem_types.push(slot_value(
                src.op.attrs.output_mem_types().unwrap_or(&[]),
                port,
                anchors,
                name,
                "output_mem_types",
            )?);
        }
        op.input_offsets = densify(&offsets, UNPLACED_OFFSET);
        if mem_types.iter().any(Option::is_some) {
            op.attrs.set(Attr::InputMemTypes(densify(&mem_types, 0)));
        }

        let mut offsets = Vec::with_capacity(self.outputs.len());
        let mut mem_types = Vec::with_capacity(self.outputs.len());
        for output in &self.outputs {
            let dst = output.dests[0];
            let node = graph.get(dst.node)?;
            let port = dst.port as usize;
            let name = &node.op.name;
            let anchors = node.inputs.len();
            op.output_descs
                .push(anchor_desc(&node.op.input_descs, port, name, "input_descs")?);
            offsets.push(slot_value(
                &node.op.input_offsets,
                port,
                anchors,
                name,
                "input_offsets",
            )?);
            mem_types.push(slot_value(
                node.op.attrs.input_mem_types().unwrap_or(&[]),
                port,
                anchors,
                name,
                "input_mem_types",
            )?);
        }
        op.output_offsets = densify(&offsets, UNPLACED_OFFSET);
        if mem_types.iter().any(Option::is_some) {
            op.attrs.set(Attr::OutputMemTypes(densify(&mem_types, 0)));
        }

        graph.insert_after(first, op)
    }

    fn detach_pairs(
        &self,
        graph: &mut Graph,
        removed: &mut Vec<EventId>,
        reclaimed: &mut VecDeque<EventId>,
        cross: &mut Vec<CrossPair>,
        foreign: &mut Vec<ForeignHalf>,
    ) -> Result<(), FusionError> {
        let pairs = discover_pairs(graph)?;
        for &event in &self.touching {
            let Some(pair) = pairs.pairs.get(&event) else {
                return Err(FusionError::InconsistentPair {
                    event,
                    detail: "pair vanished before detaching".to_string(),
                });
            };
            if pair.is_foreign() {
                let (half, is_signal) = match (&pair.signal, &pair.wait) {
                    (Some(s), None) => (s, true),
                    (None, Some(w)) => (w, false),
                    _ => {
                        return Err(FusionError::InconsistentPair {
                            event,
                            detail: "foreign pair without a local half".to_string(),
                        })
                    }
                };
                foreign.push(ForeignHalf {
                    event,
                    op_type: half.op_type.clone(),
                    member: half.peer,
                    is_signal,
                });
                remove_pair(graph, pair)?;
                continue;
            }

            let (Some(producer), Some(consumer)) = (pair.producer(), pair.consumer()) else {
                return Err(FusionError::InconsistentPair {
                    event,
                    detail: "local pair without both ends".to_string(),
                });
            };
            let producer_in = self.is_member(producer);
            let consumer_in = self.is_member(consumer);
            remove_pair(graph, pair)?;
            removed.push(event);
            if producer_in && consumer_in {
                debug!(scope = %self.scope, %event, "eliding internal pair");
                if pair.plain {
                    reclaimed.push_back(event);
                }
                continue;
            }
            let (signal_type, wait_type) = pair_op_types(pair);
            cross.push(CrossPair {
                event,
                plain: pair.plain,
                signal_type,
                wait_type,
                member: if producer_in { producer } else { consumer },
                external: if producer_in { consumer } else { producer },
                member_is_producer: producer_in,
            });
        }
        Ok(())
    }

    fn rewire(
        &self,
        graph: &mut Graph,
        sub: &mut Graph,
        super_id: NodeId,
        rehosted: &HashMap<NodeId, NodeId>,
    ) -> Result<(), FusionError> {
        let inner = |id: NodeId| lookup(rehosted, id);

        for (k, input) in self.inputs.iter().enumerate() {
            let slot = Endpoint::new(super_id, k as u32);
            graph.connect(input.src, slot)?;
            let desc = graph.get(super_id)?.op.input_descs[k].clone();
            let placeholder = sub.insert_at(
                k,
                OpDesc::new(format!("inner_data_{}", k), INNER_DATA)
                    .on_stream(self.stream)
                    .with_outputs(vec![desc])
                    .with_attrs(Attrs::new().with(Attr::ParentIndex(k as u32))),
            );
            for consumer in &input.consumers {
                sub.connect(
                    Endpoint::new(placeholder, 0),
                    Endpoint::new(inner(consumer.node)?, consumer.port),
                )?;
            }
        }

        for (j, output) in self.outputs.iter().enumerate() {
            let slot = Endpoint::new(super_id, j as u32);
            for &dest in &output.dests {
                graph.connect(slot, dest)?;
            }
            let desc = graph.get(super_id)?.op.output_descs[j].clone();
            let placeholder = sub.add_node(
                OpDesc::new(format!("inner_output_{}", j), INNER_NET_OUTPUT)
                    .on_stream(self.stream)
                    .with_inputs(vec![desc])
                    .with_attrs(Attrs::new().with(Attr::ParentIndex(j as u32))),
            );
            sub.connect(
                Endpoint::new(inner(output.src.node)?, output.src.port),
                Endpoint::new(placeholder, 0),
            )?;
        }

        for &(src, dst) in &self.internal_data {
            sub.connect(
                Endpoint::new(inner(src.node)?, src.port),
                Endpoint::new(inner(dst.node)?, dst.port),
            )?;
        }
        for &(from, to) in &self.internal_control {
            sub.add_control(inner(from)?, inner(to)?)?;
        }
        for &pred in &self.control_in {
            graph.add_control(pred, super_id)?;
        }
        for &succ in &self.control_out {
            graph.add_control(super_id, succ)?;
        }
        Ok(())
    }
}

// ── Synchronization rebuild ─────────────────────────────────────────────────

struct SyncRebuild<'a> {
    plan: &'a ScopePlan,
    super_id: NodeId,
    rehosted: &'a HashMap<NodeId, NodeId>,
    reclaimed: VecDeque<EventId>,
    block: &'a mut EventBlock,
    /// External nodes already ordered before the super node.
    synced_in: HashSet<NodeId>,
    /// External nodes already ordered after the super node.
    synced_out: HashSet<NodeId>,
    added: Vec<EventId>,
    control_links: usize,
}

impl SyncRebuild<'_> {
    /// Reclaimed id when reuse is allowed, else a fresh id from the block.
    fn next_event(&mut self, reuse: bool) -> Result<EventId, FusionError> {
        if reuse {
            if let Some(event) = self.reclaimed.pop_front() {
                return Ok(event);
            }
        }
        if let Some(event) = self.block.next_id() {
            return Ok(event);
        }
        let scope = self.plan.scope.clone();
        if self.block.range_exhausted() {
            Err(FusionError::EventRangeExhausted { scope })
        } else {
            Err(FusionError::EventBlockExhausted {
                scope,
                capacity: self.block.capacity(),
            })
        }
    }

    /// Order `from` before `to` across streams with a fresh plain pair.
    fn link(&mut self, graph: &mut Graph, from: NodeId, to: NodeId) -> Result<(), FusionError> {
        let from_stream = graph.get(from)?.op.stream;
        let to_stream = graph.get(to)?.op.stream;
        if from_stream == to_stream {
            graph.add_control(from, to)?;
            self.control_links += 1;
            return Ok(());
        }
        let event = self.next_event(true)?;
        insert_signal(graph, from, SEND, event, from_stream)?;
        insert_wait(graph, to, RECV, event, to_stream)?;
        self.added.push(event);
        Ok(())
    }

    fn cross_pairs(
        &mut self,
        graph: &mut Graph,
        sub: &mut Graph,
        cross: &[CrossPair],
    ) -> Result<(), FusionError> {
        let stream = self.plan.stream;
        for cp in cross {
            let ext_stream = graph.get(cp.external)?.op.stream;
            if cp.member_is_producer {
                self.synced_out.insert(cp.external);
            } else {
                self.synced_in.insert(cp.external);
            }
            if ext_stream == stream {
                if cp.member_is_producer {
                    graph.add_control(self.super_id, cp.external)?;
                } else {
                    graph.add_control(cp.external, self.super_id)?;
                }
                self.control_links += 1;
                continue;
            }

            let on_super = if cp.member_is_producer {
                cp.member == self.plan.topo_last
            } else {
                cp.member == self.plan.topo_first
            };
            let event = self.next_event(cp.plain && on_super)?;
            let inner = lookup(self.rehosted, cp.member)?;

            if cp.member_is_producer {
                if on_super {
                    insert_signal(graph, self.super_id, &cp.signal_type, event, stream)?;
                } else {
                    let inner_stream = sub.get(inner)?.op.stream;
                    insert_signal(sub, inner, &cp.signal_type, event, inner_stream)?;
                }
                insert_wait(graph, cp.external, &cp.wait_type, event, ext_stream)?;
            } else {
                insert_signal(graph, cp.external, &cp.signal_type, event, ext_stream)?;
                if on_super {
                    insert_wait(graph, self.super_id, &cp.wait_type, event, stream)?;
                } else {
                    let inner_stream = sub.get(inner)?.op.stream;
                    insert_wait(sub, inner, &cp.wait_type, event, inner_stream)?;
                }
            }
            debug!(old = %cp.event, new = %event, on_super, "rebuilt boundary pair");
            self.added.push(event);
        }
        Ok(())
    }

    /// Re-place half pairs whose companion is nested elsewhere; ids are kept.
    fn foreign_halves(
        &mut self,
        graph: &mut Graph,
        sub: &mut Graph,
        foreign: &[ForeignHalf],
    ) -> Result<(), FusionError> {
        let stream = self.plan.stream;
        for half in foreign {
            let on_super = if half.is_signal {
                half.member == self.plan.topo_last
            } else {
                half.member == self.plan.topo_first
            };
            match (half.is_signal, on_super) {
                (true, true) => {
                    insert_signal(graph, self.super_id, &half.op_type, half.event, stream)?;
                }
                (false, true) => {
                    insert_wait(graph, self.super_id, &half.op_type, half.event, stream)?;
                }
                (is_signal, false) => {
                    let inner = lookup(self.rehosted, half.member)?;
                    let inner_stream = sub.get(inner)?.op.stream;
                    if is_signal {
                        insert_signal(sub, inner, &half.op_type, half.event, inner_stream)?;
                    } else {
                        insert_wait(sub, inner, &half.op_type, half.event, inner_stream)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Top and bottom pairs for every non-selected stream's span.
    fn stream_spans(&mut self, graph: &mut Graph) -> Result<(), FusionError> {
        let plan = self.plan;
        for span in &plan.spans {
            if let Some(before) = span.before {
                if self.synced_in.insert(before) {
                    debug!(stream = %span.stream, node = %graph.name_of(before), "span top pair");
                    self.link(graph, before, self.super_id)?;
                }
            }
            if let Some(after) = span.after {
                if self.synced_out.insert(after) {
                    debug!(stream = %span.stream, node = %graph.name_of(after), "span bottom pair");
                    self.link(graph, self.super_id, after)?;
                }
            }
        }
        Ok(())
    }

    /// Data edges that now cross lanes without any ordering get a pair.
    fn data_lanes(&mut self, graph: &mut Graph) -> Result<(), FusionError> {
        let plan = self.plan;
        let stream = plan.stream;
        for input in &plan.inputs {
            let src = graph.get(input.src.node)?;
            if src.kind().is_pass_through() || src.op.stream == stream {
                continue;
            }
            if self.synced_in.insert(input.src.node) {
                self.link(graph, input.src.node, self.super_id)?;
            }
        }
        for output in &plan.outputs {
            for dest in &output.dests {
                let dst = graph.get(dest.node)?;
                if dst.kind().is_pass_through() || dst.op.stream == stream {
                    continue;
                }
                if self.synced_out.insert(dest.node) {
                    self.link(graph, self.super_id, dest.node)?;
                }
            }
        }
        Ok(())
    }
}

// ── Free helper functions ───────────────────────────────────────────────────

/// Stream the super node runs on: the first member's, unless that member is
/// a collective op, in which case the first non-collective member's.
fn select_stream(graph: &Graph, members: &[NodeId]) -> Result<StreamId, FusionError> {
    let Some(&first) = members.first() else {
        return Ok(StreamId(0));
    };
    let head = graph.get(first)?;
    if !head.op.is_collective() {
        return Ok(head.op.stream);
    }
    for &m in &members[1..] {
        let node = graph.get(m)?;
        if !node.op.is_collective() {
            return Ok(node.op.stream);
        }
    }
    Ok(head.op.stream)
}

fn lookup(map: &HashMap<NodeId, NodeId>, id: NodeId) -> Result<NodeId, FusionError> {
    map.get(&id).copied().ok_or_else(|| FusionError::MissingNode {
        graph: "subgraph".to_string(),
        node: id,
    })
}

fn anchor_desc(
    descs: &[TensorDesc],
    port: usize,
    node: &str,
    what: &'static str,
) -> Result<TensorDesc, FusionError> {
    descs.get(port).cloned().ok_or_else(|| FusionError::CountMismatch {
        node: node.to_string(),
        what,
        expected: port + 1,
        actual: descs.len(),
    })
}

/// Per-anchor value of an offset or memory-type list. An empty list means
/// "not provided"; a non-empty list must cover every anchor.
fn slot_value(
    list: &[i64],
    port: usize,
    anchors: usize,
    node: &str,
    what: &'static str,
) -> Result<Option<i64>, FusionError> {
    if list.is_empty() {
        return Ok(None);
    }
    if list.len() < anchors {
        return Err(FusionError::CountMismatch {
            node: node.to_string(),
            what,
            expected: anchors,
            actual: list.len(),
        });
    }
    Ok(list.get(port).copied())
}

/// Dense list with `fill` for missing entries; empty when nothing is known.
fn densify(values: &[Option<i64>], fill: i64) -> Vec<i64> {
    if values.iter().all(Option::is_none) {
        return Vec::new();
    }
    values.iter().map(|v| v.unwrap_or(fill)).collect()
}

// ── Tests ───────────────────────────────────────────────────────────────────
