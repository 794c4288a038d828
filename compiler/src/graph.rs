// graph.rs — Compute graph model for the fusion pass
//
// Nodes live in a per-graph arena addressed by `NodeId`; the graph keeps a
// separate node order (the execution listing). Data edges are stored on both
// endpoints: every input anchor names its single producer, every output
// anchor lists its consumers. Control edges are stored the same way. A node
// may own a nested subgraph (a fused super node), which is itself a `Graph`.
//
// Preconditions: none.
// Postconditions: every mutating method keeps both sides of every edge in sync.
// Failure modes: dangling handles and out-of-range anchors → `FusionError`.
// Side effects: none.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::attr::Attrs;
use crate::error::FusionError;
use crate::id::{NodeId, StreamId};

// ── Operator types ──────────────────────────────────────────────────────────

pub const SUPER_KERNEL: &str = "SuperKernel";
pub const INNER_DATA: &str = "InnerData";
pub const INNER_NET_OUTPUT: &str = "InnerNetOutput";
pub const SEND: &str = "Send";
pub const RECV: &str = "Recv";
pub const SEND_NOTIFY: &str = "SendNotify";
pub const RECV_NOTIFY: &str = "RecvNotify";

/// Engine name of the collective-communication operator library. Its
/// operators support super-kernel fusion without an explicit flag.
pub const COLLECTIVE_ENGINE: &str = "collective";

/// Offset recorded for an anchor left unplaced while a sibling anchor is placed.
pub const UNPLACED_OFFSET: i64 = -1;

/// Classification of an operator type relevant to fusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Compute,
    Data,
    Variable,
    Const,
    /// Plain signal.
    Send,
    /// Plain wait.
    Recv,
    /// Combined signal + payload.
    SendNotify,
    /// Combined wait + payload.
    RecvNotify,
    SuperKernel,
    InnerData,
    InnerNetOutput,
}

impl OpKind {
    pub fn from_op_type(op_type: &str) -> OpKind {
        match op_type {
            "Data" | "RefData" => OpKind::Data,
            "Variable" => OpKind::Variable,
            "Const" | "Constant" => OpKind::Const,
            SEND => OpKind::Send,
            RECV => OpKind::Recv,
            SEND_NOTIFY => OpKind::SendNotify,
            RECV_NOTIFY => OpKind::RecvNotify,
            SUPER_KERNEL => OpKind::SuperKernel,
            INNER_DATA => OpKind::InnerData,
            INNER_NET_OUTPUT => OpKind::InnerNetOutput,
            _ => OpKind::Compute,
        }
    }

    pub fn is_signal(self) -> bool {
        matches!(self, OpKind::Send | OpKind::SendNotify)
    }

    pub fn is_wait(self) -> bool {
        matches!(self, OpKind::Recv | OpKind::RecvNotify)
    }

    pub fn is_sync(self) -> bool {
        self.is_signal() || self.is_wait()
    }

    /// Kinds that may sit between scope members without breaking contiguity.
    pub fn is_pass_through(self) -> bool {
        self.is_sync() || matches!(self, OpKind::Data | OpKind::Variable | OpKind::Const)
    }
}

// ── Operator definition ─────────────────────────────────────────────────────

/// Data type and shape of one tensor bound to an anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorDesc {
    pub dtype: String,
    pub shape: Vec<i64>,
}

impl TensorDesc {
    pub fn new(dtype: impl Into<String>, shape: Vec<i64>) -> Self {
        TensorDesc {
            dtype: dtype.into(),
            shape,
        }
    }
}

impl Default for TensorDesc {
    fn default() -> Self {
        TensorDesc::new("undefined", Vec::new())
    }
}

impl fmt::Display for TensorDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.dtype)?;
        for (i, d) in self.shape.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

/// Operator definition: everything about a node except its edges.
///
/// Anchor counts follow the descriptor lists: a node has exactly
/// `input_descs.len()` input anchors and `output_descs.len()` output anchors.
/// Offsets are written by the memory allocator; an empty list means the node
/// has not been allocated yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpDesc {
    pub name: String,
    pub op_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    pub stream: StreamId,
    pub topo_id: i64,
    #[serde(default, skip_serializing_if = "Attrs::is_empty")]
    pub attrs: Attrs,
    #[serde(default)]
    pub input_descs: Vec<TensorDesc>,
    #[serde(default)]
    pub output_descs: Vec<TensorDesc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_offsets: Vec<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_offsets: Vec<i64>,
}

impl OpDesc {
    pub fn new(name: impl Into<String>, op_type: impl Into<String>) -> Self {
        OpDesc {
            name: name.into(),
            op_type: op_type.into(),
            engine: None,
            stream: StreamId(0),
            topo_id: 0,
            attrs: Attrs::new(),
            input_descs: Vec::new(),
            output_descs: Vec::new(),
            input_offsets: Vec::new(),
            output_offsets: Vec::new(),
        }
    }

    pub fn on_stream(mut self, stream: StreamId) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_topo(mut self, topo_id: i64) -> Self {
        self.topo_id = topo_id;
        self
    }

    pub fn with_attrs(mut self, attrs: Attrs) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = Some(engine.into());
        self
    }

    pub fn with_inputs(mut self, descs: Vec<TensorDesc>) -> Self {
        self.input_descs = descs;
        self
    }

    pub fn with_outputs(mut self, descs: Vec<TensorDesc>) -> Self {
        self.output_descs = descs;
        self
    }

    pub fn kind(&self) -> OpKind {
        OpKind::from_op_type(&self.op_type)
    }

    pub fn is_collective(&self) -> bool {
        self.engine.as_deref() == Some(COLLECTIVE_ENGINE)
    }

    /// Explicit fusion-support flag, else implicit support for the
    /// collective-communication engine.
    pub fn supports_fusion(&self) -> bool {
        self.attrs
            .fusion_supported()
            .unwrap_or_else(|| self.is_collective())
    }
}

// ── Nodes and edges ─────────────────────────────────────────────────────────

/// One end of a data edge: a node and an anchor index on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Endpoint {
    pub node: NodeId,
    pub port: u32,
}

impl Endpoint {
    pub fn new(node: NodeId, port: u32) -> Self {
        Endpoint { node, port }
    }
}

/// A node in a compute graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub op: OpDesc,
    /// Producer of each input anchor.
    pub inputs: Vec<Option<Endpoint>>,
    /// Consumers of each output anchor.
    pub outputs: Vec<Vec<Endpoint>>,
    pub ctrl_in: Vec<NodeId>,
    pub ctrl_out: Vec<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subgraph: Option<Box<Graph>>,
}

impl Node {
    fn new(op: OpDesc) -> Self {
        Node {
            inputs: vec![None; op.input_descs.len()],
            outputs: vec![Vec::new(); op.output_descs.len()],
            ctrl_in: Vec::new(),
            ctrl_out: Vec::new(),
            subgraph: None,
            op,
        }
    }

    pub fn name(&self) -> &str {
        &self.op.name
    }

    pub fn kind(&self) -> OpKind {
        self.op.kind()
    }
}

/// A compute graph: node arena plus execution listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub name: String,
    slots: Vec<Option<Node>>,
    order: Vec<NodeId>,
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        Graph {
            name: name.into(),
            slots: Vec::new(),
            order: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Node handles in execution-listing order.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id.0 as usize).and_then(Option::as_ref)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    pub fn get(&self, id: NodeId) -> Result<&Node, FusionError> {
        self.node(id).ok_or_else(|| self.missing(id))
    }

    pub fn get_mut(&mut self, id: NodeId) -> Result<&mut Node, FusionError> {
        let graph = self.name.clone();
        self.node_mut(id)
            .ok_or(FusionError::MissingNode { graph, node: id })
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Nodes in execution-listing order. Dangling handles are skipped.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.order
            .iter()
            .filter_map(move |&id| self.node(id).map(|n| (id, n)))
    }

    /// Linear lookup by operator name.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes().find(|(_, n)| n.name() == name).map(|(id, _)| id)
    }

    pub fn position(&self, id: NodeId) -> Option<usize> {
        self.order.iter().position(|&n| n == id)
    }

    /// Display name of a handle, for messages.
    pub fn name_of(&self, id: NodeId) -> String {
        self.node(id)
            .map(|n| n.op.name.clone())
            .unwrap_or_else(|| format!("<{}>", id))
    }

    fn missing(&self, id: NodeId) -> FusionError {
        FusionError::MissingNode {
            graph: self.name.clone(),
            node: id,
        }
    }

    // ── Insertion ───────────────────────────────────────────────────────

    fn alloc(&mut self, op: OpDesc) -> NodeId {
        let id = NodeId(self.slots.len() as u32);
        self.slots.push(Some(Node::new(op)));
        id
    }

    /// Append a node at the end of the listing.
    pub fn add_node(&mut self, op: OpDesc) -> NodeId {
        let id = self.alloc(op);
        self.order.push(id);
        id
    }

    /// Insert a node at listing position `pos` (clamped to the end).
    pub fn insert_at(&mut self, pos: usize, op: OpDesc) -> NodeId {
        let id = self.alloc(op);
        let pos = pos.min(self.order.len());
        self.order.insert(pos, id);
        id
    }

    pub fn insert_after(&mut self, anchor: NodeId, op: OpDesc) -> Result<NodeId, FusionError> {
        let pos = self.position(anchor).ok_or_else(|| self.missing(anchor))?;
        Ok(self.insert_at(pos + 1, op))
    }

    pub fn insert_before(&mut self, anchor: NodeId, op: OpDesc) -> Result<NodeId, FusionError> {
        let pos = self.position(anchor).ok_or_else(|| self.missing(anchor))?;
        Ok(self.insert_at(pos, op))
    }

    // ── Edges ───────────────────────────────────────────────────────────

    /// Connect output anchor `src` to input anchor `dst`.
    pub fn connect(&mut self, src: Endpoint, dst: Endpoint) -> Result<(), FusionError> {
        {
            let from = self.get(src.node)?;
            if src.port as usize >= from.outputs.len() {
                return Err(FusionError::MalformedAnchor {
                    node: from.op.name.clone(),
                    detail: format!(
                        "output anchor {} out of range ({} outputs)",
                        src.port,
                        from.outputs.len()
                    ),
                });
            }
            let to = self.get(dst.node)?;
            match to.inputs.get(dst.port as usize) {
                None => {
                    return Err(FusionError::MalformedAnchor {
                        node: to.op.name.clone(),
                        detail: format!(
                            "input anchor {} out of range ({} inputs)",
                            dst.port,
                            to.inputs.len()
                        ),
                    })
                }
                Some(Some(_)) => {
                    return Err(FusionError::MalformedAnchor {
                        node: to.op.name.clone(),
                        detail: format!("input anchor {} is already connected", dst.port),
                    })
                }
                Some(None) => {}
            }
        }
        self.get_mut(src.node)?.outputs[src.port as usize].push(dst);
        self.get_mut(dst.node)?.inputs[dst.port as usize] = Some(src);
        Ok(())
    }

    /// Add a control edge; duplicates are ignored.
    pub fn add_control(&mut self, from: NodeId, to: NodeId) -> Result<(), FusionError> {
        self.get(to)?;
        let src = self.get_mut(from)?;
        if src.ctrl_out.contains(&to) {
            return Ok(());
        }
        src.ctrl_out.push(to);
        self.get_mut(to)?.ctrl_in.push(from);
        Ok(())
    }

    /// All data edges as (producer anchor, consumer anchor), in listing order.
    pub fn data_edges(&self) -> Vec<(Endpoint, Endpoint)> {
        let mut edges = Vec::new();
        for (id, node) in self.nodes() {
            for (port, dests) in node.outputs.iter().enumerate() {
                for &dst in dests {
                    edges.push((Endpoint::new(id, port as u32), dst));
                }
            }
        }
        edges
    }

    /// All control edges as (from, to), in listing order.
    pub fn control_edges(&self) -> Vec<(NodeId, NodeId)> {
        let mut edges = Vec::new();
        for (id, node) in self.nodes() {
            for &to in &node.ctrl_out {
                edges.push((id, to));
            }
        }
        edges
    }

    // ── Removal ─────────────────────────────────────────────────────────

    /// Remove a node and every edge touching it. The returned node keeps its
    /// operator definition and subgraph; its edge lists are cleared.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node, FusionError> {
        let taken = self.slots.get_mut(id.0 as usize).and_then(Option::take);
        let mut node = match taken {
            Some(n) => n,
            None => return Err(self.missing(id)),
        };

        for (port, src) in node.inputs.iter().enumerate() {
            if let Some(src) = src {
                if let Some(peer) = self.node_mut(src.node) {
                    if let Some(dests) = peer.outputs.get_mut(src.port as usize) {
                        dests.retain(|d| *d != Endpoint::new(id, port as u32));
                    }
                }
            }
        }
        for dests in &node.outputs {
            for dst in dests {
                if let Some(peer) = self.node_mut(dst.node) {
                    if let Some(slot) = peer.inputs.get_mut(dst.port as usize) {
                        *slot = None;
                    }
                }
            }
        }
        for &pred in &node.ctrl_in {
            if let Some(peer) = self.node_mut(pred) {
                peer.ctrl_out.retain(|&n| n != id);
            }
        }
        for &succ in &node.ctrl_out {
            if let Some(peer) = self.node_mut(succ) {
                peer.ctrl_in.retain(|&n| n != id);
            }
        }

        self.order.retain(|&n| n != id);
        node.inputs.iter_mut().for_each(|slot| *slot = None);
        node.outputs.iter_mut().for_each(Vec::clear);
        node.ctrl_in.clear();
        node.ctrl_out.clear();
        Ok(node)
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// Per-stream node lists, each in listing order.
    pub fn stream_lists(&self) -> BTreeMap<StreamId, Vec<NodeId>> {
        let mut lists: BTreeMap<StreamId, Vec<NodeId>> = BTreeMap::new();
        for (id, node) in self.nodes() {
            lists.entry(node.op.stream).or_default().push(id);
        }
        lists
    }

    /// Total node count including nested subgraphs at any depth.
    pub fn total_len(&self) -> usize {
        self.nodes()
            .map(|(_, n)| 1 + n.subgraph.as_ref().map_or(0, |g| g.total_len()))
            .sum()
    }

    /// Check that every listed handle resolves, every anchor count matches
    /// its descriptors, and both sides of every edge agree.
    pub fn validate(&self) -> Result<(), FusionError> {
        for &id in &self.order {
            let node = self.get(id)?;
            if node.inputs.len() != node.op.input_descs.len() {
                return Err(FusionError::CountMismatch {
                    node: node.op.name.clone(),
                    what: "input_descs",
                    expected: node.inputs.len(),
                    actual: node.op.input_descs.len(),
                });
            }
            if node.outputs.len() != node.op.output_descs.len() {
                return Err(FusionError::CountMismatch {
                    node: node.op.name.clone(),
                    what: "output_descs",
                    expected: node.outputs.len(),
                    actual: node.op.output_descs.len(),
                });
            }
            for (port, src) in node.inputs.iter().enumerate() {
                let Some(src) = src else { continue };
                let back = Endpoint::new(id, port as u32);
                let ok = self
                    .get(src.node)?
                    .outputs
                    .get(src.port as usize)
                    .is_some_and(|dests| dests.contains(&back));
                if !ok {
                    return Err(FusionError::MalformedAnchor {
                        node: node.op.name.clone(),
                        detail: format!(
                            "input anchor {} names '{}' output {} which does not link back",
                            port,
                            self.name_of(src.node),
                            src.port
                        ),
                    });
                }
            }
            for &succ in &node.ctrl_out {
                if !self.get(succ)?.ctrl_in.contains(&id) {
                    return Err(FusionError::MalformedAnchor {
                        node: node.op.name.clone(),
                        detail: format!(
                            "control edge to '{}' has no reverse entry",
                            self.name_of(succ)
                        ),
                    });
                }
            }
            if let Some(sub) = &node.subgraph {
                sub.validate()?;
            }
        }
        Ok(())
    }
}

// ── Display ─────────────────────────────────────────────────────────────────

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_graph(f, self, 0)
    }
}

fn write_graph(f: &mut fmt::Formatter<'_>, graph: &Graph, depth: usize) -> fmt::Result {
    let pad = "  ".repeat(depth);
    writeln!(f, "{}graph '{}' ({} nodes)", pad, graph.name, graph.len())?;
    for (_, node) in graph.nodes() {
        write!(
            f,
            "{}  [{}] {} : {} stream={}",
            pad, node.op.topo_id, node.op.name, node.op.op_type, node.op.stream
        )?;
        if let Some(scope) = node.op.attrs.scope() {
            write!(f, " scope={}", scope)?;
        }
        if let Some(event) = node.op.attrs.event_id() {
            write!(f, " event={}", event)?;
        }
        writeln!(f)?;
        for (port, src) in node.inputs.iter().enumerate() {
            if let Some(src) = src {
                writeln!(
                    f,
                    "{}      in{} <- {}.{}",
                    pad,
                    port,
                    graph.name_of(src.node),
                    src.port
                )?;
            }
        }
        for &succ in &node.ctrl_out {
            writeln!(f, "{}      ctrl -> {}", pad, graph.name_of(succ))?;
        }
        if let Some(sub) = &node.subgraph {
            write_graph(f, sub, depth + 2)?;
        }
    }
    Ok(())
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn op(name: &str, n_in: usize, n_out: usize) -> OpDesc {
        OpDesc::new(name, "Relu")
            .with_inputs(vec![TensorDesc::default(); n_in])
            .with_outputs(vec![TensorDesc::default(); n_out])
    }

    #[test]
    fn connect_links_both_sides() {
        let mut g = Graph::new("g");
        let a = g.add_node(op("a", 0, 1));
        let b = g.add_node(op("b", 1, 0));
        g.connect(Endpoint::new(a, 0), Endpoint::new(b, 0)).unwrap();
        assert_eq!(g.get(a).unwrap().outputs[0], vec![Endpoint::new(b, 0)]);
        assert_eq!(g.get(b).unwrap().inputs[0], Some(Endpoint::new(a, 0)));
        assert!(g.validate().is_ok());
    }

    #[test]
    fn connect_rejects_bound_input_and_bad_port() {
        let mut g = Graph::new("g");
        let a = g.add_node(op("a", 0, 1));
        let b = g.add_node(op("b", 1, 0));
        g.connect(Endpoint::new(a, 0), Endpoint::new(b, 0)).unwrap();
        assert!(matches!(
            g.connect(Endpoint::new(a, 0), Endpoint::new(b, 0)),
            Err(FusionError::MalformedAnchor { .. })
        ));
        assert!(matches!(
            g.connect(Endpoint::new(a, 3), Endpoint::new(b, 0)),
            Err(FusionError::MalformedAnchor { .. })
        ));
    }

    #[test]
    fn remove_node_unlinks_peers() {
        let mut g = Graph::new("g");
        let a = g.add_node(op("a", 0, 1));
        let b = g.add_node(op("b", 1, 1));
        let c = g.add_node(op("c", 1, 0));
        g.connect(Endpoint::new(a, 0), Endpoint::new(b, 0)).unwrap();
        g.connect(Endpoint::new(b, 0), Endpoint::new(c, 0)).unwrap();
        g.add_control(a, c).unwrap();
        g.add_control(b, c).unwrap();

        let removed = g.remove_node(b).unwrap();
        assert_eq!(removed.op.name, "b");
        assert!(removed.inputs.iter().all(Option::is_none));
        assert!(g.get(a).unwrap().outputs[0].is_empty());
        assert_eq!(g.get(c).unwrap().inputs[0], None);
        assert_eq!(g.get(c).unwrap().ctrl_in, vec![a]);
        assert_eq!(g.order(), &[a, c]);
        assert!(matches!(
            g.get(b),
            Err(FusionError::MissingNode { .. })
        ));
        assert!(g.validate().is_ok());
    }

    #[test]
    fn insert_after_and_before_keep_listing_order() {
        let mut g = Graph::new("g");
        let a = g.add_node(op("a", 0, 0));
        let c = g.add_node(op("c", 0, 0));
        let b = g.insert_after(a, op("b", 0, 0)).unwrap();
        let z = g.insert_before(a, op("z", 0, 0)).unwrap();
        assert_eq!(g.order(), &[z, a, b, c]);
    }

    #[test]
    fn stream_lists_follow_listing() {
        let mut g = Graph::new("g");
        let a = g.add_node(op("a", 0, 0).on_stream(StreamId(1)));
        let b = g.add_node(op("b", 0, 0));
        let c = g.add_node(op("c", 0, 0).on_stream(StreamId(1)));
        let lists = g.stream_lists();
        assert_eq!(lists[&StreamId(0)], vec![b]);
        assert_eq!(lists[&StreamId(1)], vec![a, c]);
    }

    #[test]
    fn pass_through_kinds() {
        for ty in ["Data", "Variable", "Const", "Send", "Recv", "SendNotify", "RecvNotify"] {
            assert!(OpKind::from_op_type(ty).is_pass_through(), "{ty}");
        }
        assert!(!OpKind::from_op_type("MatMul").is_pass_through());
        assert!(!OpKind::from_op_type(SUPER_KERNEL).is_pass_through());
    }

    #[test]
    fn collective_engine_implies_fusion_support() {
        let plain = OpDesc::new("a", "AllReduce");
        assert!(!plain.supports_fusion());
        let coll = OpDesc::new("b", "AllReduce").with_engine(COLLECTIVE_ENGINE);
        assert!(coll.supports_fusion());
        let mut vetoed = coll.clone();
        vetoed
            .attrs
            .set(crate::attr::Attr::FusionSupported(false));
        assert!(!vetoed.supports_fusion());
    }

    #[test]
    fn json_round_trip_with_subgraph() {
        let mut inner = Graph::new("inner");
        inner.add_node(op("x", 0, 1));
        let mut g = Graph::new("g");
        let s = g.add_node(OpDesc::new("sk", SUPER_KERNEL));
        g.get_mut(s).unwrap().subgraph = Some(Box::new(inner));
        let json = serde_json::to_string(&g).unwrap();
        let back: Graph = serde_json::from_str(&json).unwrap();
        assert_eq!(back, g);
        assert_eq!(back.total_len(), 2);
    }
}
