// build.rs — Graph construction from a parsed graph description
//
// Lowers a `Document` into a root `Graph`: one node per `node` statement (in
// declaration order), anchors sized to the highest port referenced by any
// descriptor or edge, descriptors/offsets/memory types filled from `in`/`out`
// lines, then data and control edges.
//
// Preconditions: `doc` is a parsed document.
// Postconditions: on success the graph passes `Graph::validate`.
// Failure modes: unknown or duplicate nodes, ill-typed attributes, bad ports,
//                double-bound inputs → error diagnostics with spans.
// Side effects: none.

use std::collections::HashMap;

use crate::ast::*;
use crate::attr::{Attr, AttrValue, Attrs};
use crate::diag::{codes, has_errors, Diagnostic};
use crate::graph::{Endpoint, Graph, OpDesc, TensorDesc, UNPLACED_OFFSET};
use crate::id::{EventId, NodeId, StreamId};

/// Result of graph construction.
#[derive(Debug)]
pub struct BuildResult {
    pub graph: Graph,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse and build a graph description in one step.
pub fn load_source(name: &str, source: &str) -> Result<Graph, Vec<Diagnostic>> {
    let parsed = crate::parser::parse(source);
    if !parsed.errors.is_empty() {
        return Err(parsed
            .errors
            .iter()
            .map(|e| {
                let span = *e.span();
                Diagnostic::error(codes::E0300, e.to_string()).with_span(span)
            })
            .collect());
    }
    let Some(doc) = parsed.document else {
        return Err(vec![Diagnostic::error(
            codes::E0300,
            "parse produced no document",
        )]);
    };
    let result = build_graph(&doc, name);
    if has_errors(&result.diagnostics) {
        return Err(result.diagnostics);
    }
    Ok(result.graph)
}

/// Build a root graph named `main` from source text.
pub fn graph_from_source(source: &str) -> Result<Graph, Vec<Diagnostic>> {
    load_source("main", source)
}

/// Lower a parsed document into a graph.
pub fn build_graph(doc: &Document, name: &str) -> BuildResult {
    let mut builder = GraphBuilder::new(name);
    builder.declare_nodes(doc);
    builder.size_anchors(doc);
    builder.apply_descs(doc);
    let mut graph = builder.materialize();
    builder.link_edges(doc, &mut graph);
    BuildResult {
        graph,
        diagnostics: builder.diagnostics,
    }
}

// ── Internal builder ────────────────────────────────────────────────────────

/// Per-node state collected before the graph is materialized.
struct PendingNode {
    op: OpDesc,
    n_in: usize,
    n_out: usize,
    in_descs: HashMap<usize, DescDecl>,
    out_descs: HashMap<usize, DescDecl>,
}

struct GraphBuilder {
    name: String,
    pending: Vec<PendingNode>,
    index: HashMap<String, usize>,
    decl_spans: Vec<Span>,
    ids: Vec<NodeId>,
    diagnostics: Vec<Diagnostic>,
}

impl GraphBuilder {
    fn new(name: &str) -> Self {
        GraphBuilder {
            name: name.to_string(),
            pending: Vec::new(),
            index: HashMap::new(),
            decl_spans: Vec::new(),
            ids: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn error(&mut self, code: crate::diag::DiagCode, span: Span, message: String) {
        self.diagnostics
            .push(Diagnostic::error(code, message).with_span(span));
    }

    fn lookup(&mut self, ident: &Ident) -> Option<usize> {
        match self.index.get(&ident.name) {
            Some(&i) => Some(i),
            None => {
                self.diagnostics.push(
                    Diagnostic::error(codes::E0301, format!("unknown node '{}'", ident.name))
                        .with_span(ident.span)
                        .with_hint(format!("declare it with `node {} : <Type>`", ident.name)),
                );
                None
            }
        }
    }

    fn port_index(&mut self, port: &PortRef) -> Option<usize> {
        if port.index < 0 || port.index > u32::MAX as i64 {
            self.error(
                codes::E0305,
                port.span,
                format!("port index {} of '{}' is out of range", port.index, port.node.name),
            );
            return None;
        }
        Some(port.index as usize)
    }

    // ── Node declarations ───────────────────────────────────────────────

    fn declare_nodes(&mut self, doc: &Document) {
        for stmt in &doc.statements {
            let StatementKind::Node(decl) = &stmt.kind else {
                continue;
            };
            if let Some(&prev) = self.index.get(&decl.name.name) {
                let prev_span = self.decl_spans[prev];
                self.diagnostics.push(
                    Diagnostic::error(
                        codes::E0302,
                        format!("node '{}' is declared twice", decl.name.name),
                    )
                    .with_span(decl.name.span)
                    .with_related(prev_span, "first declared here"),
                );
                continue;
            }
            let topo = self.pending.len() as i64;
            let mut op = OpDesc::new(decl.name.name.clone(), decl.op_type.name.clone())
                .with_topo(topo);
            for attr in &decl.attrs {
                self.apply_attr(&mut op, attr);
            }
            self.index.insert(decl.name.name.clone(), self.pending.len());
            self.decl_spans.push(decl.name.span);
            self.pending.push(PendingNode {
                op,
                n_in: 0,
                n_out: 0,
                in_descs: HashMap::new(),
                out_descs: HashMap::new(),
            });
        }
    }

    fn apply_attr(&mut self, op: &mut OpDesc, attr: &AttrDecl) {
        let key = attr.key.name.as_str();
        match (key, &attr.value) {
            ("stream", AttrLit::Int(n, _)) => op.stream = StreamId(*n),
            ("topo", AttrLit::Int(n, _)) => op.topo_id = *n,
            ("scope", AttrLit::Str(s, _)) => op.attrs.set(Attr::Scope(s.clone())),
            ("fusion", AttrLit::Bool(b, _)) => op.attrs.set(Attr::FusionSupported(*b)),
            ("options", AttrLit::Str(s, _)) => op.attrs.set(Attr::ScopeOptions(s.clone())),
            ("engine", AttrLit::Str(s, _)) => op.engine = Some(s.clone()),
            ("event", AttrLit::Int(n, span)) => match u32::try_from(*n) {
                Ok(e) => op.attrs.set(Attr::EventId(EventId(e))),
                Err(_) => self.error(
                    codes::E0303,
                    *span,
                    format!("event id {} does not fit an unsigned 32-bit value", n),
                ),
            },
            ("stream" | "topo" | "event", other) => self.attr_type_error(key, "an integer", other),
            ("scope" | "options" | "engine", other) => self.attr_type_error(key, "a string", other),
            ("fusion", other) => self.attr_type_error(key, "a boolean", other),
            (_, value) => op.attrs.set(Attr::Custom {
                name: key.to_string(),
                value: match value {
                    AttrLit::Int(n, _) => AttrValue::Int(*n),
                    AttrLit::Str(s, _) => AttrValue::Str(s.clone()),
                    AttrLit::Bool(b, _) => AttrValue::Bool(*b),
                    AttrLit::IntList(v, _) => AttrValue::IntList(v.clone()),
                },
            }),
        }
    }

    fn attr_type_error(&mut self, key: &str, expected: &str, found: &AttrLit) {
        self.error(
            codes::E0303,
            found.span(),
            format!(
                "attribute '{}' expects {}, found {}",
                key,
                expected,
                found.type_name()
            ),
        );
    }

    // ── Anchors and descriptors ─────────────────────────────────────────

    fn size_anchors(&mut self, doc: &Document) {
        for stmt in &doc.statements {
            match &stmt.kind {
                StatementKind::Desc(d) => {
                    let (Some(n), Some(p)) = (self.lookup(&d.port.node), self.port_index(&d.port))
                    else {
                        continue;
                    };
                    let node = &mut self.pending[n];
                    match d.direction {
                        Direction::Input => node.n_in = node.n_in.max(p + 1),
                        Direction::Output => node.n_out = node.n_out.max(p + 1),
                    }
                }
                StatementKind::Data(e) => {
                    if let (Some(n), Some(p)) = (self.lookup(&e.src.node), self.port_index(&e.src))
                    {
                        let node = &mut self.pending[n];
                        node.n_out = node.n_out.max(p + 1);
                    }
                    if let (Some(n), Some(p)) = (self.lookup(&e.dst.node), self.port_index(&e.dst))
                    {
                        let node = &mut self.pending[n];
                        node.n_in = node.n_in.max(p + 1);
                    }
                }
                StatementKind::Node(_) | StatementKind::Control(_) => {}
            }
        }
    }

    fn apply_descs(&mut self, doc: &Document) {
        for stmt in &doc.statements {
            let StatementKind::Desc(d) = &stmt.kind else {
                continue;
            };
            let (Some(&n), Ok(p)) = (self.index.get(&d.port.node.name), usize::try_from(d.port.index))
            else {
                continue;
            };
            let node = &mut self.pending[n];
            match d.direction {
                Direction::Input => node.in_descs.insert(p, d.clone()),
                Direction::Output => node.out_descs.insert(p, d.clone()),
            };
        }
    }

    fn materialize(&mut self) -> Graph {
        let mut graph = Graph::new(self.name.clone());
        for pending in std::mem::take(&mut self.pending) {
            let mut op = pending.op;
            let (descs, offsets, mem_types) = expand_descs(pending.n_in, &pending.in_descs);
            op.input_descs = descs;
            op.input_offsets = offsets;
            if let Some(m) = mem_types {
                op.attrs.set(Attr::InputMemTypes(m));
            }
            let (descs, offsets, mem_types) = expand_descs(pending.n_out, &pending.out_descs);
            op.output_descs = descs;
            op.output_offsets = offsets;
            if let Some(m) = mem_types {
                op.attrs.set(Attr::OutputMemTypes(m));
            }
            self.ids.push(graph.add_node(op));
        }
        graph
    }

    // ── Edges ───────────────────────────────────────────────────────────

    fn link_edges(&mut self, doc: &Document, graph: &mut Graph) {
        for stmt in &doc.statements {
            match &stmt.kind {
                StatementKind::Data(e) => {
                    let (Some(&s), Some(&d)) =
                        (self.index.get(&e.src.node.name), self.index.get(&e.dst.node.name))
                    else {
                        continue;
                    };
                    if e.src.index < 0 || e.dst.index < 0 {
                        continue;
                    }
                    let src = Endpoint::new(self.ids[s], e.src.index as u32);
                    let dst = Endpoint::new(self.ids[d], e.dst.index as u32);
                    if let Err(err) = graph.connect(src, dst) {
                        self.error(codes::E0304, stmt.span, err.to_string());
                    }
                }
                StatementKind::Control(c) => {
                    let (Some(&f), Some(&t)) =
                        (self.index.get(&c.from.name), self.index.get(&c.to.name))
                    else {
                        self.lookup(&c.from);
                        self.lookup(&c.to);
                        continue;
                    };
                    if let Err(err) = graph.add_control(self.ids[f], self.ids[t]) {
                        self.error(codes::E0304, stmt.span, err.to_string());
                    }
                }
                StatementKind::Node(_) | StatementKind::Desc(_) => {}
            }
        }
    }
}

/// Expand sparse descriptor lines into dense per-anchor lists. Offsets and
/// memory types are only materialized when at least one anchor declares them.
fn expand_descs(
    count: usize,
    declared: &HashMap<usize, DescDecl>,
) -> (Vec<TensorDesc>, Vec<i64>, Option<Vec<i64>>) {
    let mut descs = vec![TensorDesc::default(); count];
    let mut offsets = vec![UNPLACED_OFFSET; count];
    let mut mem_types = vec![0; count];
    let mut any_offset = false;
    let mut any_mem = false;
    for (&port, d) in declared {
        descs[port] = TensorDesc::new(d.dtype.name.clone(), d.shape.clone());
        if let Some(o) = d.offset {
            offsets[port] = o;
            any_offset = true;
        }
        if let Some(m) = d.mem_type {
            mem_types[port] = m;
            any_mem = true;
        }
    }
    if !any_offset {
        offsets.clear();
    }
    (descs, offsets, any_mem.then_some(mem_types))
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::OpKind;

    #[test]
    fn builds_nodes_in_declaration_order() {
        let g = graph_from_source(
            "node x : Data (stream = 1)\nnode a : Relu (scope = \"S\", fusion = true, topo = 9)\n",
        )
        .unwrap();
        assert_eq!(g.len(), 2);
        let x = g.get(g.find("x").unwrap()).unwrap();
        assert_eq!(x.kind(), OpKind::Data);
        assert_eq!(x.op.stream, StreamId(1));
        assert_eq!(x.op.topo_id, 0);
        let a = g.get(g.find("a").unwrap()).unwrap();
        assert_eq!(a.op.topo_id, 9);
        assert_eq!(a.op.attrs.scope(), Some("S"));
        assert_eq!(a.op.attrs.fusion_supported(), Some(true));
    }

    #[test]
    fn anchors_sized_from_edges_and_descs() {
        let g = graph_from_source(
            "node a : Split\nnode b : Add\nout a.1 : float32[4] @ 128 mem 2\na.1 -> b.1\n",
        )
        .unwrap();
        let a = g.get(g.find("a").unwrap()).unwrap();
        assert_eq!(a.outputs.len(), 2);
        assert_eq!(a.op.output_descs[1], TensorDesc::new("float32", vec![4]));
        assert_eq!(a.op.output_descs[0], TensorDesc::default());
        assert_eq!(a.op.output_offsets, vec![UNPLACED_OFFSET, 128]);
        assert_eq!(a.op.attrs.output_mem_types(), Some(&[0, 2][..]));
        let b = g.get(g.find("b").unwrap()).unwrap();
        assert_eq!(b.inputs.len(), 2);
        assert!(b.op.input_offsets.is_empty());
        assert!(g.validate().is_ok());
    }

    #[test]
    fn custom_attributes_are_kept() {
        let g = graph_from_source("node a : Conv (tiles = [2, 2], fast = true)\n").unwrap();
        let a = g.get(g.find("a").unwrap()).unwrap();
        assert_eq!(a.op.attrs.custom("tiles"), Some(&AttrValue::IntList(vec![2, 2])));
        assert_eq!(a.op.attrs.custom("fast"), Some(&AttrValue::Bool(true)));
    }

    #[test]
    fn unknown_node_is_reported() {
        let errs = graph_from_source("node a : Relu\na.0 -> b.0\n").unwrap_err();
        assert!(errs.iter().any(|d| d.code == Some(codes::E0301)));
    }

    #[test]
    fn duplicate_node_is_reported() {
        let errs = graph_from_source("node a : Relu\nnode a : Relu\n").unwrap_err();
        assert_eq!(errs[0].code, Some(codes::E0302));
        assert_eq!(errs[0].related_spans.len(), 1);
    }

    #[test]
    fn ill_typed_attribute_is_reported() {
        let errs = graph_from_source("node a : Relu (stream = \"zero\")\n").unwrap_err();
        assert_eq!(errs[0].code, Some(codes::E0303));
        assert_eq!(
            errs[0].message,
            "attribute 'stream' expects an integer, found string"
        );
    }

    #[test]
    fn double_bound_input_is_reported() {
        let errs = graph_from_source(
            "node a : Relu\nnode b : Relu\nnode c : Add\na.0 -> c.0\nb.0 -> c.0\n",
        )
        .unwrap_err();
        assert_eq!(errs[0].code, Some(codes::E0304));
    }

    #[test]
    fn negative_port_is_reported() {
        let errs = graph_from_source("node a : Relu\nnode b : Relu\na.-1 -> b.0\n").unwrap_err();
        assert!(errs.iter().any(|d| d.code == Some(codes::E0305)));
    }

    #[test]
    fn syntax_errors_map_to_e0300() {
        let errs = graph_from_source("node : Relu\n").unwrap_err();
        assert!(errs.iter().all(|d| d.code == Some(codes::E0300)));
    }
}
