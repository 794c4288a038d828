// AST node types for graph description (.sgd) files.
//
// Every node carries a `SimpleSpan` for error reporting in the graph builder.
//
// Preconditions: produced by the parser from a valid or partially-valid token stream.
// Postconditions: each node's span covers the source range of the construct.
// Failure modes: none (data-only module).
// Side effects: none.

use chumsky::span::SimpleSpan;

/// Byte-offset span (alias for chumsky's `SimpleSpan`).
pub type Span = SimpleSpan;

// ── Root ──

/// A complete graph description: a sequence of statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub statements: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Node(NodeDecl),
    Desc(DescDecl),
    Data(DataEdgeDecl),
    Control(ControlEdgeDecl),
}

/// An identifier with its span.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

// ── node_stmt: 'node' IDENT ':' IDENT ('(' attr (',' attr)* ')')? ──

#[derive(Debug, Clone, PartialEq)]
pub struct NodeDecl {
    pub name: Ident,
    pub op_type: Ident,
    pub attrs: Vec<AttrDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttrDecl {
    pub key: Ident,
    pub value: AttrLit,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttrLit {
    Int(i64, Span),
    Str(String, Span),
    Bool(bool, Span),
    IntList(Vec<i64>, Span),
}

impl AttrLit {
    pub fn span(&self) -> Span {
        match self {
            AttrLit::Int(_, s) | AttrLit::Str(_, s) | AttrLit::Bool(_, s) | AttrLit::IntList(_, s) => *s,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            AttrLit::Int(..) => "integer",
            AttrLit::Str(..) => "string",
            AttrLit::Bool(..) => "boolean",
            AttrLit::IntList(..) => "integer list",
        }
    }
}

// ── port_ref: IDENT '.' INT ──

#[derive(Debug, Clone, PartialEq)]
pub struct PortRef {
    pub node: Ident,
    pub index: i64,
    pub span: Span,
}

// ── desc_stmt: ('in' | 'out') port_ref ':' IDENT '[' INT,* ']' ('@' INT)? ('mem' INT)? ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DescDecl {
    pub direction: Direction,
    pub port: PortRef,
    pub dtype: Ident,
    pub shape: Vec<i64>,
    pub offset: Option<i64>,
    pub mem_type: Option<i64>,
}

// ── data_edge: port_ref '->' port_ref ──

#[derive(Debug, Clone, PartialEq)]
pub struct DataEdgeDecl {
    pub src: PortRef,
    pub dst: PortRef,
}

// ── control_edge: IDENT '=>' IDENT ──

#[derive(Debug, Clone, PartialEq)]
pub struct ControlEdgeDecl {
    pub from: Ident,
    pub to: Ident,
}
