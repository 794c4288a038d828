// Parser for graph description (.sgd) files.
//
// Parses a token stream (from the lexer) into a `Document`. Uses chumsky
// combinators. Grammar (one statement per line):
//
//   node_stmt    := 'node' IDENT ':' IDENT ('(' attr (',' attr)* ')')?
//   desc_stmt    := ('in' | 'out') port ':' IDENT '[' INT,* ']' ('@' INT)? ('mem' INT)?
//   data_edge    := port '->' port
//   control_edge := IDENT '=>' IDENT
//   port         := IDENT '.' INT
//
// Preconditions: input is a valid token stream from `lexer::lex()`.
// Postconditions: returns a document plus any parse errors (non-fatal).
// Failure modes: syntax errors produce `Rich` diagnostics.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::ast::*;
use crate::lexer::Token;

/// Result of parsing: document plus any errors.
#[derive(Debug)]
pub struct ParseResult {
    pub document: Option<Document>,
    pub errors: Vec<Rich<'static, Token, SimpleSpan>>,
}

/// Parse a graph description. Lexes then parses.
pub fn parse(source: &str) -> ParseResult {
    let lex_result = crate::lexer::lex(source);
    let len = source.len();

    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let parser = document_parser(source);
    let (document, parse_errors) = parser.parse(stream).into_output_errors();

    let mut all_errors: Vec<Rich<'static, Token, SimpleSpan>> = lex_result
        .errors
        .into_iter()
        .map(|e| {
            let span: SimpleSpan = (e.span.start..e.span.end).into();
            Rich::custom(span, e.message)
        })
        .collect();
    all_errors.extend(parse_errors.into_iter().map(|e| e.into_owned()));

    ParseResult {
        document,
        errors: all_errors,
    }
}

// ── Main parser builder ──

fn document_parser<'tokens, 'src: 'tokens, I>(
    source: &'src str,
) -> impl Parser<'tokens, I, Document, extra::Err<Rich<'tokens, Token, SimpleSpan>>> + 'src
where
    'tokens: 'src,
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    let nl = just(Token::Newline).repeated().ignored();

    let ident = just(Token::Ident).map_with(move |_, e| {
        let span: SimpleSpan = e.span();
        Ident {
            name: source[span.start()..span.end()].to_string(),
            span,
        }
    });

    let int = select! {
        Token::Int(n) => n,
    };

    let int_list = int
        .clone()
        .separated_by(just(Token::Comma))
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LBracket), just(Token::RBracket));

    // ── Attributes ──

    let literal = select! {
        Token::Int(n) = e => AttrLit::Int(n, e.span()),
        Token::StringLit(s) = e => AttrLit::Str(s, e.span()),
        Token::True = e => AttrLit::Bool(true, e.span()),
        Token::False = e => AttrLit::Bool(false, e.span()),
    };

    let attr_value = int_list
        .clone()
        .map_with(|values, e| AttrLit::IntList(values, e.span()))
        .or(literal);

    let attr = ident
        .clone()
        .then_ignore(just(Token::Equals))
        .then(attr_value)
        .map_with(|(key, value), e| AttrDecl {
            key,
            value,
            span: e.span(),
        });

    let attrs = attr
        .separated_by(just(Token::Comma))
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LParen), just(Token::RParen));

    let node_stmt = just(Token::Node)
        .ignore_then(ident.clone())
        .then_ignore(just(Token::Colon))
        .then(ident.clone())
        .then(attrs.or_not())
        .map(|((name, op_type), attrs)| {
            StatementKind::Node(NodeDecl {
                name,
                op_type,
                attrs: attrs.unwrap_or_default(),
            })
        });

    // ── Ports ──

    let port = ident
        .clone()
        .then_ignore(just(Token::Dot))
        .then(int.clone())
        .map_with(|(node, index), e| PortRef {
            node,
            index,
            span: e.span(),
        });

    // ── Descriptor lines ──

    let direction = just(Token::In)
        .to(Direction::Input)
        .or(just(Token::Out).to(Direction::Output));

    let desc_stmt = direction
        .then(port.clone())
        .then_ignore(just(Token::Colon))
        .then(ident.clone())
        .then(int_list.clone())
        .then(just(Token::At).ignore_then(int.clone()).or_not())
        .then(just(Token::Mem).ignore_then(int.clone()).or_not())
        .map(|(((((direction, port), dtype), shape), offset), mem_type)| {
            StatementKind::Desc(DescDecl {
                direction,
                port,
                dtype,
                shape,
                offset,
                mem_type,
            })
        });

    // ── Edges ──

    let data_edge = port
        .clone()
        .then_ignore(just(Token::Arrow))
        .then(port)
        .map(|(src, dst)| StatementKind::Data(DataEdgeDecl { src, dst }));

    let control_edge = ident
        .clone()
        .then_ignore(just(Token::FatArrow))
        .then(ident)
        .map(|(from, to)| StatementKind::Control(ControlEdgeDecl { from, to }));

    // ── Statement dispatch ──

    let statement = choice((node_stmt, desc_stmt, data_edge, control_edge)).map_with(
        |kind, e| Statement {
            kind,
            span: e.span(),
        },
    );

    // ── Document ──

    nl.clone()
        .ignore_then(
            statement
                .separated_by(just(Token::Newline).repeated().at_least(1))
                .allow_trailing()
                .collect::<Vec<_>>(),
        )
        .then_ignore(nl)
        .map_with(|statements, e| Document {
            statements,
            span: e.span(),
        })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Document {
        let result = parse(source);
        assert!(
            result.errors.is_empty(),
            "unexpected errors: {:#?}",
            result.errors
        );
        result.document.expect("expected document")
    }

    fn parse_one_stmt(source: &str) -> Statement {
        let doc = parse_ok(source);
        assert_eq!(doc.statements.len(), 1, "expected 1 statement");
        doc.statements.into_iter().next().unwrap()
    }

    #[test]
    fn empty_document() {
        let doc = parse_ok("");
        assert!(doc.statements.is_empty());
        let doc = parse_ok("\n\n# only a comment\n");
        assert!(doc.statements.is_empty());
    }

    #[test]
    fn node_without_attrs() {
        let s = parse_one_stmt("node x : Data");
        let StatementKind::Node(n) = &s.kind else {
            panic!("expected Node")
        };
        assert_eq!(n.name.name, "x");
        assert_eq!(n.op_type.name, "Data");
        assert!(n.attrs.is_empty());
    }

    #[test]
    fn node_with_attrs() {
        let s = parse_one_stmt(
            "node a : Relu (stream = 1, scope = \"S\", fusion = true, dims = [1, 2])",
        );
        let StatementKind::Node(n) = &s.kind else {
            panic!("expected Node")
        };
        assert_eq!(n.attrs.len(), 4);
        assert_eq!(n.attrs[0].key.name, "stream");
        assert!(matches!(n.attrs[0].value, AttrLit::Int(1, _)));
        assert!(matches!(&n.attrs[1].value, AttrLit::Str(s, _) if s == "S"));
        assert!(matches!(n.attrs[2].value, AttrLit::Bool(true, _)));
        assert!(matches!(&n.attrs[3].value, AttrLit::IntList(v, _) if v == &vec![1, 2]));
    }

    #[test]
    fn descriptor_line() {
        let s = parse_one_stmt("out a.0 : float16[1, 16] @ 64 mem 2");
        let StatementKind::Desc(d) = &s.kind else {
            panic!("expected Desc")
        };
        assert_eq!(d.direction, Direction::Output);
        assert_eq!(d.port.node.name, "a");
        assert_eq!(d.port.index, 0);
        assert_eq!(d.dtype.name, "float16");
        assert_eq!(d.shape, vec![1, 16]);
        assert_eq!(d.offset, Some(64));
        assert_eq!(d.mem_type, Some(2));
    }

    #[test]
    fn scalar_descriptor_without_placement() {
        let s = parse_one_stmt("in b.1 : int32[]");
        let StatementKind::Desc(d) = &s.kind else {
            panic!("expected Desc")
        };
        assert_eq!(d.direction, Direction::Input);
        assert!(d.shape.is_empty());
        assert_eq!(d.offset, None);
        assert_eq!(d.mem_type, None);
    }

    #[test]
    fn data_and_control_edges() {
        let doc = parse_ok("a.0 -> b.1\na => b\n");
        assert_eq!(doc.statements.len(), 2);
        let StatementKind::Data(d) = &doc.statements[0].kind else {
            panic!("expected Data")
        };
        assert_eq!(d.src.node.name, "a");
        assert_eq!(d.dst.index, 1);
        let StatementKind::Control(c) = &doc.statements[1].kind else {
            panic!("expected Control")
        };
        assert_eq!(c.from.name, "a");
        assert_eq!(c.to.name, "b");
    }

    #[test]
    fn blank_lines_between_statements() {
        let doc = parse_ok("\nnode a : Relu\n\n\nnode b : Relu\n\n");
        assert_eq!(doc.statements.len(), 2);
    }

    #[test]
    fn syntax_error_is_reported() {
        let result = parse("node a Relu\n");
        assert!(!result.errors.is_empty());
    }
}
