// Lexer for graph description (.sgd) files.
//
// Tokenizes the line-oriented graph description language: node declarations,
// tensor descriptor lines, data edges (`a.0 -> b.1`) and control edges
// (`a => b`). Uses the `logos` crate for DFA-based lexing.
//
// Preconditions: input is valid UTF-8.
// Postconditions: returns all tokens with byte-offset spans, plus any lex errors.
// Failure modes: unrecognized characters produce `LexError`; lexing continues.
// Side effects: none.

use logos::Logos;
use std::fmt;

/// Byte-offset span in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A lexer error with location.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

/// Result of lexing: tokens plus any errors (non-fatal).
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<(Token, Span)>,
    pub errors: Vec<LexError>,
}

/// Graph description token types.
///
/// Identifiers carry no value — use the span to retrieve the text.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+|#[^\n]*")]
pub enum Token {
    // ── Keywords ──
    #[token("node")]
    Node,
    #[token("in")]
    In,
    #[token("out")]
    Out,
    #[token("mem")]
    Mem,
    #[token("true")]
    True,
    #[token("false")]
    False,

    // ── Symbols ──
    #[token("->")]
    Arrow,
    #[token("=>")]
    FatArrow,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token("=")]
    Equals,
    #[token("@")]
    At,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    // ── Literals ──
    /// Integer literal, optionally negative.
    #[regex(r"-?[0-9]+", parse_int)]
    Int(i64),

    /// String literal with `\"` and `\\` escapes.
    #[regex(r#""([^"\\]|\\.)*""#, parse_string)]
    StringLit(String),

    /// Identifier: `[a-zA-Z_][a-zA-Z0-9_]*`
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,

    /// One or more newlines (statement terminator).
    #[regex(r"\n+")]
    Newline,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Node => write!(f, "node"),
            Token::In => write!(f, "in"),
            Token::Out => write!(f, "out"),
            Token::Mem => write!(f, "mem"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Arrow => write!(f, "->"),
            Token::FatArrow => write!(f, "=>"),
            Token::Colon => write!(f, ":"),
            Token::Dot => write!(f, "."),
            Token::Comma => write!(f, ","),
            Token::Equals => write!(f, "="),
            Token::At => write!(f, "@"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Int(v) => write!(f, "{v}"),
            Token::StringLit(s) => write!(f, "\"{s}\""),
            Token::Ident => write!(f, "<ident>"),
            Token::Newline => write!(f, "<newline>"),
        }
    }
}

// ── Callbacks ──

fn parse_int(lex: &mut logos::Lexer<'_, Token>) -> Option<i64> {
    lex.slice().parse().ok()
}

fn parse_string(lex: &mut logos::Lexer<'_, Token>) -> Option<String> {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1]; // strip quotes
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next()? {
                '"' => result.push('"'),
                '\\' => result.push('\\'),
                _ => return None,
            }
        } else {
            result.push(c);
        }
    }
    Some(result)
}

// ── Public API ──

/// Lex a graph description into tokens.
///
/// Lexing is non-fatal: errors are collected and the lexer continues past
/// bad characters.
pub fn lex(source: &str) -> LexResult {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, range) in lexer.spanned() {
        let span = Span {
            start: range.start,
            end: range.end,
        };
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => errors.push(LexError {
                span,
                message: format!("unexpected character: {:?}", &source[span.start..span.end]),
            }),
        }
    }

    LexResult { tokens, errors }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_ok(source: &str) -> Vec<Token> {
        let result = lex(source);
        assert!(
            result.errors.is_empty(),
            "unexpected lex errors: {:?}",
            result.errors
        );
        result.tokens.into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn keywords_vs_identifiers() {
        let tokens = lex_ok("node in out mem true false nodes input");
        assert_eq!(
            tokens,
            vec![
                Token::Node,
                Token::In,
                Token::Out,
                Token::Mem,
                Token::True,
                Token::False,
                Token::Ident,
                Token::Ident,
            ]
        );
    }

    #[test]
    fn data_edge() {
        assert_eq!(
            lex_ok("a.0 -> b.1"),
            vec![
                Token::Ident,
                Token::Dot,
                Token::Int(0),
                Token::Arrow,
                Token::Ident,
                Token::Dot,
                Token::Int(1),
            ]
        );
    }

    #[test]
    fn control_edge_and_negative_int() {
        assert_eq!(
            lex_ok("a => b\n-3"),
            vec![
                Token::Ident,
                Token::FatArrow,
                Token::Ident,
                Token::Newline,
                Token::Int(-3),
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            lex_ok(r#""a\"b\\c""#),
            vec![Token::StringLit("a\"b\\c".to_string())]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            lex_ok("node a : Relu # trailing\n# whole line\n"),
            vec![
                Token::Node,
                Token::Ident,
                Token::Colon,
                Token::Ident,
                Token::Newline,
                Token::Newline,
            ]
        );
    }

    #[test]
    fn bad_character_is_reported() {
        let result = lex("node a ; b");
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].span, Span { start: 7, end: 8 });
    }
}
