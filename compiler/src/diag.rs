// diag.rs — Unified diagnostics model
//
// Shared diagnostic types for the graph front end and every fusion stage.
// Recoverable findings of the pass (stripped scope attributes, tolerated
// scope breaks, automatic splits) are recorded here; together they form the
// audit trail explaining why a scope did or did not fuse.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use crate::ast::Span;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0100`, `W0100`).
///
/// Codes are `&'static str` constants defined in the `codes` module.
/// Once assigned, a code keeps its meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod codes {
    use super::DiagCode;

    // Configuration
    pub const E0100: DiagCode = DiagCode("E0100"); // invalid option value
    pub const E0101: DiagCode = DiagCode("E0101"); // malformed option item
    pub const E0102: DiagCode = DiagCode("E0102"); // scope broken under abort

    // Structural corruption
    pub const E0200: DiagCode = DiagCode("E0200"); // missing node
    pub const E0201: DiagCode = DiagCode("E0201"); // malformed anchor
    pub const E0202: DiagCode = DiagCode("E0202"); // sync node control peer
    pub const E0203: DiagCode = DiagCode("E0203"); // sync node without event id
    pub const E0204: DiagCode = DiagCode("E0204"); // inconsistent pair
    pub const E0205: DiagCode = DiagCode("E0205"); // descriptor count mismatch
    pub const E0206: DiagCode = DiagCode("E0206"); // event block exhausted
    pub const E0207: DiagCode = DiagCode("E0207"); // event id range exhausted
    pub const E0208: DiagCode = DiagCode("E0208"); // scope without members

    // Graph description front end
    pub const E0300: DiagCode = DiagCode("E0300"); // syntax error
    pub const E0301: DiagCode = DiagCode("E0301"); // unknown node
    pub const E0302: DiagCode = DiagCode("E0302"); // duplicate node
    pub const E0303: DiagCode = DiagCode("E0303"); // attribute type
    pub const E0304: DiagCode = DiagCode("E0304"); // input already bound
    pub const E0305: DiagCode = DiagCode("E0305"); // port out of range

    // Postcondition verification
    pub const E0400: DiagCode = DiagCode("E0400"); // fusion certificate failed

    // Recoverable findings
    pub const W0100: DiagCode = DiagCode("W0100"); // scope stripped from non-fusable node
    pub const W0101: DiagCode = DiagCode("W0101"); // scope break tolerated (bypass)
    pub const W0102: DiagCode = DiagCode("W0102"); // unknown option key
    pub const I0100: DiagCode = DiagCode("I0100"); // scope split
    pub const I0101: DiagCode = DiagCode("I0101"); // scope fused
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagLevel {
    Error,
    Warning,
    Info,
}

// ── Related span ─────────────────────────────────────────────────────────

/// A secondary source location providing context for a diagnostic.
#[derive(Debug, Clone)]
pub struct RelatedSpan {
    pub span: Span,
    pub label: String,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

/// A diagnostic emitted by the front end or any fusion stage.
///
/// Front-end diagnostics carry a source span; pass diagnostics name the
/// scope and node in their message and carry no span.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    pub span: Option<Span>,
    pub message: String,
    pub hint: Option<String>,
    pub related_spans: Vec<RelatedSpan>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn new(level: DiagLevel, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            span: None,
            message: message.into(),
            hint: None,
            related_spans: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn error(code: DiagCode, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Error, message).with_code(code)
    }

    pub fn warning(code: DiagCode, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Warning, message).with_code(code)
    }

    pub fn info(code: DiagCode, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Info, message).with_code(code)
    }

    /// Attach a stable diagnostic code.
    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_related(mut self, span: Span, label: impl Into<String>) -> Self {
        self.related_spans.push(RelatedSpan {
            span,
            label: label.into(),
        });
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagLevel::Error
    }
}

impl From<&crate::error::FusionError> for Diagnostic {
    fn from(err: &crate::error::FusionError) -> Self {
        Diagnostic::error(err.code(), err.to_string())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
            DiagLevel::Info => "info",
        };
        if let Some(code) = &self.code {
            write!(f, "{}[{}]: {}", level, code, self.message)?;
        } else {
            write!(f, "{}: {}", level, self.message)?;
        }
        for note in &self.notes {
            write!(f, "\n  note: {}", note)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

/// True when any diagnostic in `diags` is error-level.
pub fn has_errors(diags: &[Diagnostic]) -> bool {
    diags.iter().any(Diagnostic::is_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_span() -> Span {
        (0..1).into()
    }

    #[test]
    fn display_without_code() {
        let d = Diagnostic::new(DiagLevel::Error, "something failed");
        assert_eq!(format!("{d}"), "error: something failed");
    }

    #[test]
    fn display_with_code_and_note() {
        let d = Diagnostic::info(codes::I0100, "scope 'S' split into 2 scopes")
            .with_note("cut at topo 3");
        assert_eq!(
            format!("{d}"),
            "info[I0100]: scope 'S' split into 2 scopes\n  note: cut at topo 3"
        );
    }

    #[test]
    fn builder_chain() {
        let d = Diagnostic::error(codes::E0301, "unknown node 'x'")
            .with_span(dummy_span())
            .with_hint("declare it with `node x : <Type>`")
            .with_related(dummy_span(), "referenced here");

        assert_eq!(d.code, Some(codes::E0301));
        assert_eq!(d.hint.as_deref(), Some("declare it with `node x : <Type>`"));
        assert_eq!(d.related_spans.len(), 1);
        assert!(has_errors(&[d]));
    }
}
