// error.rs — Fatal error taxonomy of the fusion pass
//
// Every variant aborts the whole pass. Recoverable findings never use this
// type; they are reported as `Diagnostic`s instead.

use thiserror::Error;

use crate::diag::{codes, DiagCode};
use crate::id::{EventId, NodeId};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FusionError {
    // ── Configuration ──
    #[error("scope '{scope}': invalid value '{value}' for option '{key}'")]
    InvalidOption {
        scope: String,
        key: String,
        value: String,
    },
    #[error("scope '{scope}': malformed option item '{item}' (expected key=value)")]
    MalformedOption { scope: String, item: String },
    #[error(
        "scope '{scope}' is broken by node '{node}' (topo {topo_id}, stream {stream}) and strict-scope-check=abort is set"
    )]
    ScopeBroken {
        scope: String,
        node: String,
        topo_id: i64,
        stream: i64,
    },

    // ── Structural corruption ──
    #[error("graph '{graph}': node handle {node} does not exist")]
    MissingNode { graph: String, node: NodeId },
    #[error("node '{node}': {detail}")]
    MalformedAnchor { node: String, detail: String },
    #[error("sync node '{node}' has {count} control peers, expected exactly one")]
    MissingControlPeer { node: String, count: usize },
    #[error("sync node '{node}' carries no event id")]
    MissingEventId { node: String },
    #[error("event {event}: {detail}")]
    InconsistentPair { event: EventId, detail: String },
    #[error("node '{node}': {what} has {actual} entries but the node has {expected} anchors")]
    CountMismatch {
        node: String,
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("scope '{scope}': reserved block of {capacity} event ids exhausted")]
    EventBlockExhausted { scope: String, capacity: u32 },
    #[error("scope '{scope}': event id range exhausted")]
    EventRangeExhausted { scope: String },
    #[error("scope '{scope}' has no members")]
    EmptyScope { scope: String },
}

impl FusionError {
    /// Stable diagnostic code for this error.
    pub fn code(&self) -> DiagCode {
        match self {
            FusionError::InvalidOption { .. } => codes::E0100,
            FusionError::MalformedOption { .. } => codes::E0101,
            FusionError::ScopeBroken { .. } => codes::E0102,
            FusionError::MissingNode { .. } => codes::E0200,
            FusionError::MalformedAnchor { .. } => codes::E0201,
            FusionError::MissingControlPeer { .. } => codes::E0202,
            FusionError::MissingEventId { .. } => codes::E0203,
            FusionError::InconsistentPair { .. } => codes::E0204,
            FusionError::CountMismatch { .. } => codes::E0205,
            FusionError::EventBlockExhausted { .. } => codes::E0206,
            FusionError::EventRangeExhausted { .. } => codes::E0207,
            FusionError::EmptyScope { .. } => codes::E0208,
        }
    }

    /// True for errors caused by scope configuration rather than a corrupt graph.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            FusionError::InvalidOption { .. }
                | FusionError::MalformedOption { .. }
                | FusionError::ScopeBroken { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_names_scope_and_value() {
        let err = FusionError::InvalidOption {
            scope: "blk0".into(),
            key: "strict-scope-check".into(),
            value: "lenient".into(),
        };
        assert_eq!(
            err.to_string(),
            "scope 'blk0': invalid value 'lenient' for option 'strict-scope-check'"
        );
        assert!(err.is_configuration());
        assert_eq!(err.code(), codes::E0100);
    }

    #[test]
    fn structural_errors_are_not_configuration() {
        let err = FusionError::MissingEventId { node: "send_3".into() };
        assert!(!err.is_configuration());
        assert_eq!(err.code(), codes::E0203);
    }
}
