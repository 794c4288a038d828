// attr.rs — Typed node attribute registry
//
// Node attributes written by upstream passes (scope membership, fusion
// support, event ids, memory types) are modelled as a closed enum of known
// kinds plus a `Custom` fallback, so every lookup is an explicit `Option`
// branch instead of a silent default.
//
// Preconditions: none (data-only module).
// Postconditions: at most one attribute per kind (per name for `Custom`).
// Failure modes: none.
// Side effects: none.

use std::mem;

use serde::{Deserialize, Serialize};

use crate::id::EventId;

/// Value payload of a custom (forward-compatible) attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Str(String),
    IntList(Vec<i64>),
}

/// A single node attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Attr {
    /// Fusion scope the node was assigned to by the marking pass.
    Scope(String),
    /// Explicit "supports super-kernel fusion" flag.
    FusionSupported(bool),
    /// Colon-separated `key=value` scope options.
    ScopeOptions(String),
    /// Event id of a signal/wait node.
    EventId(EventId),
    InputMemTypes(Vec<i64>),
    OutputMemTypes(Vec<i64>),
    /// Super-node port an inner placeholder stands for.
    ParentIndex(u32),
    /// Scope a super node was built from.
    FusedScope(String),
    Custom { name: String, value: AttrValue },
}

impl Attr {
    fn same_key(&self, other: &Attr) -> bool {
        match (self, other) {
            (Attr::Custom { name: a, .. }, Attr::Custom { name: b, .. }) => a == b,
            _ => mem::discriminant(self) == mem::discriminant(other),
        }
    }
}

/// Ordered attribute list of one operator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attrs(Vec<Attr>);

impl Attrs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attr> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Insert `attr`, replacing any attribute of the same kind.
    pub fn set(&mut self, attr: Attr) {
        match self.0.iter_mut().find(|a| a.same_key(&attr)) {
            Some(slot) => *slot = attr,
            None => self.0.push(attr),
        }
    }

    pub fn with(mut self, attr: Attr) -> Self {
        self.set(attr);
        self
    }

    pub fn scope(&self) -> Option<&str> {
        self.0.iter().find_map(|a| match a {
            Attr::Scope(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn set_scope(&mut self, scope: impl Into<String>) {
        self.set(Attr::Scope(scope.into()));
    }

    /// Remove the scope attribute, returning the old scope name.
    pub fn remove_scope(&mut self) -> Option<String> {
        let pos = self.0.iter().position(|a| matches!(a, Attr::Scope(_)))?;
        match self.0.remove(pos) {
            Attr::Scope(s) => Some(s),
            _ => None,
        }
    }

    pub fn fusion_supported(&self) -> Option<bool> {
        self.0.iter().find_map(|a| match a {
            Attr::FusionSupported(b) => Some(*b),
            _ => None,
        })
    }

    pub fn scope_options(&self) -> Option<&str> {
        self.0.iter().find_map(|a| match a {
            Attr::ScopeOptions(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn event_id(&self) -> Option<EventId> {
        self.0.iter().find_map(|a| match a {
            Attr::EventId(e) => Some(*e),
            _ => None,
        })
    }

    pub fn input_mem_types(&self) -> Option<&[i64]> {
        self.0.iter().find_map(|a| match a {
            Attr::InputMemTypes(v) => Some(v.as_slice()),
            _ => None,
        })
    }

    pub fn output_mem_types(&self) -> Option<&[i64]> {
        self.0.iter().find_map(|a| match a {
            Attr::OutputMemTypes(v) => Some(v.as_slice()),
            _ => None,
        })
    }

    pub fn parent_index(&self) -> Option<u32> {
        self.0.iter().find_map(|a| match a {
            Attr::ParentIndex(i) => Some(*i),
            _ => None,
        })
    }

    pub fn fused_scope(&self) -> Option<&str> {
        self.0.iter().find_map(|a| match a {
            Attr::FusedScope(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn custom(&self, name: &str) -> Option<&AttrValue> {
        self.0.iter().find_map(|a| match a {
            Attr::Custom { name: n, value } if n == name => Some(value),
            _ => None,
        })
    }
}
