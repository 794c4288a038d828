// id.rs — Handles and identifier allocation for the fusion pass
//
// Node handles are arena indices local to one `Graph`; they stay valid until
// the node is removed and are never reused within that graph. Stream and
// event identifiers are graph-wide numeric values read from node attributes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Arena handle of a node inside its owning graph.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub u32);

/// Logical execution lane.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct StreamId(pub i64);

/// Event identifier shared by one signal/wait pair.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EventId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lowest event id handed out for freshly minted synchronization pairs.
pub const FRESH_EVENT_BASE: u32 = 0x1_0000;

/// Graph-wide cursor for fresh event ids.
///
/// Each scope reserves a block sized to its worst-case synchronization count
/// before it is fused; committing the block advances the cursor only by the
/// ids actually consumed, so later scopes never see ids handed out earlier.
/// The cursor is `None` once the `u32` id range is used up.
#[derive(Debug)]
pub struct EventAllocator {
    next: Option<u32>,
}

impl EventAllocator {
    /// Start above both `base` and every id already present in the graph.
    pub fn new(base: u32, max_existing: Option<EventId>) -> Self {
        let above_existing = match max_existing {
            Some(e) => e.0.checked_add(1),
            None => Some(0),
        };
        EventAllocator {
            next: above_existing.map(|a| a.max(base)),
        }
    }

    pub fn cursor(&self) -> Option<u32> {
        self.next
    }

    pub fn reserve(&self, capacity: u32) -> EventBlock {
        EventBlock {
            start: self.next,
            capacity,
            used: 0,
        }
    }

    pub fn commit(&mut self, block: &EventBlock) {
        self.next = block.start.and_then(|s| s.checked_add(block.used));
    }
}

/// A contiguous run of fresh event ids reserved for one scope.
#[derive(Debug, Clone)]
pub struct EventBlock {
    start: Option<u32>,
    capacity: u32,
    used: u32,
}

impl EventBlock {
    /// Next unused id of the block, or `None` once the block or the id range
    /// is exhausted.
    pub fn next_id(&mut self) -> Option<EventId> {
        if self.used >= self.capacity {
            return None;
        }
        let id = self.start?.checked_add(self.used)?;
        self.used += 1;
        Some(EventId(id))
    }

    /// True when ids ran out before the block's capacity did.
    pub fn range_exhausted(&self) -> bool {
        self.used < self.capacity
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn used(&self) -> u32 {
        self.used
    }
}
