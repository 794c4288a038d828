// sync.rs — Signal/wait pair discovery and reconstruction
//
// Re-collects every synchronization pair visible from a graph: halves at the
// graph's own level are resolved to full (producer, signal, wait, consumer)
// quadruples; a half whose companion lives in a nested subgraph is kept as a
// foreign half. Also provides the insertion helpers the fusion engine uses to
// rebuild pairs across a new fusion boundary.
//
// Preconditions: every sync node carries an event id and one control peer.
// Postconditions: `PairIndex` maps every event id to exactly one pair.
// Failure modes: duplicate halves, orphaned halves, dangling peers
//                → `FusionError`.
// Side effects: `insert_signal`/`insert_wait` add nodes and control edges.

use std::collections::BTreeMap;

use crate::attr::{Attr, Attrs};
use crate::collect::sync_peer;
use crate::error::FusionError;
use crate::graph::{Graph, OpDesc, RECV, SEND};
use crate::id::{EventId, NodeId, StreamId};

// ── Pair model ──────────────────────────────────────────────────────────────

/// One signal or wait node at the owning graph's level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncHalf {
    pub node: NodeId,
    /// Producer (for a signal) or consumer (for a wait).
    pub peer: NodeId,
    pub stream: StreamId,
    pub op_type: String,
}

/// A synchronization pair as seen from one graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPair {
    pub event: EventId,
    /// Plain `Send`/`Recv` pair; only these free reusable ids.
    pub plain: bool,
    pub signal: Option<SyncHalf>,
    pub wait: Option<SyncHalf>,
}

impl SyncPair {
    /// True when the companion half lives in another graph container.
    pub fn is_foreign(&self) -> bool {
        self.signal.is_none() || self.wait.is_none()
    }

    pub fn producer(&self) -> Option<NodeId> {
        self.signal.as_ref().map(|h| h.peer)
    }

    pub fn consumer(&self) -> Option<NodeId> {
        self.wait.as_ref().map(|h| h.peer)
    }
}

/// Every pair of a graph plus producer/consumer lookup maps.
#[derive(Debug, Clone, Default)]
pub struct PairIndex {
    pub pairs: BTreeMap<EventId, SyncPair>,
    pub by_producer: BTreeMap<NodeId, Vec<EventId>>,
    pub by_consumer: BTreeMap<NodeId, Vec<EventId>>,
}

impl PairIndex {
    /// Events of pairs whose producer or consumer is `node`, ascending.
    pub fn touching(&self, node: NodeId) -> Vec<EventId> {
        let mut events: Vec<EventId> = self
            .by_producer
            .get(&node)
            .into_iter()
            .chain(self.by_consumer.get(&node))
            .flatten()
            .copied()
            .collect();
        events.sort_unstable();
        events.dedup();
        events
    }
}

#[derive(Default)]
struct Occurrences {
    local_signals: Vec<SyncHalf>,
    local_waits: Vec<SyncHalf>,
    nested_signals: usize,
    nested_waits: usize,
}

// ── Discovery ───────────────────────────────────────────────────────────────

/// Resolve every pair with at least one half at `graph`'s own level.
pub fn discover_pairs(graph: &Graph) -> Result<PairIndex, FusionError> {
    let mut occ: BTreeMap<EventId, Occurrences> = BTreeMap::new();

    for (id, node) in graph.nodes() {
        let kind = node.kind();
        if kind.is_sync() {
            let event = node
                .op
                .attrs
                .event_id()
                .ok_or_else(|| FusionError::MissingEventId {
                    node: node.op.name.clone(),
                })?;
            let peer = sync_peer(node)?;
            graph.get(peer)?;
            let half = SyncHalf {
                node: id,
                peer,
                stream: node.op.stream,
                op_type: node.op.op_type.clone(),
            };
            let entry = occ.entry(event).or_default();
            if kind.is_signal() {
                entry.local_signals.push(half);
            } else {
                entry.local_waits.push(half);
            }
        }
        if let Some(sub) = &node.subgraph {
            count_nested(sub, &mut occ)?;
        }
    }

    let mut index = PairIndex::default();
    for (event, o) in occ {
        let signals = o.local_signals.len() + o.nested_signals;
        let waits = o.local_waits.len() + o.nested_waits;
        if o.local_signals.is_empty() && o.local_waits.is_empty() {
            continue;
        }
        if signals != 1 || waits != 1 {
            return Err(FusionError::InconsistentPair {
                event,
                detail: format!("found {} signal(s) and {} wait(s)", signals, waits),
            });
        }
        let signal = o.local_signals.into_iter().next();
        let wait = o.local_waits.into_iter().next();
        let plain = match (&signal, &wait) {
            (Some(s), _) => s.op_type == SEND,
            (None, Some(w)) => w.op_type == RECV,
            (None, None) => false,
        };
        let pair = SyncPair {
            event,
            plain,
            signal,
            wait,
        };
        if let Some(p) = pair.producer() {
            index.by_producer.entry(p).or_default().push(event);
        }
        if let Some(c) = pair.consumer() {
            index.by_consumer.entry(c).or_default().push(event);
        }
        index.pairs.insert(event, pair);
    }
    Ok(index)
}

fn count_nested(graph: &Graph, occ: &mut BTreeMap<EventId, Occurrences>) -> Result<(), FusionError> {
    for (_, node) in graph.nodes() {
        let kind = node.kind();
        if kind.is_sync() {
            let event = node
                .op
                .attrs
                .event_id()
                .ok_or_else(|| FusionError::MissingEventId {
                    node: node.op.name.clone(),
                })?;
            let entry = occ.entry(event).or_default();
            if kind.is_signal() {
                entry.nested_signals += 1;
            } else {
                entry.nested_waits += 1;
            }
        }
        if let Some(sub) = &node.subgraph {
            count_nested(sub, occ)?;
        }
    }
    Ok(())
}

// ── Reconstruction ──────────────────────────────────────────────────────────

fn sync_op(name: String, op_type: &str, event: EventId, stream: StreamId) -> OpDesc {
    OpDesc::new(name, op_type)
        .on_stream(stream)
        .with_attrs(Attrs::new().with(Attr::EventId(event)))
}

/// Insert a signal right after `producer` and link it as the producer's
/// control successor.
pub fn insert_signal(
    graph: &mut Graph,
    producer: NodeId,
    op_type: &str,
    event: EventId,
    stream: StreamId,
) -> Result<NodeId, FusionError> {
    let name = format!("signal_{}", event);
    let id = graph.insert_after(producer, sync_op(name, op_type, event, stream))?;
    graph.add_control(producer, id)?;
    Ok(id)
}

/// Insert a wait right before `consumer` and link it as the consumer's
/// control predecessor.
pub fn insert_wait(
    graph: &mut Graph,
    consumer: NodeId,
    op_type: &str,
    event: EventId,
    stream: StreamId,
) -> Result<NodeId, FusionError> {
    let name = format!("wait_{}", event);
    let id = graph.insert_before(consumer, sync_op(name, op_type, event, stream))?;
    graph.add_control(id, consumer)?;
    Ok(id)
}

/// Companion op type for a rebuilt pair: plain pairs stay plain.
pub fn pair_op_types(pair: &SyncPair) -> (String, String) {
    let signal = pair
        .signal
        .as_ref()
        .map(|h| h.op_type.clone())
        .unwrap_or_else(|| SEND.to_string());
    let wait = pair
        .wait
        .as_ref()
        .map(|h| h.op_type.clone())
        .unwrap_or_else(|| RECV.to_string());
    (signal, wait)
}

/// Remove the local halves of `pair` from `graph`.
pub fn remove_pair(graph: &mut Graph, pair: &SyncPair) -> Result<(), FusionError> {
    for half in [&pair.signal, &pair.wait].into_iter().flatten() {
        if graph.contains(half.node) {
            graph.remove_node(half.node)?;
        }
    }
    Ok(())
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::graph_from_source;

    const PAIRED: &str = "\
node a : Relu (stream = 0)
node s : Send (stream = 0, event = 3)
node r : Recv (stream = 1, event = 3)
node b : Relu (stream = 1)
a => s
r => b
";

    #[test]
    fn resolves_full_quadruple() {
        let g = graph_from_source(PAIRED).unwrap();
        let index = discover_pairs(&g).unwrap();
        let pair = &index.pairs[&EventId(3)];
        assert!(pair.plain);
        assert!(!pair.is_foreign());
        assert_eq!(pair.producer(), g.find("a"));
        assert_eq!(pair.consumer(), g.find("b"));
        assert_eq!(pair.signal.as_ref().unwrap().node, g.find("s").unwrap());
        assert_eq!(index.touching(g.find("a").unwrap()), vec![EventId(3)]);
        assert_eq!(index.touching(g.find("b").unwrap()), vec![EventId(3)]);
    }

    #[test]
    fn notify_pairs_are_not_plain() {
        let g = graph_from_source(&PAIRED.replace("Send", "SendNotify")).unwrap();
        let index = discover_pairs(&g).unwrap();
        assert!(!index.pairs[&EventId(3)].plain);
    }

    #[test]
    fn orphan_half_is_inconsistent() {
        let g = graph_from_source("node a : Relu\nnode s : Send (event = 4)\na => s\n").unwrap();
        assert!(matches!(
            discover_pairs(&g),
            Err(FusionError::InconsistentPair { event: EventId(4), .. })
        ));
    }

    #[test]
    fn duplicate_wait_is_inconsistent() {
        let g = graph_from_source(
            "node a : Relu\nnode s : Send (event = 4)\nnode r1 : Recv (event = 4)\n\
             node r2 : Recv (event = 4)\nnode b : Relu\na => s\nr1 => b\nr2 => b\n",
        )
        .unwrap();
        assert!(discover_pairs(&g).is_err());
    }

    #[test]
    fn nested_companion_makes_foreign_half() {
        let mut g = graph_from_source("node a : Relu\nnode s : Send (event = 8)\nnode sk : SuperKernel\na => s\n")
            .unwrap();
        let mut inner = Graph::new("inner");
        let r = inner.add_node(sync_op("r".into(), RECV, EventId(8), StreamId(0)));
        let b = inner.add_node(OpDesc::new("b", "Relu"));
        inner.add_control(r, b).unwrap();
        let sk = g.find("sk").unwrap();
        g.get_mut(sk).unwrap().subgraph = Some(Box::new(inner));

        let index = discover_pairs(&g).unwrap();
        let pair = &index.pairs[&EventId(8)];
        assert!(pair.is_foreign());
        assert!(pair.wait.is_none());
        assert!(pair.plain);
    }

    #[test]
    fn insert_helpers_link_control_edges() {
        let mut g = graph_from_source("node a : Relu (stream = 0)\nnode b : Relu (stream = 1)\n").unwrap();
        let a = g.find("a").unwrap();
        let b = g.find("b").unwrap();
        let s = insert_signal(&mut g, a, SEND, EventId(70), StreamId(0)).unwrap();
        let w = insert_wait(&mut g, b, RECV, EventId(70), StreamId(1)).unwrap();
        assert_eq!(g.order(), &[a, s, w, b]);
        assert_eq!(g.get(s).unwrap().ctrl_in, vec![a]);
        assert_eq!(g.get(w).unwrap().ctrl_out, vec![b]);
        let index = discover_pairs(&g).unwrap();
        assert_eq!(index.pairs[&EventId(70)].producer(), Some(a));
        assert_eq!(index.pairs[&EventId(70)].consumer(), Some(b));

        remove_pair(&mut g, &index.pairs[&EventId(70)]).unwrap();
        assert_eq!(g.order(), &[a, b]);
        assert!(g.get(a).unwrap().ctrl_out.is_empty());
    }
}
