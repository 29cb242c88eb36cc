// src/network/relation.rs
// Per-peer relation-graph slice: authoritative local writes, versioned
// gossip merges, and the filtered export used for topology exchange.

use crate::network::context::{ContextDirectory, NetworkContext, SeparationRule};
use crate::network::peer::PeerId;
use serde::{Deserialize, Serialize};

/// One directed belief: `owner` considers itself directly connected (or not)
/// to `other`. `state_id` is the per-edge version; merges are last-writer-wins
/// on it and it never decreases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationEdge {
    pub owner: PeerId,
    pub other: PeerId,
    pub connected: bool,
    pub state_id: u64,
}

/// Ordered edge collection for a single owning peer, plus an aggregate
/// version that moves only for authoritative local changes.
#[derive(Debug)]
pub struct RelationTable {
    owner: PeerId,
    local: bool,
    edges: Vec<RelationEdge>,
    state_id: u64,
}

impl RelationTable {
    pub fn new(owner: PeerId, local: bool) -> Self {
        Self {
            owner,
            local,
            edges: Vec::new(),
            state_id: 0,
        }
    }

    pub fn owner(&self) -> &PeerId {
        &self.owner
    }

    pub fn is_local(&self) -> bool {
        self.local
    }

    /// Aggregate version. Bumped only by authoritative writes on a
    /// local-owned table, never by gossip merges.
    pub fn state_id(&self) -> u64 {
        self.state_id
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn get(&self, other: &PeerId) -> Option<&RelationEdge> {
        self.edges.iter().find(|e| &e.other == other)
    }

    /// Snapshot of every edge in insertion order.
    pub fn edges(&self) -> Vec<RelationEdge> {
        self.edges.clone()
    }

    /// Authoritative write. Inserts a fresh edge (version 0, bumped to 1 on
    /// a local-owned table) or updates an existing one, bumping its version
    /// only when the connected flag actually changed. Returns the resulting
    /// edge and whether anything changed.
    pub fn add_or_update(&mut self, other: &PeerId, connected: bool) -> (RelationEdge, bool) {
        if let Some(e) = self.edges.iter_mut().find(|e| &e.other == other) {
            if e.connected == connected {
                return (e.clone(), false);
            }
            e.connected = connected;
            e.state_id += 1;
            let edge = e.clone();
            if self.local {
                self.state_id += 1;
            }
            (edge, true)
        } else {
            // Foreign inserts stay at version 0 so the owner's own version-1
            // declaration can still win a later merge.
            let edge = RelationEdge {
                owner: self.owner.clone(),
                other: other.clone(),
                connected,
                state_id: if self.local { 1 } else { 0 },
            };
            self.edges.push(edge.clone());
            if self.local {
                self.state_id += 1;
            }
            (edge, true)
        }
    }

    /// Gossip ingest for one `(owner, other)` pair. Applies only a strictly
    /// newer version; equal or stale versions are ignored idempotently.
    /// Absent pairs insert at the incoming version. The aggregate version is
    /// never touched by a merge.
    pub fn merge_remote(&mut self, other: &PeerId, connected: bool, incoming_state_id: u64) -> bool {
        if let Some(e) = self.edges.iter_mut().find(|e| &e.other == other) {
            if incoming_state_id > e.state_id {
                e.connected = connected;
                e.state_id = incoming_state_id;
                return true;
            }
            return false;
        }
        self.edges.push(RelationEdge {
            owner: self.owner.clone(),
            other: other.clone(),
            connected,
            state_id: incoming_state_id,
        });
        true
    }

    /// Merge a full edge received off the wire. Edges carrying a different
    /// owner than this table are rejected rather than misfiled.
    pub fn merge_edge(&mut self, edge: &RelationEdge) -> bool {
        if edge.owner != self.owner {
            return false;
        }
        self.merge_remote(&edge.other, edge.connected, edge.state_id)
    }

    /// Remove the single edge to `other`. Used when a direct link between two
    /// named peers is confirmed lost.
    pub fn set_offline(&mut self, other: &PeerId) -> bool {
        let before = self.edges.len();
        self.edges.retain(|e| &e.other != other);
        before != self.edges.len()
    }

    /// Take the whole table offline.
    ///
    /// Local-owned table: every edge is marked disconnected with its version
    /// bumped (the change must win later merges), and the aggregate version
    /// moves once. Foreign table: the owner is gone and its declarations are
    /// unknowable, so the collection is cleared outright with no version
    /// bookkeeping.
    pub fn set_all_offline(&mut self) {
        if self.local {
            for e in &mut self.edges {
                e.connected = false;
                e.state_id += 1;
            }
            if !self.edges.is_empty() {
                self.state_id += 1;
            }
        } else {
            self.edges.clear();
        }
    }

    /// Ids of every peer this owner believes it is directly connected to,
    /// in insertion order.
    pub fn neighborhood(&self) -> Vec<PeerId> {
        self.edges
            .iter()
            .filter(|e| e.connected)
            .map(|e| e.other.clone())
            .collect()
    }

    /// Edges suitable for export toward `target`. Empty when `suppress` is
    /// set (black-holed owner). Otherwise an edge survives only when both of
    /// its endpoints resolve to a context not separated from the target;
    /// an unresolvable endpoint excludes the edge.
    pub fn export_snapshot(
        &self,
        suppress: bool,
        target: &NetworkContext,
        rule: &dyn SeparationRule,
        directory: &dyn ContextDirectory,
    ) -> Vec<RelationEdge> {
        if suppress {
            return Vec::new();
        }
        let admitted = |id: &PeerId| {
            directory
                .context_of(id)
                .map(|ctx| !rule.is_separated(&ctx, target))
                .unwrap_or(false)
        };
        self.edges
            .iter()
            .filter(|e| admitted(&e.owner) && admitted(&e.other))
            .cloned()
            .collect()
    }
}
