// src/network/overlay.rs
// The peer container: local peer, remote registry, connection lifecycle
// (attach, dial, replace, drop), and relation-graph routing. An overlay is
// an explicit value the application constructs and passes around.

use crate::config::OverlayConfig;
use crate::constants::{DEFAULT_POOL_CAPACITY, DEFAULT_POOL_WORKERS};
use crate::errors::OverlayError;
use crate::events::model::LogLevel;
use crate::network::connection::Connection;
use crate::network::context::{ContextDirectory, ContextMatchRule, NetworkContext, SeparationRule};
use crate::network::dispatch::DeliveryPool;
use crate::network::endpoint::EndpointKind;
use crate::network::events::{emit_topology_event, emit_transport_event};
use crate::network::message::{
    Envelope, JsonLineFormat, Payload, PendingDeliveries, Priority, SendOutcome, WireFormat,
};
use crate::network::observer::ConnectionObserver;
use crate::network::peer::{Peer, PeerDescriptor, PeerId};
use crate::network::relation::RelationEdge;
use crate::network::transport::{self, BoxedReader, BoxedWriter};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Container for one process's view of the overlay.
pub struct Overlay {
    local: Arc<Peer>,
    peers: RwLock<HashMap<PeerId, Arc<Peer>>>,
    format: Arc<dyn WireFormat>,
    separation: Arc<dyn SeparationRule>,
    pool: DeliveryPool,
}

impl Overlay {
    /// Build an overlay from configuration with the default wire format and
    /// separation rule. Must be called within a tokio runtime (the delivery
    /// pool spawns its workers here).
    pub fn new(config: &OverlayConfig) -> Self {
        let descriptor = config.local_descriptor();
        Self::with_collaborators(
            config,
            descriptor,
            Arc::new(JsonLineFormat),
            Arc::new(ContextMatchRule),
        )
    }

    /// Build an overlay with an explicit local descriptor, wire format, and
    /// separation rule.
    pub fn with_collaborators(
        config: &OverlayConfig,
        local: PeerDescriptor,
        format: Arc<dyn WireFormat>,
        separation: Arc<dyn SeparationRule>,
    ) -> Self {
        let workers = config
            .delivery
            .as_ref()
            .and_then(|d| d.pool_workers)
            .unwrap_or(DEFAULT_POOL_WORKERS);
        let capacity = config
            .delivery
            .as_ref()
            .and_then(|d| d.pool_capacity)
            .unwrap_or(DEFAULT_POOL_CAPACITY);
        let overlay = Self {
            local: Arc::new(Peer::local(local)),
            peers: RwLock::new(HashMap::new()),
            format,
            separation,
            pool: DeliveryPool::spawn(workers, capacity),
        };
        crate::emit_system_event!(
            "overlay_started",
            Some(format!("local={}", overlay.local.id()))
        );
        overlay
    }

    pub fn local(&self) -> &Arc<Peer> {
        &self.local
    }

    pub fn pool(&self) -> &DeliveryPool {
        &self.pool
    }

    /// Look up a registered remote peer.
    pub fn peer(&self, id: &PeerId) -> Option<Arc<Peer>> {
        self.peers.read().get(id).cloned()
    }

    /// Look up any known peer, the local one included.
    fn peer_handle(&self, id: &PeerId) -> Option<Arc<Peer>> {
        if id == self.local.id() {
            return Some(self.local.clone());
        }
        self.peer(id)
    }

    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.peers.read().keys().cloned().collect()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.read().len()
    }

    /// Register a remote peer. The local id and already-registered ids are
    /// rejected.
    pub fn register_peer(&self, descriptor: PeerDescriptor) -> Result<Arc<Peer>, OverlayError> {
        let id = descriptor.id.clone();
        if &id == self.local.id() {
            return Err(OverlayError::DuplicatePeer(id));
        }
        let peer = {
            let mut peers = self.peers.write();
            if peers.contains_key(&id) {
                return Err(OverlayError::DuplicatePeer(id));
            }
            let peer = Arc::new(Peer::remote(descriptor));
            peers.insert(id.clone(), peer.clone());
            peer
        };
        emit_topology_event(
            "overlay",
            LogLevel::Info,
            "peer_registered",
            Some(self.local.id().to_string()),
            Some(id.to_string()),
            Some(format!("context={}", peer.context().canonical_code())),
        );
        Ok(peer)
    }

    /// Forget a peer entirely. The local edge toward it, if any, is removed
    /// (confirmed-lost semantics, no tombstone).
    pub fn remove_peer(&self, id: &PeerId) -> Option<Arc<Peer>> {
        let removed = { self.peers.write().remove(id) };
        if removed.is_some() {
            let dropped_edge = { self.local.relations().set_offline(id) };
            emit_topology_event(
                "overlay",
                LogLevel::Info,
                "peer_removed",
                Some(self.local.id().to_string()),
                Some(id.to_string()),
                Some(format!("dropped_edge={}", dropped_edge)),
            );
        }
        removed
    }

    /// Wire a stream to a registered peer. A previous connection is replaced:
    /// the fresh one adopts its backlog, then the old one is closed. The
    /// authoritative local edge flips to connected.
    pub async fn attach_connection(
        &self,
        id: &PeerId,
        reader: BoxedReader,
        writer: BoxedWriter,
        observer: Arc<dyn ConnectionObserver>,
    ) -> Result<Arc<Connection>, OverlayError> {
        let peer = self
            .peer(id)
            .ok_or_else(|| OverlayError::UnknownPeer(id.clone()))?;
        let wrapper = Arc::new(OverlayObserver {
            local: self.local.clone(),
            peer: peer.clone(),
            app: observer,
        });
        let conn = Connection::open(
            id.clone(),
            reader,
            writer,
            self.format.clone(),
            wrapper,
            self.pool.clone(),
        );
        let displaced = peer.set_connection(conn.clone());
        peer.set_distance(1);
        if let Some(old) = displaced {
            conn.adopt_backlog(&old);
            old.close().await;
        }
        let changed = { self.local.relations().add_or_update(id, true).1 };
        if changed {
            emit_topology_event(
                "overlay",
                LogLevel::Info,
                "edge_up",
                Some(self.local.id().to_string()),
                Some(id.to_string()),
                None,
            );
        }
        // The stream can die between open and the slot install, in which
        // case the teardown notification found an empty slot and its
        // bookkeeping missed. Settle the slot and the edge here.
        if !conn.is_connected() {
            peer.clear_connection_if_dead();
            let changed = { self.local.relations().add_or_update(id, false).1 };
            if changed {
                emit_topology_event(
                    "overlay",
                    LogLevel::Info,
                    "edge_down",
                    Some(self.local.id().to_string()),
                    Some(id.to_string()),
                    None,
                );
            }
        }
        emit_transport_event(
            "overlay",
            LogLevel::Info,
            "connection_attached",
            Some(id.to_string()),
            None,
        );
        Ok(conn)
    }

    /// Dial the peer's next endpoint candidate and attach the stream. TCP
    /// server candidates are tried before NAT gateways; the chosen
    /// candidate's attempt counter is charged before the dial and a failed
    /// dial leaves that charge as the only trace.
    pub async fn connect_peer(
        &self,
        id: &PeerId,
        observer: Arc<dyn ConnectionObserver>,
    ) -> Result<Arc<Connection>, OverlayError> {
        let peer = self
            .peer(id)
            .ok_or_else(|| OverlayError::UnknownPeer(id.clone()))?;
        let (kind, candidate) = peer
            .next_server()
            .map(|c| (EndpointKind::TcpServer, c))
            .or_else(|| peer.next_gateway().map(|c| (EndpointKind::NatGateway, c)))
            .ok_or_else(|| OverlayError::NoEndpoint(id.clone()))?;
        let (reader, writer) = transport::dial(&candidate.address).await?;
        match kind {
            EndpointKind::TcpServer => peer.note_server_success(&candidate.address),
            EndpointKind::NatGateway => peer.note_gateway_success(&candidate.address),
        };
        self.attach_connection(id, reader, writer, observer).await
    }

    pub fn active_connection(&self, id: &PeerId) -> Option<Arc<Connection>> {
        self.peer(id)?.active_connection()
    }

    /// Queue an envelope on the peer's active connection.
    pub fn send_to(
        &self,
        id: &PeerId,
        envelope: Envelope,
        priority: Priority,
    ) -> Result<(), OverlayError> {
        let conn = self
            .active_connection(id)
            .ok_or_else(|| OverlayError::NotConnected(id.clone()))?;
        conn.send(envelope, priority);
        Ok(())
    }

    /// Queue an envelope and get a wire-outcome ticket for it.
    pub fn send_tracked_to(
        &self,
        id: &PeerId,
        envelope: Envelope,
        priority: Priority,
    ) -> Result<oneshot::Receiver<SendOutcome>, OverlayError> {
        let conn = self
            .active_connection(id)
            .ok_or_else(|| OverlayError::NotConnected(id.clone()))?;
        Ok(conn.send_tracked(envelope, priority))
    }

    /// Permanent teardown with no replacement: close the connection, fail
    /// everything still queued against the caller's pending table, flip the
    /// authoritative local edge to disconnected, and foreign-clear the
    /// peer's own relation slice (its owner is unreachable, its declarations
    /// unknowable).
    pub async fn drop_connection(
        &self,
        id: &PeerId,
        pending: &PendingDeliveries,
    ) -> Result<(), OverlayError> {
        let peer = self
            .peer(id)
            .ok_or_else(|| OverlayError::UnknownPeer(id.clone()))?;
        let conn = peer
            .take_connection()
            .ok_or_else(|| OverlayError::NotConnected(id.clone()))?;
        conn.close().await;
        conn.fail_queued(pending);
        {
            self.local.relations().add_or_update(id, false);
        }
        {
            peer.relations().set_all_offline();
        }
        emit_transport_event(
            "overlay",
            LogLevel::Info,
            "connection_dropped",
            Some(id.to_string()),
            None,
        );
        Ok(())
    }

    /// Deliberate local shutdown of the topology layer: close every active
    /// connection (failing their queued messages) and take the local
    /// relation slice offline with versioned tombstones.
    pub async fn go_offline(&self, pending: &PendingDeliveries) {
        let peers: Vec<Arc<Peer>> = self.peers.read().values().cloned().collect();
        for peer in peers {
            if let Some(conn) = peer.take_connection() {
                conn.close().await;
                conn.fail_queued(pending);
            }
        }
        {
            self.local.relations().set_all_offline();
        }
        crate::emit_system_event!("overlay_offline");
    }

    /// Authoritative relation write routed to the owning peer's table.
    /// An unregistered owner or other is a programming error here.
    pub fn set_relation(
        &self,
        owner: &PeerId,
        other: &PeerId,
        connected: bool,
    ) -> (RelationEdge, bool) {
        let peer = match self.peer_handle(owner) {
            Some(p) => p,
            None => panic!("relation update for unregistered peer {}", owner),
        };
        if self.peer_handle(other).is_none() {
            panic!("relation update toward unregistered peer {}", other);
        }
        let (edge, changed) = { peer.relations().add_or_update(other, connected) };
        if changed {
            emit_topology_event(
                "overlay",
                LogLevel::Debug,
                if edge.connected { "edge_up" } else { "edge_down" },
                Some(owner.to_string()),
                Some(other.to_string()),
                Some(format!("state_id={}", edge.state_id)),
            );
        }
        (edge, changed)
    }

    /// Gossip ingest of one foreign edge. Edges owned by the local peer are
    /// ignored (this process is authoritative for its own beliefs), and
    /// edges owned by unknown peers are dropped; both are wire input, not
    /// programming errors.
    pub fn merge_relation(&self, edge: &RelationEdge) -> bool {
        if &edge.owner == self.local.id() {
            emit_topology_event(
                "overlay",
                LogLevel::Debug,
                "merge_own_edge_ignored",
                Some(edge.owner.to_string()),
                Some(edge.other.to_string()),
                None,
            );
            return false;
        }
        let peer = match self.peer(&edge.owner) {
            Some(p) => p,
            None => return false,
        };
        let applied = { peer.relations().merge_edge(edge) };
        if applied {
            emit_topology_event(
                "overlay",
                LogLevel::Trace,
                "edge_merged",
                Some(edge.owner.to_string()),
                Some(edge.other.to_string()),
                Some(format!("state_id={} connected={}", edge.state_id, edge.connected)),
            );
        }
        applied
    }

    /// Merge a batch of gossiped edges, returning how many applied.
    pub fn merge_relations<'a, I>(&self, edges: I) -> usize
    where
        I: IntoIterator<Item = &'a RelationEdge>,
    {
        edges
            .into_iter()
            .filter(|edge| self.merge_relation(edge))
            .count()
    }

    /// Resolve the local peer's connected neighborhood to peer handles.
    /// Ids without a registry entry are skipped.
    pub fn neighborhood(&self) -> Vec<Arc<Peer>> {
        let ids = { self.local.relations().neighborhood() };
        ids.into_iter().filter_map(|id| self.peer(&id)).collect()
    }

    /// Export the named peer's relation slice toward `target`: empty when
    /// the owner is black-holed, otherwise filtered by the separation rule
    /// on both edge endpoints.
    pub fn export_relations(
        &self,
        of: &PeerId,
        target: &NetworkContext,
    ) -> Result<Vec<RelationEdge>, OverlayError> {
        let peer = self
            .peer_handle(of)
            .ok_or_else(|| OverlayError::UnknownPeer(of.clone()))?;
        let suppress = peer.is_black_hole();
        let edges = peer
            .relations()
            .export_snapshot(suppress, target, &*self.separation, self);
        emit_topology_event(
            "overlay",
            LogLevel::Trace,
            "relations_exported",
            Some(of.to_string()),
            None,
            Some(format!(
                "edges={} suppressed={}",
                edges.len(),
                suppress
            )),
        );
        Ok(edges)
    }

    /// Scoped write to the local application context.
    pub fn update_local_context<F: FnOnce(&mut Payload)>(&self, f: F) {
        if let Some(mut guard) = self.local.lock_context() {
            f(guard.get_mut());
        }
    }

    /// Protocol ingest of a remote peer's context blob.
    pub fn apply_peer_context(&self, id: &PeerId, payload: Payload) -> Result<(), OverlayError> {
        let peer = self
            .peer(id)
            .ok_or_else(|| OverlayError::UnknownPeer(id.clone()))?;
        peer.apply_remote_context(payload);
        Ok(())
    }
}

impl ContextDirectory for Overlay {
    fn context_of(&self, id: &PeerId) -> Option<NetworkContext> {
        self.peer_handle(id).map(|p| p.context().clone())
    }
}

/// Per-connection wrapper keeping the topology layer honest about transport
/// state before handing events to the application observer.
struct OverlayObserver {
    local: Arc<Peer>,
    peer: Arc<Peer>,
    app: Arc<dyn ConnectionObserver>,
}

#[async_trait]
impl ConnectionObserver for OverlayObserver {
    async fn message_arrived(&self, from: &PeerId, envelope: Envelope) {
        self.app.message_arrived(from, envelope).await;
    }

    async fn send_before(&self, envelope: &Envelope) {
        self.app.send_before(envelope).await;
    }

    async fn send_after(&self, envelope: &Envelope) {
        self.app.send_after(envelope).await;
    }

    async fn disconnected(&self, peer_id: &PeerId) {
        self.peer.clear_connection_if_dead();
        let replaced = self
            .peer
            .active_connection()
            .map(|c| c.is_connected())
            .unwrap_or(false);
        if !replaced {
            let changed = { self.local.relations().add_or_update(peer_id, false).1 };
            if changed {
                emit_topology_event(
                    "overlay",
                    LogLevel::Info,
                    "edge_down",
                    Some(self.local.id().to_string()),
                    Some(peer_id.to_string()),
                    None,
                );
            }
        }
        self.app.disconnected(peer_id).await;
    }
}
