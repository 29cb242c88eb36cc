// src/network/peer.rs
// Peer identity and per-peer state: role tag, context blob with guarded
// writes, endpoint candidate sets, relation slice, and the connection slot.

use crate::constants::PROTOCOL_VERSION;
use crate::network::connection::Connection;
use crate::network::context::NetworkContext;
use crate::network::endpoint::{CandidateSet, EndpointCandidate};
use crate::network::message::Payload;
use crate::network::relation::RelationTable;
use parking_lot::{Mutex, MutexGuard, RwLock, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// Opaque ordered identity token of one overlay participant. Never changes
/// for the lifetime of a peer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

fn default_protocol_version() -> u32 {
    PROTOCOL_VERSION
}

fn default_distance() -> u32 {
    1
}

/// Registration input describing a peer before it becomes live state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerDescriptor {
    pub id: PeerId,
    pub host: String,
    #[serde(default)]
    pub context: NetworkContext,
    #[serde(default = "default_protocol_version")]
    pub protocol_version: u32,
    /// Hop count; 1 means directly reachable.
    #[serde(default = "default_distance")]
    pub distance: u32,
    #[serde(default)]
    pub black_hole: bool,
    /// Advertised NAT gateway addresses.
    #[serde(default)]
    pub gateways: Vec<String>,
    /// Advertised TCP server addresses.
    #[serde(default)]
    pub servers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_context: Option<Payload>,
}

impl PeerDescriptor {
    pub fn new(id: impl Into<PeerId>, host: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            context: NetworkContext::default(),
            protocol_version: PROTOCOL_VERSION,
            distance: 1,
            black_hole: false,
            gateways: Vec::new(),
            servers: Vec::new(),
            app_context: None,
        }
    }

    pub fn with_context(mut self, context: NetworkContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_servers<I, S>(mut self, addrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.servers = addrs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_gateways<I, S>(mut self, addrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.gateways = addrs.into_iter().map(Into::into).collect();
        self
    }

    pub fn black_hole(mut self, flag: bool) -> Self {
        self.black_hole = flag;
        self
    }
}

/// State only the process-local peer carries.
pub struct LocalState {
    listen_addrs: Mutex<Vec<String>>,
}

impl LocalState {
    pub fn listen_addrs(&self) -> Vec<String> {
        self.listen_addrs.lock().clone()
    }

    pub fn add_listen_addr(&self, addr: impl Into<String>) {
        let addr = addr.into();
        let mut addrs = self.listen_addrs.lock();
        if !addrs.contains(&addr) {
            addrs.push(addr);
        }
    }
}

/// State only remote peers carry. Distance and the connection slot are the
/// only remote attributes that legitimately tear down and rebuild.
pub struct RemoteState {
    distance: AtomicU32,
    connection: Mutex<Option<Arc<Connection>>>,
}

impl RemoteState {
    pub fn distance(&self) -> u32 {
        self.distance.load(Ordering::Relaxed)
    }
}

/// Local/remote discriminator with capability accessors instead of
/// downcasts: ask for the state you need and get `None` on the wrong role.
pub enum Role {
    Local(LocalState),
    Remote(RemoteState),
}

/// Scoped write access to the local application context. Holding the guard
/// is the only way to mutate it; everyone else reads snapshots.
pub struct ContextGuard<'a> {
    guard: RwLockWriteGuard<'a, Payload>,
}

impl ContextGuard<'_> {
    pub fn get(&self) -> &Payload {
        &self.guard
    }

    pub fn get_mut(&mut self) -> &mut Payload {
        &mut self.guard
    }

    pub fn set(&mut self, payload: Payload) {
        *self.guard = payload;
    }
}

/// One overlay participant.
pub struct Peer {
    id: PeerId,
    host: String,
    context: NetworkContext,
    protocol_version: u32,
    black_hole: AtomicBool,
    app_context: RwLock<Payload>,
    gateways: Mutex<CandidateSet>,
    servers: Mutex<CandidateSet>,
    relations: Mutex<RelationTable>,
    role: Role,
}

impl Peer {
    /// Build the process-local peer.
    pub fn local(descriptor: PeerDescriptor) -> Self {
        Self::build(
            descriptor,
            true,
            |_| Role::Local(LocalState {
                listen_addrs: Mutex::new(Vec::new()),
            }),
        )
    }

    /// Build a remote peer.
    pub fn remote(descriptor: PeerDescriptor) -> Self {
        Self::build(descriptor, false, |d| {
            Role::Remote(RemoteState {
                distance: AtomicU32::new(d.distance),
                connection: Mutex::new(None),
            })
        })
    }

    fn build(
        descriptor: PeerDescriptor,
        local: bool,
        role: impl FnOnce(&PeerDescriptor) -> Role,
    ) -> Self {
        let role = role(&descriptor);
        Self {
            id: descriptor.id.clone(),
            host: descriptor.host,
            context: descriptor.context,
            protocol_version: descriptor.protocol_version,
            black_hole: AtomicBool::new(descriptor.black_hole),
            app_context: RwLock::new(descriptor.app_context.unwrap_or_default()),
            gateways: Mutex::new(CandidateSet::new(descriptor.gateways)),
            servers: Mutex::new(CandidateSet::new(descriptor.servers)),
            relations: Mutex::new(RelationTable::new(descriptor.id, local)),
            role,
        }
    }

    pub fn id(&self) -> &PeerId {
        &self.id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn context(&self) -> &NetworkContext {
        &self.context
    }

    pub fn protocol_version(&self) -> u32 {
        self.protocol_version
    }

    pub fn is_local(&self) -> bool {
        matches!(self.role, Role::Local(_))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.role, Role::Remote(_))
    }

    pub fn local_state(&self) -> Option<&LocalState> {
        match &self.role {
            Role::Local(state) => Some(state),
            Role::Remote(_) => None,
        }
    }

    pub fn remote_state(&self) -> Option<&RemoteState> {
        match &self.role {
            Role::Remote(state) => Some(state),
            Role::Local(_) => None,
        }
    }

    pub fn is_black_hole(&self) -> bool {
        self.black_hole.load(Ordering::Relaxed)
    }

    pub fn set_black_hole(&self, flag: bool) {
        self.black_hole.store(flag, Ordering::Relaxed);
    }

    /// Clone-on-read view of the application context blob.
    pub fn context_snapshot(&self) -> Payload {
        self.app_context.read().clone()
    }

    /// Exclusive write access to the application context. Only the local
    /// peer hands out the guard; remote contexts change solely through the
    /// protocol ingest path.
    pub fn lock_context(&self) -> Option<ContextGuard<'_>> {
        if self.is_local() {
            Some(ContextGuard {
                guard: self.app_context.write(),
            })
        } else {
            None
        }
    }

    /// Protocol ingest of a remote peer's context update.
    pub(crate) fn apply_remote_context(&self, payload: Payload) {
        *self.app_context.write() = payload;
    }

    /// Hop count for remote peers, `None` for the local peer.
    pub fn distance(&self) -> Option<u32> {
        self.remote_state().map(|r| r.distance())
    }

    /// Record a new hop count. No-op on the local peer.
    pub fn set_distance(&self, hops: u32) -> bool {
        match self.remote_state() {
            Some(remote) => {
                remote.distance.store(hops, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    pub fn active_connection(&self) -> Option<Arc<Connection>> {
        self.remote_state()?.connection.lock().clone()
    }

    /// Install a connection, returning the displaced one if any.
    pub(crate) fn set_connection(&self, conn: Arc<Connection>) -> Option<Arc<Connection>> {
        match self.remote_state() {
            Some(remote) => remote.connection.lock().replace(conn),
            None => None,
        }
    }

    pub(crate) fn take_connection(&self) -> Option<Arc<Connection>> {
        self.remote_state()?.connection.lock().take()
    }

    /// Clear the slot only if the connection it holds has died. A healthy
    /// replacement attached concurrently must not be knocked out by a stale
    /// teardown notification.
    pub(crate) fn clear_connection_if_dead(&self) -> bool {
        if let Some(remote) = self.remote_state() {
            let mut slot = remote.connection.lock();
            if let Some(current) = slot.as_ref() {
                if !current.is_connected() {
                    *slot = None;
                    return true;
                }
            }
        }
        false
    }

    /// This peer's relation-graph slice.
    pub fn relations(&self) -> MutexGuard<'_, RelationTable> {
        self.relations.lock()
    }

    /// Ids this peer believes it is directly connected to.
    pub fn neighborhood(&self) -> Vec<PeerId> {
        self.relations.lock().neighborhood()
    }

    pub fn servers(&self) -> MutexGuard<'_, CandidateSet> {
        self.servers.lock()
    }

    pub fn gateways(&self) -> MutexGuard<'_, CandidateSet> {
        self.gateways.lock()
    }

    /// Select and charge the next TCP server candidate under one lock hold.
    pub fn next_server(&self) -> Option<EndpointCandidate> {
        self.servers.lock().take_next()
    }

    /// Select and charge the next NAT gateway candidate under one lock hold.
    pub fn next_gateway(&self) -> Option<EndpointCandidate> {
        self.gateways.lock().take_next()
    }

    pub fn note_server_success(&self, address: &str) -> bool {
        self.servers.lock().mark_success(address)
    }

    pub fn note_gateway_success(&self, address: &str) -> bool {
        self.gateways.lock().mark_success(address)
    }

    pub fn server_candidates(&self) -> Vec<EndpointCandidate> {
        self.servers.lock().snapshot()
    }

    pub fn gateway_candidates(&self) -> Vec<EndpointCandidate> {
        self.gateways.lock().snapshot()
    }

    pub fn display(&self) -> String {
        format!(
            "Peer[id: {}, host: {}, context: {}]",
            self.id,
            self.host,
            self.context.canonical_code()
        )
    }
}
