// src/network/observer.rs

use crate::network::message::Envelope;
use crate::network::peer::PeerId;
use async_trait::async_trait;

/// Callback seam between a connection and the layer above it. Hook methods
/// default to no-ops; implement only what you need.
///
/// `message_arrived` and `disconnected` run on the connection's receive task
/// in arrival order; `send_after` runs on the shared delivery pool.
#[async_trait]
pub trait ConnectionObserver: Send + Sync {
    /// One decoded inbound envelope from `from`.
    async fn message_arrived(&self, from: &PeerId, envelope: Envelope);

    /// About to write a data frame to the wire.
    async fn send_before(&self, _envelope: &Envelope) {}

    /// A data frame reached the wire.
    async fn send_after(&self, _envelope: &Envelope) {}

    /// The connection tore down. Fires exactly once per connection.
    async fn disconnected(&self, _peer: &PeerId) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

#[async_trait]
impl ConnectionObserver for NullObserver {
    async fn message_arrived(&self, _from: &PeerId, _envelope: Envelope) {}
}
