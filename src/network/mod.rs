pub mod connection;
pub mod context;
pub mod dispatch;
pub mod endpoint;
pub(crate) mod events;
pub mod message;
pub mod observer;
pub mod overlay;
pub mod peer;
pub mod relation;
pub mod transport;

pub use connection::{Connection, ConnectionStats};
pub use context::{ContextDirectory, ContextMatchRule, NetworkContext, SeparationRule};
pub use dispatch::DeliveryPool;
pub use endpoint::{CandidateSet, EndpointCandidate, EndpointKind};
pub use message::{
    DeliveryClass, Envelope, JsonLineFormat, Payload, PendingDeliveries, Priority, SendOutcome,
    WireFormat,
};
pub use observer::{ConnectionObserver, NullObserver};
pub use overlay::Overlay;
pub use peer::{Peer, PeerDescriptor, PeerId, Role};
pub use relation::{RelationEdge, RelationTable};
pub use transport::dial;
