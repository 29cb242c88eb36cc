//! Meshwork public prelude (curated stable-intent exports).
//! Import with: `use meshwork::prelude::*;`
//!
//! Items here are considered *stable-intent* prior to 1.0.0. Their shape may
//! still adjust minimally until the first tagged release, but we aim to avoid
//! breaking renames or removals. Exclusions are deliberate.

pub use crate::config::OverlayConfig;
pub use crate::errors::OverlayError;
pub use crate::network::context::NetworkContext;
pub use crate::network::message::{DeliveryClass, Envelope, Payload, PendingDeliveries, Priority, SendOutcome};
pub use crate::network::observer::ConnectionObserver;
pub use crate::network::overlay::Overlay;
pub use crate::network::peer::{Peer, PeerDescriptor, PeerId};
pub use crate::network::relation::RelationEdge;
