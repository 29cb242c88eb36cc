//! # Meshwork Core Library
//!
//! Peer-to-peer virtual network overlay in two layers:
//!
//! * **Transport:** prioritized, acknowledged message delivery over framed
//!   byte streams, with backlog adoption when a connection is replaced.
//! * **Topology:** per-peer relation tables tracking who believes itself
//!   linked to whom, versioned for gossip merge and filtered on export.
//!
//! ## Design Principles
//! * Async-first: all I/O paths are non-blocking (Tokio + async traits).
//! * Explicit wiring: an [`network::Overlay`] is a value the application
//!   constructs and passes around; there is no process-global node state.
//! * Context isolation for logical network partitioning.
//! * Event-driven instrumentation (JSON line event log + console).
//! * Backpressure over blocking: full queues drop and count instead of
//!   stalling hot paths.
//!
//! ## Key Modules
//! * `config` – Runtime configuration (node identity, delivery pool, logging).
//! * `network` – Transport, connections, peers, relation graph, overlay container.
//! * `events` – Structured logging/events dispatcher.
//!
//! ## Status
//! Pre-initial public release. APIs may change without notice until version 0.1.0 is tagged.

pub mod config;
pub mod constants;
pub mod errors;
pub mod events;
pub mod network;
pub mod prelude; // curated stable-intent re-exports
pub mod utils; // common helpers (naming, etc.)
