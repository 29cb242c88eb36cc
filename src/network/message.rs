// src/network/message.rs

use crate::network::peer::PeerId;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;
use uuid::Uuid;

/// Outbound service class. Declaration order is service order: the sender
/// always drains the lowest-numbered non-empty queue first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Ack,
    System,
    UserData,
}

/// Delivery guarantee of an envelope. Reliable envelopes generate a low-level
/// acknowledgement from the receiving side; datagrams are fire-and-forget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryClass {
    Reliable,
    Datagram,
}

/// Opaque application body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Payload {
    Text(String),
    Json(Value),
    Binary(Vec<u8>),
}

impl Default for Payload {
    fn default() -> Self {
        Payload::Json(Value::Null)
    }
}

/// The unit the transport frames, tracks, and delivers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub id: Uuid,
    pub from: PeerId,
    pub to: PeerId,
    pub class: DeliveryClass,
    pub payload: Payload,
}

impl Envelope {
    pub fn new(from: PeerId, to: PeerId, class: DeliveryClass, payload: Payload) -> Self {
        Self {
            id: Uuid::new_v4(),
            from,
            to,
            class,
            payload,
        }
    }

    pub fn reliable(from: PeerId, to: PeerId, payload: Payload) -> Self {
        Self::new(from, to, DeliveryClass::Reliable, payload)
    }

    pub fn datagram(from: PeerId, to: PeerId, payload: Payload) -> Self {
        Self::new(from, to, DeliveryClass::Datagram, payload)
    }
}

/// Final status of one tracked send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The frame reached the wire (delivery itself may still be in flight).
    Sent,
    /// The frame was abandoned by a permanent teardown.
    Failed,
}

/// Table of envelopes whose final outcome a caller is waiting on. The
/// application registers an id before sending and resolves it from its own
/// protocol (or the transport resolves it as failed on permanent teardown).
#[derive(Clone, Default)]
pub struct PendingDeliveries {
    inner: Arc<Mutex<HashMap<Uuid, oneshot::Sender<SendOutcome>>>>,
}

impl PendingDeliveries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in `id`. The returned receiver resolves exactly once.
    pub fn register(&self, id: Uuid) -> oneshot::Receiver<SendOutcome> {
        let (tx, rx) = oneshot::channel();
        self.inner.lock().insert(id, tx);
        rx
    }

    /// Resolve a waiter from the application side. Returns false when the id
    /// was not registered (or already resolved).
    pub fn complete(&self, id: &Uuid, outcome: SendOutcome) -> bool {
        match self.inner.lock().remove(id) {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }

    /// Teardown path: resolve a waiter as failed.
    pub(crate) fn fail(&self, id: &Uuid) -> bool {
        self.complete(id, SendOutcome::Failed)
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.inner.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// Pluggable envelope codec. Implementations must produce self-delimiting
/// output: the receive loop hands the codec a stream positioned right after
/// the frame tag byte and expects exactly one envelope consumed.
#[async_trait]
pub trait WireFormat: Send + Sync {
    async fn write(
        &self,
        writer: &mut (dyn AsyncWrite + Unpin + Send),
        envelope: &Envelope,
    ) -> io::Result<()>;

    async fn read(
        &self,
        reader: &mut (dyn AsyncBufRead + Unpin + Send),
    ) -> io::Result<Envelope>;
}

/// Default codec: one JSON document per line.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonLineFormat;

#[async_trait]
impl WireFormat for JsonLineFormat {
    async fn write(
        &self,
        writer: &mut (dyn AsyncWrite + Unpin + Send),
        envelope: &Envelope,
    ) -> io::Result<()> {
        let json = serde_json::to_string(envelope)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        Ok(())
    }

    async fn read(
        &self,
        reader: &mut (dyn AsyncBufRead + Unpin + Send),
    ) -> io::Result<Envelope> {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream closed mid-frame",
            ));
        }
        serde_json::from_str(line.trim_end())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}
