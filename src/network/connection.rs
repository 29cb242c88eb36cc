// src/network/connection.rs
// Per-peer transport: three priority lanes, a single notifier-driven sender
// task, a frame-tag receive loop, FIFO low-level acks, and backlog migration
// between connections.

use crate::constants::{FRAME_ACK, FRAME_DATA};
use crate::events::model::LogLevel;
use crate::network::dispatch::DeliveryPool;
use crate::network::events::emit_transport_event;
use crate::network::message::{
    DeliveryClass, Envelope, PendingDeliveries, Priority, SendOutcome, WireFormat,
};
use crate::network::observer::ConnectionObserver;
use crate::network::transport::{BoxedReader, BoxedWriter};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;

use crate::network::peer::PeerId;

/// One wire job: either a bare low-level acknowledgement or a framed envelope.
#[derive(Debug, Clone)]
enum Frame {
    Ack,
    Data(Envelope),
}

/// A queued outbound frame with its lane and optional completion ticket.
struct OutboundMessage {
    frame: Frame,
    priority: Priority,
    ticket: Option<oneshot::Sender<SendOutcome>>,
}

/// The three FIFO lanes plus a pending counter. Only the sender task pops,
/// so a peeked head stays the head of its lane until the sender removes it.
#[derive(Default)]
struct SendQueues {
    ack: VecDeque<OutboundMessage>,
    system: VecDeque<OutboundMessage>,
    user: VecDeque<OutboundMessage>,
    pending: usize,
}

impl SendQueues {
    fn lane(&mut self, priority: Priority) -> &mut VecDeque<OutboundMessage> {
        match priority {
            Priority::Ack => &mut self.ack,
            Priority::System => &mut self.system,
            Priority::UserData => &mut self.user,
        }
    }

    fn push(&mut self, msg: OutboundMessage) {
        let priority = msg.priority;
        self.lane(priority).push_back(msg);
        self.pending += 1;
    }

    fn peek_highest(&self) -> Option<(Priority, &OutboundMessage)> {
        if let Some(m) = self.ack.front() {
            return Some((Priority::Ack, m));
        }
        if let Some(m) = self.system.front() {
            return Some((Priority::System, m));
        }
        self.user.front().map(|m| (Priority::UserData, m))
    }

    fn pop_front(&mut self, priority: Priority) -> Option<OutboundMessage> {
        let msg = self.lane(priority).pop_front();
        if msg.is_some() {
            self.pending -= 1;
        }
        msg
    }

    /// Empty every lane in service order, preserving per-lane FIFO order.
    fn drain_in_order(&mut self) -> Vec<OutboundMessage> {
        let mut out = Vec::with_capacity(self.pending);
        out.extend(self.ack.drain(..));
        out.extend(self.system.drain(..));
        out.extend(self.user.drain(..));
        self.pending = 0;
        out
    }

    fn total(&self) -> usize {
        self.pending
    }
}

/// A reliable envelope that reached the wire and is waiting for its
/// (uncorrelated, FIFO-matched) low-level acknowledgement.
struct AckPending {
    envelope: Envelope,
    priority: Priority,
    sent_at: Instant,
}

/// Counter snapshot for diagnostics.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConnectionStats {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub acks_received: u64,
    pub dropped_sends: u64,
}

/// Transport to one remote peer over a pair of stream halves.
///
/// Teardown is single-fire: whichever of read EOF, read/write/decode error,
/// framing violation, or an explicit [`Connection::close`] happens first wins;
/// the rest are no-ops. Sends racing a teardown are dropped (and counted).
pub struct Connection {
    peer: PeerId,
    connected: AtomicBool,
    queues: Mutex<SendQueues>,
    awaiting_ack: Mutex<VecDeque<AckPending>>,
    reply_time: Mutex<Option<Duration>>,
    wake: Notify,
    writer: tokio::sync::Mutex<BoxedWriter>,
    format: Arc<dyn WireFormat>,
    observer: Arc<dyn ConnectionObserver>,
    pool: DeliveryPool,
    sender_task: Mutex<Option<JoinHandle<()>>>,
    receiver_task: Mutex<Option<JoinHandle<()>>>,
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
    acks_received: AtomicU64,
    dropped_sends: AtomicU64,
}

impl Connection {
    /// Wrap a stream and start the sender and receive tasks. Must be called
    /// within a tokio runtime.
    pub fn open(
        peer: PeerId,
        reader: BoxedReader,
        writer: BoxedWriter,
        format: Arc<dyn WireFormat>,
        observer: Arc<dyn ConnectionObserver>,
        pool: DeliveryPool,
    ) -> Arc<Self> {
        let conn = Arc::new(Self {
            peer,
            connected: AtomicBool::new(true),
            queues: Mutex::new(SendQueues::default()),
            awaiting_ack: Mutex::new(VecDeque::new()),
            reply_time: Mutex::new(None),
            wake: Notify::new(),
            writer: tokio::sync::Mutex::new(writer),
            format,
            observer,
            pool,
            sender_task: Mutex::new(None),
            receiver_task: Mutex::new(None),
            frames_sent: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            acks_received: AtomicU64::new(0),
            dropped_sends: AtomicU64::new(0),
        });
        *conn.sender_task.lock() = Some(tokio::spawn(run_sender(conn.clone())));
        *conn.receiver_task.lock() = Some(tokio::spawn(run_receiver(conn.clone(), reader)));
        conn
    }

    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Queue a data frame. Fire-and-forget; no outcome is reported.
    pub fn send(&self, envelope: Envelope, priority: Priority) {
        self.enqueue(OutboundMessage {
            frame: Frame::Data(envelope),
            priority,
            ticket: None,
        });
    }

    /// Queue a data frame and get a ticket resolving `Sent` once the frame
    /// reaches the wire, or `Failed` on permanent teardown handling.
    pub fn send_tracked(
        &self,
        envelope: Envelope,
        priority: Priority,
    ) -> oneshot::Receiver<SendOutcome> {
        let (tx, rx) = oneshot::channel();
        self.enqueue(OutboundMessage {
            frame: Frame::Data(envelope),
            priority,
            ticket: Some(tx),
        });
        rx
    }

    fn enqueue_ack(&self) {
        self.enqueue(OutboundMessage {
            frame: Frame::Ack,
            priority: Priority::Ack,
            ticket: None,
        });
    }

    fn enqueue(&self, msg: OutboundMessage) {
        if !self.is_connected() {
            self.dropped_sends.fetch_add(1, Ordering::Relaxed);
            if let Some(ticket) = msg.ticket {
                self.pool.resolve(ticket, SendOutcome::Failed);
            }
            return;
        }
        let first = {
            let mut queues = self.queues.lock();
            queues.push(msg);
            queues.total() == 1
        };
        if first {
            self.wake.notify_one();
        }
    }

    /// Last measured send-to-ack round trip, if any ack arrived yet.
    pub fn reply_time(&self) -> Option<Duration> {
        *self.reply_time.lock()
    }

    pub fn awaiting_ack_len(&self) -> usize {
        self.awaiting_ack.lock().len()
    }

    /// Queued frames including bare acks.
    pub fn queued_total(&self) -> usize {
        self.queues.lock().total()
    }

    /// Data envelopes currently queued, in service order. Bare ack frames are
    /// not part of the snapshot.
    pub fn queued_snapshot(&self) -> Vec<(Priority, Envelope)> {
        let queues = self.queues.lock();
        let mut out = Vec::with_capacity(queues.pending);
        for lane in [&queues.ack, &queues.system, &queues.user] {
            for msg in lane {
                if let Frame::Data(env) = &msg.frame {
                    out.push((msg.priority, env.clone()));
                }
            }
        }
        out
    }

    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            acks_received: self.acks_received.load(Ordering::Relaxed),
            dropped_sends: self.dropped_sends.load(Ordering::Relaxed),
        }
    }

    /// Take over the undelivered backlog of a (usually dead) predecessor:
    /// first its unacknowledged reliable envelopes in send order (they may
    /// arrive twice; at-least-once is the contract), then its still-queued
    /// frames per lane in original FIFO order. Bare acks are skipped; they
    /// belong to the link that died.
    pub fn adopt_backlog(&self, other: &Connection) {
        let unacked: Vec<AckPending> = {
            let mut awaiting = other.awaiting_ack.lock();
            awaiting.drain(..).collect()
        };
        let queued: Vec<OutboundMessage> = {
            let mut queues = other.queues.lock();
            queues.drain_in_order()
        };
        let mut moved = 0usize;
        for entry in unacked {
            self.enqueue(OutboundMessage {
                frame: Frame::Data(entry.envelope),
                priority: entry.priority,
                ticket: None,
            });
            moved += 1;
        }
        for msg in queued {
            if matches!(msg.frame, Frame::Ack) {
                continue;
            }
            self.enqueue(msg);
            moved += 1;
        }
        emit_transport_event(
            "connection",
            LogLevel::Debug,
            "backlog_adopted",
            Some(self.peer.to_string()),
            Some(format!("moved={}", moved)),
        );
    }

    /// Permanent-teardown path: every still-queued data frame is failed.
    /// Tickets resolve `Failed`; envelope ids registered in `pending` have
    /// their waiters resolved and removed so nobody is left hanging.
    pub fn fail_queued(&self, pending: &PendingDeliveries) {
        let drained = {
            let mut queues = self.queues.lock();
            queues.drain_in_order()
        };
        let mut failed = 0usize;
        for mut msg in drained {
            if let Frame::Data(env) = &msg.frame {
                pending.fail(&env.id);
                if let Some(ticket) = msg.ticket.take() {
                    self.pool.resolve(ticket, SendOutcome::Failed);
                }
                failed += 1;
            }
        }
        if failed > 0 {
            emit_transport_event(
                "connection",
                LogLevel::Info,
                "queued_failed",
                Some(self.peer.to_string()),
                Some(format!("count={}", failed)),
            );
        }
    }

    /// Explicit teardown. Idempotent.
    pub async fn close(&self) {
        self.shutdown("closed_by_request").await;
    }

    async fn shutdown(&self, reason: &str) {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }
        self.wake.notify_one();
        emit_transport_event(
            "connection",
            LogLevel::Info,
            "disconnected",
            Some(self.peer.to_string()),
            Some(reason.to_string()),
        );
        self.observer.disconnected(&self.peer).await;
        // Signal EOF to the far side now instead of when the last handle
        // drops; an application holding a clone must not delay the peer's
        // failure detection. A sender wedged mid-write holds the writer
        // lock, so reap it first in that case to free the lock.
        match self.writer.try_lock() {
            Ok(mut writer) => {
                let _ = writer.shutdown().await;
            }
            Err(_) => {
                if let Some(task) = self.sender_task.lock().take() {
                    task.abort();
                }
                let mut writer = self.writer.lock().await;
                let _ = writer.shutdown().await;
            }
        }
        // Reap the I/O tasks last. A task parked in an idle read would
        // otherwise pin its stream half open forever. An I/O task calling
        // shutdown on itself has no awaits left before it finishes, so its
        // own abort never lands.
        if let Some(task) = self.sender_task.lock().take() {
            task.abort();
        }
        if let Some(task) = self.receiver_task.lock().take() {
            task.abort();
        }
    }
}

async fn write_frame(
    writer: &mut (dyn AsyncWrite + Unpin + Send),
    format: &Arc<dyn WireFormat>,
    frame: &Frame,
) -> io::Result<()> {
    match frame {
        Frame::Ack => writer.write_all(&[FRAME_ACK]).await?,
        Frame::Data(envelope) => {
            writer.write_all(&[FRAME_DATA]).await?;
            format.write(writer, envelope).await?;
        }
    }
    writer.flush().await
}

/// Single sender task. Peeks the head of the highest non-empty lane, writes
/// that one frame with the writer lock held for the whole frame, and only
/// then dequeues it. A failed write leaves the frame queued for migration.
async fn run_sender(conn: Arc<Connection>) {
    loop {
        if !conn.is_connected() {
            break;
        }
        let job = {
            let queues = conn.queues.lock();
            queues
                .peek_highest()
                .map(|(priority, msg)| (priority, msg.frame.clone()))
        };
        let (priority, frame) = match job {
            Some(job) => job,
            None => {
                conn.wake.notified().await;
                continue;
            }
        };
        if let Frame::Data(envelope) = &frame {
            conn.observer.send_before(envelope).await;
        }
        let written = {
            let mut writer = conn.writer.lock().await;
            write_frame(&mut **writer, &conn.format, &frame).await
        };
        match written {
            Ok(()) => {
                let finished = {
                    let mut queues = conn.queues.lock();
                    queues.pop_front(priority)
                };
                let mut finished = match finished {
                    Some(msg) => msg,
                    None => continue,
                };
                conn.frames_sent.fetch_add(1, Ordering::Relaxed);
                if let Frame::Data(envelope) = finished.frame {
                    if envelope.class == DeliveryClass::Reliable {
                        conn.awaiting_ack.lock().push_back(AckPending {
                            envelope: envelope.clone(),
                            priority,
                            sent_at: Instant::now(),
                        });
                    }
                    conn.pool.notify_sent(conn.observer.clone(), envelope);
                }
                if let Some(ticket) = finished.ticket.take() {
                    conn.pool.resolve(ticket, SendOutcome::Sent);
                }
            }
            Err(e) => {
                emit_transport_event(
                    "connection",
                    LogLevel::Error,
                    "write_failed",
                    Some(conn.peer.to_string()),
                    Some(e.to_string()),
                );
                conn.shutdown("write_failed").await;
                break;
            }
        }
    }
}

/// Receive loop: one tag byte per frame. `0x01` pops the oldest
/// awaiting-acknowledgement entry (acks carry no correlation on purpose);
/// `0x00` decodes an envelope, auto-acks reliable ones, and dispatches it.
/// Anything else is a framing violation and fatal.
async fn run_receiver(conn: Arc<Connection>, mut reader: BoxedReader) {
    loop {
        if !conn.is_connected() {
            break;
        }
        let tag = match reader.read_u8().await {
            Ok(tag) => tag,
            Err(e) => {
                let reason = if e.kind() == io::ErrorKind::UnexpectedEof {
                    "peer_closed"
                } else {
                    "read_error"
                };
                emit_transport_event(
                    "connection",
                    if reason == "peer_closed" {
                        LogLevel::Info
                    } else {
                        LogLevel::Error
                    },
                    reason,
                    Some(conn.peer.to_string()),
                    Some(e.to_string()),
                );
                conn.shutdown(reason).await;
                break;
            }
        };
        match tag {
            FRAME_ACK => {
                conn.acks_received.fetch_add(1, Ordering::Relaxed);
                let matched = conn.awaiting_ack.lock().pop_front();
                match matched {
                    Some(entry) => {
                        *conn.reply_time.lock() = Some(entry.sent_at.elapsed());
                    }
                    None => {
                        emit_transport_event(
                            "connection",
                            LogLevel::Warn,
                            "ack_unmatched",
                            Some(conn.peer.to_string()),
                            None,
                        );
                    }
                }
            }
            FRAME_DATA => match conn.format.read(&mut *reader).await {
                Ok(envelope) => {
                    conn.frames_received.fetch_add(1, Ordering::Relaxed);
                    if envelope.class == DeliveryClass::Reliable {
                        conn.enqueue_ack();
                    }
                    conn.observer.message_arrived(&conn.peer, envelope).await;
                }
                Err(e) => {
                    emit_transport_event(
                        "connection",
                        LogLevel::Error,
                        "decode_error",
                        Some(conn.peer.to_string()),
                        Some(e.to_string()),
                    );
                    conn.shutdown("decode_error").await;
                    break;
                }
            },
            other => {
                emit_transport_event(
                    "connection",
                    LogLevel::Error,
                    "frame_violation",
                    Some(conn.peer.to_string()),
                    Some(format!("tag=0x{:02x}", other)),
                );
                conn.shutdown("frame_violation").await;
                break;
            }
        }
    }
}
