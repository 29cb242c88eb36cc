// src/network/dispatch.rs
// Shared worker pool that runs send-completion work off the connection
// I/O tasks.

use crate::network::message::{Envelope, SendOutcome};
use crate::network::observer::ConnectionObserver;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};

pub(crate) enum DeliveryJob {
    SendAfter {
        observer: Arc<dyn ConnectionObserver>,
        envelope: Envelope,
    },
    Outcome {
        ticket: oneshot::Sender<SendOutcome>,
        outcome: SendOutcome,
    },
}

/// Bounded pool shared by every connection of one overlay. `send_after`
/// observer hooks and tracked-send outcomes are dispatched here so slow
/// application code never stalls a sender or receive loop.
#[derive(Clone)]
pub struct DeliveryPool {
    tx: mpsc::Sender<DeliveryJob>,
    dropped: Arc<AtomicU64>,
}

impl DeliveryPool {
    /// Start `workers` tasks draining a queue of `capacity` jobs. Must be
    /// called within a tokio runtime.
    pub fn spawn(workers: usize, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel::<DeliveryJob>(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        for _ in 0..workers.max(1) {
            let rx = rx.clone();
            tokio::spawn(async move {
                loop {
                    let job = { rx.lock().await.recv().await };
                    match job {
                        Some(DeliveryJob::SendAfter { observer, envelope }) => {
                            observer.send_after(&envelope).await;
                        }
                        Some(DeliveryJob::Outcome { ticket, outcome }) => {
                            let _ = ticket.send(outcome);
                        }
                        None => break,
                    }
                }
            });
        }
        Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Queue a `send_after` hook. Droppable under backpressure (counted);
    /// hooks are advisory, outcomes are not.
    pub(crate) fn notify_sent(&self, observer: Arc<dyn ConnectionObserver>, envelope: Envelope) {
        if self
            .tx
            .try_send(DeliveryJob::SendAfter { observer, envelope })
            .is_err()
        {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Queue an outcome resolution. When the pool is saturated or gone the
    /// ticket resolves inline; a waiter is never lost to backpressure.
    pub(crate) fn resolve(&self, ticket: oneshot::Sender<SendOutcome>, outcome: SendOutcome) {
        if let Err(err) = self.tx.try_send(DeliveryJob::Outcome { ticket, outcome }) {
            if let DeliveryJob::Outcome { ticket, outcome } = err.into_inner() {
                let _ = ticket.send(outcome);
            }
        }
    }

    /// Number of advisory jobs dropped because the queue was full.
    pub fn dropped_jobs(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
