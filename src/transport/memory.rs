//! # In-process transport.
//!
//! [`MemoryTransport`] is a single-topic broker living inside the process. It is what
//! the tests and demos run against, and a reference for implementing real transports.
//!
//! ## Delivery loop
//! ```text
//! subscribe() ──► spawn deliver()
//!                   ├─► wait until connected (or stopped)
//!                   └─► loop {
//!                         acquire in-flight permit   (max_in_flight)
//!                         recv next message
//!                         spawn { handler(msg) }
//!                            ├─ Ok   → acked
//!                            ├─ Err  → requeue while attempts < max_attempts
//!                            └─ Err  → dropped
//!                       }
//! ```
//!
//! ## Rules
//! - Delivery starts once the transport is **both** connected and subscribed.
//! - At most `max_in_flight` handler invocations run at once.
//! - `stop()` ends the delivery loop; invocations already running finish normally.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{Semaphore, mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::{Message, MessageHandler, Subscription, Transport};
use crate::error::TransportError;

#[derive(Default, Debug)]
struct Counters {
    published: AtomicU64,
    delivered: AtomicU64,
    acked: AtomicU64,
    requeued: AtomicU64,
    dropped: AtomicU64,
    connects: AtomicU64,
    stops: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time copy of a [`MemoryTransport`]'s counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Messages accepted by `publish`.
    pub published: u64,
    /// Handler invocations started (including redeliveries).
    pub delivered: u64,
    /// Deliveries whose handler returned `Ok`.
    pub acked: u64,
    /// Deliveries put back on the queue after an `Err`.
    pub requeued: u64,
    /// Deliveries given up after `max_attempts`.
    pub dropped: u64,
    /// Calls to `connect`.
    pub connects: u64,
    /// Calls to `stop`.
    pub stops: u64,
}

/// Single-topic in-process broker.
pub struct MemoryTransport {
    topic: String,
    reachable: bool,
    max_attempts: u32,
    next_id: AtomicU64,
    tx: mpsc::UnboundedSender<Message>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Message>>>,
    connected: watch::Sender<bool>,
    shutdown: CancellationToken,
    counters: Arc<Counters>,
}

impl MemoryTransport {
    /// Default number of delivery attempts before a failing message is dropped.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

    /// Creates a broker serving `topic`.
    pub fn new(topic: impl Into<String>) -> Self {
        Self::build(topic.into(), true)
    }

    /// Creates a broker whose `connect` always fails.
    pub fn unreachable(topic: impl Into<String>) -> Self {
        Self::build(topic.into(), false)
    }

    fn build(topic: String, reachable: bool) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (connected, _) = watch::channel(false);
        Self {
            topic,
            reachable,
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            next_id: AtomicU64::new(1),
            tx,
            rx: Mutex::new(Some(rx)),
            connected,
            shutdown: CancellationToken::new(),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Sets how many deliveries a failing message gets (minimum 1).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Returns a snapshot of the counters.
    pub fn stats(&self) -> TransportStats {
        let c = &self.counters;
        TransportStats {
            published: c.published.load(Ordering::Relaxed),
            delivered: c.delivered.load(Ordering::Relaxed),
            acked: c.acked.load(Ordering::Relaxed),
            requeued: c.requeued.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
            connects: c.connects.load(Ordering::Relaxed),
            stops: c.stops.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self, addr: &str) -> Result<(), TransportError> {
        Counters::bump(&self.counters.connects);
        if !self.reachable {
            return Err(TransportError::Unreachable {
                addr: addr.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        self.connected.send_replace(true);
        Ok(())
    }

    fn subscribe(
        &self,
        subscription: Subscription,
        handler: MessageHandler,
    ) -> Result<(), TransportError> {
        if subscription.topic != self.topic {
            return Err(TransportError::UnknownTopic {
                topic: subscription.topic,
            });
        }
        let rx = self
            .rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .ok_or(TransportError::AlreadySubscribed)?;

        let delivery = Delivery {
            handler,
            requeue: self.tx.clone(),
            permits: Arc::new(Semaphore::new(subscription.max_in_flight.max(1))),
            max_attempts: self.max_attempts,
            shutdown: self.shutdown.clone(),
            counters: Arc::clone(&self.counters),
        };
        tokio::spawn(delivery.run(rx, self.connected.subscribe()));
        Ok(())
    }

    async fn publish(&self, topic: &str, body: Vec<u8>) -> Result<(), TransportError> {
        if self.shutdown.is_cancelled() {
            return Err(TransportError::Stopped);
        }
        if topic != self.topic {
            return Err(TransportError::UnknownTopic {
                topic: topic.to_string(),
            });
        }
        let msg = Message {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            body,
            attempts: 0,
        };
        self.tx.send(msg).map_err(|_| TransportError::Stopped)?;
        Counters::bump(&self.counters.published);
        Ok(())
    }

    async fn stop(&self) {
        Counters::bump(&self.counters.stops);
        self.shutdown.cancel();
    }
}

/// State owned by the delivery loop.
struct Delivery {
    handler: MessageHandler,
    requeue: mpsc::UnboundedSender<Message>,
    permits: Arc<Semaphore>,
    max_attempts: u32,
    shutdown: CancellationToken,
    counters: Arc<Counters>,
}

impl Delivery {
    async fn run(
        self,
        mut rx: mpsc::UnboundedReceiver<Message>,
        mut connected: watch::Receiver<bool>,
    ) {
        let up = async { connected.wait_for(|up| *up).await.is_ok() };
        tokio::select! {
            up = up => {
                if !up {
                    return;
                }
            }
            _ = self.shutdown.cancelled() => return,
        }

        loop {
            let permit = tokio::select! {
                res = self.permits.clone().acquire_owned() => match res {
                    Ok(permit) => permit,
                    Err(_closed) => break,
                },
                _ = self.shutdown.cancelled() => break,
            };
            let mut msg = tokio::select! {
                next = rx.recv() => match next {
                    Some(msg) => msg,
                    None => break,
                },
                _ = self.shutdown.cancelled() => break,
            };

            msg.attempts += 1;
            Counters::bump(&self.counters.delivered);

            let handler = Arc::clone(&self.handler);
            let requeue = self.requeue.clone();
            let counters = Arc::clone(&self.counters);
            let max_attempts = self.max_attempts;
            tokio::spawn(async move {
                let _permit = permit;
                match handler(msg.clone()).await {
                    Ok(()) => Counters::bump(&counters.acked),
                    Err(_) if msg.attempts < max_attempts => {
                        Counters::bump(&counters.requeued);
                        let _ = requeue.send(msg);
                    }
                    Err(_) => Counters::bump(&counters.dropped),
                }
            });
        }
    }
}
