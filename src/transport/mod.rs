//! # Transport abstraction.
//!
//! A [`Transport`] is the message-broker connection the worker sits on. jobvisor only
//! needs four primitives from it:
//!
//! ```text
//! connect(addr)                      establish consumer/producer connections
//! subscribe(subscription, handler)   deliver every message to `handler`
//! publish(topic, bytes)              fire-and-forget send
//! stop()                             close consumer and producer
//! ```
//!
//! ## Delivery contract
//! - At-least-once: a message whose handler returns `Ok(())` is acknowledged;
//!   any `Err` leaves redelivery up to the transport.
//! - The transport runs handler invocations concurrently and bounds them by
//!   [`Subscription::max_in_flight`]. jobvisor does not add its own admission control.

mod memory;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::{JobError, TransportError};

pub use memory::{MemoryTransport, TransportStats};

/// One inbound message as delivered by a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Transport-assigned identifier.
    pub id: u64,
    /// Raw message body.
    pub body: Vec<u8>,
    /// Delivery attempt, starting at 1.
    pub attempts: u32,
}

/// Future returned by a [`MessageHandler`].
pub type MessageFuture = BoxFuture<'static, Result<(), JobError>>;

/// Callback installed with [`Transport::subscribe`]; invoked once per delivery.
pub type MessageHandler = Arc<dyn Fn(Message) -> MessageFuture + Send + Sync>;

/// Wraps an async closure into a [`MessageHandler`].
///
/// ```rust
/// use jobvisor::transport::{Message, message_handler};
///
/// let h = message_handler(|msg: Message| async move {
///     println!("got {} bytes", msg.body.len());
///     Ok(())
/// });
/// ```
pub fn message_handler<F, Fut>(f: F) -> MessageHandler
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), JobError>> + Send + 'static,
{
    Arc::new(move |msg: Message| f(msg).boxed())
}

/// Where and how to consume.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subscription {
    /// Topic to consume.
    pub topic: String,
    /// Subscription (channel) name.
    pub channel: String,
    /// Maximum unacknowledged deliveries at once.
    pub max_in_flight: usize,
}

/// Message-broker connection used by a [`Worker`](crate::Worker).
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Connects to the broker at `addr`.
    async fn connect(&self, addr: &str) -> Result<(), TransportError>;

    /// Installs the delivery callback.
    fn subscribe(
        &self,
        subscription: Subscription,
        handler: MessageHandler,
    ) -> Result<(), TransportError>;

    /// Publishes `body` on `topic`.
    async fn publish(&self, topic: &str, body: Vec<u8>) -> Result<(), TransportError>;

    /// Stops consumer and producer. No deliveries start after this returns.
    async fn stop(&self);
}
