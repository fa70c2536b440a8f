//! # Subscriber trait
//!
//! A [`Subscribe`] implementation receives every [`Event`] a worker publishes: lifecycle
//! (`WorkerConnected`, `ShutdownRequested`, `IntakeClosed`, `Drained`), per-message intake
//! decisions and per-job outcomes. [`LogWriter`](crate::LogWriter) is one; metrics or
//! audit sinks are others.
//!
//! Each subscriber gets its own bounded queue inside the
//! [`SubscriberSet`](crate::SubscriberSet) and its own delivery task, so a slow
//! subscriber never delays job execution or its peers. When its queue is full the event
//! is dropped for that subscriber alone and a `SubscriberOverflow` event is published.

use async_trait::async_trait;

use crate::events::Event;

/// Receiver of runtime events.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes one event. A panic here is caught and reported as `SubscriberPanicked`.
    async fn on_event(&self, event: &Event);

    /// Name used in overflow and panic reports.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Capacity of the queue feeding this subscriber.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
