//! # Dispatch: from transport message to guarded handler execution.
//!
//! [`Dispatcher`] is the per-message half of the dispatch loop. The transport invokes it
//! once per delivery (on its own concurrent unit); [`Worker::run`](crate::Worker::run)
//! owns the other half, the top-level wait and the drain.
//!
//! ## Flow
//! ```text
//! Message ──► track in-flight (TaskTracker token)
//!                 ▼
//!           intake closed? ── yes ──► Err(Rejected)            (not acked, redelivered)
//!                 │ no
//!                 ▼
//!           empty body? ── yes ──► Ok(())                      (acked, handler skipped)
//!                 │ no
//!                 ▼
//!           decode ── error ──► DecodePolicy::Discard → Ok(())
//!                 │             DecodePolicy::Reject  → Err(Decode)
//!                 ▼
//!           ExecutionGuard::execute(job)
//!                 ├─ Err(Panicked) → forward to crash channel (first one wins)
//!                 └─ result ──► transport
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::core::config::DecodePolicy;
use crate::core::guard::ExecutionGuard;
use crate::error::JobError;
use crate::events::{Bus, Event, EventKind};
use crate::jobs::JobDescriptor;
use crate::transport::{Message, MessageHandler, message_handler};

/// Per-message dispatch state shared by every delivery of one `run`.
#[derive(Clone)]
pub struct Dispatcher {
    guard: Arc<ExecutionGuard>,
    tracker: TaskTracker,
    intake: CancellationToken,
    crashes: mpsc::Sender<String>,
    decode_policy: DecodePolicy,
    bus: Bus,
}

impl Dispatcher {
    pub fn new(
        guard: Arc<ExecutionGuard>,
        tracker: TaskTracker,
        intake: CancellationToken,
        crashes: mpsc::Sender<String>,
        decode_policy: DecodePolicy,
        bus: Bus,
    ) -> Self {
        Self {
            guard,
            tracker,
            intake,
            crashes,
            decode_policy,
            bus,
        }
    }

    /// Handles one delivery. `Ok(())` tells the transport to acknowledge.
    pub async fn dispatch(&self, msg: Message) -> Result<(), JobError> {
        let _in_flight = self.tracker.token();
        if self.intake.is_cancelled() {
            self.bus.publish(Event::new(EventKind::MessageRejected));
            return Err(JobError::Rejected);
        }

        if msg.body.is_empty() {
            self.bus.publish(Event::new(EventKind::MessageSkipped));
            return Ok(());
        }

        let job = match JobDescriptor::decode(&msg.body) {
            Ok(job) => job,
            Err(e) => {
                self.bus
                    .publish(Event::new(EventKind::MessageDiscarded).with_reason(e.to_string()));
                return match self.decode_policy {
                    DecodePolicy::Discard => Ok(()),
                    DecodePolicy::Reject => Err(e),
                };
            }
        };

        let res = self.guard.execute(job).await;
        if let Err(JobError::Panicked { info }) = &res {
            // Capacity 1: only the first crash is kept, later ones are already reported
            // through JobPanicked events.
            let _ = self.crashes.try_send(info.clone());
        }
        res
    }

    /// Converts the dispatcher into the callback handed to the transport.
    pub fn into_handler(self) -> MessageHandler {
        let me = Arc::new(self);
        message_handler(move |msg: Message| {
            let me = Arc::clone(&me);
            async move { me.dispatch(msg).await }
        })
    }
}
