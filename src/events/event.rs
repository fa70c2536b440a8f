//! # Runtime events emitted by the worker, dispatch loop and execution guard.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Lifecycle events**: connect, shutdown request, drain completion
//! - **Job events**: one `JobStarting` and exactly one terminal event per executed job
//! - **Intake events**: messages that never reach a handler (empty, malformed, rejected)
//! - **Subscriber events**: problems inside the fan-out itself
//!
//! The [`Event`] struct carries optional metadata (timeout, elapsed time, reason).
//!
//! ## Ordering guarantees
//! Every event published on a [`Bus`](crate::events::Bus) receives a sequence number from
//! that bus; numbers increase monotonically per bus.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use jobvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::DeadlineExceeded)
//!     .with_timeout(Duration::from_secs(5))
//!     .with_reason("deadline exceeded after 5s");
//!
//! assert_eq!(ev.kind, EventKind::DeadlineExceeded);
//! assert_eq!(ev.timeout_ms, Some(5_000));
//! ```

use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Lifecycle events ===
    /// Transport connected; the worker is started.
    WorkerConnected,

    /// Shutdown requested; the stop signal is about to close.
    ShutdownRequested,

    /// A handler crash reached the dispatch loop; no new messages are accepted.
    ///
    /// Sets:
    /// - `reason`: panic info
    IntakeClosed,

    /// All in-flight invocations finished after the dispatch loop stopped.
    Drained,

    // === Job events ===
    /// Handler invocation is about to start.
    ///
    /// Sets:
    /// - `timeout_ms`: effective job timeout
    JobStarting,

    /// Handler returned `Ok(())`.
    ///
    /// Sets:
    /// - `elapsed_ms`: execution time
    JobSucceeded,

    /// Handler returned an error.
    ///
    /// Sets:
    /// - `elapsed_ms`: execution time
    /// - `reason`: error message
    JobFailed,

    /// Deadline passed (directly, or after the shutdown grace ran out).
    ///
    /// Sets:
    /// - `timeout_ms`: effective job timeout
    /// - `elapsed_ms`: execution time
    DeadlineExceeded,

    /// Handler panicked.
    ///
    /// Sets:
    /// - `elapsed_ms`: execution time
    /// - `reason`: panic info
    JobPanicked,

    // === Intake events ===
    /// Message with an empty body was acknowledged without running the handler.
    MessageSkipped,

    /// Message body could not be decoded.
    ///
    /// Sets:
    /// - `reason`: decoder error
    MessageDiscarded,

    /// Message arrived after intake closed and was handed back to the transport.
    MessageRejected,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `reason`: `subscriber=<name> info=<panic>`
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `reason`: `subscriber=<name> reason=<full|closed>`
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Sequence number assigned by the bus at publish time (`0` before publishing).
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Job timeout in milliseconds.
    pub timeout_ms: Option<u32>,
    /// Job execution time in milliseconds.
    pub elapsed_ms: Option<u32>,
    /// Human-readable reason (errors, panic info, overflow details).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind stamped with the current time.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: 0,
            at: SystemTime::now(),
            kind,
            timeout_ms: None,
            elapsed_ms: None,
            reason: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a timeout (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    /// Attaches an execution time (stored as milliseconds).
    #[inline]
    pub fn with_elapsed(mut self, d: Duration) -> Self {
        self.elapsed_ms = Some(compact_ms(d));
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} info={info}"))
    }

    /// True for events describing a finished job.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::JobSucceeded
                | EventKind::JobFailed
                | EventKind::DeadlineExceeded
                | EventKind::JobPanicked
        )
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}
