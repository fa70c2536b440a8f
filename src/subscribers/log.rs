//! # LogWriter: events to `tracing`
//!
//! The default subscriber. Every [`Event`] becomes one `tracing` record with structured
//! fields, at a level that matches its severity:
//!
//! ```text
//! ERROR  IntakeClosed, JobPanicked, SubscriberPanicked
//! WARN   JobFailed, DeadlineExceeded, MessageDiscarded, MessageRejected, SubscriberOverflow
//! INFO   WorkerConnected, ShutdownRequested, Drained
//! DEBUG  JobStarting, JobSucceeded, MessageSkipped
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber backed by `tracing`.
#[derive(Default, Debug, Clone, Copy)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::IntakeClosed => {
                error!(seq = e.seq, panic = reason, "handler crash reached dispatch loop; intake closed");
            }
            EventKind::JobPanicked => {
                error!(seq = e.seq, elapsed_ms = e.elapsed_ms, panic = reason, "job panicked");
            }
            EventKind::SubscriberPanicked => {
                error!(seq = e.seq, reason, "subscriber panicked");
            }
            EventKind::JobFailed => {
                warn!(seq = e.seq, elapsed_ms = e.elapsed_ms, error = reason, "job failed");
            }
            EventKind::DeadlineExceeded => {
                warn!(
                    seq = e.seq,
                    timeout_ms = e.timeout_ms,
                    elapsed_ms = e.elapsed_ms,
                    "job deadline exceeded"
                );
            }
            EventKind::MessageDiscarded => {
                warn!(seq = e.seq, error = reason, "malformed message discarded");
            }
            EventKind::MessageRejected => {
                warn!(seq = e.seq, "message rejected, intake closed");
            }
            EventKind::SubscriberOverflow => {
                warn!(seq = e.seq, reason, "subscriber dropped event");
            }
            EventKind::WorkerConnected => {
                info!(seq = e.seq, addr = reason, "worker connected");
            }
            EventKind::ShutdownRequested => {
                info!(seq = e.seq, "shutdown requested");
            }
            EventKind::Drained => {
                info!(seq = e.seq, "in-flight jobs drained");
            }
            EventKind::JobStarting => {
                debug!(seq = e.seq, timeout_ms = e.timeout_ms, "job starting");
            }
            EventKind::JobSucceeded => {
                debug!(seq = e.seq, elapsed_ms = e.elapsed_ms, "job succeeded");
            }
            EventKind::MessageSkipped => {
                debug!(seq = e.seq, "empty message acknowledged");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
