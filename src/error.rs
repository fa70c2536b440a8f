//! Error types used by the jobvisor runtime, job handlers and transports.
//!
//! This module defines three enums:
//!
//! - [`JobError`] - the outcome of a single job execution (returned by handlers and the guard).
//! - [`WorkerError`] - lifecycle errors raised by the [`Worker`](crate::Worker) itself.
//! - [`TransportError`] - failures reported by a [`Transport`](crate::transport::Transport) implementation.
//!
//! Each type exposes `as_label` for logs/metrics.

use std::any::Any;
use std::time::Duration;

use thiserror::Error;

/// # Errors produced by job execution.
///
/// Returned by [`Handler`](crate::Handler) implementations and by the execution guard.
/// Any `Err` returned to the transport means the message is **not** acknowledged.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// The job ran past its deadline (or past the remaining grace after shutdown).
    #[error("deadline exceeded after {timeout:?}")]
    DeadlineExceeded {
        /// The effective job timeout.
        timeout: Duration,
    },

    /// The handler reported a failure.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The handler observed cancellation and gave up.
    #[error("context cancelled")]
    Canceled,

    /// The handler panicked; the panic was captured at the guard boundary.
    #[error("handler panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },

    /// The message body could not be decoded into a job descriptor.
    #[error("malformed job payload: {error}")]
    Decode {
        /// The decoder error message.
        error: String,
    },

    /// The worker no longer accepts new messages.
    #[error("worker is not accepting new jobs")]
    Rejected,
}

impl JobError {
    /// Convenience constructor for [`JobError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        JobError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use jobvisor::JobError;
    /// use std::time::Duration;
    ///
    /// let err = JobError::DeadlineExceeded { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "job_deadline_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            JobError::DeadlineExceeded { .. } => "job_deadline_exceeded",
            JobError::Fail { .. } => "job_failed",
            JobError::Canceled => "job_canceled",
            JobError::Panicked { .. } => "job_panicked",
            JobError::Decode { .. } => "job_malformed",
            JobError::Rejected => "job_rejected",
        }
    }

    /// Indicates whether redelivering the same message could succeed.
    ///
    /// Returns `false` for [`JobError::Decode`] and [`JobError::Panicked`].
    pub fn is_retryable(&self) -> bool {
        !matches!(self, JobError::Decode { .. } | JobError::Panicked { .. })
    }
}

/// # Errors produced by worker lifecycle operations.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// Shutdown already happened; the worker cannot be started, run or fed again.
    #[error("worker already shut down")]
    AlreadyShutdown,

    /// `run` was called while another `run` is active.
    #[error("worker dispatch loop already running")]
    AlreadyRunning,

    /// The transport could not be connected at startup. The worker is unusable.
    #[error("could not connect transport: {0}")]
    Connect(TransportError),

    /// A transport call failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A message could not be encoded for publishing.
    #[error("could not encode message: {error}")]
    Encode {
        /// The encoder error message.
        error: String,
    },
}

impl WorkerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerError::AlreadyShutdown => "worker_already_shutdown",
            WorkerError::AlreadyRunning => "worker_already_running",
            WorkerError::Connect(_) => "worker_connect_failed",
            WorkerError::Transport(_) => "worker_transport",
            WorkerError::Encode { .. } => "worker_encode",
        }
    }
}

/// # Errors reported by a transport.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The broker at `addr` could not be reached.
    #[error("broker unreachable at {addr}: {reason}")]
    Unreachable {
        /// Address that was dialed.
        addr: String,
        /// Underlying reason.
        reason: String,
    },

    /// Publishing to a topic this transport does not serve.
    #[error("unknown topic {topic:?}")]
    UnknownTopic {
        /// The requested topic.
        topic: String,
    },

    /// The subscription handler was already installed.
    #[error("subscription already active")]
    AlreadySubscribed,

    /// The transport has been stopped.
    #[error("transport stopped")]
    Stopped,
}

impl TransportError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TransportError::Unreachable { .. } => "transport_unreachable",
            TransportError::UnknownTopic { .. } => "transport_unknown_topic",
            TransportError::AlreadySubscribed => "transport_already_subscribed",
            TransportError::Stopped => "transport_stopped",
        }
    }
}

/// Renders a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
