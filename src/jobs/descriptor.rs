//! # Job descriptor: the decoded unit of work.
//!
//! [`JobDescriptor`] is what a handler receives for every inbound message. It is
//! decoded fresh per message and owned by the dispatch invocation that created it.
//!
//! ## Wire format
//! ```text
//! {"timeout": 5000000000, "body": "aGVsbG8="}
//!   timeout  signed nanoseconds, missing → 0, negative → 0
//!   body     base64 payload, missing/null → empty
//! ```
//!
//! A zero timeout means "use the worker default"
//! ([`WorkerConfig::job_timeout`](crate::WorkerConfig::job_timeout)).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::wire;
use crate::error::{JobError, WorkerError};

/// Immutable job value: opaque payload plus execution timeout.
///
/// The timeout is measured from the moment execution begins, not from enqueue time.
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use jobvisor::JobDescriptor;
///
/// let job = JobDescriptor::new(b"hello".to_vec(), Duration::from_secs(5));
/// let bytes = job.encode().unwrap();
/// assert_eq!(JobDescriptor::decode(&bytes).unwrap(), job);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    #[serde(with = "wire::nanos", default)]
    timeout: Duration,
    #[serde(rename = "body", with = "wire::base64_bytes", default)]
    payload: Vec<u8>,
}

impl JobDescriptor {
    /// Creates a descriptor.
    pub fn new(payload: impl Into<Vec<u8>>, timeout: Duration) -> Self {
        Self {
            timeout,
            payload: payload.into(),
        }
    }

    /// Returns the payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Returns the requested timeout (`Duration::ZERO` = worker default).
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Consumes the descriptor and returns the payload.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Decodes a descriptor from a message body.
    pub fn decode(body: &[u8]) -> Result<Self, JobError> {
        serde_json::from_slice(body).map_err(|e| JobError::Decode {
            error: e.to_string(),
        })
    }

    /// Encodes the descriptor into its wire form.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Anything that can be handed to [`Worker::enqueue`](crate::Worker::enqueue).
pub trait QueuedMessage: Send + Sync {
    /// Serializes the message into the bytes published on the topic.
    fn bytes(&self) -> Result<Vec<u8>, WorkerError>;
}

impl QueuedMessage for JobDescriptor {
    fn bytes(&self) -> Result<Vec<u8>, WorkerError> {
        self.encode().map_err(|e| WorkerError::Encode {
            error: e.to_string(),
        })
    }
}

/// Pre-encoded bodies are published as they are.
impl QueuedMessage for [u8] {
    fn bytes(&self) -> Result<Vec<u8>, WorkerError> {
        Ok(self.to_vec())
    }
}

impl QueuedMessage for Vec<u8> {
    fn bytes(&self) -> Result<Vec<u8>, WorkerError> {
        Ok(self.clone())
    }
}
