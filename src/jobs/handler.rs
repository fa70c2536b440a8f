//! # Handler abstraction.
//!
//! A [`Handler`] is the user-supplied work function executed once per job. It receives a
//! [`CancellationToken`] and should check it to stop cooperatively when the job's deadline
//! passes or the worker shuts down. Cancellation is advisory: the runtime never aborts
//! a running handler.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::JobError;
use crate::jobs::JobDescriptor;

/// # Asynchronous, cancelable job handler.
///
/// # Example
/// ```
/// use tokio_util::sync::CancellationToken;
/// use async_trait::async_trait;
/// use jobvisor::{Handler, JobDescriptor, JobError};
///
/// struct Echo;
///
/// #[async_trait]
/// impl Handler for Echo {
///     async fn handle(&self, ctx: CancellationToken, job: JobDescriptor) -> Result<(), JobError> {
///         if ctx.is_cancelled() {
///             return Err(JobError::Canceled);
///         }
///         println!("{}", String::from_utf8_lossy(job.payload()));
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Executes one job until completion or cancellation.
    async fn handle(&self, ctx: CancellationToken, job: JobDescriptor) -> Result<(), JobError>;
}

/// Shared handle to a handler.
pub type HandlerRef = Arc<dyn Handler>;

/// Handler that accepts every job without doing anything.
///
/// Used when a worker is built without a handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

#[async_trait]
impl Handler for NoopHandler {
    async fn handle(&self, _ctx: CancellationToken, _job: JobDescriptor) -> Result<(), JobError> {
        Ok(())
    }
}
