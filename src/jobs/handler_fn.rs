//! # Function-backed handler (`HandlerFn`)
//!
//! [`HandlerFn`] wraps a closure `F: Fn(CancellationToken, JobDescriptor) -> Fut`, producing
//! a fresh future per job. Each call owns its own state; share state across jobs with an
//! explicit `Arc<...>` captured by the closure.
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use jobvisor::{HandlerFn, HandlerRef, JobDescriptor, JobError};
//!
//! let h: HandlerRef = HandlerFn::arc(|ctx: CancellationToken, job: JobDescriptor| async move {
//!     if ctx.is_cancelled() {
//!         return Err(JobError::Canceled);
//!     }
//!     let _ = job.payload();
//!     Ok(())
//! });
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::JobError;
use crate::jobs::{Handler, JobDescriptor};

/// Function-backed handler implementation.
#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F, Fut> HandlerFn<F>
where
    F: Fn(CancellationToken, JobDescriptor) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), JobError>> + Send + 'static,
{
    /// Creates a new function-backed handler.
    ///
    /// Prefer [`HandlerFn::arc`] when you immediately need a [`HandlerRef`](crate::HandlerRef).
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the handler and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(CancellationToken, JobDescriptor) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), JobError>> + Send + 'static,
{
    async fn handle(&self, ctx: CancellationToken, job: JobDescriptor) -> Result<(), JobError> {
        (self.f)(ctx, job).await
    }
}
