//! # Execution guard: run one job under a deadline, crash isolation and shutdown preemption.
//!
//! The guard spawns the handler on its own Tokio task and waits for the first of
//! three outcomes:
//!
//! ```text
//! enter busy slot ──► spawn handler(ctx, job)
//!                          │
//!       ┌──────────────────┼─────────────────────────────┐
//!       ▼                  ▼                             ▼
//!  handler returns    deadline fires               stop signal closes
//!       │                  │                             │
//!   its result        cancel ctx                   cancel ctx
//!                     DeadlineExceeded             wait remaining time
//!                                                   ├─ handler returns → its result
//!                                                   └─ time runs out   → DeadlineExceeded
//! ```
//!
//! ## Rules
//! - The handler runs **exactly once**; it is never aborted, only cancelled cooperatively.
//! - A handler panic is returned as [`JobError::Panicked`] after the busy slot is released.
//! - The busy counter is decremented **exactly once** per execution, on every exit path.
//! - Always publishes `JobStarting` and **exactly one** terminal event.

use std::time::Duration;

use tokio::task::JoinError;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::core::busy::BusyCounter;
use crate::error::{JobError, panic_message};
use crate::events::{Bus, Event, EventKind};
use crate::jobs::{HandlerRef, JobDescriptor};

/// Supervises individual handler executions.
///
/// Cheap to share behind an `Arc`; one guard serves every message of a worker.
pub struct ExecutionGuard {
    handler: HandlerRef,
    stop: CancellationToken,
    busy: BusyCounter,
    bus: Bus,
    default_timeout: Duration,
}

impl ExecutionGuard {
    pub fn new(
        handler: HandlerRef,
        stop: CancellationToken,
        busy: BusyCounter,
        bus: Bus,
        default_timeout: Duration,
    ) -> Self {
        Self {
            handler,
            stop,
            busy,
            bus,
            default_timeout,
        }
    }

    /// Executes `job` and returns the first outcome to occur.
    ///
    /// ### Timeout
    /// The job's own timeout, or the default timeout when it is zero. Measured from
    /// the moment this call starts.
    ///
    /// ### Shutdown
    /// When the stop signal closes first, the handler's token is cancelled and the guard
    /// waits at most for what is left of the timeout. It never waits indefinitely.
    pub async fn execute(&self, job: JobDescriptor) -> Result<(), JobError> {
        let timeout = match job.timeout() {
            Duration::ZERO => self.default_timeout,
            t => t,
        };
        let _slot = self.busy.enter();
        let started = Instant::now();

        let ctx = self.stop.child_token();
        let _cancel_on_exit = ctx.clone().drop_guard();

        self.bus
            .publish(Event::new(EventKind::JobStarting).with_timeout(timeout));

        let handler = self.handler.clone();
        let handler_ctx = ctx.clone();
        let mut run = tokio::spawn(async move { handler.handle(handler_ctx, job).await });

        let deadline = time::sleep(timeout);
        tokio::pin!(deadline);

        let res = tokio::select! {
            joined = &mut run => flatten(joined),
            _ = &mut deadline => {
                ctx.cancel();
                Err(JobError::DeadlineExceeded { timeout })
            }
            _ = self.stop.cancelled() => {
                ctx.cancel();
                tokio::select! {
                    joined = &mut run => flatten(joined),
                    _ = &mut deadline => Err(JobError::DeadlineExceeded { timeout }),
                }
            }
        };

        self.publish_outcome(&res, timeout, started.elapsed());
        res
    }

    fn publish_outcome(&self, res: &Result<(), JobError>, timeout: Duration, elapsed: Duration) {
        let ev = match res {
            Ok(()) => Event::new(EventKind::JobSucceeded),
            Err(JobError::DeadlineExceeded { .. }) => {
                Event::new(EventKind::DeadlineExceeded).with_timeout(timeout)
            }
            Err(JobError::Panicked { info }) => {
                Event::new(EventKind::JobPanicked).with_reason(info.as_str())
            }
            Err(e) => Event::new(EventKind::JobFailed).with_reason(e.to_string()),
        };
        self.bus.publish(ev.with_elapsed(elapsed));
    }
}

/// Maps the handler task's join result onto a job result.
fn flatten(joined: Result<Result<(), JobError>, JoinError>) -> Result<(), JobError> {
    match joined {
        Ok(res) => res,
        Err(e) if e.is_panic() => Err(JobError::Panicked {
            info: panic_message(&*e.into_panic()),
        }),
        Err(_) => Err(JobError::Canceled),
    }
}
