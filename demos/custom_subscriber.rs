//! # Example: custom_subscriber
//!
//! Attaches a metrics-style subscriber next to the built-in [`LogWriter`].
//!
//! Shows how to:
//! - Implement the [`Subscribe`] trait.
//! - Count job outcomes from [`Event`] / [`EventKind`].
//! - Watch a handler panic close intake while in-flight work drains.
//!
//! ## Flow
//! ```text
//! ExecutionGuard ── JobStarting / JobSucceeded / JobFailed / DeadlineExceeded / JobPanicked ──┐
//! Dispatcher     ── MessageSkipped / MessageDiscarded / MessageRejected ──────────────────────┤
//! Worker         ── WorkerConnected / ShutdownRequested / IntakeClosed / Drained ─────────────┤
//!                                                                                             ▼
//!                                                         Bus ──► SubscriberSet ──► Outcomes.on_event()
//!                                                                               └──► LogWriter.on_event()
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example custom_subscriber
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use jobvisor::transport::MemoryTransport;
use jobvisor::{
    Event, EventKind, HandlerFn, JobDescriptor, JobError, LogWriter, Subscribe, Worker,
    WorkerConfig,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Counts terminal job outcomes.
#[derive(Default)]
struct Outcomes {
    succeeded: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    panicked: AtomicU64,
}

impl Outcomes {
    fn report(&self) {
        println!(
            "[outcomes] ok={} failed={} timeout={} panic={}",
            self.succeeded.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
            self.timed_out.load(Ordering::Relaxed),
            self.panicked.load(Ordering::Relaxed),
        );
    }
}

#[async_trait]
impl Subscribe for Outcomes {
    async fn on_event(&self, ev: &Event) {
        let counter = match ev.kind {
            EventKind::JobSucceeded => &self.succeeded,
            EventKind::JobFailed => &self.failed,
            EventKind::DeadlineExceeded => &self.timed_out,
            EventKind::JobPanicked => &self.panicked,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn name(&self) -> &'static str {
        "outcomes"
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let outcomes = Arc::new(Outcomes::default());
    let subs: Vec<Arc<dyn Subscribe>> = vec![outcomes.clone(), Arc::new(LogWriter::new())];

    let transport = Arc::new(MemoryTransport::new("jobs"));
    let handler = HandlerFn::arc(|_ctx: CancellationToken, job: JobDescriptor| async move {
        match job.payload() {
            b"fail" => Err(JobError::fail("upstream rejected the request")),
            b"slow" => {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Ok(())
            }
            b"panic" => panic!("corrupted job state"),
            _ => Ok(()),
        }
    });

    let worker = Worker::builder(transport)
        .with_config(WorkerConfig {
            topic: "jobs".into(),
            max_in_flight: 4,
            startup_delay: Duration::ZERO,
            ..WorkerConfig::default()
        })
        .with_handler(handler)
        .with_subscribers(subs)
        .build();

    worker.start().await?;
    let runner = tokio::spawn({
        let worker = Arc::clone(&worker);
        async move { worker.run().await }
    });

    for body in ["ok", "fail", "slow", "ok"] {
        worker
            .enqueue(&JobDescriptor::new(body, Duration::from_millis(300)))
            .await?;
    }
    tokio::time::sleep(Duration::from_millis(500)).await;
    outcomes.report();

    // A panic closes intake; run() returns once the remaining jobs drain.
    worker
        .enqueue(&JobDescriptor::new("panic", Duration::from_secs(1)))
        .await?;
    runner.await??;

    tokio::time::sleep(Duration::from_millis(50)).await;
    outcomes.report();
    Ok(())
}
