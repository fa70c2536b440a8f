//! # Example: basic_worker
//!
//! Runs a worker against the in-process transport and feeds it a handful of jobs.
//!
//! Shows how to:
//! - Build a [`Worker`] with a [`HandlerFn`] and a custom [`WorkerConfig`].
//! - Enqueue [`JobDescriptor`]s, including one that overruns its deadline.
//! - Shut down and wait for `run()` to drain.
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example basic_worker
//! ```

use std::sync::Arc;
use std::time::Duration;

use jobvisor::transport::MemoryTransport;
use jobvisor::{HandlerFn, JobDescriptor, JobError, Worker, WorkerConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let transport = Arc::new(MemoryTransport::new("notifications"));
    let cfg = WorkerConfig {
        topic: "notifications".into(),
        max_in_flight: 2,
        startup_delay: Duration::from_millis(10),
        ..WorkerConfig::default()
    };

    let handler = HandlerFn::arc(|ctx: CancellationToken, job: JobDescriptor| async move {
        let text = String::from_utf8_lossy(job.payload()).into_owned();
        let work = Duration::from_millis(if text == "slow" { 500 } else { 100 });

        tokio::select! {
            _ = tokio::time::sleep(work) => {
                println!("[handler] delivered {text:?}");
                Ok(())
            }
            _ = ctx.cancelled() => Err(JobError::Canceled),
        }
    });

    let worker = Worker::builder(transport.clone())
        .with_config(cfg)
        .with_handler(handler)
        .build();

    worker.start().await?;
    let runner = tokio::spawn({
        let worker = Arc::clone(&worker);
        async move { worker.run().await }
    });

    for text in ["hello", "world", "again"] {
        worker
            .enqueue(&JobDescriptor::new(text, Duration::from_secs(1)))
            .await?;
    }
    worker
        .enqueue(&JobDescriptor::new("slow", Duration::from_millis(200)))
        .await?;

    tokio::time::sleep(Duration::from_millis(800)).await;
    println!("[main] busy workers before shutdown: {}", worker.busy_workers());

    worker.shutdown().await?;
    runner.await??;

    println!("[main] {:?}", transport.stats());
    Ok(())
}
