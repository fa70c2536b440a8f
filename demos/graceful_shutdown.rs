//! # Example: graceful_shutdown
//!
//! Serves a worker until Ctrl-C (or SIGTERM), then drains.
//!
//! Long jobs watch their cancellation token and wrap up when shutdown arrives; the
//! remaining part of their timeout is the grace they get. Without a signal the demo shuts
//! itself down after a few seconds.
//!
//! ## Flow
//! ```text
//! serve()
//!   ├─► start()           connect once
//!   ├─► run()             dispatch until stop
//!   └─► signal / timer ─► shutdown() ─► ctx.cancelled() in every handler ─► drain
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example graceful_shutdown
//! # press Ctrl-C while jobs are running
//! ```

use std::sync::Arc;
use std::time::Duration;

use jobvisor::transport::MemoryTransport;
use jobvisor::{HandlerFn, JobDescriptor, JobError, Worker, WorkerConfig, WorkerState};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let transport = Arc::new(MemoryTransport::new("batch"));
    let cfg = WorkerConfig {
        topic: "batch".into(),
        max_in_flight: 3,
        ..WorkerConfig::default()
    };

    let handler = HandlerFn::arc(|ctx: CancellationToken, job: JobDescriptor| async move {
        let id = String::from_utf8_lossy(job.payload()).into_owned();
        for step in 1..=20 {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(250)) => {
                    println!("[job {id}] step {step}/20");
                }
                _ = ctx.cancelled() => {
                    println!("[job {id}] cancelled at step {step}, flushing partial work");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    return Err(JobError::Canceled);
                }
            }
        }
        Ok(())
    });

    let worker = Worker::builder(transport)
        .with_config(cfg)
        .with_handler(handler)
        .build();

    for id in 0..5 {
        worker
            .enqueue(&JobDescriptor::new(format!("{id}"), Duration::from_secs(30)))
            .await?;
    }

    tokio::spawn({
        let worker = Arc::clone(&worker);
        async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            if worker.shutdown().await.is_ok() {
                println!("[timer] no signal received, shutting down");
            }
        }
    });

    worker.serve().await?;
    assert_eq!(worker.state(), WorkerState::Stopped);
    println!("[main] drained, busy = {}", worker.busy_workers());
    Ok(())
}
