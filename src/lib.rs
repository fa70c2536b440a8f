//! # jobvisor
//!
//! **Jobvisor** is a bounded-concurrency job executor that sits between a message-queue
//! transport and user-supplied async work functions.
//!
//! It pulls serialized job descriptors off a subscription, runs each one against a
//! [`Handler`] under a per-job deadline, isolates handler panics so one bad job cannot
//! take the worker down, and shuts down cooperatively while draining work in flight.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                       ┌──────────────────────────────┐
//!                       │  Transport (broker client)   │
//!                       │  connect / subscribe /       │
//!                       │  publish / stop              │
//!                       └──────┬───────────────▲───────┘
//!               Message (bytes)│               │ Ok = ack, Err = redeliver
//!                              ▼               │
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Worker                                                           │
//! │  - Dispatcher   (intake gate, decode, DecodePolicy, crash relay)  │
//! │  - ExecutionGuard (deadline, panic isolation, stop preemption)    │
//! │  - BusyCounter  (jobs executing right now)                        │
//! │  - TaskTracker  (in-flight callbacks, drained by run())           │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   handler(ctx, job)  handler(ctx, job)  handler(ctx, job)     (one task each)
//!
//!  Worker / Dispatcher / Guard ── publish(Event) ──► Bus ──► listener ──► SubscriberSet
//!                                                                     ┌──────┼──────┐
//!                                                                     ▼      ▼      ▼
//!                                                                LogWriter  sub2  subN
//! ```
//!
//! ### Lifecycle
//! ```text
//! Worker::builder(transport).with_config(..).with_handler(..).build()
//!
//! start()     ─► sleep(startup_delay) ─► transport.connect(addr)   (once, memoized)
//! run()       ─► transport.subscribe(callback)
//!                 select! { stop signal | handler crash → close worker, stop transport }
//!                 drain in-flight callbacks ─► Drained
//! shutdown()  ─► ShutdownRequested ─► transport.stop() ─► cancel stop signal
//! enqueue(m)  ─► transport.publish(topic, m.bytes())
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                            |
//! |-------------------|---------------------------------------------------------------|-----------------------------------------------|
//! | **Jobs**          | Wire-compatible job descriptors and handlers.                 | [`JobDescriptor`], [`Handler`], [`HandlerFn`] |
//! | **Worker**        | Start, run, shut down, enqueue; busy accounting.              | [`Worker`], [`WorkerState`]                   |
//! | **Configuration** | Construction-time settings and malformed-message handling.    | [`WorkerConfig`], [`DecodePolicy`]            |
//! | **Transport**     | Broker abstraction and an in-process implementation.          | [`transport::Transport`]                      |
//! | **Subscriber API**| Observe runtime events (logging, metrics, audit).             | [`Subscribe`], [`LogWriter`]                  |
//! | **Errors**        | Typed errors for jobs, lifecycle and transport.               | [`JobError`], [`WorkerError`]                 |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use jobvisor::{HandlerFn, JobDescriptor, Worker, WorkerConfig};
//! use jobvisor::transport::MemoryTransport;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = Arc::new(MemoryTransport::new("jobs"));
//!     let cfg = WorkerConfig {
//!         topic: "jobs".into(),
//!         startup_delay: Duration::ZERO,
//!         ..WorkerConfig::default()
//!     };
//!
//!     let worker = Worker::builder(transport)
//!         .with_config(cfg)
//!         .with_handler(HandlerFn::arc(|_ctx: CancellationToken, job: JobDescriptor| async move {
//!             println!("payload: {:?}", job.payload());
//!             Ok(())
//!         }))
//!         .build();
//!
//!     worker.start().await?;
//!     worker.enqueue(&JobDescriptor::new(b"hello".to_vec(), Duration::from_secs(5))).await?;
//!
//!     let runner = tokio::spawn({
//!         let worker = Arc::clone(&worker);
//!         async move { worker.run().await }
//!     });
//!     tokio::time::sleep(Duration::from_millis(50)).await;
//!
//!     worker.shutdown().await?;
//!     runner.await??;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod jobs;
mod subscribers;
pub mod transport;

// ---- Public re-exports ----

pub use core::{DecodePolicy, Worker, WorkerBuilder, WorkerConfig, WorkerState};
pub use error::{JobError, TransportError, WorkerError};
pub use events::{Bus, Event, EventKind};
pub use jobs::{Handler, HandlerFn, HandlerRef, JobDescriptor, NoopHandler, QueuedMessage};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
