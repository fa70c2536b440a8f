//! Runtime core: job execution and worker lifecycle.
//!
//! The public API from this module is [`Worker`] (plus its builder, config and state).
//!
//! Internal modules:
//! - [`guard`]: executes one job with deadline, crash isolation and shutdown preemption;
//! - [`dispatch`]: per-message callback installed on the transport;
//! - [`worker`]: start/run/shutdown/enqueue lifecycle;
//! - [`busy`]: in-flight job counter with RAII slots;
//! - [`shutdown`]: cross-platform termination signals;
//! - [`config`]: worker settings.

mod builder;
mod busy;
mod config;
mod dispatch;
mod guard;
mod shutdown;
mod worker;

pub use builder::WorkerBuilder;
pub use config::{DecodePolicy, WorkerConfig};
pub use worker::{Worker, WorkerState};
