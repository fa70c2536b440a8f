//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the worker, the dispatch
//! callbacks, the execution guard and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Worker` (lifecycle), dispatch callbacks (intake),
//!   `ExecutionGuard` (job outcome), `SubscriberSet` workers (overflow/panic).
//! - **Consumer**: the listener spawned by `WorkerBuilder::build`, which fans out
//!   to the `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
