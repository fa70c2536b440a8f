//! # Job abstractions.
//!
//! This module provides the job-related types:
//! - [`JobDescriptor`] - immutable unit of work (payload + timeout) decoded per message
//! - [`QueuedMessage`] - anything that can be encoded and enqueued
//! - [`Handler`] - trait for user-supplied async, cancelable work functions
//! - [`HandlerFn`] - closure-backed handler implementation
//! - [`HandlerRef`] - shared reference to a handler (`Arc<dyn Handler>`)

mod descriptor;
mod handler;
mod handler_fn;
mod wire;

pub use descriptor::{JobDescriptor, QueuedMessage};
pub use handler::{Handler, HandlerRef, NoopHandler};
pub use handler_fn::HandlerFn;
