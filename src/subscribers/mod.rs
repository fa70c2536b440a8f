//! # Event subscribers.
//!
//! Subscribers observe runtime [`Event`](crate::Event)s published on the bus. They are
//! the worker's logging sink: a worker built without explicit subscribers gets a
//! [`LogWriter`], which forwards events to `tracing`.
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use jobvisor::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct CrashCounter;
//!
//! #[async_trait]
//! impl Subscribe for CrashCounter {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::JobPanicked {
//!             // increment a counter, page someone...
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "crash-counter" }
//! }
//! ```

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
