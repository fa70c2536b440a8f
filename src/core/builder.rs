use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;

use super::{config::WorkerConfig, worker::Worker};
use crate::{
    events::Bus,
    jobs::{HandlerRef, NoopHandler},
    subscribers::{LogWriter, Subscribe, SubscriberSet},
    transport::Transport,
};

/// Builder for constructing a [`Worker`].
///
/// Defaults: [`WorkerConfig::default`], a [`NoopHandler`], and a single [`LogWriter`]
/// subscriber.
pub struct WorkerBuilder {
    transport: Arc<dyn Transport>,
    cfg: WorkerConfig,
    handler: Option<HandlerRef>,
    subscribers: Option<Vec<Arc<dyn Subscribe>>>,
}

impl WorkerBuilder {
    /// Creates a builder on top of `transport`.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            cfg: WorkerConfig::default(),
            handler: None,
            subscribers: None,
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, cfg: WorkerConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Sets the handler every decoded job is executed with.
    pub fn with_handler(mut self, handler: HandlerRef) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Replaces the default [`LogWriter`] with the given subscribers.
    ///
    /// Pass an empty vector to run silently. Include `LogWriter` explicitly to keep
    /// logging alongside custom subscribers.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = Some(subscribers);
        self
    }

    /// Builds the worker and spawns its event listener.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> Arc<Worker> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subscribers = self.subscribers.unwrap_or_else(|| {
            let log: Arc<dyn Subscribe> = Arc::new(LogWriter::new());
            vec![log]
        });
        let subs = SubscriberSet::new(subscribers, bus.clone());
        spawn_listener(&bus, subs);

        let handler = self.handler.unwrap_or_else(|| -> HandlerRef { Arc::new(NoopHandler) });
        Arc::new(Worker::new_internal(self.cfg, self.transport, handler, bus))
    }
}

/// Forwards bus events to the subscriber set until every bus handle is dropped.
fn spawn_listener(bus: &Bus, subs: SubscriberSet) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => subs.emit(ev),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });
}
