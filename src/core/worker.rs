//! # Worker: lifecycle controller and dispatch loop owner.
//!
//! A [`Worker`] binds one transport subscription to one [`Handler`](crate::Handler).
//! It owns the stop signal, the busy counter and the in-flight tracker, and exposes the
//! lifecycle operations:
//!
//! ```text
//!            start()                  shutdown()                 drained
//! Created ───────────► Connected ──────────────► Draining ───────────────► Stopped
//!    │   (connect once,                (stop transport,        (no job in flight)
//!    │    memoized result)              cancel stop signal)
//!    └──────────────────────────── shutdown() ─────────────────────────────┘
//! ```
//!
//! ## Dispatch loop
//! ```text
//! run():
//!   transport.subscribe(Dispatcher callback)
//!   select! {
//!     stop.cancelled()   → fall through
//!     crash_rx.recv()    → cancel intake, stop transport, publish IntakeClosed
//!   }
//!   tracker.close(); tracker.wait()   (drain in-flight callbacks)
//!   publish Drained
//! ```
//!
//! ## Rules
//! - `start` connects at most once; a connect failure is final and returned by every call.
//! - `shutdown` succeeds once; later calls return [`WorkerError::AlreadyShutdown`].
//! - After shutdown, `start`, `run` and `enqueue` return [`WorkerError::AlreadyShutdown`].
//! - A handler crash closes the worker the same way, except running jobs keep their tokens.
//! - `transport.stop()` is called at most once, and only after a successful connect.
//! - `shutdown` does not wait for jobs; `run` returns once they have drained.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{OnceCell, mpsc};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::core::builder::WorkerBuilder;
use crate::core::busy::BusyCounter;
use crate::core::config::WorkerConfig;
use crate::core::dispatch::Dispatcher;
use crate::core::guard::ExecutionGuard;
use crate::core::shutdown;
use crate::error::WorkerError;
use crate::events::{Bus, Event, EventKind};
use crate::jobs::{HandlerRef, QueuedMessage};
use crate::transport::{Subscription, Transport};

/// Coarse lifecycle state of a [`Worker`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    /// Built, not connected yet.
    Created,
    /// Transport connected; messages are being dispatched once `run` is active.
    Connected,
    /// Closed (shutdown or handler crash) while jobs are still executing.
    Draining,
    /// Closed with no job in flight.
    Stopped,
}

/// Bounded-concurrency job executor on top of a [`Transport`].
pub struct Worker {
    cfg: WorkerConfig,
    transport: Arc<dyn Transport>,
    guard: Arc<ExecutionGuard>,
    bus: Bus,
    stop: CancellationToken,
    intake: CancellationToken,
    busy: BusyCounter,
    tracker: TaskTracker,
    connect_once: OnceCell<Result<(), WorkerError>>,
    started: AtomicBool,
    /// Set by `shutdown` or a handler crash; gates `start`, `run` and `enqueue`.
    stopped: AtomicBool,
    shutdown_requested: AtomicBool,
    transport_stopped: AtomicBool,
    running: AtomicBool,
}

impl Worker {
    /// Starts building a worker on top of `transport`.
    pub fn builder(transport: Arc<dyn Transport>) -> WorkerBuilder {
        WorkerBuilder::new(transport)
    }

    pub(super) fn new_internal(
        cfg: WorkerConfig,
        transport: Arc<dyn Transport>,
        handler: HandlerRef,
        bus: Bus,
    ) -> Self {
        let stop = CancellationToken::new();
        let busy = BusyCounter::new();
        let guard = Arc::new(ExecutionGuard::new(
            handler,
            stop.clone(),
            busy.clone(),
            bus.clone(),
            cfg.job_timeout,
        ));

        Self {
            intake: stop.child_token(),
            cfg,
            transport,
            guard,
            bus,
            stop,
            busy,
            tracker: TaskTracker::new(),
            connect_once: OnceCell::new(),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            shutdown_requested: AtomicBool::new(false),
            transport_stopped: AtomicBool::new(false),
            running: AtomicBool::new(false),
        }
    }

    /// Returns the worker's configuration.
    pub fn config(&self) -> &WorkerConfig {
        &self.cfg
    }

    /// Connects the transport, once.
    ///
    /// Waits `startup_delay` before the first connect. Concurrent and repeated calls share
    /// the outcome of that single attempt: `Ok(())`, or [`WorkerError::Connect`] forever.
    ///
    /// Shutdown during the delay skips the connect. Shutdown racing a connect in progress
    /// stops the transport as soon as it is up. Both return [`WorkerError::AlreadyShutdown`].
    pub async fn start(&self) -> Result<(), WorkerError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(WorkerError::AlreadyShutdown);
        }

        self.connect_once
            .get_or_init(|| async {
                tokio::select! {
                    _ = time::sleep(self.cfg.startup_delay) => {}
                    _ = self.stop.cancelled() => return Err(WorkerError::AlreadyShutdown),
                }
                if self.stopped.load(Ordering::SeqCst) {
                    return Err(WorkerError::AlreadyShutdown);
                }
                self.transport
                    .connect(&self.cfg.addr)
                    .await
                    .map_err(WorkerError::Connect)
            })
            .await
            .clone()?;

        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.bus
                .publish(Event::new(EventKind::WorkerConnected).with_reason(self.cfg.addr.as_str()));
        }
        if self.stopped.load(Ordering::SeqCst) {
            self.stop_transport().await;
            return Err(WorkerError::AlreadyShutdown);
        }
        Ok(())
    }

    /// Runs the dispatch loop until shutdown or a handler crash, then drains.
    ///
    /// Subscribes the transport with a callback that decodes each message and executes it
    /// under the [`ExecutionGuard`]. The transport may start delivering before or after
    /// [`Worker::start`]; that is up to the transport.
    ///
    /// After a handler crash the worker closes: intake rejects further deliveries (not
    /// acknowledged), the transport is stopped so undelivered messages stay on the broker,
    /// and `enqueue` fails. Jobs already executing finish under their own deadlines. The
    /// call returns once every in-flight callback has completed.
    pub async fn run(&self) -> Result<(), WorkerError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(WorkerError::AlreadyShutdown);
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(WorkerError::AlreadyRunning);
        }

        let (crash_tx, mut crash_rx) = mpsc::channel::<String>(1);
        let dispatcher = Dispatcher::new(
            Arc::clone(&self.guard),
            self.tracker.clone(),
            self.intake.clone(),
            crash_tx,
            self.cfg.decode_policy,
            self.bus.clone(),
        );
        let subscription = Subscription {
            topic: self.cfg.topic.clone(),
            channel: self.cfg.channel.clone(),
            max_in_flight: self.cfg.max_in_flight_clamped(),
        };
        self.transport
            .subscribe(subscription, dispatcher.into_handler())?;

        tokio::select! {
            _ = self.stop.cancelled() => {}
            Some(info) = crash_rx.recv() => {
                self.stopped.store(true, Ordering::SeqCst);
                self.intake.cancel();
                self.bus.publish(Event::new(EventKind::IntakeClosed).with_reason(info));
                self.stop_transport().await;
            }
        }

        self.tracker.close();
        self.tracker.wait().await;
        self.bus.publish(Event::new(EventKind::Drained));
        Ok(())
    }

    /// Requests shutdown. Succeeds exactly once.
    ///
    /// Stops the transport (if it was ever connected) and cancels the stop signal, which
    /// cancels every running handler's token. Does not wait for jobs to finish.
    ///
    /// Also valid after a handler crash closed the worker: it then only cancels the jobs
    /// still draining.
    pub async fn shutdown(&self) -> Result<(), WorkerError> {
        if self.shutdown_requested.swap(true, Ordering::SeqCst) {
            return Err(WorkerError::AlreadyShutdown);
        }
        self.stopped.store(true, Ordering::SeqCst);

        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.stop_transport().await;
        self.stop.cancel();
        Ok(())
    }

    /// Stops the transport once, if it was ever connected.
    ///
    /// `start` and the closing paths both call this; whichever sees the other's flag
    /// first wins the swap.
    async fn stop_transport(&self) {
        if self.started.load(Ordering::SeqCst)
            && !self.transport_stopped.swap(true, Ordering::SeqCst)
        {
            self.transport.stop().await;
        }
    }

    /// Encodes `msg` and publishes it on the configured topic.
    pub async fn enqueue<M>(&self, msg: &M) -> Result<(), WorkerError>
    where
        M: QueuedMessage + ?Sized,
    {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(WorkerError::AlreadyShutdown);
        }
        let body = msg.bytes()?;
        self.transport.publish(&self.cfg.topic, body).await?;
        Ok(())
    }

    /// Number of jobs executing right now.
    pub fn busy_workers(&self) -> u64 {
        self.busy.get()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        if self.stopped.load(Ordering::SeqCst) {
            if self.busy.get() > 0 {
                WorkerState::Draining
            } else {
                WorkerState::Stopped
            }
        } else if self.started.load(Ordering::SeqCst) {
            WorkerState::Connected
        } else {
            WorkerState::Created
        }
    }

    /// Starts the worker and runs it until a termination signal, then shuts down and drains.
    ///
    /// Also returns when the loop ends on its own (handler crash, or `shutdown` called
    /// from elsewhere).
    pub async fn serve(&self) -> Result<(), WorkerError> {
        self.start().await?;

        let run = self.run();
        tokio::pin!(run);

        tokio::select! {
            res = &mut run => return res,
            signal = shutdown::wait_for_shutdown_signal() => match signal {
                Ok(name) => {
                    tracing::info!(signal = name, "termination signal received");
                    match self.shutdown().await {
                        Ok(()) | Err(WorkerError::AlreadyShutdown) => {}
                        Err(e) => return Err(e),
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "signal handlers unavailable; serving until shutdown()");
                }
            },
        }
        run.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::DecodePolicy;
    use crate::error::{JobError, TransportError};
    use crate::jobs::{HandlerFn, JobDescriptor};
    use crate::subscribers::Subscribe;
    use crate::transport::{MemoryTransport, MessageHandler};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, AtomicUsize};
    use tokio::sync::Semaphore;
    use std::time::Duration;

    fn config(max_in_flight: usize) -> WorkerConfig {
        WorkerConfig {
            topic: "jobs".to_string(),
            max_in_flight,
            startup_delay: Duration::ZERO,
            ..WorkerConfig::default()
        }
    }

    async fn eventually(mut check: impl FnMut() -> bool) {
        for _ in 0..300 {
            if check() {
                return;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    fn counting_handler(calls: Arc<AtomicUsize>) -> HandlerRef {
        HandlerFn::arc(move |_ctx: CancellationToken, _job: JobDescriptor| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    #[derive(Default)]
    struct Recorder {
        kinds: Mutex<Vec<EventKind>>,
    }

    impl Recorder {
        fn seen(&self, kind: EventKind) -> bool {
            self.kinds.lock().unwrap().contains(&kind)
        }
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, event: &Event) {
            self.kinds.lock().unwrap().push(event.kind);
        }
    }

    /// Memory transport whose `connect` blocks until a permit is added to `gate`.
    struct GatedTransport {
        inner: MemoryTransport,
        gate: Semaphore,
    }

    #[async_trait]
    impl Transport for GatedTransport {
        async fn connect(&self, addr: &str) -> Result<(), TransportError> {
            let _permit = self.gate.acquire().await;
            self.inner.connect(addr).await
        }

        fn subscribe(
            &self,
            subscription: Subscription,
            handler: MessageHandler,
        ) -> Result<(), TransportError> {
            self.inner.subscribe(subscription, handler)
        }

        async fn publish(&self, topic: &str, body: Vec<u8>) -> Result<(), TransportError> {
            self.inner.publish(topic, body).await
        }

        async fn stop(&self) {
            self.inner.stop().await
        }
    }

    #[tokio::test]
    async fn empty_payload_is_acked_without_calling_handler() {
        let transport = Arc::new(MemoryTransport::new("jobs"));
        let calls = Arc::new(AtomicUsize::new(0));
        let worker = Worker::builder(transport.clone())
            .with_config(config(2))
            .with_handler(counting_handler(calls.clone()))
            .build();

        worker.start().await.unwrap();
        let runner = tokio::spawn({
            let worker = Arc::clone(&worker);
            async move { worker.run().await }
        });

        transport.publish("jobs", Vec::new()).await.unwrap();
        let observed = Arc::clone(&transport);
        eventually(move || observed.stats().acked == 1).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        worker.shutdown().await.unwrap();
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn enqueued_jobs_reach_the_handler() {
        let transport = Arc::new(MemoryTransport::new("jobs"));
        let calls = Arc::new(AtomicUsize::new(0));
        let worker = Worker::builder(transport.clone())
            .with_config(config(2))
            .with_handler(counting_handler(calls.clone()))
            .build();

        worker.start().await.unwrap();
        let runner = tokio::spawn({
            let worker = Arc::clone(&worker);
            async move { worker.run().await }
        });

        for i in 0..3u8 {
            let job = JobDescriptor::new(vec![i], Duration::from_secs(1));
            worker.enqueue(&job).await.unwrap();
        }
        let observed = Arc::clone(&transport);
        eventually(move || observed.stats().acked == 3).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        worker.shutdown().await.unwrap();
        runner.await.unwrap().unwrap();
        assert_eq!(worker.state(), WorkerState::Stopped);
    }

    #[tokio::test]
    async fn enqueue_after_shutdown_does_not_touch_transport() {
        let transport = Arc::new(MemoryTransport::new("jobs"));
        let worker = Worker::builder(transport.clone())
            .with_config(config(1))
            .build();

        worker.shutdown().await.unwrap();
        let job = JobDescriptor::new(b"late".to_vec(), Duration::ZERO);
        assert_eq!(
            worker.enqueue(&job).await,
            Err(WorkerError::AlreadyShutdown)
        );
        assert_eq!(transport.stats().published, 0);
    }

    #[tokio::test]
    async fn enqueue_forwards_bytes_and_transport_errors() {
        let transport = Arc::new(MemoryTransport::new("jobs"));
        let worker = Worker::builder(transport.clone())
            .with_config(config(1))
            .build();
        worker.enqueue(&b"pre-encoded"[..]).await.unwrap();
        assert_eq!(transport.stats().published, 1);

        let misrouted = Worker::builder(transport.clone())
            .with_config(WorkerConfig {
                topic: "elsewhere".to_string(),
                ..config(1)
            })
            .build();
        assert_eq!(
            misrouted.enqueue(&Vec::<u8>::new()).await,
            Err(WorkerError::Transport(TransportError::UnknownTopic {
                topic: "elsewhere".to_string()
            }))
        );
    }

    #[tokio::test]
    async fn second_shutdown_is_rejected_without_side_effects() {
        let transport = Arc::new(MemoryTransport::new("jobs"));
        let worker = Worker::builder(transport.clone())
            .with_config(config(1))
            .build();

        worker.start().await.unwrap();
        assert_eq!(worker.shutdown().await, Ok(()));
        assert_eq!(
            worker.shutdown().await,
            Err(WorkerError::AlreadyShutdown)
        );
        assert_eq!(transport.stats().stops, 1);
        assert_eq!(worker.start().await, Err(WorkerError::AlreadyShutdown));
        assert_eq!(worker.run().await, Err(WorkerError::AlreadyShutdown));
    }

    #[tokio::test]
    async fn shutdown_before_start_leaves_transport_alone() {
        let transport = Arc::new(MemoryTransport::new("jobs"));
        let worker = Worker::builder(transport.clone())
            .with_config(config(1))
            .build();

        worker.shutdown().await.unwrap();
        let stats = transport.stats();
        assert_eq!(stats.stops, 0);
        assert_eq!(stats.connects, 0);
        assert_eq!(worker.state(), WorkerState::Stopped);
    }

    #[tokio::test]
    async fn shutdown_during_startup_delay_skips_connect() {
        let transport = Arc::new(MemoryTransport::new("jobs"));
        let worker = Worker::builder(transport.clone())
            .with_config(WorkerConfig {
                startup_delay: Duration::from_millis(100),
                ..config(1)
            })
            .build();

        let starter = tokio::spawn({
            let worker = Arc::clone(&worker);
            async move { worker.start().await }
        });
        time::sleep(Duration::from_millis(20)).await;
        worker.shutdown().await.unwrap();

        assert_eq!(starter.await.unwrap(), Err(WorkerError::AlreadyShutdown));
        let stats = transport.stats();
        assert_eq!((stats.connects, stats.stops), (0, 0));
        assert_eq!(worker.state(), WorkerState::Stopped);
    }

    #[tokio::test]
    async fn shutdown_racing_connect_stops_transport_once() {
        let transport = Arc::new(GatedTransport {
            inner: MemoryTransport::new("jobs"),
            gate: Semaphore::new(0),
        });
        let worker = Worker::builder(transport.clone())
            .with_config(config(1))
            .build();

        let starter = tokio::spawn({
            let worker = Arc::clone(&worker);
            async move { worker.start().await }
        });
        time::sleep(Duration::from_millis(20)).await;

        // Connect is still pending, so shutdown has nothing to stop yet.
        worker.shutdown().await.unwrap();
        assert_eq!(transport.inner.stats().stops, 0);

        transport.gate.add_permits(1);
        assert_eq!(starter.await.unwrap(), Err(WorkerError::AlreadyShutdown));
        assert_eq!(
            worker.shutdown().await,
            Err(WorkerError::AlreadyShutdown)
        );

        let stats = transport.inner.stats();
        assert_eq!((stats.connects, stats.stops), (1, 1));
        assert_eq!(worker.state(), WorkerState::Stopped);
    }

    #[tokio::test]
    async fn start_connects_once() {
        let transport = Arc::new(MemoryTransport::new("jobs"));
        let worker = Worker::builder(transport.clone())
            .with_config(config(1))
            .build();

        assert_eq!(worker.state(), WorkerState::Created);
        let (a, b) = tokio::join!(worker.start(), worker.start());
        assert_eq!(a, Ok(()));
        assert_eq!(b, Ok(()));
        worker.start().await.unwrap();

        assert_eq!(transport.stats().connects, 1);
        assert_eq!(worker.state(), WorkerState::Connected);
    }

    #[tokio::test]
    async fn connect_failure_is_final() {
        let transport = Arc::new(MemoryTransport::unreachable("jobs"));
        let worker = Worker::builder(transport.clone())
            .with_config(config(1))
            .build();

        let first = worker.start().await.unwrap_err();
        let second = worker.start().await.unwrap_err();
        assert_eq!(first.as_label(), "worker_connect_failed");
        assert_eq!(first, second);
        assert_eq!(transport.stats().connects, 1);
        assert_eq!(worker.state(), WorkerState::Created);
    }

    #[tokio::test]
    async fn second_run_is_rejected() {
        let transport = Arc::new(MemoryTransport::new("jobs"));
        let worker = Worker::builder(transport.clone())
            .with_config(config(1))
            .build();

        let runner = tokio::spawn({
            let worker = Arc::clone(&worker);
            async move { worker.run().await }
        });
        let observed = Arc::clone(&worker);
        eventually(move || observed.running.load(Ordering::SeqCst)).await;
        assert_eq!(worker.run().await, Err(WorkerError::AlreadyRunning));

        worker.shutdown().await.unwrap();
        runner.await.unwrap().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrency_never_exceeds_max_in_flight() {
        let transport = Arc::new(MemoryTransport::new("jobs"));
        let handler = HandlerFn::arc(|_ctx: CancellationToken, _job: JobDescriptor| async {
            time::sleep(Duration::from_millis(50)).await;
            Ok(())
        });
        let worker = Worker::builder(transport.clone())
            .with_config(config(4))
            .with_handler(handler)
            .build();

        worker.start().await.unwrap();
        let runner = tokio::spawn({
            let worker = Arc::clone(&worker);
            async move { worker.run().await }
        });

        let peak = Arc::new(AtomicU64::new(0));
        let sampler = tokio::spawn({
            let worker = Arc::clone(&worker);
            let peak = Arc::clone(&peak);
            async move {
                loop {
                    peak.fetch_max(worker.busy_workers(), Ordering::SeqCst);
                    time::sleep(Duration::from_millis(2)).await;
                }
            }
        });

        for i in 0..10u8 {
            let job = JobDescriptor::new(vec![i], Duration::from_secs(5));
            worker.enqueue(&job).await.unwrap();
        }
        let observed = Arc::clone(&transport);
        eventually(move || observed.stats().acked == 10).await;
        sampler.abort();

        let peak = peak.load(Ordering::SeqCst);
        assert!((1..=4).contains(&peak), "peak = {peak}");
        assert_eq!(worker.busy_workers(), 0);

        worker.shutdown().await.unwrap();
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn shutdown_cancels_running_jobs_and_run_drains() {
        let transport = Arc::new(MemoryTransport::new("jobs"));
        let handler = HandlerFn::arc(|ctx: CancellationToken, _job: JobDescriptor| async move {
            ctx.cancelled().await;
            Err(JobError::Canceled)
        });
        let worker = Worker::builder(transport.clone())
            .with_config(config(2))
            .with_handler(handler)
            .build();

        worker.start().await.unwrap();
        let runner = tokio::spawn({
            let worker = Arc::clone(&worker);
            async move { worker.run().await }
        });
        worker
            .enqueue(&JobDescriptor::new(b"wait".to_vec(), Duration::from_secs(30)))
            .await
            .unwrap();
        let observed = Arc::clone(&worker);
        eventually(move || observed.busy_workers() == 1).await;

        worker.shutdown().await.unwrap();
        time::timeout(Duration::from_secs(2), runner)
            .await
            .expect("run did not drain")
            .unwrap()
            .unwrap();
        assert_eq!(worker.busy_workers(), 0);
        assert_eq!(worker.state(), WorkerState::Stopped);
    }

    #[tokio::test]
    async fn handler_crash_closes_intake_and_ends_run() {
        let transport = Arc::new(MemoryTransport::new("jobs").with_max_attempts(2));
        let recorder = Arc::new(Recorder::default());
        let handler = HandlerFn::arc(|_ctx: CancellationToken, job: JobDescriptor| async move {
            if job.payload() == b"boom" {
                panic!("handler exploded");
            }
            Ok(())
        });
        let subs: Vec<Arc<dyn Subscribe>> = vec![recorder.clone()];
        let worker = Worker::builder(transport.clone())
            .with_config(config(2))
            .with_handler(handler)
            .with_subscribers(subs)
            .build();

        worker.start().await.unwrap();
        let runner = tokio::spawn({
            let worker = Arc::clone(&worker);
            async move { worker.run().await }
        });
        worker
            .enqueue(&JobDescriptor::new(b"boom".to_vec(), Duration::from_secs(1)))
            .await
            .unwrap();

        time::timeout(Duration::from_secs(2), runner)
            .await
            .expect("run did not return after crash")
            .unwrap()
            .unwrap();
        assert!(worker.intake.is_cancelled());

        let observed = Arc::clone(&recorder);
        eventually(move || observed.seen(EventKind::Drained)).await;
        assert!(recorder.seen(EventKind::JobPanicked));
        assert!(recorder.seen(EventKind::IntakeClosed));
    }

    #[tokio::test]
    async fn crash_closes_worker_without_losing_valid_jobs() {
        let transport = Arc::new(MemoryTransport::new("jobs").with_max_attempts(20));
        let valid_calls = Arc::new(AtomicUsize::new(0));
        let counter = valid_calls.clone();
        let handler = HandlerFn::arc(move |_ctx: CancellationToken, job: JobDescriptor| {
            let counter = counter.clone();
            async move {
                if job.payload() == b"boom" {
                    panic!("handler exploded");
                }
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        let worker = Worker::builder(transport.clone())
            .with_config(config(1))
            .with_handler(handler)
            .with_subscribers(Vec::new())
            .build();

        worker.start().await.unwrap();
        let runner = tokio::spawn({
            let worker = Arc::clone(&worker);
            async move { worker.run().await }
        });
        worker
            .enqueue(&JobDescriptor::new(b"boom".to_vec(), Duration::from_secs(1)))
            .await
            .unwrap();
        time::timeout(Duration::from_secs(2), runner)
            .await
            .expect("run did not return after crash")
            .unwrap()
            .unwrap();

        assert_eq!(worker.state(), WorkerState::Stopped);
        let valid = JobDescriptor::new(b"valid".to_vec(), Duration::from_secs(1));
        assert_eq!(
            worker.enqueue(&valid).await,
            Err(WorkerError::AlreadyShutdown)
        );
        assert_eq!(worker.start().await, Err(WorkerError::AlreadyShutdown));
        // The consumer side is down too: nothing is pulled from the broker to be rejected.
        assert!(matches!(
            transport.publish("jobs", valid.encode().unwrap()).await,
            Err(TransportError::Stopped)
        ));

        let before = transport.stats();
        time::sleep(Duration::from_millis(50)).await;
        let after = transport.stats();
        assert_eq!(after.stops, 1);
        assert_eq!(after.dropped, 0);
        assert_eq!(after.delivered, before.delivered);
        assert_eq!(valid_calls.load(Ordering::SeqCst), 0);

        // The first explicit shutdown is still accepted and makes no second stop call.
        assert_eq!(worker.shutdown().await, Ok(()));
        assert_eq!(transport.stats().stops, 1);
    }

    #[tokio::test]
    async fn decode_policy_controls_acknowledgement() {
        for (policy, acked, dropped) in [(DecodePolicy::Discard, 1, 0), (DecodePolicy::Reject, 0, 1)] {
            let transport = Arc::new(MemoryTransport::new("jobs").with_max_attempts(1));
            let calls = Arc::new(AtomicUsize::new(0));
            let worker = Worker::builder(transport.clone())
                .with_config(WorkerConfig {
                    decode_policy: policy,
                    ..config(1)
                })
                .with_handler(counting_handler(calls.clone()))
                .build();

            worker.start().await.unwrap();
            let runner = tokio::spawn({
                let worker = Arc::clone(&worker);
                async move { worker.run().await }
            });
            transport.publish("jobs", b"not json".to_vec()).await.unwrap();

            let observed = Arc::clone(&transport);
            eventually(move || {
                let s = observed.stats();
                s.acked + s.dropped == 1
            })
            .await;
            let stats = transport.stats();
            assert_eq!((stats.acked, stats.dropped), (acked, dropped), "{policy:?}");
            assert_eq!(calls.load(Ordering::SeqCst), 0);

            worker.shutdown().await.unwrap();
            runner.await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn lifecycle_events_reach_subscribers() {
        let transport = Arc::new(MemoryTransport::new("jobs"));
        let recorder = Arc::new(Recorder::default());
        let subs: Vec<Arc<dyn Subscribe>> = vec![recorder.clone()];
        let worker = Worker::builder(transport.clone())
            .with_config(config(1))
            .with_subscribers(subs)
            .build();

        worker.start().await.unwrap();
        let runner = tokio::spawn({
            let worker = Arc::clone(&worker);
            async move { worker.run().await }
        });
        worker.shutdown().await.unwrap();
        runner.await.unwrap().unwrap();

        let observed = Arc::clone(&recorder);
        eventually(move || observed.seen(EventKind::Drained)).await;
        assert!(recorder.seen(EventKind::WorkerConnected));
        assert!(recorder.seen(EventKind::ShutdownRequested));
    }
}
