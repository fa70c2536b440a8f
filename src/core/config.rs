//! # Worker configuration.
//!
//! Provides [`WorkerConfig`], the construction-time settings of a [`Worker`](crate::Worker).
//! There are no process-wide defaults: every worker owns its config.
//!
//! ## Sentinel values
//! - `max_in_flight = 0` → clamped to 1
//! - job `timeout = 0s` → the execution guard applies `job_timeout`

use std::time::Duration;

/// What to do with a message whose body cannot be decoded into a job.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DecodePolicy {
    /// Acknowledge the message and publish `MessageDiscarded`.
    #[default]
    Discard,
    /// Return `JobError::Decode` so the transport may redeliver.
    Reject,
}

/// Construction-time configuration of a worker.
///
/// ## Field semantics
/// - `addr`: broker address the transport connects to
/// - `topic`: topic consumed by the dispatch loop and targeted by `enqueue`
/// - `channel`: subscription (consumer group) name on the topic
/// - `max_in_flight`: admission hint passed to the transport (`0` = 1)
/// - `startup_delay`: pause before connecting, absorbs broker warm-up
/// - `job_timeout`: timeout for jobs that carry none
/// - `decode_policy`: handling of malformed message bodies
/// - `bus_capacity`: event bus ring buffer size (min 1)
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Broker address.
    pub addr: String,
    /// Topic to consume and publish.
    pub topic: String,
    /// Subscription name.
    pub channel: String,
    /// Maximum number of unacknowledged messages the transport may deliver at once.
    pub max_in_flight: usize,
    /// Delay before the first connect attempt.
    ///
    /// Accommodates slow broker start-up; correctness never depends on it.
    pub startup_delay: Duration,
    /// Timeout applied to jobs whose descriptor has a zero timeout.
    pub job_timeout: Duration,
    /// Handling of bodies that fail to decode.
    pub decode_policy: DecodePolicy,
    /// Capacity of the event bus broadcast channel.
    pub bus_capacity: usize,
}

impl WorkerConfig {
    /// Returns `max_in_flight` clamped to a minimum of 1.
    #[inline]
    pub fn max_in_flight_clamped(&self) -> usize {
        self.max_in_flight.max(1)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for WorkerConfig {
    /// Default configuration:
    ///
    /// - `addr = "127.0.0.1:4150"`
    /// - `topic = "gorush"`, `channel = "ch"`
    /// - `max_in_flight` = available parallelism (1 if unknown)
    /// - `startup_delay = 100ms`
    /// - `job_timeout = 60min`
    /// - `decode_policy = Discard`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:4150".to_string(),
            topic: "gorush".to_string(),
            channel: "ch".to_string(),
            max_in_flight: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            startup_delay: Duration::from_millis(100),
            job_timeout: Duration::from_secs(60 * 60),
            decode_policy: DecodePolicy::Discard,
            bus_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_local_broker() {
        let cfg = WorkerConfig::default();
        assert_eq!(cfg.addr, "127.0.0.1:4150");
        assert_eq!(cfg.topic, "gorush");
        assert_eq!(cfg.channel, "ch");
        assert!(cfg.max_in_flight >= 1);
        assert_eq!(cfg.decode_policy, DecodePolicy::Discard);
    }

    #[test]
    fn zero_values_are_clamped() {
        let cfg = WorkerConfig {
            max_in_flight: 0,
            bus_capacity: 0,
            ..WorkerConfig::default()
        };
        assert_eq!(cfg.max_in_flight_clamped(), 1);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
