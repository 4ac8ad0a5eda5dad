//! Admission control for clickrush.
//!
//! Two independent gates protect the shared counter:
//!
//! - **Sliding window log** -- each identity may perform at most
//!   `max_requests_per_minute` actions in any trailing 60-second interval.
//!   Every admitted action is remembered until it ages out, so the cap is
//!   exact rather than approximated from fixed buckets.
//!
//! - **Connection admitter** -- bounds how many identities may be connected
//!   at the same time. Admission is a single atomic check-and-insert.
//!
//! The [`AdmissionControl`] facade combines both and reports rejections as
//! distinct [`Admission`] outcomes so callers can tell "slow down" apart from
//! "try again later".

pub mod connections;
pub mod sliding_window;

use std::sync::Arc;

use clickrush_common::RateLimitConfig;

pub use connections::ConnectionAdmitter;
pub use sliding_window::SlidingWindowLimiter;

/// Outcome of an admission decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The action or connection may proceed.
    Allowed,
    /// The identity exhausted its per-minute allowance and should slow down.
    RateLimited { remaining: u64 },
    /// The service is at its connection capacity; retry later.
    CapacityExceeded,
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

/// Rate limiter and connection cap behind one cheaply cloneable handle.
#[derive(Clone)]
pub struct AdmissionControl {
    limiter: Arc<SlidingWindowLimiter>,
    connections: Arc<ConnectionAdmitter>,
}

impl AdmissionControl {
    pub fn new(config: &RateLimitConfig) -> Self {
        tracing::info!(
            max_requests_per_minute = config.max_requests_per_minute,
            max_connections = config.max_connections,
            "creating admission control"
        );
        Self {
            limiter: Arc::new(SlidingWindowLimiter::new(config.max_requests_per_minute)),
            connections: Arc::new(ConnectionAdmitter::new(config.max_connections)),
        }
    }

    /// Decide whether `key` may perform an action now.
    pub fn check_action(&self, key: &str) -> Admission {
        if self.limiter.allow(key) {
            Admission::Allowed
        } else {
            Admission::RateLimited {
                remaining: self.limiter.remaining(key),
            }
        }
    }

    /// Try to register a new connection for `key`.
    pub fn connect(&self, key: &str) -> Admission {
        if self.connections.try_admit(key) {
            Admission::Allowed
        } else {
            Admission::CapacityExceeded
        }
    }

    pub fn disconnect(&self, key: &str) {
        self.connections.release(key);
    }

    /// Evict expired rate-limit state. Meant to run on a periodic schedule.
    pub fn sweep(&self) -> usize {
        self.limiter.sweep()
    }

    pub fn active_connections(&self) -> usize {
        self.connections.active_count()
    }

    pub fn limiter(&self) -> &SlidingWindowLimiter {
        &self.limiter
    }

    pub fn connections(&self) -> &ConnectionAdmitter {
        &self.connections
    }
}
