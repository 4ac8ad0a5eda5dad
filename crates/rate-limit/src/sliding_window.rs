use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Length of the rolling admission window.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Admitted request timestamps for a single identity, oldest first.
struct RequestLog {
    stamps: VecDeque<Instant>,
    violations: u64,
}

impl RequestLog {
    fn new() -> Self {
        Self {
            stamps: VecDeque::new(),
            violations: 0,
        }
    }

    /// Drop every timestamp that has aged out of the window. An entry exactly
    /// one window old counts as expired.
    fn purge(&mut self, now: Instant) {
        while let Some(&oldest) = self.stamps.front() {
            if now.saturating_duration_since(oldest) >= WINDOW {
                self.stamps.pop_front();
            } else {
                break;
            }
        }
    }
}

/// A concurrent sliding window log rate limiter.
///
/// Unlike a bucketed counter, every admitted request is remembered until it
/// ages out, so an identity can never exceed `limit` admissions in any
/// trailing 60-second interval. Expired entries are popped from the front of
/// the log and never revisited.
pub struct SlidingWindowLimiter {
    logs: DashMap<String, RequestLog>,
    limit: u64,
}

impl SlidingWindowLimiter {
    /// Create a limiter admitting at most `max_requests_per_minute` actions per
    /// identity in any rolling 60-second window.
    pub fn new(max_requests_per_minute: u64) -> Self {
        Self {
            logs: DashMap::new(),
            limit: max_requests_per_minute,
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Check whether `key` may act now, recording the action if so.
    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    /// [`allow`](Self::allow) evaluated at an explicit instant.
    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut entry = self
            .logs
            .entry(key.to_string())
            .or_insert_with(RequestLog::new);
        let log = entry.value_mut();

        log.purge(now);

        if (log.stamps.len() as u64) < self.limit {
            log.stamps.push_back(now);
            return true;
        }

        log.violations += 1;
        // One warning per ten violations keeps a flooding client from flooding the log too.
        if log.violations % 10 == 1 {
            tracing::warn!(
                client = key,
                requests = log.stamps.len(),
                violations = log.violations,
                "rate limit exceeded"
            );
        }
        false
    }

    /// Number of actions `key` may still take in the current window.
    pub fn remaining(&self, key: &str) -> u64 {
        self.remaining_at(key, Instant::now())
    }

    /// [`remaining`](Self::remaining) evaluated at an explicit instant.
    ///
    /// Unknown identities are not inserted into the table.
    pub fn remaining_at(&self, key: &str, now: Instant) -> u64 {
        match self.logs.get_mut(key) {
            Some(mut entry) => {
                let log = entry.value_mut();
                log.purge(now);
                self.limit.saturating_sub(log.stamps.len() as u64)
            }
            None => self.limit,
        }
    }

    /// Purge expired entries for every identity and evict identities whose
    /// log is left empty. Returns the number of evicted identities.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// [`sweep`](Self::sweep) evaluated at an explicit instant.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.logs.len();

        self.logs.retain(|_key, log| {
            log.purge(now);
            !log.stamps.is_empty()
        });

        let evicted = before.saturating_sub(self.logs.len());
        tracing::debug!(
            evicted,
            remaining = self.logs.len(),
            "sliding window sweep complete"
        );
        evicted
    }

    /// Number of identities currently tracked.
    pub fn tracked(&self) -> usize {
        self.logs.len()
    }
}
