use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Caps the number of simultaneously connected identities.
///
/// The whole active set sits behind one mutex; every operation does a single
/// hash-set lookup or insert while holding it.
pub struct ConnectionAdmitter {
    active: Mutex<HashSet<String>>,
    max_connections: usize,
}

impl ConnectionAdmitter {
    pub fn new(max_connections: usize) -> Self {
        Self {
            active: Mutex::new(HashSet::new()),
            max_connections,
        }
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    fn active(&self) -> MutexGuard<'_, HashSet<String>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `true` if another connection would currently fit.
    ///
    /// Advisory only: the answer can be stale by the time the caller acts on
    /// it. Use [`try_admit`](Self::try_admit) to admit.
    pub fn can_admit(&self, key: &str) -> bool {
        let fits = self.active().len() < self.max_connections;
        if !fits {
            tracing::debug!(client = key, max = self.max_connections, "connection capacity reached");
        }
        fits
    }

    /// Atomically check capacity and register `key`.
    ///
    /// An identity that is already active is admitted again without taking
    /// another slot.
    pub fn try_admit(&self, key: &str) -> bool {
        let mut active = self.active();

        if active.contains(key) {
            return true;
        }

        if active.len() >= self.max_connections {
            tracing::warn!(
                client = key,
                max = self.max_connections,
                "connection limit reached, rejecting connection"
            );
            return false;
        }

        active.insert(key.to_string());
        tracing::debug!(client = key, total = active.len(), "connection added");
        true
    }

    /// Register `key` without a capacity check. Idempotent.
    pub fn admit(&self, key: &str) {
        let mut active = self.active();
        if active.insert(key.to_string()) {
            tracing::debug!(client = key, total = active.len(), "connection added");
        }
    }

    /// Remove `key` if present. Idempotent.
    pub fn release(&self, key: &str) {
        let mut active = self.active();
        if active.remove(key) {
            tracing::debug!(client = key, total = active.len(), "connection removed");
        }
    }

    pub fn active_count(&self) -> usize {
        self.active().len()
    }
}
