//! Completion registry
//!
//! Maps `(key, operation)` to the single registration waiting on it.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::pending::{pending_pair, PendingWait, WaitHandle, WaitOutcome};

/// Counters for correlator activity
#[derive(Debug, Default)]
pub struct CorrelatorStats {
    /// Registrations made by `wait`
    pub registered: AtomicU64,
    /// Completions handed to a waiter
    pub completed: AtomicU64,
    /// Waits that ran out of time
    pub timeouts: AtomicU64,
    /// Requests the action refused up front
    pub rejected: AtomicU64,
    /// Waits refused because the pair was already taken
    pub duplicates: AtomicU64,
    /// Notifications nobody was waiting for
    pub dropped: AtomicU64,
}

impl CorrelatorStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn registered(&self) -> u64 {
        self.registered.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn duplicates(&self) -> u64 {
        self.duplicates.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Bridges asynchronous completions to blocking callers
///
/// ## Concurrency:
/// - `registry`: short-held Mutex, never held while a caller blocks
/// - each waiter blocks on its own one-shot channel
/// - `notify` and `notify_all` never block, so they are safe to call from
///   the event-delivery context
pub struct Correlator<K, Op> {
    /// At most one registration per `(key, operation)`
    registry: Mutex<HashMap<(K, Op), PendingWait>>,

    /// Source of registration sequence numbers
    next_seq: AtomicU64,

    /// Timeout used by `wait`
    default_timeout: Duration,

    stats: CorrelatorStats,
}

impl<K, Op> Correlator<K, Op>
where
    K: Eq + Hash + Clone + fmt::Debug,
    Op: Eq + Hash + Copy + fmt::Debug,
{
    /// Create a correlator whose `wait` gives up after `default_timeout`
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            registry: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
            default_timeout,
            stats: CorrelatorStats::default(),
        }
    }

    /// Register for `(key, operation)`, run `action`, then block for the result.
    ///
    /// Returns:
    /// - `Some(success)` when a matching notification arrived
    /// - `Some(false)` when `action` refused the request (no blocking happens)
    /// - `None` when the timeout elapsed or another caller already waits on
    ///   the same pair; the request may still complete later
    pub fn wait<F, E>(&self, key: K, operation: Op, action: F) -> Option<bool>
    where
        F: FnOnce() -> std::result::Result<(), E>,
        E: fmt::Display,
    {
        self.wait_timeout(key, operation, self.default_timeout, action)
    }

    /// Same as `wait` with an explicit timeout
    pub fn wait_timeout<F, E>(
        &self,
        key: K,
        operation: Op,
        timeout: Duration,
        action: F,
    ) -> Option<bool>
    where
        F: FnOnce() -> std::result::Result<(), E>,
        E: fmt::Display,
    {
        // Registration must happen before the action runs: the completion may
        // be delivered before `action` even returns.
        let handle = match self.register(&key, operation) {
            Some(handle) => handle,
            None => {
                CorrelatorStats::bump(&self.stats.duplicates);
                warn!(key = ?key, operation = ?operation, "Wait already outstanding");
                return None;
            }
        };

        if let Err(e) = action() {
            self.unregister(&key, operation, handle.seq());
            CorrelatorStats::bump(&self.stats.rejected);
            warn!(key = ?key, operation = ?operation, error = %e, "Request rejected");
            return Some(false);
        }

        match handle.wait(timeout) {
            WaitOutcome::Delivered(success) => Some(success),
            WaitOutcome::TimedOut | WaitOutcome::Abandoned => {
                // Registration already gone: a notify removed it after the
                // timeout and is delivering or dropping it right now.
                if !self.unregister(&key, operation, handle.seq()) {
                    if let Some(success) = handle.take_removed() {
                        return Some(success);
                    }
                }

                CorrelatorStats::bump(&self.stats.timeouts);
                warn!(
                    key = ?key,
                    operation = ?operation,
                    timeout_ms = timeout.as_millis() as u64,
                    "Timed out waiting for completion"
                );
                None
            }
        }
    }

    /// Deliver `success` to the waiter on `(key, operation)`, if any.
    ///
    /// Returns true if a waiter received it. A missing waiter is routine
    /// (non-blocking caller, expired wait, unsolicited event).
    pub fn notify(&self, key: &K, operation: Op, success: bool) -> bool {
        let pending = self.registry.lock().remove(&(key.clone(), operation));

        match pending {
            Some(pending) => {
                let age = pending.age();
                if pending.deliver(success) {
                    CorrelatorStats::bump(&self.stats.completed);
                    trace!(
                        key = ?key,
                        operation = ?operation,
                        success,
                        waited_us = age.as_micros() as u64,
                        "Completion delivered"
                    );
                    true
                } else {
                    CorrelatorStats::bump(&self.stats.dropped);
                    debug!(key = ?key, operation = ?operation, "Waiter went away before delivery");
                    false
                }
            }
            None => {
                CorrelatorStats::bump(&self.stats.dropped);
                debug!(key = ?key, operation = ?operation, success, "No waiter for completion");
                false
            }
        }
    }

    /// Deliver `success` to every waiter registered under `operation`.
    ///
    /// Used for completions that carry no key. Returns the number of waiters
    /// that received it.
    pub fn notify_all(&self, operation: Op, success: bool) -> usize {
        let matched: Vec<PendingWait> = {
            let mut registry = self.registry.lock();
            let keys: Vec<(K, Op)> = registry
                .keys()
                .filter(|(_, op)| *op == operation)
                .cloned()
                .collect();

            keys.iter().filter_map(|k| registry.remove(k)).collect()
        };

        if matched.is_empty() {
            CorrelatorStats::bump(&self.stats.dropped);
            debug!(operation = ?operation, success, "No waiters for broadcast completion");
            return 0;
        }

        let delivered = matched
            .into_iter()
            .map(|pending| pending.deliver(success))
            .filter(|delivered| *delivered)
            .count();

        self.stats
            .completed
            .fetch_add(delivered as u64, Ordering::Relaxed);
        trace!(operation = ?operation, success, delivered, "Broadcast completion delivered");

        delivered
    }

    /// Check if someone is waiting on `(key, operation)`
    pub fn is_pending(&self, key: &K, operation: Op) -> bool {
        self.registry.lock().contains_key(&(key.clone(), operation))
    }

    /// Number of outstanding waits
    pub fn pending_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// Timeout used by `wait`
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn stats(&self) -> &CorrelatorStats {
        &self.stats
    }

    /// Insert a registration unless the pair is taken
    fn register(&self, key: &K, operation: Op) -> Option<WaitHandle> {
        let mut registry = self.registry.lock();
        let slot = (key.clone(), operation);

        if registry.contains_key(&slot) {
            return None;
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let (pending, handle) = pending_pair(seq);
        registry.insert(slot, pending);
        CorrelatorStats::bump(&self.stats.registered);

        Some(handle)
    }

    /// Remove the registration for the pair if it is still ours.
    ///
    /// Returns false if it was already taken by a notify (or replaced by a
    /// newer registration after that notify).
    fn unregister(&self, key: &K, operation: Op, seq: u64) -> bool {
        let mut registry = self.registry.lock();
        let slot = (key.clone(), operation);

        match registry.get(&slot) {
            Some(pending) if pending.seq() == seq => {
                registry.remove(&slot);
                true
            }
            _ => false,
        }
    }
}
