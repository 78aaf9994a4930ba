//! One-shot completion slot
//!
//! A registration is split into two halves: the `PendingWait` kept in the
//! registry (sending side) and the `WaitHandle` kept by the blocked caller.

use std::time::{Duration, Instant};

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};

/// Registry side of a registration
pub(crate) struct PendingWait {
    /// Sequence number, unique per registration
    seq: u64,

    /// Capacity-one channel used as the result slot
    sender: Sender<bool>,

    /// When the registration was made
    registered_at: Instant,
}

/// Caller side of a registration
pub(crate) struct WaitHandle {
    seq: u64,
    receiver: Receiver<bool>,
}

/// How a blocking wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitOutcome {
    /// A completion was delivered
    Delivered(bool),

    /// The timeout elapsed first
    TimedOut,

    /// The registry dropped the registration without delivering
    Abandoned,
}

/// Create both halves of a new registration
pub(crate) fn pending_pair(seq: u64) -> (PendingWait, WaitHandle) {
    let (sender, receiver) = bounded(1);

    let pending = PendingWait {
        seq,
        sender,
        registered_at: Instant::now(),
    };

    (pending, WaitHandle { seq, receiver })
}

impl PendingWait {
    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }

    /// Time since registration
    pub(crate) fn age(&self) -> Duration {
        self.registered_at.elapsed()
    }

    /// Hand the result to the waiter.
    ///
    /// Never blocks: the slot holds one value and each registration is
    /// delivered at most once. Returns false if the waiter is gone.
    pub(crate) fn deliver(self, success: bool) -> bool {
        self.sender.try_send(success).is_ok()
    }
}

impl WaitHandle {
    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }

    /// Block until delivery or timeout
    pub(crate) fn wait(&self, timeout: Duration) -> WaitOutcome {
        match self.receiver.recv_timeout(timeout) {
            Ok(success) => WaitOutcome::Delivered(success),
            Err(RecvTimeoutError::Timeout) => WaitOutcome::TimedOut,
            Err(RecvTimeoutError::Disconnected) => WaitOutcome::Abandoned,
        }
    }

    /// Collect the result once the registration has left the registry
    ///
    /// Whoever removed it either delivers or drops the sending side, so this
    /// returns promptly. Must not be called while the registration is still
    /// registered.
    pub(crate) fn take_removed(&self) -> Option<bool> {
        self.receiver.recv().ok()
    }
}
