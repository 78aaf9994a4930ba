//! Simulated driver
//!
//! Host-side stand-in for the radio stack: accepts requests, reports their
//! completion on the event queue, lets tests play the remote peer, and
//! records the responses the peripheral sends.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{GattError, Result};
use crate::gatt::AttResponse;

use super::{Driver, EventSender, HardwareEvent, Operation, Request};

/// How the simulated stack answers one kind of request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimBehavior {
    /// Accept and report completion for the request key
    Complete(bool),

    /// Accept and report completion without a key
    Broadcast(bool),

    /// Accept and never report completion
    Silent,

    /// Refuse at submission
    Reject,
}

pub struct SimulatedDriver {
    events: EventSender,

    /// Per-operation behaviour, `Complete(true)` when absent
    behaviors: RwLock<HashMap<Operation, SimBehavior>>,

    responses_tx: Sender<AttResponse>,
    responses_rx: Receiver<AttResponse>,

    submitted: AtomicU64,
}

impl SimulatedDriver {
    pub fn new(events: EventSender) -> Self {
        let (responses_tx, responses_rx) = unbounded();

        // Unregistration is reported without the app id
        let mut behaviors = HashMap::new();
        behaviors.insert(Operation::AppUnregister, SimBehavior::Broadcast(true));

        Self {
            events,
            behaviors: RwLock::new(behaviors),
            responses_tx,
            responses_rx,
            submitted: AtomicU64::new(0),
        }
    }

    pub fn set_behavior(&self, operation: Operation, behavior: SimBehavior) {
        self.behaviors.write().insert(operation, behavior);
    }

    pub fn behavior(&self, operation: Operation) -> SimBehavior {
        self.behaviors
            .read()
            .get(&operation)
            .copied()
            .unwrap_or(SimBehavior::Complete(true))
    }

    /// Push an event as if the stack (or the peer through it) produced it
    pub fn inject(&self, event: HardwareEvent) -> Result<()> {
        self.events.send(event)
    }

    /// Responses sent so far, in order
    pub fn responses(&self) -> &Receiver<AttResponse> {
        &self.responses_rx
    }

    /// Number of requests accepted or rejected so far
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }
}

impl Driver for SimulatedDriver {
    fn submit(&self, request: Request) -> Result<()> {
        self.submitted.fetch_add(1, Ordering::Relaxed);
        let behavior = self.behavior(request.operation);
        debug!(operation = %request.operation, key = request.key, ?behavior, "Simulated request");

        let key = match behavior {
            SimBehavior::Reject => {
                return Err(GattError::Driver(format!(
                    "{} for key {:#06x} refused",
                    request.operation, request.key
                )));
            }
            SimBehavior::Silent => return Ok(()),
            SimBehavior::Complete(_) => Some(request.key),
            SimBehavior::Broadcast(_) => None,
        };

        let success = matches!(
            behavior,
            SimBehavior::Complete(true) | SimBehavior::Broadcast(true)
        );

        self.events.send(HardwareEvent::Completed {
            operation: request.operation,
            key,
            success,
        })
    }

    fn respond(&self, response: AttResponse) -> Result<()> {
        self.responses_tx
            .send(response)
            .map_err(|_| GattError::Driver("response channel closed".to_string()))
    }
}
