//! Driver Module
//!
//! The seam to the vendor radio stack.
//!
//! ## Architecture
//! - Requests go out synchronously through [`Driver::submit`]; `Ok` only
//!   means the stack accepted the request
//! - Every outcome comes back later as a [`HardwareEvent`] on one serial
//!   event context ([`EventLoop`])
//! - The event loop hands each event to an [`EventSink`], which does the
//!   kind-based dispatch

mod event_loop;
mod sim;

use std::fmt;

use crate::attribute::ConnectionId;
use crate::error::Result;
use crate::gatt::{AttResponse, ExecWriteRequest, ReadRequest, WriteRequest};

pub use event_loop::{event_queue, EventLoop, EventQueue, EventSender};
pub use sim::{SimBehavior, SimulatedDriver};

/// Asynchronous operations the stack reports completion for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    AppRegister,
    AppUnregister,
    ServiceCreate,
    ServiceStart,
    ServiceDelete,
    CharacteristicAdd,
    AdvertisingStart,
    AdvertisingStop,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::AppRegister => "app register",
            Operation::AppUnregister => "app unregister",
            Operation::ServiceCreate => "service create",
            Operation::ServiceStart => "service start",
            Operation::ServiceDelete => "service delete",
            Operation::CharacteristicAdd => "characteristic add",
            Operation::AdvertisingStart => "advertising start",
            Operation::AdvertisingStop => "advertising stop",
        };
        f.write_str(name)
    }
}

/// A request addressed by operation and key (app id, handle, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub operation: Operation,
    pub key: u16,
}

/// Everything the stack reports on its event context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardwareEvent {
    /// An earlier request finished. `key` is `None` for completions the
    /// stack does not tie to a key.
    Completed {
        operation: Operation,
        key: Option<u16>,
        success: bool,
    },

    Connected {
        conn: ConnectionId,
        addr: [u8; 6],
    },

    Disconnected {
        conn: ConnectionId,
    },

    MtuChanged {
        conn: ConnectionId,
        mtu: u16,
    },

    Read(ReadRequest),

    Write(WriteRequest),

    ExecWrite(ExecWriteRequest),
}

/// Request-issuing side of the stack
pub trait Driver: Send + Sync {
    /// Hand a request to the stack. Must not block on the outcome.
    fn submit(&self, request: Request) -> Result<()>;

    /// Send a response to a peer request
    fn respond(&self, response: AttResponse) -> Result<()>;
}

/// Receives events on the event context, one at a time
pub trait EventSink: Send + Sync {
    /// Must return promptly; the next event waits behind this one.
    fn deliver(&self, event: HardwareEvent);
}
