//! GATT Module
//!
//! Adapter between attribute sub-events from the stack and the transaction
//! engine in [`crate::attribute`].
//!
//! ## Responsibilities
//! - Track the negotiated MTU of each connection
//! - Turn read / write / execute-write / disconnect events into transaction
//!   calls on the addressed attribute
//! - Build the response the stack sends back to the peer

mod connection;
mod handler;
mod request;

pub use connection::{Connection, ConnectionTable};
pub use handler::AttributeHandler;
pub use request::{AttResponse, AttStatus, ExecWriteRequest, ReadRequest, WriteRequest};

/// Bluetooth 4.0 and 4.1 allow 27 bytes of link-layer data, of which 4 go to
/// L2CAP, leaving 23 for ATT.
pub const MTU_DEFAULT_CLIENT: u16 = 23;

/// Largest MTU the server offers during exchange
pub const MTU_DEFAULT_SERVER: u16 = 512;

/// Every ATT PDU starts with a one byte opcode
pub const ATT_OPCODE_LEN: usize = 1;
