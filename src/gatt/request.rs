//! Attribute requests as delivered by the stack, and the responses to them

use bytes::Bytes;

use crate::attribute::ConnectionId;

/// A peer reads an attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRequest {
    pub conn: ConnectionId,
    pub trans_id: u32,
    pub handle: u16,
    pub offset: u16,
    /// Continuation of a long read already in progress
    pub is_long: bool,
    /// False when the stack answers on its own
    pub need_rsp: bool,
}

/// A peer writes (a fragment of) an attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    pub conn: ConnectionId,
    pub trans_id: u32,
    pub handle: u16,
    pub offset: u16,
    /// Part of a prepared write, applied only on execute
    pub is_prep: bool,
    pub need_rsp: bool,
    pub value: Bytes,
}

/// A peer executes or cancels its queued prepared writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecWriteRequest {
    pub conn: ConnectionId,
    pub trans_id: u32,
    /// False when the peer cancels the queue
    pub commit: bool,
}

/// ATT status codes used in responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AttStatus {
    Ok = 0x00,
    InvalidHandle = 0x01,
    InvalidOffset = 0x07,
}

/// Response the stack should send for a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttResponse {
    pub conn: ConnectionId,
    pub trans_id: u32,
    pub status: AttStatus,
    pub handle: u16,
    pub offset: u16,
    pub value: Bytes,
}

impl AttResponse {
    /// Status-only response
    pub fn status(conn: ConnectionId, trans_id: u32, handle: u16, status: AttStatus) -> Self {
        Self {
            conn,
            trans_id,
            status,
            handle,
            offset: 0,
            value: Bytes::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == AttStatus::Ok
    }
}
