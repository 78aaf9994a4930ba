//! Attribute handler
//!
//! Applies the read/write sub-events of one attribute handle to its
//! [`AttributeValue`] and decides what goes back to the peer.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::attribute::{AttributeValue, ConnectionId};

use super::{AttResponse, AttStatus, ExecWriteRequest, ReadRequest, WriteRequest};

/// Called with the connection that finished a read or a write
type Callback = Arc<dyn Fn(ConnectionId) + Send + Sync>;

/// Serves one attribute handle
pub struct AttributeHandler {
    handle: u16,
    value: Arc<AttributeValue>,
    on_read: RwLock<Option<Callback>>,
    on_write: RwLock<Option<Callback>>,
}

impl AttributeHandler {
    pub fn new(handle: u16, value: Arc<AttributeValue>) -> Self {
        Self {
            handle,
            value,
            on_read: RwLock::new(None),
            on_write: RwLock::new(None),
        }
    }

    pub fn handle(&self) -> u16 {
        self.handle
    }

    pub fn value(&self) -> &Arc<AttributeValue> {
        &self.value
    }

    /// Run `callback` each time a peer has read the whole value
    pub fn set_on_read<F>(&self, callback: F)
    where
        F: Fn(ConnectionId) + Send + Sync + 'static,
    {
        *self.on_read.write() = Some(Arc::new(callback));
    }

    /// Run `callback` each time a peer write has been committed
    pub fn set_on_write<F>(&self, callback: F)
    where
        F: Fn(ConnectionId) + Send + Sync + 'static,
    {
        *self.on_write.write() = Some(Arc::new(callback));
    }

    /// Serve the next chunk of a (possibly long) read
    ///
    /// `payload_limit` is the MTU of the connection minus the opcode.
    pub fn handle_read(&self, request: &ReadRequest, payload_limit: usize) -> Option<AttResponse> {
        if request.handle != self.handle {
            return None;
        }

        debug!(
            conn = request.conn,
            trans_id = request.trans_id,
            offset = request.offset,
            long = request.is_long,
            "Read request"
        );

        if !request.need_rsp {
            return None;
        }

        // A long read continues the transaction the first read opened
        if !request.is_long {
            self.value.read_start(request.conn);
        }

        let chunk = self.value.read_advance(request.conn, payload_limit);
        if chunk.len() < payload_limit {
            self.value.read_abort(request.conn);
            self.fire(&self.on_read, request.conn);
        }

        Some(AttResponse {
            conn: request.conn,
            trans_id: request.trans_id,
            status: AttStatus::Ok,
            handle: self.handle,
            offset: request.offset,
            value: chunk,
        })
    }

    /// Apply a write or prepared-write fragment
    pub fn handle_write(&self, request: &WriteRequest) -> Option<AttResponse> {
        if request.handle != self.handle {
            return None;
        }

        debug!(
            conn = request.conn,
            trans_id = request.trans_id,
            offset = request.offset,
            len = request.value.len(),
            prep = request.is_prep,
            "Write request"
        );

        // Plain writes and the first prepared fragment open a transaction;
        // later prepared fragments must find one already open.
        if !request.is_prep || request.offset == 0 {
            self.value.write_start(request.conn);
        }

        if !self.value.write_add(request.conn, &request.value) {
            warn!(
                conn = request.conn,
                offset = request.offset,
                "Prepared write fragment without a transaction"
            );
            return request.need_rsp.then(|| {
                AttResponse::status(
                    request.conn,
                    request.trans_id,
                    self.handle,
                    AttStatus::InvalidOffset,
                )
            });
        }

        // Prepared fragments wait for execute-write
        if !request.is_prep && self.value.write_commit(request.conn) {
            self.fire(&self.on_write, request.conn);
        }

        // The peer expects its fragment echoed back
        request.need_rsp.then(|| AttResponse {
            conn: request.conn,
            trans_id: request.trans_id,
            status: AttStatus::Ok,
            handle: self.handle,
            offset: request.offset,
            value: request.value.clone(),
        })
    }

    /// Commit or cancel the prepared write of the requesting connection
    ///
    /// Returns true if this attribute had a write in progress for it.
    pub fn handle_exec_write(&self, request: &ExecWriteRequest) -> bool {
        if !self.value.write_ongoing(request.conn) {
            return false;
        }

        debug!(
            conn = request.conn,
            trans_id = request.trans_id,
            commit = request.commit,
            handle = self.handle,
            "Execute write"
        );

        if !request.commit {
            self.value.write_abort(request.conn);
            return true;
        }

        if self.value.write_commit(request.conn) {
            self.fire(&self.on_write, request.conn);
        }

        true
    }

    /// Drop every transaction of a connection that went away
    pub fn handle_disconnect(&self, conn: ConnectionId) {
        self.value.abort_all(conn);
    }

    /// Callbacks run outside the slot lock so they may replace themselves
    fn fire(&self, slot: &RwLock<Option<Callback>>, conn: ConnectionId) {
        let callback = slot.read().clone();
        if let Some(callback) = callback {
            callback(conn);
        }
    }
}

impl fmt::Debug for AttributeHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeHandler")
            .field("handle", &self.handle)
            .field("len", &self.value.len())
            .finish()
    }
}
