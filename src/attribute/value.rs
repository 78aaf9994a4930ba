//! Attribute value with per-connection read/write transactions

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace};

use crate::error::Result;

use super::transaction::{ReadTransaction, TransactionCounts, WriteTransaction};
use super::ConnectionId;

/// The committed bytes of one attribute and the transactions in flight on it
///
/// ## Concurrency:
/// - `value`: RwLock, replaced wholesale on commit
/// - `writes` / `reads`: one Mutex per map, held only for map bookkeeping
/// - Lock order when both are needed: `writes` → `value`
///
/// Reads hand out `Bytes` slices of a snapshot, so a commit swaps in a new
/// buffer and never touches what an open read is walking.
#[derive(Debug, Default)]
pub struct AttributeValue {
    value: RwLock<Bytes>,
    writes: Mutex<HashMap<ConnectionId, WriteTransaction>>,
    reads: Mutex<HashMap<ConnectionId, ReadTransaction>>,
}

impl AttributeValue {
    pub fn new(initial: impl Into<Bytes>) -> Self {
        Self {
            value: RwLock::new(initial.into()),
            writes: Mutex::new(HashMap::new()),
            reads: Mutex::new(HashMap::new()),
        }
    }

    // =========================================================================
    // Committed value
    // =========================================================================

    /// Current committed bytes
    pub fn to_raw(&self) -> Bytes {
        self.value.read().clone()
    }

    /// Replace the committed bytes directly (local update, not a peer write)
    pub fn set_raw(&self, value: impl Into<Bytes>) {
        *self.value.write() = value.into();
    }

    /// Encode `value` with bincode and commit it
    ///
    /// Integers come out little-endian and fixed width, so a `u32` occupies
    /// exactly four bytes on the wire.
    pub fn set<T: Serialize>(&self, value: &T) -> Result<()> {
        let encoded = bincode::serialize(value)?;
        self.set_raw(encoded);
        Ok(())
    }

    /// Decode the committed bytes as `T`
    pub fn get<T: DeserializeOwned>(&self) -> Result<T> {
        let raw = self.to_raw();
        Ok(bincode::deserialize(&raw)?)
    }

    pub fn len(&self) -> usize {
        self.value.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.read().is_empty()
    }

    // =========================================================================
    // Write transactions
    // =========================================================================

    /// Open a fresh write buffer for `conn`, dropping any unfinished one
    pub fn write_start(&self, conn: ConnectionId) {
        let replaced = self.writes.lock().insert(conn, WriteTransaction::default());

        if let Some(old) = replaced {
            debug!(conn, discarded = old.len(), "Replaced unfinished write transaction");
        }
    }

    /// Append a fragment to the open write of `conn`
    ///
    /// Returns false if no write is open.
    pub fn write_add(&self, conn: ConnectionId, fragment: &[u8]) -> bool {
        let mut writes = self.writes.lock();

        match writes.get_mut(&conn) {
            Some(write) => {
                write.append(fragment);
                trace!(conn, fragment = fragment.len(), total = write.len(), "Write fragment added");
                true
            }
            None => {
                debug!(conn, fragment = fragment.len(), "Write fragment without open transaction");
                false
            }
        }
    }

    /// Replace the committed value with the accumulated buffer of `conn`
    ///
    /// Returns false if no write is open.
    pub fn write_commit(&self, conn: ConnectionId) -> bool {
        let mut writes = self.writes.lock();

        let Some(write) = writes.remove(&conn) else {
            debug!(conn, "Commit without open transaction");
            return false;
        };

        let value = write.into_value();
        trace!(conn, len = value.len(), "Write committed");
        *self.value.write() = value;

        true
    }

    /// Drop the open write of `conn`; no-op if there is none
    pub fn write_abort(&self, conn: ConnectionId) {
        if self.writes.lock().remove(&conn).is_some() {
            trace!(conn, "Write aborted");
        }
    }

    pub fn write_ongoing(&self, conn: ConnectionId) -> bool {
        self.writes.lock().contains_key(&conn)
    }

    // =========================================================================
    // Read transactions
    // =========================================================================

    /// Snapshot the committed value for `conn` and rewind its cursor
    pub fn read_start(&self, conn: ConnectionId) {
        let snapshot = self.to_raw();
        trace!(conn, len = snapshot.len(), "Read started");
        self.reads.lock().insert(conn, ReadTransaction::new(snapshot));
    }

    /// Next chunk of at most `max_len` bytes for `conn`
    ///
    /// A chunk shorter than `max_len` means the transfer is complete; the
    /// transaction is closed once it has been handed out. Returns an empty
    /// chunk if no read is open.
    pub fn read_advance(&self, conn: ConnectionId, max_len: usize) -> Bytes {
        let mut reads = self.reads.lock();

        let Some(read) = reads.get_mut(&conn) else {
            debug!(conn, "Read advance without open transaction");
            return Bytes::new();
        };

        let chunk = read.advance(max_len);
        if chunk.len() < max_len {
            reads.remove(&conn);
            trace!(conn, last = chunk.len(), "Read finished");
        }

        chunk
    }

    /// Drop the open read of `conn`; no-op if there is none
    pub fn read_abort(&self, conn: ConnectionId) {
        if self.reads.lock().remove(&conn).is_some() {
            trace!(conn, "Read aborted");
        }
    }

    pub fn read_ongoing(&self, conn: ConnectionId) -> bool {
        self.reads.lock().contains_key(&conn)
    }

    // =========================================================================
    // Connection lifecycle
    // =========================================================================

    /// Drop every transaction `conn` has open (link lost)
    pub fn abort_all(&self, conn: ConnectionId) {
        self.read_abort(conn);
        self.write_abort(conn);
    }

    /// Number of open transactions, for diagnostics
    pub fn open_transactions(&self) -> TransactionCounts {
        TransactionCounts {
            reads: self.reads.lock().len(),
            writes: self.writes.lock().len(),
        }
    }
}
