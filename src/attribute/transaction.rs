//! Per-connection transaction state

use bytes::{Bytes, BytesMut};

/// An open read: the value as it was at start, and how much has been sent
#[derive(Debug)]
pub(crate) struct ReadTransaction {
    snapshot: Bytes,
    offset: usize,
}

impl ReadTransaction {
    pub(crate) fn new(snapshot: Bytes) -> Self {
        Self { snapshot, offset: 0 }
    }

    /// Take up to `max_len` bytes from the cursor forward
    pub(crate) fn advance(&mut self, max_len: usize) -> Bytes {
        let len = max_len.min(self.remaining());
        if len == 0 {
            return Bytes::new();
        }

        // Slicing shares the snapshot allocation
        let chunk = self.snapshot.slice(self.offset..self.offset + len);
        self.offset += len;
        chunk
    }

    pub(crate) fn remaining(&self) -> usize {
        self.snapshot.len() - self.offset
    }
}

/// An open write: fragments received so far
#[derive(Debug, Default)]
pub(crate) struct WriteTransaction {
    buffer: BytesMut,
}

impl WriteTransaction {
    pub(crate) fn append(&mut self, fragment: &[u8]) {
        self.buffer.extend_from_slice(fragment);
    }

    pub(crate) fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Finish accumulating and hand out the value to commit
    pub(crate) fn into_value(self) -> Bytes {
        self.buffer.freeze()
    }
}

/// Number of transactions currently open on an attribute
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionCounts {
    pub reads: usize,
    pub writes: usize,
}
