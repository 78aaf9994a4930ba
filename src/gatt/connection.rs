//! Connection table
//!
//! Tracks the peers currently linked and the MTU negotiated with each.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::attribute::ConnectionId;
use crate::error::{GattError, Result};

use super::{ATT_OPCODE_LEN, MTU_DEFAULT_CLIENT};

/// One linked peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    /// Peer device address
    pub addr: [u8; 6],

    /// Negotiated MTU
    pub mtu: u16,
}

/// Connections keyed by id
///
/// Written from the event context, read from any thread.
pub struct ConnectionTable {
    connections: RwLock<HashMap<ConnectionId, Connection>>,

    /// MTU a connection starts with before exchange
    default_mtu: u16,

    /// Largest MTU this side accepts
    local_mtu: u16,
}

impl ConnectionTable {
    pub fn new(default_mtu: u16, local_mtu: u16) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            default_mtu,
            local_mtu,
        }
    }

    /// Record a new link
    pub fn connect(&self, conn: ConnectionId, addr: [u8; 6]) {
        let connection = Connection {
            addr,
            mtu: self.default_mtu,
        };

        if self.connections.write().insert(conn, connection).is_some() {
            warn!(conn, "Connection id reused without disconnect");
        }

        info!(conn, addr = %format_addr(&addr), "Peer connected");
    }

    /// Forget a link, returning what was known about it
    pub fn disconnect(&self, conn: ConnectionId) -> Option<Connection> {
        let removed = self.connections.write().remove(&conn);

        match removed {
            Some(connection) => info!(conn, addr = %format_addr(&connection.addr), "Peer disconnected"),
            None => warn!(conn, "Disconnect for unknown connection"),
        }

        removed
    }

    /// Store the MTU negotiated for `conn`
    ///
    /// Values below the ATT minimum are raised to it, values above the
    /// local MTU are capped at it.
    pub fn set_mtu(&self, conn: ConnectionId, mtu: u16) -> Result<()> {
        let mut connections = self.connections.write();
        let connection = connections
            .get_mut(&conn)
            .ok_or(GattError::UnknownConnection(conn))?;

        if mtu < MTU_DEFAULT_CLIENT {
            warn!(conn, mtu, "MTU below ATT minimum, using {}", MTU_DEFAULT_CLIENT);
        }
        if mtu > self.local_mtu {
            debug!(conn, mtu, local_mtu = self.local_mtu, "Peer MTU capped at local MTU");
        }
        connection.mtu = mtu.min(self.local_mtu).max(MTU_DEFAULT_CLIENT);

        info!(conn, mtu = connection.mtu, "MTU updated");
        Ok(())
    }

    pub fn get(&self, conn: ConnectionId) -> Option<Connection> {
        self.connections.read().get(&conn).copied()
    }

    pub fn mtu(&self, conn: ConnectionId) -> Option<u16> {
        self.get(conn).map(|c| c.mtu)
    }

    /// Largest attribute payload one response can carry on `conn`
    pub fn payload_limit(&self, conn: ConnectionId) -> Option<usize> {
        self.mtu(conn).map(|mtu| mtu as usize - ATT_OPCODE_LEN)
    }

    pub fn contains(&self, conn: ConnectionId) -> bool {
        self.connections.read().contains_key(&conn)
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    pub fn default_mtu(&self) -> u16 {
        self.default_mtu
    }

    pub fn local_mtu(&self) -> u16 {
        self.local_mtu
    }
}

fn format_addr(addr: &[u8; 6]) -> String {
    addr.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}
