//! Error types for gattkit
//!
//! The correlator and the transaction engine never fail loudly; they report
//! through `bool`/`Option`. This error type covers the layers around them.

use thiserror::Error;

use crate::driver::Operation;

/// Result type alias using GattError
pub type Result<T> = std::result::Result<T, GattError>;

/// Unified error type for gattkit operations
#[derive(Debug, Error)]
pub enum GattError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Driver Errors
    // -------------------------------------------------------------------------
    #[error("Driver rejected request: {0}")]
    Driver(String),

    #[error("{operation} for key {key:#06x} failed")]
    Failed { operation: Operation, key: u16 },

    /// The completion never arrived within the timeout, or another caller was
    /// already waiting on the same key. The request may still complete later.
    #[error("{operation} for key {key:#06x} has an unknown outcome")]
    OutcomeUnknown { operation: Operation, key: u16 },

    // -------------------------------------------------------------------------
    // Connection / Attribute Errors
    // -------------------------------------------------------------------------
    #[error("Unknown connection: {0}")]
    UnknownConnection(u16),

    #[error("Attribute handle already registered: {0:#06x}")]
    DuplicateAttribute(u16),

    #[error("Unknown attribute handle: {0:#06x}")]
    UnknownAttribute(u16),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Event Loop Errors
    // -------------------------------------------------------------------------
    #[error("Event loop error: {0}")]
    EventLoop(String),
}

impl From<bincode::Error> for GattError {
    fn from(err: bincode::Error) -> Self {
        GattError::Serialization(err.to_string())
    }
}
