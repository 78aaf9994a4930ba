//! # gattkit
//!
//! Blocking request/response and fragmented attribute transfers for a BLE
//! peripheral sitting on a callback-driven radio stack:
//! - A completion correlator that turns an asynchronous completion into the
//!   return value of a blocking call
//! - A per-connection transaction engine for long reads and prepared writes
//! - A serial event loop and a simulated driver for host-side use
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Application threads                          │
//! │            (blocking / non-blocking requests)                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ request()
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Peripheral                              │
//! │        (Correlator · ConnectionTable · Attributes)           │
//! └──────────┬──────────────────────────────────▲───────────────┘
//!            │ submit / respond                 │ deliver(event)
//!            ▼                                  │
//!   ┌─────────────────┐   HardwareEvent   ┌─────┴───────┐
//!   │     Driver      │ ────────────────► │  EventLoop  │
//!   │  (radio stack)  │                   │ (1 thread)  │
//!   └─────────────────┘                   └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod attribute;
pub mod correlator;
pub mod gatt;
pub mod driver;
pub mod peripheral;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{GattError, Result};
pub use config::Config;
pub use attribute::{AttributeValue, ConnectionId};
pub use correlator::Correlator;
pub use peripheral::{Peripheral, RequestMode};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of gattkit
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
