//! Correlator Module
//!
//! Turns a completion that arrives on the hardware event context into the
//! return value of a blocking call.
//!
//! ## Responsibilities
//! - Register a waiter for `(key, operation)` before the request is issued
//! - Deliver a completion to exactly one waiter (or to all waiters of an
//!   operation, for completions that carry no key)
//! - Bound every wait with a timeout and clean up after it
//! - Drop late and unsolicited completions quietly
//!
//! ## Flow
//! ```text
//!  caller thread                         event context
//!  ─────────────                         ─────────────
//!  wait(key, op, action)
//!    ├─ register (key, op)  ◄── lock ──┐
//!    ├─ action()  ── request ──► stack │
//!    └─ block on one-shot              │
//!                                      │  notify(key, op, ok)
//!                                      └─ remove (key, op)
//!    ◄──────────── one-shot send ──────── deliver(ok)
//! ```
//!
//! The registry lock only covers map bookkeeping; suspension happens on a
//! per-registration crossbeam channel.

mod pending;
mod registry;

pub use registry::{Correlator, CorrelatorStats};
