//! Attribute Module
//!
//! One attribute value plus the per-connection transactions that move it
//! across the link in transfer-unit sized pieces.
//!
//! ## Responsibilities
//! - Hold the committed value
//! - Accumulate write fragments per connection until commit or abort
//! - Serve reads from a per-connection snapshot with an advancing cursor
//! - Keep connections isolated from each other
//!
//! ## Transaction Lifecycle
//! ```text
//!  write:  start ──► add ──► add ──► commit   (value replaced)
//!                               └──► abort    (value untouched)
//!
//!  read:   start (snapshot) ──► advance ──► advance ──► short chunk (closed)
//!                                      └──► abort
//! ```
//!
//! Nothing here returns an error for an out-of-order call. A missing
//! transaction shows up as `false` or an empty chunk, and the caller decides
//! what to tell the peer.

mod transaction;
mod value;

pub use transaction::TransactionCounts;
pub use value::AttributeValue;

/// Identifier the stack assigns to a link with one peer
pub type ConnectionId = u16;
