//! Process-boundary action dispatch.
//!
//! The UI surface cannot touch the network or local disk; it issues named
//! actions across the process boundary and awaits a correlated reply. This
//! crate implements both sides of that boundary:
//!
//! - [`BridgeClient`]: the initiator. `call(action, payload)` allocates a
//!   correlation key, sends a request envelope, and suspends until the matching
//!   reply arrives.
//! - [`ActionRouter`] + [`BridgeServer`]: the handler side. Registered async
//!   handlers are invoked fire-and-forget; results become `.success` replies,
//!   failures become `.error` replies, always.
//!
//! The transport underneath is an explicit [`Transport`]/[`TransportReceiver`]
//! pair, independent of any particular host runtime's event emitter.

pub mod client;
pub mod correlation;
pub mod error;
pub mod fake;
pub mod router;
pub mod transport;

pub use client::BridgeClient;
pub use correlation::PendingReplies;
pub use error::{BridgeError, Result};
pub use fake::{FakeTransportBuilder, FakeTransportController};
pub use router::{ActionRouter, Broadcaster, BridgeServer};
pub use transport::{Transport, TransportParts, TransportReceiver, duplex, line_transport};
