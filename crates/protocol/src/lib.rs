//! Wire types for the graphdock action protocol.
//!
//! This crate contains the serde-serializable types exchanged between a UI
//! surface and the privileged host process. These types represent the
//! "protocol layer" - the shapes of data as they appear on the wire.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization and
//!   reply-topic formatting
//! * Stable: Changes only when the wire contract changes
//!
//! The transport and correlation machinery lives in `graphdock-bridge`;
//! the handlers live in `graphdock-host`.

pub mod actions;
pub mod envelope;
pub mod topic;
pub mod types;

pub use envelope::*;
pub use topic::*;
pub use types::*;
