//! Pending-reply registry with exactly-once settlement.
//!
//! Each outgoing request registers a settle token (a `oneshot` sender) keyed
//! by a fresh [`CorrelationKey`]. The first matching reply consumes the token;
//! the token is removed from the map *before* it fires, so even a misbehaving
//! handler that emits both a success and an error reply delivers at most one
//! of them, and re-entrant double-fire is impossible.
//!
//! No timeout is enforced. A request whose handler never replies leaks its
//! entry until process exit; that is an explicit design limitation, not a bug
//! to paper over. Callers wanting timeouts race the pending future against a
//! timer - the consume-once settle makes a late reply harmless to discard.

use std::collections::HashMap;

use graphdock_protocol::{CorrelationKey, ErrorPayload};
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use tokio::sync::oneshot;
use tracing::debug;

/// What a settled request resolves to on the initiator side.
pub type SettledReply = std::result::Result<JsonValue, ErrorPayload>;

#[derive(Default)]
pub struct PendingReplies {
    entries: Mutex<HashMap<CorrelationKey, oneshot::Sender<SettledReply>>>,
}

impl PendingReplies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh key and installs a settle token for it.
    pub fn register(&self) -> (CorrelationKey, oneshot::Receiver<SettledReply>) {
        let key = CorrelationKey::fresh();
        let (tx, rx) = oneshot::channel();
        self.entries.lock().insert(key, tx);
        (key, rx)
    }

    /// Delivers a success reply. No-op if the key is unknown (already settled
    /// or never registered).
    pub fn resolve(&self, key: CorrelationKey, value: JsonValue) {
        self.settle(key, Ok(value));
    }

    /// Delivers an error reply. Symmetric to [`resolve`](Self::resolve).
    pub fn reject(&self, key: CorrelationKey, error: ErrorPayload) {
        self.settle(key, Err(error));
    }

    /// Drops a token without firing it, e.g. when the send itself failed.
    pub fn forget(&self, key: CorrelationKey) {
        self.entries.lock().remove(&key);
    }

    /// Number of requests still awaiting a reply.
    pub fn in_flight(&self) -> usize {
        self.entries.lock().len()
    }

    fn settle(&self, key: CorrelationKey, outcome: SettledReply) {
        // Removal happens before the token fires; a second reply for the same
        // key finds nothing here and is discarded.
        let Some(token) = self.entries.lock().remove(&key) else {
            debug!(target = "graphdock.bridge", %key, "discarding reply for unknown correlation key");
            return;
        };
        // The receiver may already be dropped (caller gave up); that is fine.
        let _ = token.send(outcome);
    }
}
