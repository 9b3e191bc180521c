//! Request, reply and broadcast envelopes.
//!
//! Requests carry an action name, a fresh correlation key and a
//! handler-specific payload:
//!
//! ```json
//! { "action": "executeQuery", "key": "3ee5…", "payload": { "id": "…", "query": "…" } }
//! ```
//!
//! Everything flowing the other way is an event. Replies are events whose name
//! is a [`ReplyTopic`]; anything else (e.g. `"tabs"`) is a broadcast:
//!
//! ```json
//! { "event": "executeQuery.3ee5….success", "payload": { "records": [] } }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::topic::{CorrelationKey, ReplyOutcome, ReplyTopic};

/// A named action sent from a surface to the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub action: String,
    pub key: CorrelationKey,
    pub payload: Value,
}

/// An event pushed from the host to a surface.
///
/// Replies and broadcasts share this shape; the receiver tells them apart by
/// whether `event` parses as a [`ReplyTopic`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: String,
    pub payload: Value,
}

impl EventEnvelope {
    /// Builds a success reply for the given request.
    pub fn success(action: &str, key: CorrelationKey, payload: Value) -> Self {
        Self {
            event: ReplyTopic::new(action, key, ReplyOutcome::Success).to_string(),
            payload,
        }
    }

    /// Builds an error reply carrying the failure payload.
    pub fn error(action: &str, key: CorrelationKey, error: &ErrorPayload) -> Self {
        Self {
            event: ReplyTopic::new(action, key, ReplyOutcome::Error).to_string(),
            payload: error.to_value(),
        }
    }

    /// Builds a broadcast, a push unrelated to any request.
    pub fn broadcast(event: &str, payload: Value) -> Self {
        Self {
            event: event.to_string(),
            payload,
        }
    }
}

/// Discriminated union of everything that crosses the boundary.
///
/// Uses serde's `untagged`: messages with an `action`/`key` pair are requests,
/// messages with an `event` name are events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireMessage {
    Request(RequestEnvelope),
    Event(EventEnvelope),
}

/// Error codes used in [`ErrorPayload::code`].
pub mod codes {
    /// Referenced connection id has no stored parameters.
    pub const NOT_FOUND: &str = "notFound";
    /// The downstream query or operation itself failed.
    pub const EXECUTION_ERROR: &str = "executionError";
    /// Persistence layer failure.
    pub const STORAGE_ERROR: &str = "storageError";
    /// The request payload did not match the handler's schema.
    pub const INVALID_PAYLOAD: &str = "invalidPayload";
    /// Handler crashed or misbehaved on the host side.
    pub const INTERNAL: &str = "internalError";
}

/// Failure value carried in an error reply.
///
/// Serialized losslessly enough to reconstruct a user-facing message on the
/// initiator side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

impl ErrorPayload {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(codes::INTERNAL, message)
    }

    pub fn to_value(&self) -> Value {
        // Both fields are plain strings; serialization cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Reconstructs the payload from a reply body, tolerating foreign shapes.
    pub fn from_value(value: Value) -> Self {
        match serde_json::from_value::<ErrorPayload>(value.clone()) {
            Ok(payload) => payload,
            Err(_) => Self::new(codes::INTERNAL, value.to_string()),
        }
    }
}

impl std::fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_message_distinguishes_request_from_event() {
        let key = CorrelationKey::fresh();
        let raw = json!({ "action": "getItem", "key": key, "payload": { "key": "connections" } });
        match serde_json::from_value::<WireMessage>(raw).unwrap() {
            WireMessage::Request(req) => {
                assert_eq!(req.action, "getItem");
                assert_eq!(req.key, key);
            }
            WireMessage::Event(_) => panic!("expected request"),
        }

        let raw = json!({ "event": "tabs", "payload": { "currentIndex": 0, "tabs": [] } });
        match serde_json::from_value::<WireMessage>(raw).unwrap() {
            WireMessage::Event(ev) => assert_eq!(ev.event, "tabs"),
            WireMessage::Request(_) => panic!("expected event"),
        }
    }

    #[test]
    fn success_reply_names_match_the_wire_contract() {
        let key = CorrelationKey::fresh();
        let reply = EventEnvelope::success("testConnection", key, json!("Connection succeeded"));
        assert_eq!(reply.event, format!("testConnection.{key}.success"));
    }

    #[test]
    fn error_payload_survives_the_wire() {
        let original = ErrorPayload::new(codes::NOT_FOUND, "no stored connection with id 'x'");
        let recovered = ErrorPayload::from_value(original.to_value());
        assert_eq!(recovered, original);
    }

    #[test]
    fn foreign_error_shapes_degrade_to_internal() {
        let recovered = ErrorPayload::from_value(json!({ "weird": true }));
        assert_eq!(recovered.code, codes::INTERNAL);
        assert!(recovered.message.contains("weird"));
    }
}
