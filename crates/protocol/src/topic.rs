//! Correlation keys and reply-topic naming.
//!
//! A reply is delivered as an event named `"<action>.<key>.success"` or
//! `"<action>.<key>.error"`. This is the bit-exact contract both sides of the
//! boundary agree on: the initiator subscribes to exactly these two names for
//! each request it sends.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique token binding a request to its eventual reply.
///
/// Keys are 128-bit random UUIDs, so they are unique among all in-flight
/// requests for the lifetime of the process without coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationKey(Uuid);

impl CorrelationKey {
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for CorrelationKey {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Whether a reply carries a handler result or a handler failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    Success,
    Error,
}

impl ReplyOutcome {
    fn as_str(self) -> &'static str {
        match self {
            ReplyOutcome::Success => "success",
            ReplyOutcome::Error => "error",
        }
    }
}

/// Parsed form of a reply event name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTopic {
    pub action: String,
    pub key: CorrelationKey,
    pub outcome: ReplyOutcome,
}

impl ReplyTopic {
    pub fn new(action: &str, key: CorrelationKey, outcome: ReplyOutcome) -> Self {
        Self {
            action: action.to_string(),
            key,
            outcome,
        }
    }

    /// Parses an event name of the form `<action>.<key>.<outcome>`.
    ///
    /// Returns `None` for anything else; such events are broadcasts, not
    /// replies. Action names may not contain `.`, so the split is unambiguous.
    pub fn parse(event: &str) -> Option<Self> {
        let mut segments = event.rsplitn(3, '.');
        let outcome = match segments.next()? {
            "success" => ReplyOutcome::Success,
            "error" => ReplyOutcome::Error,
            _ => return None,
        };
        let key: CorrelationKey = segments.next()?.parse().ok()?;
        let action = segments.next()?;
        if action.is_empty() {
            return None;
        }
        Some(Self::new(action, key, outcome))
    }
}

impl fmt::Display for ReplyTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.action, self.key, self.outcome.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_round_trips_through_event_name() {
        let key = CorrelationKey::fresh();
        let topic = ReplyTopic::new("executeQuery", key, ReplyOutcome::Success);
        let parsed = ReplyTopic::parse(&topic.to_string()).unwrap();
        assert_eq!(parsed, topic);
    }

    #[test]
    fn error_topic_parses() {
        let key = CorrelationKey::fresh();
        let event = format!("openConnection.{key}.error");
        let parsed = ReplyTopic::parse(&event).unwrap();
        assert_eq!(parsed.action, "openConnection");
        assert_eq!(parsed.key, key);
        assert_eq!(parsed.outcome, ReplyOutcome::Error);
    }

    #[test]
    fn broadcast_names_are_not_topics() {
        assert!(ReplyTopic::parse("tabs").is_none());
        assert!(ReplyTopic::parse("contextmenu.click").is_none());
        assert!(ReplyTopic::parse("a.not-a-uuid.success").is_none());
    }

    #[test]
    fn empty_action_is_rejected() {
        let key = CorrelationKey::fresh();
        assert!(ReplyTopic::parse(&format!(".{key}.success")).is_none());
    }

    #[test]
    fn fresh_keys_are_distinct() {
        let a = CorrelationKey::fresh();
        let b = CorrelationKey::fresh();
        assert_ne!(a, b);
    }
}
