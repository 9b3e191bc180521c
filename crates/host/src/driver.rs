//! Database driver seam.
//!
//! The query language and its result schema are not modeled here; a session
//! takes a query string plus optional parameters and hands back whatever JSON
//! the database produced. The registry in [`sessions`](crate::sessions) only
//! depends on these two traits, which keeps the actual client swappable (and
//! trivially fakeable in tests, see [`testing`](crate::testing)).

use std::sync::Arc;

use async_trait::async_trait;
use graphdock_protocol::ConnectionParams;
use serde_json::{Value as JsonValue, json};

use crate::error::{HostError, Result};

/// Opens sessions against a database described by [`ConnectionParams`].
#[async_trait]
pub trait GraphDriver: Send + Sync {
    async fn connect(&self, params: &ConnectionParams) -> Result<Arc<dyn GraphSession>>;
}

/// A live, reusable handle to one database session.
#[async_trait]
pub trait GraphSession: Send + Sync {
    /// Executes a query and returns the raw result structure.
    async fn run(&self, query: &str, parameters: Option<JsonValue>) -> Result<JsonValue>;

    /// Releases the session. Safe to call once per handle.
    async fn close(&self) -> Result<()>;
}

/// Driver speaking the HTTP transactional endpoint
/// (`POST <host>/db/<db>/tx/commit`) with basic auth.
///
/// Sessions are stateless on the wire, so `connect` is cheap and `close` has
/// nothing to release; reachability problems surface on the first `run`.
pub struct HttpGraphDriver {
    client: reqwest::Client,
}

impl HttpGraphDriver {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpGraphDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphDriver for HttpGraphDriver {
    async fn connect(&self, params: &ConnectionParams) -> Result<Arc<dyn GraphSession>> {
        let endpoint = format!(
            "{}/db/{}/tx/commit",
            params.host.trim_end_matches('/'),
            params.db
        );
        Ok(Arc::new(HttpGraphSession {
            client: self.client.clone(),
            endpoint,
            login: params.login.clone(),
            password: params.password.clone(),
        }))
    }
}

struct HttpGraphSession {
    client: reqwest::Client,
    endpoint: String,
    login: String,
    password: String,
}

#[async_trait]
impl GraphSession for HttpGraphSession {
    async fn run(&self, query: &str, parameters: Option<JsonValue>) -> Result<JsonValue> {
        let statement = json!({
            "statements": [{
                "statement": query,
                "parameters": parameters.unwrap_or_else(|| json!({})),
            }]
        });

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.login, Some(&self.password))
            .json(&statement)
            .send()
            .await
            .map_err(|err| HostError::Execution(err.to_string()))?;

        let status = response.status();
        let body: JsonValue = response
            .json()
            .await
            .map_err(|err| HostError::Execution(err.to_string()))?;

        if !status.is_success() {
            return Err(HostError::Execution(format!("{status}: {body}")));
        }

        // The transactional endpoint reports query failures in-band.
        if let Some(errors) = body.get("errors").and_then(JsonValue::as_array) {
            if let Some(first) = errors.first() {
                let message = first
                    .get("message")
                    .and_then(JsonValue::as_str)
                    .unwrap_or("unknown database error");
                return Err(HostError::Execution(message.to_string()));
            }
        }

        Ok(body)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
