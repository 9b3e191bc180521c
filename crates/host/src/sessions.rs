//! Per-connection session registry.
//!
//! Sessions are network-backed and stateful, so they are pooled by connection
//! id rather than opened per query. The registry is the single owner of the
//! id-to-session map; every operation goes through its lock, which resolves
//! the open-while-open race for one id the only sensible way: last opener
//! wins, the previous handle gets a best-effort close.
//!
//! `test_connection` is the exception to pooling - it must never leave a
//! dangling handle, so it always round-trips open, probe, close from raw
//! parameters, bypassing the registry.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use graphdock_protocol::ConnectionParams;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::connections::ConnectionStore;
use crate::driver::{GraphDriver, GraphSession};
use crate::error::Result;

/// Trivial query used to verify a connection is alive.
pub const LIVENESS_QUERY: &str = "RETURN 1";

pub struct SessionRegistry {
    driver: Arc<dyn GraphDriver>,
    connections: ConnectionStore,
    sessions: Mutex<HashMap<String, Arc<dyn GraphSession>>>,
}

impl SessionRegistry {
    pub fn new(driver: Arc<dyn GraphDriver>, connections: ConnectionStore) -> Self {
        Self {
            driver,
            connections,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Opens (or cycles) the session for a stored connection id.
    ///
    /// Idempotent in effect - afterwards exactly one session exists for the
    /// id - but not in side effect: an existing session is always closed and
    /// replaced. Close failures on the stale handle are logged, never
    /// propagated; they must not mask the outcome of the open itself.
    pub async fn open(&self, id: &str) -> Result<()> {
        let params = self.connections.find(id)?;
        let mut sessions = self.sessions.lock().await;

        if let Some(stale) = sessions.remove(id) {
            debug!(target = "graphdock.sessions", id, "cycling existing session");
            if let Err(err) = stale.close().await {
                warn!(target = "graphdock.sessions", id, error = %err, "failed to close stale session");
            }
        }

        let session = self.driver.connect(&params).await?;
        sessions.insert(id.to_string(), session);
        debug!(target = "graphdock.sessions", id, "session opened");
        Ok(())
    }

    /// Releases the session for `id`, if any. Closing an absent id is a
    /// no-op, so the operation is idempotent.
    pub async fn close(&self, id: &str) -> Result<()> {
        let removed = self.sessions.lock().await.remove(id);
        if let Some(session) = removed {
            if let Err(err) = session.close().await {
                warn!(target = "graphdock.sessions", id, error = %err, "failed to close session");
            }
            debug!(target = "graphdock.sessions", id, "session closed");
        }
        Ok(())
    }

    /// Executes a query against the session for `id`, opening one lazily when
    /// none exists yet.
    pub async fn run(
        &self,
        id: &str,
        query: &str,
        parameters: Option<JsonValue>,
    ) -> Result<JsonValue> {
        let session = {
            let mut sessions = self.sessions.lock().await;
            match sessions.entry(id.to_string()) {
                Entry::Occupied(entry) => Arc::clone(entry.get()),
                Entry::Vacant(entry) => {
                    let params = self.connections.find(id)?;
                    debug!(target = "graphdock.sessions", id, "opening session on first use");
                    let session = self.driver.connect(&params).await?;
                    Arc::clone(entry.insert(session))
                }
            }
        };
        // The lock is released before the query runs; a concurrent re-open
        // may close this handle underneath us, which the driver reports as an
        // execution failure like any other.
        session.run(query, parameters).await
    }

    /// Probes connectivity from raw parameters, bypassing the registry.
    ///
    /// Never rejects: both outcomes are reported as a human-readable string
    /// so the surface renders them uniformly. The throwaway session is
    /// released regardless of the probe's outcome.
    pub async fn test_connection(&self, params: &ConnectionParams) -> String {
        connection_report(self.driver.as_ref(), params).await
    }

    /// Number of live pooled sessions.
    pub async fn live_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Releases every pooled session, e.g. on shutdown.
    pub async fn close_all(&self) {
        let mut sessions = self.sessions.lock().await;
        for (id, session) in sessions.drain() {
            if let Err(err) = session.close().await {
                warn!(target = "graphdock.sessions", id, error = %err, "failed to close session");
            }
        }
    }
}

/// Probes connectivity and renders the verdict as the fixed report string.
pub async fn connection_report(driver: &dyn GraphDriver, params: &ConnectionParams) -> String {
    match probe_connection(driver, params).await {
        Ok(()) => "Connection succeeded".to_string(),
        Err(err) => format!("Failed to connect: {err}"),
    }
}

/// Opens a throwaway session, runs the liveness query, and always releases
/// the session afterwards.
pub async fn probe_connection(driver: &dyn GraphDriver, params: &ConnectionParams) -> Result<()> {
    let session = driver.connect(params).await?;
    let outcome = session.run(LIVENESS_QUERY, None).await;
    if let Err(err) = session.close().await {
        warn!(target = "graphdock.sessions", error = %err, "failed to release probe session");
    }
    outcome.map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connections::CONNECTIONS_KEY;
    use crate::error::HostError;
    use crate::storage::JsonStore;
    use crate::testing::RecordingDriver;

    fn registry_with(ids: &[&str]) -> (tempfile::TempDir, Arc<RecordingDriver>, SessionRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(JsonStore::new(dir.path()));
        let list: Vec<_> = ids.iter().map(|id| test_params(id)).collect();
        storage
            .set_item(CONNECTIONS_KEY, &serde_json::to_value(&list).unwrap())
            .unwrap();
        let driver = Arc::new(RecordingDriver::new());
        let registry = SessionRegistry::new(
            Arc::clone(&driver) as Arc<dyn GraphDriver>,
            ConnectionStore::new(storage),
        );
        (dir, driver, registry)
    }

    fn test_params(id: &str) -> ConnectionParams {
        ConnectionParams {
            id: id.into(),
            host: format!("bolt://{id}:7687"),
            login: "neo4j".into(),
            password: "pw".into(),
            db: "neo4j".into(),
            name: id.into(),
        }
    }

    #[tokio::test]
    async fn open_unknown_id_is_not_found() {
        let (_dir, driver, registry) = registry_with(&["local"]);
        assert!(matches!(
            registry.open("prod").await,
            Err(HostError::NotFound(id)) if id == "prod"
        ));
        assert_eq!(driver.open_handles(), 0);
    }

    #[tokio::test]
    async fn double_open_leaves_one_handle_and_releases_the_first() {
        let (_dir, driver, registry) = registry_with(&["local"]);

        registry.open("local").await.unwrap();
        registry.open("local").await.unwrap();

        assert_eq!(registry.live_sessions().await, 1);
        assert_eq!(driver.sessions_opened(), 2);
        assert_eq!(driver.sessions_closed(), 1);
        assert_eq!(driver.open_handles(), 1);
    }

    #[tokio::test]
    async fn run_opens_lazily_on_first_use() {
        let (_dir, driver, registry) = registry_with(&["local"]);

        let result = registry
            .run("local", "MATCH (n) RETURN n", None)
            .await
            .unwrap();
        assert_eq!(result["query"], "MATCH (n) RETURN n");
        assert_eq!(registry.live_sessions().await, 1);
        assert_eq!(driver.sessions_opened(), 1);

        // The second run reuses the pooled session.
        registry.run("local", "RETURN 2", None).await.unwrap();
        assert_eq!(driver.sessions_opened(), 1);
    }

    #[tokio::test]
    async fn run_without_stored_params_is_not_found() {
        let (_dir, _driver, registry) = registry_with(&[]);
        assert!(matches!(
            registry.run("ghost", "RETURN 1", None).await,
            Err(HostError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn query_failure_propagates_as_execution_error() {
        let (_dir, driver, registry) = registry_with(&["local"]);
        driver.fail_queries_containing("DIVIDE");

        let err = registry
            .run("local", "RETURN 1 / 0 // DIVIDE", None)
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::Execution(_)));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (_dir, driver, registry) = registry_with(&["local"]);
        registry.open("local").await.unwrap();

        registry.close("local").await.unwrap();
        registry.close("local").await.unwrap();

        assert_eq!(registry.live_sessions().await, 0);
        assert_eq!(driver.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_connection_success_reports_the_fixed_string() {
        let (_dir, driver, registry) = registry_with(&[]);
        let report = registry.test_connection(&test_params("adhoc")).await;
        assert_eq!(report, "Connection succeeded");
        assert_eq!(driver.queries(), vec![LIVENESS_QUERY.to_string()]);
        assert_eq!(driver.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_connection_failure_embeds_the_cause_and_leaks_nothing() {
        let (_dir, driver, registry) = registry_with(&[]);
        driver.refuse_hosts_containing("unreachable");

        let mut params = test_params("adhoc");
        params.host = "bolt://unreachable:7687".into();
        let report = registry.test_connection(&params).await;

        assert!(report.starts_with("Failed to connect: "));
        assert!(report.contains("unreachable"));
        assert_eq!(driver.open_handles(), 0);
    }

    #[tokio::test]
    async fn probe_releases_the_handle_even_when_the_query_fails() {
        let driver = RecordingDriver::new();
        driver.fail_queries_containing(LIVENESS_QUERY);

        let outcome = probe_connection(&driver, &test_params("adhoc")).await;
        assert!(outcome.is_err());
        assert_eq!(driver.open_handles(), 0);
        assert_eq!(driver.sessions_closed(), 1);
    }

    #[tokio::test]
    async fn close_all_drains_the_pool() {
        let (_dir, driver, registry) = registry_with(&["a", "b"]);
        registry.open("a").await.unwrap();
        registry.open("b").await.unwrap();

        registry.close_all().await;
        assert_eq!(registry.live_sessions().await, 0);
        assert_eq!(driver.open_handles(), 0);
    }
}
