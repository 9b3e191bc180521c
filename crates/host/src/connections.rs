//! Stored connection parameters.
//!
//! The surface persists its connection list through the generic storage
//! actions; the host reads the same list back when it needs parameters for an
//! id. The list lives under one storage key as an ordered sequence.

use std::sync::Arc;

use graphdock_protocol::ConnectionParams;
use serde_json::json;

use crate::error::{HostError, Result};
use crate::storage::JsonStore;

pub const CONNECTIONS_KEY: &str = "connections";

#[derive(Debug, Clone)]
pub struct ConnectionStore {
    storage: Arc<JsonStore>,
}

impl ConnectionStore {
    pub fn new(storage: Arc<JsonStore>) -> Self {
        Self { storage }
    }

    /// Returns all stored connections, oldest first.
    pub fn list(&self) -> Result<Vec<ConnectionParams>> {
        let raw = self.storage.get_item(CONNECTIONS_KEY, json!([]))?;
        serde_json::from_value(raw)
            .map_err(|err| HostError::Storage(format!("stored connection list is malformed: {err}")))
    }

    /// Looks up parameters by connection id.
    pub fn find(&self, id: &str) -> Result<ConnectionParams> {
        self.list()?
            .into_iter()
            .find(|params| params.id == id)
            .ok_or_else(|| HostError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(id: &str) -> ConnectionParams {
        ConnectionParams {
            id: id.into(),
            host: format!("bolt://{id}.example:7687"),
            login: "neo4j".into(),
            password: "secret".into(),
            db: "neo4j".into(),
            name: id.to_uppercase(),
        }
    }

    fn seeded_store(ids: &[&str]) -> (tempfile::TempDir, ConnectionStore) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(JsonStore::new(dir.path()));
        let list: Vec<_> = ids.iter().map(|id| params(id)).collect();
        storage
            .set_item(CONNECTIONS_KEY, &serde_json::to_value(&list).unwrap())
            .unwrap();
        (dir, ConnectionStore::new(storage))
    }

    #[test]
    fn empty_storage_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConnectionStore::new(Arc::new(JsonStore::new(dir.path())));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn find_returns_the_matching_entry() {
        let (_dir, store) = seeded_store(&["local", "staging"]);
        let found = store.find("staging").unwrap();
        assert_eq!(found.name, "STAGING");
    }

    #[test]
    fn find_unknown_id_is_not_found() {
        let (_dir, store) = seeded_store(&["local"]);
        assert!(matches!(store.find("prod"), Err(HostError::NotFound(id)) if id == "prod"));
    }

    #[test]
    fn list_preserves_order() {
        let (_dir, store) = seeded_store(&["a", "b", "c"]);
        let ids: Vec<_> = store.list().unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
