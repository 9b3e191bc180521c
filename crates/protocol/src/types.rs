//! Handler payloads and shared data shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameters for one stored database connection.
///
/// Persisted as an ordered list under the `connections` storage key and looked
/// up by `id`. Immutable once fetched for a given operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    pub id: String,
    pub host: String,
    pub login: String,
    pub password: String,
    pub db: String,
    pub name: String,
}

/// Payload of `openConnection` and `closeConnection`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRef {
    pub id: String,
}

/// Payload of `executeQuery`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteQuery {
    pub id: String,
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

/// Payload of `getItem`. `default_val` is returned when the key is absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetItem {
    pub key: String,
    #[serde(default)]
    pub default_val: Value,
}

/// Payload of `setItem`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetItem {
    pub key: String,
    pub value: Value,
}

/// Payload of `deleteItem`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteItem {
    pub key: String,
}

/// Payload of `openTab`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenTab {
    pub url: String,
}

/// Payload of `selectTab` and `closeTab`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabRef {
    pub index: usize,
}

/// Payload of `setTabTitle`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetTabTitle {
    pub index: usize,
    pub title: String,
}

/// Payload of `setTabUrl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetTabUrl {
    pub index: usize,
    pub url: String,
}

/// One entry in a tab snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabLabel {
    pub title: String,
}

/// Full tab state, pushed to every surface after each mutation and returned by
/// `getTabs`. Always a complete snapshot, never a delta, so observers cannot
/// drift from a missed incremental update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabsSnapshot {
    /// Index of the focused tab, or -1 when the collection is empty.
    pub current_index: i64,
    pub tabs: Vec<TabLabel>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_item_default_is_null_when_omitted() {
        let payload: GetItem = serde_json::from_value(json!({ "key": "connections" })).unwrap();
        assert_eq!(payload.default_val, Value::Null);

        let payload: GetItem =
            serde_json::from_value(json!({ "key": "connections", "defaultVal": [] })).unwrap();
        assert_eq!(payload.default_val, json!([]));
    }

    #[test]
    fn snapshot_uses_camel_case_on_the_wire() {
        let snapshot = TabsSnapshot {
            current_index: -1,
            tabs: vec![],
        };
        let raw = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(raw, json!({ "currentIndex": -1, "tabs": [] }));
    }

    #[test]
    fn connection_params_round_trip() {
        let params = ConnectionParams {
            id: "c1".into(),
            host: "bolt://localhost:7687".into(),
            login: "neo4j".into(),
            password: "secret".into(),
            db: "movies".into(),
            name: "Local".into(),
        };
        let raw = serde_json::to_value(&params).unwrap();
        let back: ConnectionParams = serde_json::from_value(raw).unwrap();
        assert_eq!(back, params);
    }
}
