//! The action catalog: binds every wire action name to host behavior.
//!
//! Handlers are thin - payload parsing, one call into the owning subsystem,
//! error-to-payload mapping - so the semantics stay testable in the subsystem
//! modules. Malformed payloads are rejected uniformly with an `invalidPayload`
//! error before any state is touched.

use std::sync::Arc;

use graphdock_bridge::ActionRouter;
use graphdock_protocol::{
    ConnectionParams, ConnectionRef, DeleteItem, ErrorPayload, ExecuteQuery, GetItem, OpenTab,
    SetItem, SetTabTitle, SetTabUrl, TabRef, actions, codes,
};
use serde::de::DeserializeOwned;
use serde_json::{Value as JsonValue, json};
use tokio::sync::Mutex;

use crate::sessions::SessionRegistry;
use crate::storage::JsonStore;
use crate::tabs::TabManager;

/// Shared handles behind every handler. Cloning is cheap; all fields are
/// reference-counted.
#[derive(Clone)]
pub struct HostState {
    pub storage: Arc<JsonStore>,
    pub sessions: Arc<SessionRegistry>,
    pub tabs: Arc<Mutex<TabManager>>,
}

fn parse<T: DeserializeOwned>(payload: JsonValue) -> Result<T, ErrorPayload> {
    serde_json::from_value(payload)
        .map_err(|err| ErrorPayload::new(codes::INVALID_PAYLOAD, format!("malformed payload: {err}")))
}

/// Builds the full router: connection, storage, and tab actions.
pub fn build_router(state: HostState) -> ActionRouter {
    let mut router = ActionRouter::new();

    {
        let state = state.clone();
        router.register(actions::OPEN_CONNECTION, move |payload| {
            let state = state.clone();
            async move {
                let conn: ConnectionRef = parse(payload)?;
                state
                    .sessions
                    .open(&conn.id)
                    .await
                    .map_err(|err| err.to_payload())?;
                Ok(JsonValue::Null)
            }
        });
    }

    {
        let state = state.clone();
        router.register(actions::CLOSE_CONNECTION, move |payload| {
            let state = state.clone();
            async move {
                let conn: ConnectionRef = parse(payload)?;
                state
                    .sessions
                    .close(&conn.id)
                    .await
                    .map_err(|err| err.to_payload())?;
                Ok(JsonValue::Null)
            }
        });
    }

    {
        let state = state.clone();
        router.register(actions::EXECUTE_QUERY, move |payload| {
            let state = state.clone();
            async move {
                let request: ExecuteQuery = parse(payload)?;
                state
                    .sessions
                    .run(&request.id, &request.query, request.parameters)
                    .await
                    .map_err(|err| err.to_payload())
            }
        });
    }

    {
        let state = state.clone();
        router.register(actions::TEST_CONNECTION, move |payload| {
            let state = state.clone();
            async move {
                let params: ConnectionParams = parse(payload)?;
                // Both probe outcomes resolve successfully; the report string
                // carries the verdict.
                Ok(json!(state.sessions.test_connection(&params).await))
            }
        });
    }

    {
        let state = state.clone();
        router.register(actions::GET_ITEM, move |payload| {
            let state = state.clone();
            async move {
                let request: GetItem = parse(payload)?;
                state
                    .storage
                    .get_item(&request.key, request.default_val)
                    .map_err(|err| err.to_payload())
            }
        });
    }

    {
        let state = state.clone();
        router.register(actions::SET_ITEM, move |payload| {
            let state = state.clone();
            async move {
                let request: SetItem = parse(payload)?;
                state
                    .storage
                    .set_item(&request.key, &request.value)
                    .map_err(|err| err.to_payload())?;
                Ok(JsonValue::Null)
            }
        });
    }

    {
        let state = state.clone();
        router.register(actions::DELETE_ITEM, move |payload| {
            let state = state.clone();
            async move {
                let request: DeleteItem = parse(payload)?;
                state
                    .storage
                    .delete_item(&request.key)
                    .map_err(|err| err.to_payload())?;
                Ok(JsonValue::Null)
            }
        });
    }

    {
        let state = state.clone();
        router.register(actions::GET_TABS, move |_payload| {
            let state = state.clone();
            async move {
                let snapshot = state.tabs.lock().await.snapshot();
                serde_json::to_value(&snapshot)
                    .map_err(|err| ErrorPayload::internal(err.to_string()))
            }
        });
    }

    {
        let state = state.clone();
        router.register(actions::OPEN_TAB, move |payload| {
            let state = state.clone();
            async move {
                let request: OpenTab = parse(payload)?;
                state.tabs.lock().await.open_tab(&request.url);
                Ok(JsonValue::Null)
            }
        });
    }

    {
        let state = state.clone();
        router.register(actions::SELECT_TAB, move |payload| {
            let state = state.clone();
            async move {
                let request: TabRef = parse(payload)?;
                state.tabs.lock().await.select_tab(request.index);
                Ok(JsonValue::Null)
            }
        });
    }

    {
        let state = state.clone();
        router.register(actions::CLOSE_TAB, move |payload| {
            let state = state.clone();
            async move {
                let request: TabRef = parse(payload)?;
                state.tabs.lock().await.close_tab(request.index);
                Ok(JsonValue::Null)
            }
        });
    }

    {
        let state = state.clone();
        router.register(actions::REFRESH_TAB, move |payload| {
            let state = state.clone();
            async move {
                let request: TabRef = parse(payload)?;
                state.tabs.lock().await.refresh_tab(request.index);
                Ok(JsonValue::Null)
            }
        });
    }

    {
        let state = state.clone();
        router.register(actions::SET_TAB_TITLE, move |payload| {
            let state = state.clone();
            async move {
                let request: SetTabTitle = parse(payload)?;
                state
                    .tabs
                    .lock()
                    .await
                    .set_tab_title(request.index, &request.title);
                Ok(JsonValue::Null)
            }
        });
    }

    {
        let state = state.clone();
        router.register(actions::SET_TAB_URL, move |payload| {
            let state = state.clone();
            async move {
                let request: SetTabUrl = parse(payload)?;
                state
                    .tabs
                    .lock()
                    .await
                    .set_tab_url(request.index, &request.url);
                Ok(JsonValue::Null)
            }
        });
    }

    router
}
