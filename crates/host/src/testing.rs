//! In-process fakes for the driver and shell seams.
//!
//! Both fakes record every call so tests can assert on ordering and balance
//! (opens vs closes, detach-then-attach) instead of just final state. They
//! live in the library rather than a tests/ helper because the integration
//! tests wire them into the real router.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use graphdock_protocol::ConnectionParams;
use serde_json::{Value as JsonValue, json};

use crate::driver::{GraphDriver, GraphSession};
use crate::error::{HostError, Result};
use crate::tabs::{Bounds, ViewHost, ViewId};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct DriverState {
    opened: AtomicUsize,
    closed: AtomicUsize,
    queries: Mutex<Vec<String>>,
    refuse_hosts: Mutex<Option<String>>,
    fail_queries: Mutex<Option<String>>,
}

/// Driver fake that hands out [`RecordingSession`]s and counts their
/// lifecycle events.
#[derive(Default)]
pub struct RecordingDriver {
    state: Arc<DriverState>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `connect` fail for any host containing `fragment`.
    pub fn refuse_hosts_containing(&self, fragment: &str) {
        *lock(&self.state.refuse_hosts) = Some(fragment.to_string());
    }

    /// Makes `run` fail for any query containing `fragment`.
    pub fn fail_queries_containing(&self, fragment: &str) {
        *lock(&self.state.fail_queries) = Some(fragment.to_string());
    }

    pub fn sessions_opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    /// Sessions opened and not yet closed.
    pub fn open_handles(&self) -> usize {
        self.sessions_opened() - self.sessions_closed()
    }

    /// Every query run across all sessions, in order.
    pub fn queries(&self) -> Vec<String> {
        lock(&self.state.queries).clone()
    }
}

#[async_trait]
impl GraphDriver for RecordingDriver {
    async fn connect(&self, params: &ConnectionParams) -> Result<Arc<dyn GraphSession>> {
        if let Some(fragment) = lock(&self.state.refuse_hosts).as_deref() {
            if params.host.contains(fragment) {
                return Err(HostError::Execution(format!(
                    "connection refused: {}",
                    params.host
                )));
            }
        }
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(RecordingSession {
            state: Arc::clone(&self.state),
            closed: AtomicUsize::new(0),
        }))
    }
}

pub struct RecordingSession {
    state: Arc<DriverState>,
    closed: AtomicUsize,
}

#[async_trait]
impl GraphSession for RecordingSession {
    async fn run(&self, query: &str, parameters: Option<JsonValue>) -> Result<JsonValue> {
        lock(&self.state.queries).push(query.to_string());
        if let Some(fragment) = lock(&self.state.fail_queries).as_deref() {
            if query.contains(fragment) {
                return Err(HostError::Execution(format!(
                    "simulated failure for '{query}'"
                )));
            }
        }
        Ok(json!({
            "records": [],
            "query": query,
            "parameters": parameters.unwrap_or(JsonValue::Null),
        }))
    }

    async fn close(&self) -> Result<()> {
        // Double-close on one handle must not skew the balance.
        if self.closed.fetch_add(1, Ordering::SeqCst) == 0 {
            self.state.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// One recorded shell operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCall {
    CreateView { view: ViewId, url: String },
    Attach(ViewId),
    Detach(ViewId),
    DestroyView(ViewId),
    SetBounds { view: ViewId, bounds: Bounds },
    CloseWindow,
}

#[derive(Default)]
struct ShellLog {
    calls: Vec<ShellCall>,
    main_events: Vec<(String, JsonValue)>,
    view_events: Vec<(ViewId, String, JsonValue)>,
}

/// Shell fake recording every [`ViewHost`] call. Clones share the log, so a
/// test can keep one handle while the manager owns another.
#[derive(Clone, Default)]
pub struct RecordingViewHost {
    log: Arc<Mutex<ShellLog>>,
}

impl RecordingViewHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ShellCall> {
        lock(&self.log).calls.clone()
    }

    /// Views in creation order.
    pub fn created_views(&self) -> Vec<ViewId> {
        lock(&self.log)
            .calls
            .iter()
            .filter_map(|call| match call {
                ShellCall::CreateView { view, .. } => Some(*view),
                _ => None,
            })
            .collect()
    }

    pub fn window_closes(&self) -> usize {
        lock(&self.log)
            .calls
            .iter()
            .filter(|call| matches!(call, ShellCall::CloseWindow))
            .count()
    }

    /// Payloads sent to the main surface, in order.
    pub fn main_broadcasts(&self) -> Vec<JsonValue> {
        lock(&self.log)
            .main_events
            .iter()
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    /// Payloads sent to a specific view, in order.
    pub fn view_broadcasts(&self, view: ViewId) -> Vec<JsonValue> {
        lock(&self.log)
            .view_events
            .iter()
            .filter(|(target, _, _)| *target == view)
            .map(|(_, _, payload)| payload.clone())
            .collect()
    }
}

impl ViewHost for RecordingViewHost {
    fn create_view(&mut self, url: &str) -> ViewId {
        let view = ViewId::fresh();
        lock(&self.log).calls.push(ShellCall::CreateView {
            view,
            url: url.to_string(),
        });
        view
    }

    fn attach(&mut self, view: ViewId) {
        lock(&self.log).calls.push(ShellCall::Attach(view));
    }

    fn detach(&mut self, view: ViewId) {
        lock(&self.log).calls.push(ShellCall::Detach(view));
    }

    fn destroy_view(&mut self, view: ViewId) {
        lock(&self.log).calls.push(ShellCall::DestroyView(view));
    }

    fn set_bounds(&mut self, view: ViewId, bounds: Bounds) {
        lock(&self.log).calls.push(ShellCall::SetBounds { view, bounds });
    }

    fn close_window(&mut self) {
        lock(&self.log).calls.push(ShellCall::CloseWindow);
    }

    fn send_to_main(&mut self, event: &str, payload: JsonValue) {
        lock(&self.log)
            .main_events
            .push((event.to_string(), payload));
    }

    fn send_to_view(&mut self, view: ViewId, event: &str, payload: JsonValue) {
        lock(&self.log)
            .view_events
            .push((view, event.to_string(), payload));
    }
}
