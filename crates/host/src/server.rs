//! Unix-socket host server.
//!
//! Surfaces connect to a socket and speak newline-delimited JSON envelopes;
//! each connection gets its own [`BridgeServer`] over the shared router, so
//! per-surface dispatch stays isolated while all handlers share one
//! [`HostState`]. Tab mutations flow back out through [`ShellLink`]: the
//! manager's view-host calls become [`ShellEvent`]s on a channel, and a fanout
//! task pushes each broadcast to every connected surface. Window close drains
//! the session pool and stops the server.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde_json::Value as JsonValue;
use tokio::net::UnixListener;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use graphdock_bridge::{Broadcaster, BridgeServer, line_transport};

use crate::actions::{HostState, build_router};
use crate::connections::ConnectionStore;
use crate::driver::GraphDriver;
use crate::sessions::SessionRegistry;
use crate::storage::JsonStore;
use crate::tabs::{Bounds, TabManager, ViewHost, ViewId};

/// Shell-bound effect emitted by the tab manager.
#[derive(Debug)]
pub enum ShellEvent {
    Broadcast { event: String, payload: JsonValue },
    CloseWindow,
}

/// [`ViewHost`] that forwards window-level effects onto a channel.
///
/// Socket surfaces have no embedded per-tab renderer, so view lifecycle calls
/// reduce to id bookkeeping; broadcasts and window close are the effects that
/// cross the boundary.
pub struct ShellLink {
    tx: mpsc::UnboundedSender<ShellEvent>,
}

impl ShellLink {
    pub fn new(tx: mpsc::UnboundedSender<ShellEvent>) -> Self {
        Self { tx }
    }
}

impl ViewHost for ShellLink {
    fn create_view(&mut self, url: &str) -> ViewId {
        let view = ViewId::fresh();
        debug!(target = "graphdock.shell", %view, url, "view created");
        view
    }

    fn attach(&mut self, view: ViewId) {
        debug!(target = "graphdock.shell", %view, "view attached");
    }

    fn detach(&mut self, view: ViewId) {
        debug!(target = "graphdock.shell", %view, "view detached");
    }

    fn destroy_view(&mut self, view: ViewId) {
        debug!(target = "graphdock.shell", %view, "view destroyed");
    }

    fn set_bounds(&mut self, view: ViewId, bounds: Bounds) {
        debug!(target = "graphdock.shell", %view, ?bounds, "view bounds updated");
    }

    fn close_window(&mut self) {
        let _ = self.tx.send(ShellEvent::CloseWindow);
    }

    fn send_to_main(&mut self, event: &str, payload: JsonValue) {
        let _ = self.tx.send(ShellEvent::Broadcast {
            event: event.to_string(),
            payload,
        });
    }

    fn send_to_view(&mut self, view: ViewId, event: &str, _payload: JsonValue) {
        // Per-view surfaces receive the same snapshot via the main fanout.
        debug!(target = "graphdock.shell", %view, event, "view-targeted event folded into fanout");
    }
}

/// Binds the socket and serves until the last tab closes the window.
pub async fn serve(socket: &Path, storage_dir: &Path, driver: Arc<dyn GraphDriver>) -> anyhow::Result<()> {
    let (shell_tx, mut shell_rx) = mpsc::unbounded_channel();

    let storage = Arc::new(JsonStore::new(storage_dir));
    let sessions = Arc::new(SessionRegistry::new(
        driver,
        ConnectionStore::new(Arc::clone(&storage)),
    ));
    let tabs = Arc::new(Mutex::new(TabManager::new(Box::new(ShellLink::new(
        shell_tx,
    )))));
    let router = Arc::new(build_router(HostState {
        storage,
        sessions: Arc::clone(&sessions),
        tabs,
    }));

    match std::fs::remove_file(socket) {
        Ok(()) => debug!(target = "graphdock.server", path = %socket.display(), "removed stale socket"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err).with_context(|| format!("removing stale socket {}", socket.display()));
        }
    }
    let listener = UnixListener::bind(socket)
        .with_context(|| format!("binding {}", socket.display()))?;
    info!(target = "graphdock.server", path = %socket.display(), "listening");

    let surfaces: Arc<Mutex<Vec<Broadcaster>>> = Arc::default();

    let mut fanout = tokio::spawn({
        let surfaces = Arc::clone(&surfaces);
        async move {
            while let Some(event) = shell_rx.recv().await {
                match event {
                    ShellEvent::Broadcast { event, payload } => {
                        let mut list = surfaces.lock().await;
                        let mut alive = Vec::with_capacity(list.len());
                        for surface in list.drain(..) {
                            match surface.broadcast(&event, payload.clone()).await {
                                Ok(()) => alive.push(surface),
                                Err(err) => {
                                    debug!(target = "graphdock.server", error = %err, "dropping disconnected surface");
                                }
                            }
                        }
                        *list = alive;
                    }
                    ShellEvent::CloseWindow => {
                        info!(target = "graphdock.server", "window closed, shutting down");
                        break;
                    }
                }
            }
        }
    });

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _addr)) => {
                    debug!(target = "graphdock.server", "surface connected");
                    let (read_half, write_half) = stream.into_split();
                    let server =
                        BridgeServer::new(Arc::clone(&router), line_transport(write_half, read_half));
                    surfaces.lock().await.push(server.broadcaster());
                    tokio::spawn(server.serve());
                }
                Err(err) => {
                    warn!(target = "graphdock.server", error = %err, "accept failed");
                }
            },
            _ = &mut fanout => break,
        }
    }

    sessions.close_all().await;
    let _ = std::fs::remove_file(socket);
    Ok(())
}
