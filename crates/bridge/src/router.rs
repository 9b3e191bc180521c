//! Handler side of the boundary.
//!
//! An [`ActionRouter`] maps action names to async handlers. A [`BridgeServer`]
//! drives one transport with one router: each incoming request envelope is
//! dispatched fire-and-forget (the serve loop never blocks on a handler), and
//! every handler outcome - success, failure, or panic - is converted to a reply
//! envelope. Concurrent requests to the same action are processed
//! independently and may complete out of order relative to send order; handler
//! authors must not assume mutual exclusion across calls to the same action.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use graphdock_protocol::{CorrelationKey, ErrorPayload, EventEnvelope, RequestEnvelope, WireMessage};
use serde_json::Value as JsonValue;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use crate::transport::{Transport, TransportParts, TransportReceiver};

/// What a handler resolves to; failures become `.error` replies.
pub type HandlerReply = std::result::Result<JsonValue, ErrorPayload>;

type HandlerFuture = Pin<Box<dyn Future<Output = HandlerReply> + Send>>;
type Handler = Arc<dyn Fn(JsonValue) -> HandlerFuture + Send + Sync>;

/// Registry of named action handlers.
#[derive(Default)]
pub struct ActionRouter {
    handlers: HashMap<String, Handler>,
}

impl ActionRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for an action name, replacing any previous one.
    pub fn register<F, Fut>(&mut self, action: &str, handler: F)
    where
        F: Fn(JsonValue) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerReply> + Send + 'static,
    {
        self.handlers
            .insert(action.to_string(), Arc::new(move |payload| Box::pin(handler(payload))));
    }

    fn get(&self, action: &str) -> Option<Handler> {
        self.handlers.get(action).cloned()
    }

    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

/// Clonable sending handle for replies and broadcasts.
#[derive(Clone)]
pub struct Broadcaster {
    sender: Arc<Mutex<Box<dyn Transport>>>,
}

impl Broadcaster {
    /// Pushes an uncorrelated event to the surface on the other end.
    pub async fn broadcast(&self, event: &str, payload: JsonValue) -> crate::Result<()> {
        self.send(EventEnvelope::broadcast(event, payload)).await
    }

    async fn send(&self, envelope: EventEnvelope) -> crate::Result<()> {
        let message = serde_json::to_value(&envelope)?;
        self.sender.lock().await.send(message).await
    }
}

/// Serves one router over one transport.
pub struct BridgeServer {
    router: Arc<ActionRouter>,
    sender: Broadcaster,
    receiver: Box<dyn TransportReceiver>,
    message_rx: mpsc::UnboundedReceiver<JsonValue>,
}

impl BridgeServer {
    pub fn new(router: Arc<ActionRouter>, parts: TransportParts) -> Self {
        Self {
            router,
            sender: Broadcaster {
                sender: Arc::new(Mutex::new(parts.sender)),
            },
            receiver: parts.receiver,
            message_rx: parts.message_rx,
        }
    }

    /// Handle for pushing broadcasts to this transport's surface.
    pub fn broadcaster(&self) -> Broadcaster {
        self.sender.clone()
    }

    /// Runs the dispatch loop until the transport closes.
    pub async fn serve(self) {
        let Self {
            router,
            sender,
            receiver,
            mut message_rx,
        } = self;

        let receiver_handle = tokio::spawn(async move {
            if let Err(err) = receiver.run().await {
                warn!(target = "graphdock.bridge", error = %err, "transport receiver failed");
            }
        });

        while let Some(message) = message_rx.recv().await {
            match serde_json::from_value::<WireMessage>(message.clone()) {
                Ok(WireMessage::Request(request)) => dispatch(&router, &sender, request),
                Ok(WireMessage::Event(event)) => {
                    warn!(
                        target = "graphdock.bridge",
                        event = %event.event,
                        "handler side received an event envelope; dropping"
                    );
                }
                Err(err) => {
                    warn!(target = "graphdock.bridge", error = %err, message = %message, "unparseable message");
                }
            }
        }

        debug!(target = "graphdock.bridge", "serve loop ended (transport closed)");
        let _ = receiver_handle.await;
    }
}

fn dispatch(router: &Arc<ActionRouter>, sender: &Broadcaster, request: RequestEnvelope) {
    let RequestEnvelope { action, key, payload } = request;

    let Some(handler) = router.get(&action) else {
        // Matches the original host runtime: an action nobody listens to
        // never replies, and the initiator's pending entry leaks.
        warn!(target = "graphdock.bridge", %action, "no handler registered; request will never be answered");
        return;
    };

    let sender = sender.clone();
    let handler_task = tokio::spawn(handler(payload));
    tokio::spawn(async move {
        let outcome = match handler_task.await {
            Ok(outcome) => outcome,
            Err(err) => Err(ErrorPayload::internal(format!(
                "handler for '{action}' crashed: {err}"
            ))),
        };
        send_reply(&sender, &action, key, outcome).await;
    });
}

async fn send_reply(sender: &Broadcaster, action: &str, key: CorrelationKey, outcome: HandlerReply) {
    let envelope = match &outcome {
        Ok(value) => EventEnvelope::success(action, key, value.clone()),
        Err(error) => EventEnvelope::error(action, key, error),
    };
    match sender.send(envelope).await {
        Ok(()) => debug!(target = "graphdock.bridge", action, %key, ok = outcome.is_ok(), "reply sent"),
        Err(err) => warn!(target = "graphdock.bridge", action, %key, error = %err, "failed to send reply"),
    }
}
