//! Initiator side of the boundary.
//!
//! # Message Flow
//!
//! 1. Surface code calls [`BridgeClient::call`] with an action name and payload
//! 2. The client registers a settle token and sends a request envelope
//! 3. The caller suspends on the token's receiver
//! 4. The reply pump ([`BridgeClient::run`]) receives events from the transport
//! 5. Events whose name parses as a reply topic settle the matching token
//! 6. Everything else is a broadcast and is forwarded to the broadcast stream

use std::sync::Arc;

use graphdock_protocol::{ErrorPayload, EventEnvelope, ReplyOutcome, ReplyTopic, RequestEnvelope, WireMessage};
use serde_json::Value as JsonValue;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use crate::correlation::PendingReplies;
use crate::error::{BridgeError, Result};
use crate::transport::{Transport, TransportParts, TransportReceiver};

pub struct BridgeClient {
    pending: PendingReplies,
    sender: Mutex<Box<dyn Transport>>,
    // Taken once by run().
    inbound: Mutex<Option<Inbound>>,
    broadcasts: mpsc::UnboundedSender<EventEnvelope>,
}

struct Inbound {
    receiver: Box<dyn TransportReceiver>,
    message_rx: mpsc::UnboundedReceiver<JsonValue>,
}

impl BridgeClient {
    /// Creates a client over the given transport.
    ///
    /// Returns the client and the stream of broadcasts (pushes not correlated
    /// to any request, e.g. the `tabs` snapshot).
    pub fn new(parts: TransportParts) -> (Arc<Self>, mpsc::UnboundedReceiver<EventEnvelope>) {
        let (broadcast_tx, broadcast_rx) = mpsc::unbounded_channel();
        let client = Arc::new(Self {
            pending: PendingReplies::new(),
            sender: Mutex::new(parts.sender),
            inbound: Mutex::new(Some(Inbound {
                receiver: parts.receiver,
                message_rx: parts.message_rx,
            })),
            broadcasts: broadcast_tx,
        });
        (client, broadcast_rx)
    }

    /// Sends a named action and awaits the correlated reply.
    ///
    /// Concurrent calls never interfere, even for the same action name:
    /// correlation is by key, never by action. An error reply rejects with the
    /// original payload intact. There is no timeout; a handler that never
    /// replies suspends the caller until the transport closes.
    pub async fn call(&self, action: &str, payload: JsonValue) -> Result<JsonValue> {
        let (key, reply_rx) = self.pending.register();
        let request = RequestEnvelope {
            action: action.to_string(),
            key,
            payload,
        };
        let message = serde_json::to_value(&request)?;

        if let Err(err) = self.sender.lock().await.send(message).await {
            self.pending.forget(key);
            return Err(err);
        }
        debug!(target = "graphdock.bridge", action, %key, "request sent");

        match reply_rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(BridgeError::Remote(error)),
            Err(_) => Err(BridgeError::ChannelClosed),
        }
    }

    /// Number of requests awaiting a reply. Entries for handlers that never
    /// reply stay here until process exit.
    pub fn in_flight(&self) -> usize {
        self.pending.in_flight()
    }

    /// Runs the reply pump until the transport closes. Call once, from a
    /// spawned task.
    pub async fn run(&self) {
        let Some(inbound) = self.inbound.lock().await.take() else {
            warn!(target = "graphdock.bridge", "client pump started twice; ignoring");
            return;
        };
        let Inbound {
            receiver,
            mut message_rx,
        } = inbound;

        let receiver_handle = tokio::spawn(async move {
            if let Err(err) = receiver.run().await {
                warn!(target = "graphdock.bridge", error = %err, "transport receiver failed");
            }
        });

        while let Some(message) = message_rx.recv().await {
            match serde_json::from_value::<WireMessage>(message.clone()) {
                Ok(WireMessage::Event(event)) => self.dispatch_event(event),
                Ok(WireMessage::Request(request)) => {
                    warn!(
                        target = "graphdock.bridge",
                        action = %request.action,
                        "initiator received a request envelope; dropping"
                    );
                }
                Err(err) => {
                    warn!(target = "graphdock.bridge", error = %err, message = %message, "unparseable message");
                }
            }
        }

        debug!(target = "graphdock.bridge", "client pump ended (transport closed)");
        let _ = receiver_handle.await;
    }

    fn dispatch_event(&self, event: EventEnvelope) {
        match ReplyTopic::parse(&event.event) {
            Some(topic) => match topic.outcome {
                ReplyOutcome::Success => self.pending.resolve(topic.key, event.payload),
                ReplyOutcome::Error => self
                    .pending
                    .reject(topic.key, ErrorPayload::from_value(event.payload)),
            },
            None => {
                // Broadcast; receiver may be gone during shutdown.
                let _ = self.broadcasts.send(event);
            }
        }
    }
}
