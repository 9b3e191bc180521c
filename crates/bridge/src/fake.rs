//! Fake transport for unit testing correlation and dispatch.
//!
//! Provides an in-memory transport plus a controller for injecting inbound
//! messages and inspecting what the connection sent, without any real process
//! boundary.
//!
//! # Example
//!
//! ```ignore
//! let (parts, controller) = FakeTransportBuilder::new().build();
//! let (client, _broadcasts) = BridgeClient::new(parts);
//!
//! tokio::spawn({
//!     let pump = Arc::clone(&client);
//!     async move { pump.run().await }
//! });
//!
//! let fut = client.call("getItem", json!({"key": "connections"}));
//! controller.inject_success("getItem", key, json!([]));
//! let result = fut.await?;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use graphdock_protocol::{CorrelationKey, ErrorPayload, EventEnvelope, RequestEnvelope};
use serde_json::Value as JsonValue;
use tokio::sync::{Mutex, mpsc};

use crate::Result;
use crate::transport::{Transport, TransportParts, TransportReceiver};

/// Builder for creating fake transport instances.
#[derive(Default)]
pub struct FakeTransportBuilder {}

impl FakeTransportBuilder {
    pub fn new() -> Self {
        Self {}
    }

    /// Builds the fake transport and returns both parts and a controller.
    pub fn build(self) -> (TransportParts, FakeTransportController) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let sent_messages = Arc::new(Mutex::new(Vec::new()));

        let parts = TransportParts {
            sender: Box::new(FakeTransportSender {
                sent: Arc::clone(&sent_messages),
            }),
            receiver: Box::new(FakeTransportReceiver {
                inbound_rx,
                message_tx,
            }),
            message_rx,
        };

        let controller = FakeTransportController {
            inbound_tx,
            sent: sent_messages,
        };

        (parts, controller)
    }
}

/// Controller for injecting inbound messages and inspecting sent messages.
pub struct FakeTransportController {
    inbound_tx: mpsc::UnboundedSender<JsonValue>,
    sent: Arc<Mutex<Vec<JsonValue>>>,
}

impl FakeTransportController {
    /// Injects a raw JSON message into the connection.
    pub fn inject(&self, message: JsonValue) {
        let _ = self.inbound_tx.send(message);
    }

    /// Injects a request envelope, as a surface would send one.
    pub fn inject_request(&self, action: &str, key: CorrelationKey, payload: JsonValue) {
        let request = RequestEnvelope {
            action: action.to_string(),
            key,
            payload,
        };
        self.inject(serde_json::to_value(&request).unwrap());
    }

    /// Injects a success reply for the given action and key.
    pub fn inject_success(&self, action: &str, key: CorrelationKey, payload: JsonValue) {
        let envelope = EventEnvelope::success(action, key, payload);
        self.inject(serde_json::to_value(&envelope).unwrap());
    }

    /// Injects an error reply.
    pub fn inject_error(&self, action: &str, key: CorrelationKey, code: &str, message: &str) {
        let envelope = EventEnvelope::error(action, key, &ErrorPayload::new(code, message));
        self.inject(serde_json::to_value(&envelope).unwrap());
    }

    /// Injects an uncorrelated broadcast event.
    pub fn inject_broadcast(&self, event: &str, payload: JsonValue) {
        let envelope = EventEnvelope::broadcast(event, payload);
        self.inject(serde_json::to_value(&envelope).unwrap());
    }

    /// Takes all sent messages, clearing the buffer.
    pub async fn take_sent(&self) -> Vec<JsonValue> {
        std::mem::take(&mut *self.sent.lock().await)
    }

    /// Waits until at least `count` messages have been sent, then takes them.
    ///
    /// Panics after two seconds; a hung send is a test failure, not a hang.
    pub async fn wait_for_sent(&self, count: usize) -> Vec<JsonValue> {
        for _ in 0..200 {
            {
                let mut sent = self.sent.lock().await;
                if sent.len() >= count {
                    return std::mem::take(&mut *sent);
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {count} sent message(s)");
    }
}

struct FakeTransportSender {
    sent: Arc<Mutex<Vec<JsonValue>>>,
}

impl Transport for FakeTransportSender {
    fn send(
        &mut self,
        message: JsonValue,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let sent = Arc::clone(&self.sent);
        Box::pin(async move {
            sent.lock().await.push(message);
            Ok(())
        })
    }
}

struct FakeTransportReceiver {
    inbound_rx: mpsc::UnboundedReceiver<JsonValue>,
    message_tx: mpsc::UnboundedSender<JsonValue>,
}

impl TransportReceiver for FakeTransportReceiver {
    fn run(mut self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
        Box::pin(async move {
            while let Some(message) = self.inbound_rx.recv().await {
                if self.message_tx.send(message).is_err() {
                    break;
                }
            }
            Ok(())
        })
    }
}
