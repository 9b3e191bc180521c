//! Transport seam between the dispatch layer and the host runtime.
//!
//! A transport is a bidirectional channel carrying JSON values: [`Transport`]
//! sends, [`TransportReceiver`] pumps inbound messages into the `message_rx`
//! queue the connection loop consumes. Concrete implementations: an in-memory
//! [`duplex`] pair, a newline-delimited [`line_transport`] over any async
//! stream, and the [`fake`](crate::fake) transport for tests.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value as JsonValue;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::{BridgeError, Result};

/// Sending half of a transport.
pub trait Transport: Send {
    fn send(&mut self, message: JsonValue)
    -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Receiving half of a transport. `run` pumps inbound messages until the
/// underlying channel closes.
pub trait TransportReceiver: Send {
    fn run(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>>;
}

/// The pieces a connection needs: a sender, a receiver pump, and the queue the
/// pump feeds.
pub struct TransportParts {
    pub sender: Box<dyn Transport>,
    pub receiver: Box<dyn TransportReceiver>,
    pub message_rx: mpsc::UnboundedReceiver<JsonValue>,
}

/// Creates two directly linked in-memory transports.
///
/// Whatever one side sends appears on the other side's `message_rx`. Used to
/// wire a [`BridgeClient`](crate::BridgeClient) to a
/// [`BridgeServer`](crate::BridgeServer) inside one process.
pub fn duplex() -> (TransportParts, TransportParts) {
    let (a_to_b_tx, a_to_b_rx) = mpsc::unbounded_channel();
    let (b_to_a_tx, b_to_a_rx) = mpsc::unbounded_channel();

    let a = TransportParts {
        sender: Box::new(ChannelTransport { tx: a_to_b_tx }),
        receiver: Box::new(IdleReceiver),
        message_rx: b_to_a_rx,
    };
    let b = TransportParts {
        sender: Box::new(ChannelTransport { tx: b_to_a_tx }),
        receiver: Box::new(IdleReceiver),
        message_rx: a_to_b_rx,
    };
    (a, b)
}

struct ChannelTransport {
    tx: mpsc::UnboundedSender<JsonValue>,
}

impl Transport for ChannelTransport {
    fn send(
        &mut self,
        message: JsonValue,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let result = self
            .tx
            .send(message)
            .map_err(|_| BridgeError::Transport("peer dropped".to_string()));
        Box::pin(async move { result })
    }
}

/// Receiver for transports whose inbound side is wired directly; nothing to
/// pump.
struct IdleReceiver;

impl TransportReceiver for IdleReceiver {
    fn run(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
        Box::pin(async { Ok(()) })
    }
}

/// Creates a transport framing one JSON value per line over an async stream
/// pair, e.g. the two halves of a Unix socket.
pub fn line_transport<W, R>(writer: W, reader: R) -> TransportParts
where
    W: AsyncWrite + Unpin + Send + 'static,
    R: AsyncRead + Unpin + Send + 'static,
{
    let (message_tx, message_rx) = mpsc::unbounded_channel();
    TransportParts {
        sender: Box::new(LineSender { writer }),
        receiver: Box::new(LineReceiver {
            reader: BufReader::new(reader),
            message_tx,
        }),
        message_rx,
    }
}

struct LineSender<W> {
    writer: W,
}

impl<W> Transport for LineSender<W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn send(
        &mut self,
        message: JsonValue,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let mut line = serde_json::to_string(&message)?;
            line.push('\n');
            self.writer.write_all(line.as_bytes()).await?;
            self.writer.flush().await?;
            Ok(())
        })
    }
}

struct LineReceiver<R> {
    reader: BufReader<R>,
    message_tx: mpsc::UnboundedSender<JsonValue>,
}

impl<R> TransportReceiver for LineReceiver<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    fn run(mut self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
        Box::pin(async move {
            let mut line = String::new();
            loop {
                line.clear();
                let read = self.reader.read_line(&mut line).await?;
                if read == 0 {
                    return Ok(());
                }
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match serde_json::from_str::<JsonValue>(trimmed) {
                    Ok(message) => {
                        if self.message_tx.send(message).is_err() {
                            return Ok(());
                        }
                    }
                    Err(err) => {
                        warn!(target = "graphdock.bridge", error = %err, "dropping unparseable frame");
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn duplex_delivers_both_ways() {
        let (mut a, mut b) = duplex();
        a.sender.send(json!({"from": "a"})).await.unwrap();
        b.sender.send(json!({"from": "b"})).await.unwrap();
        assert_eq!(b.message_rx.recv().await.unwrap(), json!({"from": "a"}));
        assert_eq!(a.message_rx.recv().await.unwrap(), json!({"from": "b"}));
    }

    #[tokio::test]
    async fn line_transport_round_trips_frames() {
        let (client_side, server_side) = tokio::io::duplex(1024);
        let (client_read, client_write) = tokio::io::split(client_side);
        let (server_read, server_write) = tokio::io::split(server_side);

        let mut client = line_transport(client_write, client_read);
        let mut server = line_transport(server_write, server_read);

        tokio::spawn(client.receiver.run());
        tokio::spawn(server.receiver.run());

        client.sender.send(json!({"n": 1})).await.unwrap();
        client.sender.send(json!({"n": 2})).await.unwrap();
        server.sender.send(json!({"ack": true})).await.unwrap();

        assert_eq!(server.message_rx.recv().await.unwrap(), json!({"n": 1}));
        assert_eq!(server.message_rx.recv().await.unwrap(), json!({"n": 2}));
        assert_eq!(client.message_rx.recv().await.unwrap(), json!({"ack": true}));
    }

    #[tokio::test]
    async fn line_receiver_skips_garbage_frames() {
        let (client_side, server_side) = tokio::io::duplex(1024);
        let (_client_read, mut client_write) = tokio::io::split(client_side);
        let (server_read, server_write) = tokio::io::split(server_side);

        let mut server = line_transport(server_write, server_read);
        tokio::spawn(server.receiver.run());

        client_write.write_all(b"not json\n{\"ok\":1}\n").await.unwrap();
        client_write.flush().await.unwrap();

        assert_eq!(server.message_rx.recv().await.unwrap(), json!({"ok": 1}));
    }
}
