use std::net::SocketAddr;

use anyhow::Context;
use chat_server::ChatServer;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::{self, Message};

/// The WebSocket front door of the chat server.
///
/// Accepts WebSocket connections and turns each one into a chat
/// [`Session`](chat_server::Session): inbound text frames are handed to the
/// session, outbound events are written by the session's mailbox.
pub struct Gateway {
    listen_addr: SocketAddr,
    server: ChatServer,
}

impl Gateway {
    pub fn new(listen_addr: SocketAddr, server: ChatServer) -> Self {
        Self {
            listen_addr,
            server,
        }
    }

    /// Bind to the configured address and serve until the task is dropped.
    pub async fn run(&self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.listen_addr)
            .await
            .with_context(|| format!("failed to bind {}", self.listen_addr))?;
        self.serve(listener).await
    }

    /// Accept connections on an already-bound listener. Each connection is
    /// handled in its own Tokio task.
    pub async fn serve(&self, listener: TcpListener) -> anyhow::Result<()> {
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, "ws-gateway listening");

        loop {
            let (stream, remote_addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    tracing::warn!(%err, "failed to accept connection");
                    continue;
                }
            };
            let server = self.server.clone();

            tokio::spawn(async move {
                if let Err(err) = handle_connection(stream, remote_addr, server).await {
                    tracing::debug!(%remote_addr, %err, "connection handler error");
                }
            });
        }
    }
}

/// Handle a single TCP connection from handshake through teardown.
async fn handle_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    server: ChatServer,
) -> anyhow::Result<()> {
    let ws = tokio_tungstenite::accept_async(stream)
        .await
        .context("websocket handshake failed")?;

    let (write, mut read) = ws.split();

    // The mailbox speaks `String`; wrap each frame as a text message.
    let sink = write.with(|text: String| async move {
        Ok::<_, tungstenite::Error>(Message::Text(text.into()))
    });

    let mut session = server.connect(sink);
    tracing::info!(subscriber_id = %session.id(), %remote_addr, "websocket client connected");

    while let Some(frame) = read.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                session.handle_inbound(text.as_str());
            }
            Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                Ok(text) => {
                    session.handle_inbound(text);
                }
                Err(_) => {
                    tracing::debug!(
                        subscriber_id = %session.id(),
                        len = bytes.len(),
                        "ignoring non-UTF-8 binary frame"
                    );
                }
            },
            Ok(Message::Close(_)) => break,
            // Ping/pong are answered by tungstenite itself.
            Ok(_) => {}
            Err(err) => {
                tracing::debug!(subscriber_id = %session.id(), %err, "read error, closing session");
                break;
            }
        }
    }

    tracing::info!(subscriber_id = %session.id(), %remote_addr, "websocket client disconnected");
    session.disconnect();

    Ok(())
}
