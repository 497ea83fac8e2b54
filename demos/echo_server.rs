//! WebSocket echo server built on the delegate API.
//!
//! Run with: cargo run --example echo_server
//! Then connect with any WebSocket client on ws://127.0.0.1:9001

use std::error::Error;
use std::sync::{Arc, OnceLock};

use tracing_subscriber::EnvFilter;

use wshost::{
    CloseReason, Config, ConnectionId, Message, Server, ServerDelegate, ServerHandle,
};

const PORT: u16 = 9001;

/// Echoes every data message back to the connection it came from.
struct EchoDelegate {
    handle: OnceLock<ServerHandle>,
}

impl EchoDelegate {
    fn new() -> Self {
        Self {
            handle: OnceLock::new(),
        }
    }

    fn reply(&self, id: ConnectionId, message: Message) {
        let Some(handle) = self.handle.get() else {
            return;
        };
        if let Err(e) = handle.send(id, message) {
            tracing::warn!(%id, error = %e, "echo failed");
        }
    }
}

impl ServerDelegate for EchoDelegate {
    fn on_message(&self, id: ConnectionId, text: String) {
        tracing::info!(%id, len = text.len(), "text received");
        self.reply(id, Message::text(text));
    }

    fn on_binary(&self, id: ConnectionId, data: Vec<u8>) {
        tracing::info!(%id, len = data.len(), "binary received");
        self.reply(id, Message::binary(data));
    }

    fn on_connection_opened(&self, id: ConnectionId, path: &str) {
        tracing::info!(%id, path, "connection opened");
    }

    fn on_connection_closed(&self, id: ConnectionId, reason: CloseReason) {
        tracing::info!(%id, ?reason, "connection closed");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let delegate = Arc::new(EchoDelegate::new());
    let server = Server::new(Config::default(), delegate.clone());
    let _ = delegate.handle.set(server.handle());

    server.start(PORT).await?;
    tracing::info!(port = PORT, "echo server listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    server.stop().await;
    Ok(())
}
