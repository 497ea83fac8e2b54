//! WebSocket test server for concurrency testing.
//!
//! Spawns an echo server on an ephemeral loopback port and tears it
//! down gracefully when the test is done.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use wshost::{Config, ConnectionId, Message, Server, ServerDelegate, ServerHandle};

/// Delegate that echoes every data message back to its sender.
struct EchoDelegate {
    handle: OnceLock<ServerHandle>,
}

impl EchoDelegate {
    fn reply(&self, id: ConnectionId, message: Message) {
        if let Some(handle) = self.handle.get() {
            // A send can race the connection closing; echo is best-effort.
            let _ = handle.send(id, message);
        }
    }
}

impl ServerDelegate for EchoDelegate {
    fn on_message(&self, id: ConnectionId, text: String) {
        self.reply(id, Message::text(text));
    }

    fn on_binary(&self, id: ConnectionId, data: Vec<u8>) {
        self.reply(id, Message::binary(data));
    }
}

/// An echo server bound to `127.0.0.1` on a port picked by the OS.
pub struct TestServer {
    server: Server,
}

impl TestServer {
    /// Spawn with default configuration.
    pub async fn spawn() -> (Self, SocketAddr) {
        Self::spawn_with_config(Config::default()).await
    }

    /// Spawn with a custom configuration, e.g. tightened limits.
    pub async fn spawn_with_config(config: Config) -> (Self, SocketAddr) {
        let delegate = Arc::new(EchoDelegate {
            handle: OnceLock::new(),
        });
        let server = Server::new(config, delegate.clone());
        server
            .start_on(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .expect("bind test server");
        delegate
            .handle
            .set(server.handle())
            .unwrap_or_else(|_| panic!("handle already set"));

        let addr = server.local_addr().expect("server is running");
        (Self { server }, addr)
    }

    /// The running server, for assertions on its state.
    pub fn server(&self) -> &Server {
        &self.server
    }

    /// Gracefully stop the server and all its connections.
    pub async fn shutdown(self) {
        self.server.stop().await;
    }
}
