//! Listener ownership, the accept loop, and per-connection tasks.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::message::{CloseCode, CloseFrame, Message};
use crate::server::delegate::{CloseReason, ConnectionId, ServerDelegate};
use crate::server::registry::{ConnectionFlags, ConnectionRegistry};

/// WebSocket server engine.
///
/// Owns the listening socket, accepts incoming streams, drives one task
/// per connection through handshake and frame exchange, and forwards
/// every decoded message to the [`ServerDelegate`] supplied at
/// construction. Messages from one connection reach the delegate in
/// arrival order; messages from different connections may arrive
/// concurrently.
///
/// ## Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use wshost::{Config, Server, ServerDelegate, ConnectionId};
///
/// struct Printer;
///
/// impl ServerDelegate for Printer {
///     fn on_message(&self, id: ConnectionId, text: String) {
///         println!("{id}: {text}");
///     }
/// }
///
/// let server = Server::new(Config::default(), Arc::new(Printer));
/// server.start(9001).await?;
/// // ... later
/// server.stop().await;
/// ```
pub struct Server {
    config: Config,
    delegate: Arc<dyn ServerDelegate>,
    registry: Arc<ConnectionRegistry>,
    running: Mutex<Option<Running>>,
}

struct Running {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

impl Server {
    /// Create a server that will report to `delegate`.
    ///
    /// Nothing is bound until [`start`](Server::start).
    #[must_use]
    pub fn new(config: Config, delegate: Arc<dyn ServerDelegate>) -> Self {
        Self {
            config,
            delegate,
            registry: Arc::new(ConnectionRegistry::new()),
            running: Mutex::new(None),
        }
    }

    /// Bind `0.0.0.0:port` and begin accepting connections.
    ///
    /// # Errors
    ///
    /// - `Error::Bind` if the port cannot be bound
    /// - `Error::InvalidState` if the server is already running
    pub async fn start(&self, port: u16) -> Result<()> {
        self.start_on(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
            .await
    }

    /// Bind a specific address and begin accepting connections.
    ///
    /// Binding port 0 picks a free port; [`local_addr`](Server::local_addr)
    /// reports the actual one.
    ///
    /// # Errors
    ///
    /// Same as [`start`](Server::start).
    pub async fn start_on(&self, addr: SocketAddr) -> Result<()> {
        if self.is_running() {
            return Err(Error::InvalidState("server is already running".into()));
        }

        let listener = TcpListener::bind(addr).await.map_err(|e| Error::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;
        let local_addr = listener.local_addr().map_err(|e| Error::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let accept_task = tokio::spawn(accept_loop(
            listener,
            self.config.clone(),
            self.delegate.clone(),
            self.registry.clone(),
            shutdown_rx,
        ));

        let mut guard = self.running.lock().expect("server lock poisoned");
        if guard.is_some() {
            // Lost a start race; tear down the listener we just spawned.
            let _ = shutdown.send(true);
            accept_task.abort();
            return Err(Error::InvalidState("server is already running".into()));
        }
        *guard = Some(Running {
            local_addr,
            shutdown,
            accept_task,
        });

        info!(addr = %local_addr, "server listening");
        Ok(())
    }

    /// Stop accepting, close every connection, and release the listener.
    ///
    /// Sends a going-away close to each open connection and waits up to
    /// the configured grace period for the close handshakes to finish;
    /// stragglers are force-closed silently. Idempotent: calling this on
    /// a stopped server does nothing.
    pub async fn stop(&self) {
        let running = self
            .running
            .lock()
            .expect("server lock poisoned")
            .take();
        let Some(running) = running else {
            return;
        };

        info!(addr = %running.local_addr, "stopping server");
        let _ = running.shutdown.send(true);
        let _ = running.accept_task.await;

        // Force-closed stragglers never ran their own teardown; their
        // consumer is still owed the closed callback.
        for id in self.registry.drain_opened() {
            self.delegate.on_connection_closed(id, CloseReason::Transport);
        }
    }

    /// Enqueue a message to one connection without blocking.
    ///
    /// The message is written by the connection's own task; an I/O
    /// failure after enqueueing terminates that connection and surfaces
    /// through [`ServerDelegate::on_connection_closed`], not here.
    ///
    /// # Errors
    ///
    /// - `Error::ConnectionNotFound` if no connection has this id
    /// - `Error::InvalidState` if the connection is not open
    pub fn send(&self, id: ConnectionId, message: Message) -> Result<()> {
        self.registry.send(id, message)
    }

    /// Enqueue a message to every open connection, best-effort.
    ///
    /// Returns how many connections accepted it.
    pub fn broadcast(&self, message: Message) -> usize {
        self.registry.broadcast(&message)
    }

    /// A cloneable handle for sending from outside the server's owner,
    /// e.g. from inside the delegate.
    #[must_use]
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            registry: self.registry.clone(),
        }
    }

    /// The bound address while running, `None` otherwise.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running
            .lock()
            .expect("server lock poisoned")
            .as_ref()
            .map(|running| running.local_addr)
    }

    /// Whether the server is currently accepting connections.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .expect("server lock poisoned")
            .is_some()
    }

    /// Number of tracked connections, including ones still in the
    /// handshake.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }
}

impl Drop for Server {
    /// Hard stop. [`stop`](Server::stop) is the graceful path; a server
    /// dropped while running aborts its tasks without the close
    /// handshake.
    fn drop(&mut self) {
        if let Ok(mut guard) = self.running.lock() {
            if let Some(running) = guard.take() {
                let _ = running.shutdown.send(true);
                running.accept_task.abort();
            }
        }
    }
}

/// Sending side of a [`Server`], detached from its lifecycle.
///
/// Lets the consumer push messages out without holding the server
/// itself, most commonly from inside the [`ServerDelegate`] to answer
/// an inbound message.
#[derive(Clone)]
pub struct ServerHandle {
    registry: Arc<ConnectionRegistry>,
}

impl ServerHandle {
    /// Same contract as [`Server::send`].
    ///
    /// # Errors
    ///
    /// - `Error::ConnectionNotFound` if no connection has this id
    /// - `Error::InvalidState` if the connection is not open
    pub fn send(&self, id: ConnectionId, message: Message) -> Result<()> {
        self.registry.send(id, message)
    }

    /// Same contract as [`Server::broadcast`].
    pub fn broadcast(&self, message: Message) -> usize {
        self.registry.broadcast(&message)
    }
}

/// Accept incoming streams until shutdown, then wait out the grace
/// period before aborting connections that have not finished closing.
async fn accept_loop(
    listener: TcpListener,
    config: Config,
    delegate: Arc<dyn ServerDelegate>,
    registry: Arc<ConnectionRegistry>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let (id, commands, flags) = registry.register();
                    debug!(%id, %peer, "connection accepted");
                    tasks.spawn(run_connection(
                        id,
                        stream,
                        config.clone(),
                        delegate.clone(),
                        registry.clone(),
                        commands,
                        flags,
                        shutdown.clone(),
                    ));
                }
                Err(e) => warn!(error = %e, "accept failed"),
            },
        }
    }
    drop(listener);

    let drain = async {
        while tasks.join_next().await.is_some() {}
    };
    if tokio::time::timeout(config.timeouts.close_grace, drain)
        .await
        .is_err()
    {
        debug!(stragglers = tasks.len(), "close grace elapsed, aborting");
        tasks.shutdown().await;
    }
}

/// Drive one connection from handshake to teardown.
///
/// Owns the stream exclusively; the rest of the server reaches it only
/// through the command channel and the shutdown signal.
#[allow(clippy::too_many_arguments)]
async fn run_connection<T>(
    id: ConnectionId,
    io: T,
    config: Config,
    delegate: Arc<dyn ServerDelegate>,
    registry: Arc<ConnectionRegistry>,
    mut commands: mpsc::UnboundedReceiver<Message>,
    flags: Arc<ConnectionFlags>,
    mut shutdown: watch::Receiver<bool>,
) where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let accepted = tokio::time::timeout(config.timeouts.handshake, Connection::accept(io, &config));
    let (mut conn, request) = match accepted.await {
        Ok(Ok(accepted)) => accepted,
        Ok(Err(e)) => {
            debug!(%id, error = %e, "handshake rejected");
            registry.remove(id);
            return;
        }
        Err(_) => {
            debug!(%id, "handshake timed out");
            registry.remove(id);
            return;
        }
    };

    flags.mark_open();
    delegate.on_connection_opened(id, &request.path);

    let mut local_close: Option<CloseFrame> = None;
    let mut commands_open = true;

    let reason = loop {
        tokio::select! {
            _ = shutdown.changed(), if local_close.is_none() => {
                let frame = CloseFrame::new(CloseCode::GoingAway, "server shutting down");
                flags.mark_not_open();
                if let Err(e) = conn.close(frame.code, &frame.reason).await {
                    debug!(%id, error = %e, "close frame lost to transport");
                    break CloseReason::Transport;
                }
                // Keep reading until the peer echoes the close.
                local_close = Some(frame);
            }

            cmd = commands.recv(), if commands_open => match cmd {
                Some(message) => match conn.send(message).await {
                    Ok(()) => {}
                    // Raced with a close; the caller was told the send
                    // was accepted, dropping it here is the documented
                    // best-effort outcome.
                    Err(Error::InvalidState(_)) => {}
                    Err(e) => {
                        debug!(%id, error = %e, "outbound write failed");
                        flags.mark_not_open();
                        break CloseReason::Transport;
                    }
                },
                None => commands_open = false,
            },

            result = tokio::time::timeout(config.timeouts.idle, conn.recv()) => match result {
                Err(_) => {
                    debug!(%id, "idle timeout");
                    let frame = CloseFrame::new(CloseCode::GoingAway, "idle timeout");
                    flags.mark_not_open();
                    let _ = conn.close(frame.code, &frame.reason).await;
                    break CloseReason::Local(frame);
                }
                Ok(Ok(Some(Message::Text(text)))) => delegate.on_message(id, text),
                Ok(Ok(Some(Message::Binary(data)))) => delegate.on_binary(id, data),
                Ok(Ok(Some(Message::Ping(_) | Message::Pong(_)))) => {}
                Ok(Ok(Some(Message::Close(frame)))) => {
                    flags.mark_not_open();
                    break match local_close.take() {
                        Some(sent) => CloseReason::Local(sent),
                        None => CloseReason::Peer(frame),
                    };
                }
                Ok(Ok(None)) => break CloseReason::Transport,
                Ok(Err(e)) => {
                    flags.mark_not_open();
                    break match e.close_code() {
                        Some(code) => {
                            warn!(%id, error = %e, "closing on protocol violation");
                            let frame = CloseFrame::new(CloseCode::from_u16(code), "");
                            let _ = conn.close(frame.code, &frame.reason).await;
                            CloseReason::Local(frame)
                        }
                        None => {
                            debug!(%id, error = %e, "transport ended");
                            CloseReason::Transport
                        }
                    };
                }
            },
        }
    };

    // A write the select cancelled mid-frame may still be buffered.
    let _ = conn.flush().await;
    flags.mark_not_open();
    registry.remove(id);
    delegate.on_connection_closed(id, reason);
    debug!(%id, "connection closed");
}
