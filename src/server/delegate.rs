//! Consumer callback surface.

use crate::message::CloseFrame;

/// Identifier for one accepted connection.
///
/// Ids are assigned monotonically per server and never reused, so a
/// stale id fails lookup instead of reaching a different connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw numeric value, for logging and error reporting.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Why a connection ended, as reported to
/// [`ServerDelegate::on_connection_closed`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CloseReason {
    /// The peer started the close handshake; its close frame, if it
    /// carried a code.
    Peer(Option<CloseFrame>),
    /// This side started the close handshake, on shutdown, idle timeout,
    /// or after a protocol error. Carries the frame that was sent.
    Local(CloseFrame),
    /// The transport ended without a close handshake.
    Transport,
}

/// Callbacks delivered by a [`Server`](crate::Server) to its consumer.
///
/// One implementation serves every connection; per-connection calls are
/// never concurrent with each other and arrive in wire order, so an
/// implementation only needs interior synchronization for state shared
/// across connections. Callbacks run on the connection's task, so long
/// blocking work should be handed off rather than done inline.
///
/// Only [`on_message`](ServerDelegate::on_message) is required; the
/// lifecycle hooks default to no-ops.
pub trait ServerDelegate: Send + Sync + 'static {
    /// A complete text message arrived.
    fn on_message(&self, id: ConnectionId, text: String);

    /// A complete binary message arrived.
    fn on_binary(&self, id: ConnectionId, data: Vec<u8>) {
        let _ = (id, data);
    }

    /// The opening handshake finished and the connection is open.
    ///
    /// `path` is the request-target from the handshake, uninterpreted.
    fn on_connection_opened(&self, id: ConnectionId, path: &str) {
        let _ = (id, path);
    }

    /// The connection left the server, called exactly once per opened
    /// connection.
    fn on_connection_closed(&self, id: ConnectionId, reason: CloseReason) {
        let _ = (id, reason);
    }
}
