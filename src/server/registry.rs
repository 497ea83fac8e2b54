//! Synchronized registry of active connections.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::message::Message;
use crate::server::delegate::ConnectionId;

/// Lifecycle flags shared between a connection task and the registry.
///
/// `open` gates the send API: true only between handshake completion and
/// the start of the close sequence. `opened` latches once the handshake
/// completes and is what decides whether a force-closed straggler still
/// owes the consumer an `on_connection_closed` callback.
#[derive(Default)]
pub(crate) struct ConnectionFlags {
    open: AtomicBool,
    opened: AtomicBool,
}

impl ConnectionFlags {
    pub(crate) fn mark_open(&self) {
        self.opened.store(true, Ordering::Release);
        self.open.store(true, Ordering::Release);
    }

    pub(crate) fn mark_not_open(&self) {
        self.open.store(false, Ordering::Release);
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub(crate) fn was_opened(&self) -> bool {
        self.opened.load(Ordering::Acquire)
    }
}

/// Outbound channel into one connection task, plus its lifecycle flags.
struct ConnectionHandle {
    sender: mpsc::UnboundedSender<Message>,
    flags: Arc<ConnectionFlags>,
}

/// Active-connection set shared between the accept path and every
/// connection task.
///
/// The accept path inserts, each connection's termination path removes,
/// and the send/broadcast API iterates. The map lock is held only for
/// those operations, never across an await; actual I/O happens on the
/// owning task after the message leaves the channel.
pub(crate) struct ConnectionRegistry {
    next_id: AtomicU64,
    connections: Mutex<HashMap<ConnectionId, ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate an id and register a fresh handle for it.
    ///
    /// Returns the id, the command receiver for the connection task, and
    /// the shared flags the task maintains.
    pub(crate) fn register(
        &self,
    ) -> (
        ConnectionId,
        mpsc::UnboundedReceiver<Message>,
        Arc<ConnectionFlags>,
    ) {
        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::unbounded_channel();
        let flags = Arc::new(ConnectionFlags::default());

        let handle = ConnectionHandle {
            sender,
            flags: flags.clone(),
        };
        self.connections
            .lock()
            .expect("registry lock poisoned")
            .insert(id, handle);

        (id, receiver, flags)
    }

    /// Drop a connection's entry. Returns whether it was present.
    pub(crate) fn remove(&self, id: ConnectionId) -> bool {
        self.connections
            .lock()
            .expect("registry lock poisoned")
            .remove(&id)
            .is_some()
    }

    /// Enqueue a message for one connection.
    ///
    /// # Errors
    ///
    /// - `Error::ConnectionNotFound` if no connection has this id
    /// - `Error::InvalidState` if the connection is not open
    pub(crate) fn send(&self, id: ConnectionId, message: Message) -> Result<()> {
        let guard = self.connections.lock().expect("registry lock poisoned");
        let handle = guard
            .get(&id)
            .ok_or(Error::ConnectionNotFound(id.as_u64()))?;

        if !handle.flags.is_open() {
            return Err(Error::InvalidState(format!("{id} is not open")));
        }
        handle
            .sender
            .send(message)
            .map_err(|_| Error::InvalidState(format!("{id} is shutting down")))
    }

    /// Enqueue a message for every open connection.
    ///
    /// Returns how many connections accepted it; ones that raced into a
    /// closed state are skipped.
    pub(crate) fn broadcast(&self, message: &Message) -> usize {
        let guard = self.connections.lock().expect("registry lock poisoned");
        guard
            .values()
            .filter(|handle| handle.flags.is_open())
            .filter(|handle| handle.sender.send(message.clone()).is_ok())
            .count()
    }

    /// Number of registered connections, including ones still in the
    /// handshake.
    pub(crate) fn len(&self) -> usize {
        self.connections
            .lock()
            .expect("registry lock poisoned")
            .len()
    }

    /// Remove every entry, returning the ids whose handshake had
    /// completed at some point.
    ///
    /// Entries still mid-handshake are dropped without being reported;
    /// their consumer never heard about them.
    pub(crate) fn drain_opened(&self) -> Vec<ConnectionId> {
        let mut guard = self.connections.lock().expect("registry lock poisoned");
        guard
            .drain()
            .filter(|(_, handle)| handle.flags.was_opened())
            .map(|(id, _)| id)
            .collect()
    }
}
