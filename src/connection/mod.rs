//! Connection state machine and message plumbing.
//!
//! A [`Connection`] owns one transport stream and drives it through the
//! lifecycle in [`ConnectionState`]: handshake, open message exchange,
//! close handshake, closed. Outbound messages are split into frames by
//! [`MessageFragmenter`]; inbound frames are reassembled and validated
//! before they surface as [`Message`](crate::Message) values.
//!
//! ## Example
//!
//! ```rust,ignore
//! use wshost::{Config, Connection, Message};
//!
//! let (stream, _addr) = listener.accept().await?;
//! let config = Config::default();
//! let (mut conn, request) = Connection::accept(stream, &config).await?;
//!
//! while let Some(msg) = conn.recv().await? {
//!     if msg.is_data() {
//!         conn.send(msg).await?;
//!     }
//! }
//! ```

#[allow(clippy::module_inception)]
mod connection;
mod fragmenter;
mod role;
mod state;

pub use connection::Connection;
pub use fragmenter::MessageFragmenter;
pub use role::Role;
pub use state::ConnectionState;
