//! Multi-connection server on top of [`Connection`](crate::Connection).
//!
//! A [`Server`] listens on a TCP port, accepts connections, runs each
//! one's handshake and message loop on its own task, and reports
//! everything that happens to a [`ServerDelegate`] supplied at
//! construction. Outbound traffic goes through [`Server::send`] and
//! [`Server::broadcast`], or through a cloneable [`ServerHandle`] when
//! the delegate itself needs to reply.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wshost::{Config, ConnectionId, Server, ServerDelegate};
//!
//! struct Logger;
//!
//! impl ServerDelegate for Logger {
//!     fn on_message(&self, id: ConnectionId, text: String) {
//!         println!("{id}: {text}");
//!     }
//! }
//!
//! let server = Server::new(Config::default(), Arc::new(Logger));
//! server.start(9001).await?;
//! ```

mod delegate;
mod registry;
#[allow(clippy::module_inception)]
mod server;

pub use delegate::{CloseReason, ConnectionId, ServerDelegate};
pub use server::{Server, ServerHandle};
