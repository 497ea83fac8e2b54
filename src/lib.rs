//! # wshost - Embeddable WebSocket Server Engine
//!
//! `wshost` is an RFC 6455 compliant WebSocket server library for Rust.
//!
//! ## Features
//!
//! - **Full RFC 6455 compliance** with strict frame and UTF-8 validation
//! - **Delegate-driven server** that fans events out to one callback surface
//! - **Per-connection state machine** with symmetric close handshake
//! - **Configurable limits** for frames, messages, fragments, and timeouts
//! - **Structured logging** via `tracing`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wshost::{Config, ConnectionId, Server, ServerDelegate};
//!
//! struct Echo;
//!
//! impl ServerDelegate for Echo {
//!     fn on_message(&self, id: ConnectionId, text: String) {
//!         println!("{id}: {text}");
//!     }
//! }
//!
//! let server = Server::new(Config::default(), Arc::new(Echo));
//! server.start(9001).await?;
//! ```

pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod protocol;
pub mod server;

pub use codec::FrameCodec;
pub use config::{Config, Limits, Timeouts};
pub use connection::{Connection, ConnectionState, MessageFragmenter, Role};
pub use error::{Error, Result};
pub use message::{CloseCode, CloseFrame, Message};
pub use protocol::{HandshakeRequest, HandshakeResponse, OpCode, WS_GUID, compute_accept_key};
pub use server::{CloseReason, ConnectionId, Server, ServerDelegate, ServerHandle};
