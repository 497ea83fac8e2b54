//! Test harness utilities for high-concurrency WebSocket testing.
//!
//! Reusable components for exercising the server through real TCP
//! connections: an echo server on an ephemeral port, a raw client that
//! speaks the wire protocol, and atomic counters for throughput checks.

#![allow(dead_code)]

mod client;
mod metrics;
mod server;

pub use client::{TestClient, raw_connect};
pub use metrics::Metrics;
pub use server::TestServer;
