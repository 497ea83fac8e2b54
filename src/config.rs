//! Configuration and limits for the server engine.

use std::time::Duration;

/// Resource limits for WebSocket connections.
///
/// These limits bound memory usage and protect against resource
/// exhaustion from hostile peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum size of a single frame payload in bytes.
    ///
    /// Default: 16 MB
    pub max_frame_size: usize,

    /// Maximum size of a complete message in bytes, after reassembling
    /// all fragments.
    ///
    /// Default: 64 MB
    pub max_message_size: usize,

    /// Maximum number of fragments in a single message.
    ///
    /// Default: 128
    pub max_fragment_count: usize,

    /// Maximum size of the handshake request in bytes.
    ///
    /// Default: 8 KB
    pub max_handshake_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_frame_size: 16 * 1024 * 1024,
            max_message_size: 64 * 1024 * 1024,
            max_fragment_count: 128,
            max_handshake_size: 8192,
        }
    }
}

impl Limits {
    /// Create new limits with custom values.
    #[must_use]
    pub const fn new(
        max_frame_size: usize,
        max_message_size: usize,
        max_fragment_count: usize,
        max_handshake_size: usize,
    ) -> Self {
        Self {
            max_frame_size,
            max_message_size,
            max_fragment_count,
            max_handshake_size,
        }
    }

    /// Limits suitable for small embedded deployments.
    ///
    /// - Max frame: 64 KB
    /// - Max message: 256 KB
    /// - Max fragments: 16
    /// - Max handshake: 4 KB
    #[must_use]
    pub const fn embedded() -> Self {
        Self {
            max_frame_size: 64 * 1024,
            max_message_size: 256 * 1024,
            max_fragment_count: 16,
            max_handshake_size: 4096,
        }
    }

    /// Validate that a frame payload size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameTooLarge`](crate::Error::FrameTooLarge) if
    /// `size` exceeds the configured maximum.
    pub const fn check_frame_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_frame_size {
            Err(crate::Error::FrameTooLarge {
                size,
                max: self.max_frame_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a reassembled message size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageTooLarge`](crate::Error::MessageTooLarge) if
    /// `size` exceeds the configured maximum.
    pub const fn check_message_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_message_size {
            Err(crate::Error::MessageTooLarge {
                size,
                max: self.max_message_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a fragment count is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TooManyFragments`](crate::Error::TooManyFragments)
    /// if `count` exceeds the configured maximum.
    pub const fn check_fragment_count(&self, count: usize) -> Result<(), crate::Error> {
        if count > self.max_fragment_count {
            Err(crate::Error::TooManyFragments {
                count,
                max: self.max_fragment_count,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that buffered handshake data is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`](crate::Error::InvalidHandshake)
    /// if `size` exceeds the configured maximum.
    pub fn check_handshake_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_handshake_size {
            Err(crate::Error::InvalidHandshake(format!(
                "handshake request exceeds {} bytes",
                self.max_handshake_size
            )))
        } else {
            Ok(())
        }
    }
}

/// Timeout configuration for connection lifecycle phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Maximum time for a newly accepted socket to complete the opening
    /// handshake before it is dropped.
    ///
    /// Default: 30 seconds
    pub handshake: Duration,

    /// Grace period during shutdown for connections to finish the close
    /// handshake before they are forcibly terminated.
    ///
    /// Default: 5 seconds
    pub close_grace: Duration,

    /// Maximum time a connection may sit idle without any inbound frame.
    ///
    /// Default: 300 seconds
    pub idle: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            handshake: Duration::from_secs(30),
            close_grace: Duration::from_secs(5),
            idle: Duration::from_secs(300),
        }
    }
}

impl Timeouts {
    /// Create new timeouts with custom values.
    #[must_use]
    pub const fn new(handshake: Duration, close_grace: Duration, idle: Duration) -> Self {
        Self {
            handshake,
            close_grace,
            idle,
        }
    }
}

/// Server engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Resource limits.
    pub limits: Limits,

    /// Fragment size for outgoing messages in bytes.
    ///
    /// Messages larger than this are split into continuation frames.
    ///
    /// Default: 16 KB
    pub fragment_size: usize,

    /// Accept unmasked frames from clients.
    ///
    /// RFC 6455 requires clients to mask every frame. Enabling this
    /// violates the protocol but can be useful against non-conforming
    /// test peers.
    ///
    /// Default: false
    pub accept_unmasked_frames: bool,

    /// Read buffer size in bytes.
    ///
    /// Default: 8 KB
    pub read_buffer_size: usize,

    /// Write buffer size in bytes.
    ///
    /// Default: 8 KB
    pub write_buffer_size: usize,

    /// Timeout configuration.
    pub timeouts: Timeouts,

    /// Allowed origins for cross-site WebSocket hijacking protection.
    ///
    /// If `Some`, only handshakes whose Origin header matches one of
    /// these values are accepted. If `None`, origin validation is
    /// disabled.
    ///
    /// Default: None
    pub allowed_origins: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            fragment_size: 16 * 1024,
            accept_unmasked_frames: false,
            read_buffer_size: 8192,
            write_buffer_size: 8192,
            timeouts: Timeouts::default(),
            allowed_origins: None,
        }
    }
}

impl Config {
    /// Create a configuration with default limits and timeouts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom limits.
    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the maximum reassembled message size.
    #[must_use]
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.limits.max_message_size = size;
        self
    }

    /// Set the fragment size for outgoing messages.
    #[must_use]
    pub fn with_fragment_size(mut self, size: usize) -> Self {
        self.fragment_size = size;
        self
    }

    /// Set the read buffer size.
    #[must_use]
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set the write buffer size.
    #[must_use]
    pub fn with_write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }

    /// Tolerate unmasked frames from clients, in violation of RFC 6455.
    #[must_use]
    pub fn with_accept_unmasked_frames(mut self, accept: bool) -> Self {
        self.accept_unmasked_frames = accept;
        self
    }

    /// Set the timeout configuration.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set the handshake timeout.
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.handshake = timeout;
        self
    }

    /// Set the shutdown close grace period.
    #[must_use]
    pub fn with_close_grace(mut self, grace: Duration) -> Self {
        self.timeouts.close_grace = grace;
        self
    }

    /// Set allowed origins for cross-site WebSocket hijacking protection.
    ///
    /// Only handshakes with an Origin header matching one of these values
    /// are accepted.
    #[must_use]
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = Some(origins);
        self
    }
}
