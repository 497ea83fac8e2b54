//! Connection lifecycle states.

/// Lifecycle state of a single connection.
///
/// A connection starts in `Connecting` while the opening handshake is in
/// flight, spends its useful life in `Open`, passes through `Closing`
/// once either side starts the close handshake, and ends in `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum ConnectionState {
    /// Opening handshake not yet complete.
    #[default]
    Connecting,
    /// Handshake done, data frames flow in both directions.
    Open,
    /// A close frame has been sent, awaiting the peer's echo.
    Closing,
    /// Close handshake finished or transport gone.
    Closed,
}

impl ConnectionState {
    /// Whether application messages may be sent.
    ///
    /// Only `Open` qualifies. In `Closing` the close frame must be the
    /// last frame this endpoint sends.
    #[inline]
    #[must_use]
    pub const fn can_send(self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// Whether inbound data frames are delivered to the application.
    ///
    /// Data arriving in `Closing` is legal per the protocol but no longer
    /// actionable, so it is read and dropped rather than delivered.
    #[inline]
    #[must_use]
    pub const fn delivers_inbound(self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// Whether the transport is still alive in this state.
    #[inline]
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, ConnectionState::Closed)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connecting => f.write_str("connecting"),
            ConnectionState::Open => f.write_str("open"),
            ConnectionState::Closing => f.write_str("closing"),
            ConnectionState::Closed => f.write_str("closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        assert_eq!(ConnectionState::default(), ConnectionState::Connecting);
    }

    #[test]
    fn test_can_send_only_when_open() {
        assert!(!ConnectionState::Connecting.can_send());
        assert!(ConnectionState::Open.can_send());
        assert!(!ConnectionState::Closing.can_send());
        assert!(!ConnectionState::Closed.can_send());
    }

    #[test]
    fn test_inbound_dropped_while_closing() {
        assert!(ConnectionState::Open.delivers_inbound());
        assert!(!ConnectionState::Closing.delivers_inbound());
        assert!(!ConnectionState::Closed.delivers_inbound());
    }

    #[test]
    fn test_is_active() {
        assert!(ConnectionState::Connecting.is_active());
        assert!(ConnectionState::Open.is_active());
        assert!(ConnectionState::Closing.is_active());
        assert!(!ConnectionState::Closed.is_active());
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectionState::Open.to_string(), "open");
        assert_eq!(ConnectionState::Closing.to_string(), "closing");
    }
}
