//! WebSocket message and close-code types as defined in RFC 6455.

/// WebSocket close status code per RFC 6455 Section 7.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum CloseCode {
    /// Normal closure (1000).
    #[default]
    Normal,
    /// Going away (1001). Endpoint is shutting down or navigating away.
    GoingAway,
    /// Protocol error (1002). Malformed frame or protocol violation.
    ProtocolError,
    /// Unsupported data (1003). Endpoint cannot handle the received data type.
    UnsupportedData,
    /// Invalid payload (1007). Message data inconsistent with its type,
    /// e.g. non-UTF-8 bytes in a text message.
    InvalidPayload,
    /// Policy violation (1008).
    PolicyViolation,
    /// Message too big (1009). Message exceeds what the endpoint can process.
    MessageTooBig,
    /// Mandatory extension (1010).
    MandatoryExtension,
    /// Internal error (1011). Endpoint hit an unexpected condition.
    InternalError,
    /// Service restart (1012).
    ServiceRestart,
    /// Try again later (1013).
    TryAgainLater,
    /// Bad gateway (1014).
    BadGateway,
    /// Any other code (3000-3999 for registered use, 4000-4999 for private use).
    Other(u16),
}

impl CloseCode {
    /// Create a `CloseCode` from its numeric value.
    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::GoingAway,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::UnsupportedData,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::MessageTooBig,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::InternalError,
            1012 => CloseCode::ServiceRestart,
            1013 => CloseCode::TryAgainLater,
            1014 => CloseCode::BadGateway,
            other => CloseCode::Other(other),
        }
    }

    /// Numeric value of this close code.
    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::UnsupportedData => 1003,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::MessageTooBig => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::InternalError => 1011,
            CloseCode::ServiceRestart => 1012,
            CloseCode::TryAgainLater => 1013,
            CloseCode::BadGateway => 1014,
            CloseCode::Other(code) => *code,
        }
    }

    /// Check if this code may appear on the wire per RFC 6455 Section 7.4.1.
    ///
    /// 1000-1003 and 1007-1014 are defined protocol codes; 3000-4999 are
    /// reserved for frameworks and applications.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        let code = self.as_u16();
        matches!(code, 1000..=1003 | 1007..=1014 | 3000..=4999)
    }

    /// Check if this code is reserved and MUST NOT be sent in a close frame.
    ///
    /// 1004 is reserved; 1005, 1006, and 1015 are synthetic codes an
    /// endpoint reports locally but never puts on the wire.
    #[must_use]
    pub const fn is_reserved(&self) -> bool {
        let code = self.as_u16();
        matches!(code, 1004..=1006 | 1015)
    }
}

/// Close frame payload: status code plus optional human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    /// The close status code.
    pub code: CloseCode,
    /// Reason for closing (UTF-8, at most 123 bytes on the wire).
    pub reason: String,
}

impl CloseFrame {
    /// Create a close frame with the given code and reason.
    #[must_use]
    pub fn new(code: CloseCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

/// A decoded WebSocket message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Message {
    /// A text message (validated UTF-8).
    Text(String),
    /// A binary message.
    Binary(Vec<u8>),
    /// A ping control frame (payload <= 125 bytes).
    Ping(Vec<u8>),
    /// A pong control frame (payload <= 125 bytes).
    Pong(Vec<u8>),
    /// A close control frame, optionally carrying code and reason.
    Close(Option<CloseFrame>),
}

impl Message {
    /// Create a text message.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Message::Text(s.into())
    }

    /// Create a binary message.
    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Message::Binary(data.into())
    }

    /// Create a ping message.
    #[must_use]
    pub fn ping(data: impl Into<Vec<u8>>) -> Self {
        Message::Ping(data.into())
    }

    /// Create a pong message.
    #[must_use]
    pub fn pong(data: impl Into<Vec<u8>>) -> Self {
        Message::Pong(data.into())
    }

    /// Create a close message with status code and reason.
    #[must_use]
    pub fn close(code: CloseCode, reason: impl Into<String>) -> Self {
        Message::Close(Some(CloseFrame::new(code, reason)))
    }

    /// Returns `true` if this is a data message (text or binary).
    #[must_use]
    pub const fn is_data(&self) -> bool {
        matches!(self, Message::Text(_) | Message::Binary(_))
    }

    /// Returns `true` if this is a control message (ping, pong, or close).
    #[must_use]
    pub const fn is_control(&self) -> bool {
        matches!(
            self,
            Message::Ping(_) | Message::Pong(_) | Message::Close(_)
        )
    }

    /// Returns `true` if this is a close message.
    #[must_use]
    pub const fn is_close(&self) -> bool {
        matches!(self, Message::Close(_))
    }

    /// Consume and return the text content, if this is a text message.
    #[must_use]
    pub fn into_text(self) -> Option<String> {
        match self {
            Message::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Consume and return the binary content, if this is a binary message.
    #[must_use]
    pub fn into_binary(self) -> Option<Vec<u8>> {
        match self {
            Message::Binary(data) => Some(data),
            _ => None,
        }
    }

    /// Borrow the text content, if this is a text message.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Message::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Payload length in bytes (close frames report the reason length).
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Message::Text(s) => s.len(),
            Message::Binary(d) | Message::Ping(d) | Message::Pong(d) => d.len(),
            Message::Close(Some(frame)) => frame.reason.len(),
            Message::Close(None) => 0,
        }
    }

    /// Returns `true` if the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_and_binary_constructors() {
        let msg = Message::text("hello");
        assert!(matches!(msg, Message::Text(s) if s == "hello"));

        let msg = Message::binary(vec![1, 2, 3]);
        assert!(matches!(msg, Message::Binary(ref d) if d == &[1, 2, 3]));
    }

    #[test]
    fn test_ping_pong_constructors() {
        let ping = Message::ping(b"abc".to_vec());
        assert!(matches!(ping, Message::Ping(ref d) if d == b"abc"));

        let pong = Message::pong(b"abc".to_vec());
        assert!(matches!(pong, Message::Pong(ref d) if d == b"abc"));
    }

    #[test]
    fn test_close_with_code() {
        let msg = Message::close(CloseCode::GoingAway, "shutting down");
        match msg {
            Message::Close(Some(frame)) => {
                assert_eq!(frame.code, CloseCode::GoingAway);
                assert_eq!(frame.reason, "shutting down");
            }
            _ => panic!("expected close frame"),
        }
    }

    #[test]
    fn test_message_classification() {
        assert!(Message::text("x").is_data());
        assert!(Message::binary(vec![0]).is_data());
        assert!(!Message::ping(vec![]).is_data());

        assert!(Message::ping(vec![]).is_control());
        assert!(Message::pong(vec![]).is_control());
        assert!(Message::Close(None).is_control());
        assert!(Message::Close(None).is_close());
        assert!(!Message::text("x").is_control());
    }

    #[test]
    fn test_into_accessors() {
        assert_eq!(Message::text("hi").into_text(), Some("hi".to_string()));
        assert_eq!(Message::binary(vec![1]).into_text(), None);
        assert_eq!(Message::binary(vec![1, 2]).into_binary(), Some(vec![1, 2]));
        assert_eq!(Message::text("hi").into_binary(), None);
        assert_eq!(Message::text("hi").as_text(), Some("hi"));
    }

    #[test]
    fn test_message_len() {
        assert_eq!(Message::text("hello").len(), 5);
        assert_eq!(Message::binary(vec![0; 7]).len(), 7);
        assert_eq!(Message::Close(None).len(), 0);
        assert_eq!(Message::close(CloseCode::Normal, "bye").len(), 3);
        assert!(Message::Close(None).is_empty());
        assert!(!Message::text("x").is_empty());
    }

    #[test]
    fn test_close_code_round_trip() {
        for code in [1000, 1001, 1002, 1003, 1007, 1008, 1009, 1010, 1011, 1012, 1013, 1014] {
            assert_eq!(CloseCode::from_u16(code).as_u16(), code);
        }
        assert_eq!(CloseCode::from_u16(3000), CloseCode::Other(3000));
        assert_eq!(CloseCode::Other(4999).as_u16(), 4999);
    }

    #[test]
    fn test_close_code_validity() {
        assert!(CloseCode::Normal.is_valid());
        assert!(CloseCode::ProtocolError.is_valid());
        assert!(CloseCode::MessageTooBig.is_valid());
        assert!(CloseCode::ServiceRestart.is_valid());
        assert!(CloseCode::BadGateway.is_valid());
        assert!(CloseCode::Other(3000).is_valid());
        assert!(CloseCode::Other(4999).is_valid());

        assert!(!CloseCode::Other(0).is_valid());
        assert!(!CloseCode::Other(999).is_valid());
        assert!(!CloseCode::Other(1004).is_valid());
        assert!(!CloseCode::Other(1005).is_valid());
        assert!(!CloseCode::Other(1006).is_valid());
        assert!(!CloseCode::Other(1015).is_valid());
        assert!(!CloseCode::Other(2999).is_valid());
        assert!(!CloseCode::Other(5000).is_valid());
    }

    #[test]
    fn test_close_code_reserved() {
        assert!(CloseCode::Other(1004).is_reserved());
        assert!(CloseCode::Other(1005).is_reserved());
        assert!(CloseCode::Other(1006).is_reserved());
        assert!(CloseCode::Other(1015).is_reserved());

        assert!(!CloseCode::Normal.is_reserved());
        assert!(!CloseCode::TryAgainLater.is_reserved());
        assert!(!CloseCode::Other(4000).is_reserved());
    }
}
