//! Opening handshake negotiation (RFC 6455 Section 4).
//!
//! Parses the client's HTTP Upgrade request, validates it, and produces
//! the `101 Switching Protocols` response. Handshake failures map to a
//! best-effort `400 Bad Request` written by the connection layer.

use crate::error::{Error, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};
use std::collections::HashMap;

/// GUID appended to the client key for the Sec-WebSocket-Accept digest.
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Headers that must not appear more than once in a request.
const SINGLETON_HEADERS: &[&str] = &[
    "host",
    "upgrade",
    "connection",
    "sec-websocket-key",
    "sec-websocket-version",
];

/// Locate the end of an HTTP header block in `buf`.
///
/// Returns the index one past the `\r\n\r\n` terminator, or `None` when
/// the block is still incomplete and more bytes are needed.
#[must_use]
pub fn find_request_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + 4)
}

/// Compute the Sec-WebSocket-Accept value for a client key.
///
/// Defined as `base64(sha1(key + GUID))`.
///
/// # Example
///
/// ```
/// use wshost::protocol::handshake::compute_accept_key;
///
/// let accept = compute_accept_key("dGhlIHNhbXBsZSBub25jZQ==");
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Build a complete `400 Bad Request` response for a failed handshake.
#[must_use]
pub fn bad_request_response(reason: &str) -> Vec<u8> {
    let body = if reason.is_empty() {
        "Bad Request".to_string()
    } else {
        format!("Bad Request: {reason}")
    };
    format!(
        "HTTP/1.1 400 Bad Request\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
    .into_bytes()
}

/// Validate an Origin header against an allow-list.
///
/// An empty allow-list accepts any origin, including none at all.
///
/// # Errors
///
/// Returns `Error::InvalidHandshake` when the list is non-empty and the
/// origin is absent or not listed.
pub fn validate_origin(origin: Option<&str>, allowed: &[String]) -> Result<()> {
    if allowed.is_empty() {
        return Ok(());
    }

    match origin {
        Some(o) if allowed.iter().any(|a| a == o) => Ok(()),
        Some(o) => Err(Error::InvalidHandshake(format!(
            "Origin not allowed: {o}"
        ))),
        None => Err(Error::InvalidHandshake(
            "Origin required but missing".into(),
        )),
    }
}

/// Parse header lines into a case-insensitive map.
///
/// Rejects duplicates of the security-relevant singleton headers.
fn parse_headers<'a, I>(lines: I, check_singletons: bool) -> Result<HashMap<String, String>>
where
    I: Iterator<Item = &'a str>,
{
    let mut headers: HashMap<String, String> = HashMap::new();

    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name_lower = name.trim().to_lowercase();

            if check_singletons
                && SINGLETON_HEADERS.contains(&name_lower.as_str())
                && headers.contains_key(&name_lower)
            {
                return Err(Error::InvalidHandshake(format!(
                    "Duplicate header: {}",
                    name.trim()
                )));
            }

            headers.insert(name_lower, value.trim().to_string());
        }
    }

    Ok(headers)
}

fn check_header_value(header: &str, value: &str) -> Result<()> {
    if value.contains('\r') || value.contains('\n') {
        return Err(Error::InvalidHandshake(format!(
            "{header} value contains CR or LF"
        )));
    }
    Ok(())
}

/// A parsed client upgrade request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// The request path, e.g. `/chat`. Surfaced to the host application
    /// but not otherwise interpreted.
    pub path: String,
    /// The Host header value.
    pub host: String,
    /// The Sec-WebSocket-Key header value.
    pub key: String,
    /// The Sec-WebSocket-Version value, 13 for RFC 6455.
    pub version: u8,
    /// The Origin header value, if present.
    pub origin: Option<String>,
    /// Offered subprotocols from Sec-WebSocket-Protocol, in order.
    pub protocols: Vec<String>,
}

impl HandshakeRequest {
    /// Parse an upgrade request from a complete HTTP header block.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHandshake` when the request line is not
    /// `GET <path> HTTP/1.1`, a required header is missing or duplicated,
    /// `Upgrade` is not `websocket`, or `Connection` lacks the `upgrade`
    /// token.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| Error::InvalidHandshake("Request is not valid UTF-8".into()))?;

        let mut lines = text.lines();

        let request_line = lines
            .next()
            .ok_or_else(|| Error::InvalidHandshake("Empty request".into()))?;

        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(Error::InvalidHandshake("Malformed request line".into()));
        }
        if parts[0] != "GET" {
            return Err(Error::InvalidHandshake(format!(
                "Expected GET method, got {}",
                parts[0]
            )));
        }
        if !parts[2].starts_with("HTTP/1.1") {
            return Err(Error::InvalidHandshake(format!(
                "Expected HTTP/1.1, got {}",
                parts[2]
            )));
        }
        let path = parts[1].to_string();

        let headers = parse_headers(lines, true)?;

        let upgrade = headers
            .get("upgrade")
            .ok_or_else(|| Error::InvalidHandshake("Missing Upgrade header".into()))?;
        if !upgrade.eq_ignore_ascii_case("websocket") {
            return Err(Error::InvalidHandshake(format!(
                "Invalid Upgrade header: {upgrade}"
            )));
        }

        // Connection is a comma-separated token list; the upgrade token
        // may appear alongside others, e.g. "keep-alive, Upgrade".
        let connection = headers
            .get("connection")
            .ok_or_else(|| Error::InvalidHandshake("Missing Connection header".into()))?;
        if !connection
            .split(',')
            .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
        {
            return Err(Error::InvalidHandshake(format!(
                "Invalid Connection header: {connection}"
            )));
        }

        let host = headers
            .get("host")
            .ok_or_else(|| Error::InvalidHandshake("Missing Host header".into()))?
            .clone();

        let key = headers
            .get("sec-websocket-key")
            .ok_or_else(|| Error::InvalidHandshake("Missing Sec-WebSocket-Key header".into()))?
            .clone();

        let version_str = headers.get("sec-websocket-version").ok_or_else(|| {
            Error::InvalidHandshake("Missing Sec-WebSocket-Version header".into())
        })?;
        let version: u8 = version_str
            .parse()
            .map_err(|_| Error::InvalidHandshake(format!("Invalid version: {version_str}")))?;

        let origin = headers.get("origin").cloned();

        let protocols = headers
            .get("sec-websocket-protocol")
            .map(|p| p.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default();

        Ok(Self {
            path,
            host,
            key,
            version,
            origin,
            protocols,
        })
    }

    /// Parse an upgrade request, rejecting oversized header blocks first.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHandshake` when `data` exceeds `max_size`,
    /// plus every error `parse` can produce.
    pub fn parse_with_limit(data: &[u8], max_size: usize) -> Result<Self> {
        if data.len() > max_size {
            return Err(Error::InvalidHandshake(format!(
                "Handshake request of {} bytes exceeds limit of {max_size}",
                data.len()
            )));
        }
        Self::parse(data)
    }

    /// Validate the parsed request per RFC 6455.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHandshake` when the version is not 13, the
    /// key does not decode to exactly 16 bytes, or Host is empty.
    pub fn validate(&self) -> Result<()> {
        if self.version != 13 {
            return Err(Error::InvalidHandshake(format!(
                "Unsupported WebSocket version: {} (expected 13)",
                self.version
            )));
        }

        match BASE64.decode(&self.key) {
            Ok(decoded) if decoded.len() == 16 => {}
            Ok(decoded) => {
                return Err(Error::InvalidHandshake(format!(
                    "Sec-WebSocket-Key must decode to 16 bytes, got {}",
                    decoded.len()
                )));
            }
            Err(_) => {
                return Err(Error::InvalidHandshake(
                    "Sec-WebSocket-Key is not valid base64".into(),
                ));
            }
        }

        if self.host.is_empty() {
            return Err(Error::InvalidHandshake("Host header is empty".into()));
        }

        Ok(())
    }
}

/// The server's `101 Switching Protocols` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// The computed Sec-WebSocket-Accept value.
    pub accept: String,
    /// The echoed subprotocol, if the client offered any.
    pub protocol: Option<String>,
}

impl HandshakeResponse {
    /// Build a response for a validated request.
    ///
    /// The first offered subprotocol is echoed back verbatim; there is no
    /// negotiation logic.
    #[must_use]
    pub fn from_request(req: &HandshakeRequest) -> Self {
        Self {
            accept: compute_accept_key(&req.key),
            protocol: req.protocols.first().cloned(),
        }
    }

    /// Serialize the response headers into `buf`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHandshake` if the echoed protocol value
    /// would allow header injection.
    pub fn write(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(b"HTTP/1.1 101 Switching Protocols\r\n");
        buf.extend_from_slice(b"Upgrade: websocket\r\n");
        buf.extend_from_slice(b"Connection: Upgrade\r\n");
        buf.extend_from_slice(format!("Sec-WebSocket-Accept: {}\r\n", self.accept).as_bytes());

        if let Some(ref proto) = self.protocol {
            check_header_value("Sec-WebSocket-Protocol", proto)?;
            buf.extend_from_slice(format!("Sec-WebSocket-Protocol: {proto}\r\n").as_bytes());
        }

        buf.extend_from_slice(b"\r\n");
        Ok(())
    }

    /// Parse a server response from a complete HTTP header block.
    ///
    /// Used by test clients to verify the upgrade succeeded.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHandshake` when the status is not 101 or a
    /// required header is missing or malformed.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| Error::InvalidHandshake("Response is not valid UTF-8".into()))?;

        let mut lines = text.lines();

        let status_line = lines
            .next()
            .ok_or_else(|| Error::InvalidHandshake("Empty response".into()))?;
        if !status_line.starts_with("HTTP/1.1 101") {
            return Err(Error::InvalidHandshake(format!(
                "Expected 101 status, got: {status_line}"
            )));
        }

        let headers = parse_headers(lines, false)?;

        let upgrade = headers
            .get("upgrade")
            .ok_or_else(|| Error::InvalidHandshake("Missing Upgrade header in response".into()))?;
        if !upgrade.eq_ignore_ascii_case("websocket") {
            return Err(Error::InvalidHandshake(format!(
                "Invalid Upgrade header: {upgrade}"
            )));
        }

        let connection = headers.get("connection").ok_or_else(|| {
            Error::InvalidHandshake("Missing Connection header in response".into())
        })?;
        if !connection
            .split(',')
            .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
        {
            return Err(Error::InvalidHandshake(format!(
                "Invalid Connection header: {connection}"
            )));
        }

        let accept = headers
            .get("sec-websocket-accept")
            .ok_or_else(|| Error::InvalidHandshake("Missing Sec-WebSocket-Accept header".into()))?
            .clone();

        let protocol = headers.get("sec-websocket-protocol").cloned();

        Ok(Self { accept, protocol })
    }
}
