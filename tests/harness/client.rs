//! WebSocket test client for concurrency testing.
//!
//! Performs the client side of the opening handshake over a raw TCP
//! stream, then drives the connection through the library's own state
//! machine in the client role.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use wshost::{
    CloseCode, CloseFrame, Config, Connection, Error, Message, Result, Role, compute_accept_key,
};

/// RFC 6455 sample nonce; servers only check shape, not uniqueness.
const CLIENT_KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";

const MAX_RESPONSE: usize = 8192;

/// A client-role connection to a test server.
pub struct TestClient {
    conn: Connection<TcpStream>,
}

impl TestClient {
    /// Connect and handshake on path `/`.
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        Self::connect_on_path(addr, "/", &Config::default()).await
    }

    /// Connect with a path tagged by `id`, so server logs tell clients
    /// apart.
    pub async fn connect_with_id(addr: SocketAddr, id: usize) -> Result<Self> {
        Self::connect_on_path(addr, &format!("/client-{id}"), &Config::default()).await
    }

    /// Connect with a custom client configuration.
    pub async fn connect_with_config(addr: SocketAddr, config: &Config) -> Result<Self> {
        Self::connect_on_path(addr, "/", config).await
    }

    async fn connect_on_path(addr: SocketAddr, path: &str, config: &Config) -> Result<Self> {
        let mut stream = TcpStream::connect(addr).await?;

        let request = format!(
            "GET {path} HTTP/1.1\r\n\
             Host: {addr}\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Key: {CLIENT_KEY}\r\n\
             Sec-WebSocket-Version: 13\r\n\
             \r\n"
        );
        stream.write_all(request.as_bytes()).await?;

        let response = read_response_head(&mut stream).await?;
        check_response(&response)?;

        Ok(Self {
            conn: Connection::new(stream, Role::Client, config),
        })
    }

    /// Send one text message.
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.conn.send(Message::text(text)).await
    }

    /// Send one binary message.
    pub async fn send_binary(&mut self, data: Vec<u8>) -> Result<()> {
        self.conn.send(Message::binary(data)).await
    }

    /// Send a ping with the given payload.
    pub async fn send_ping(&mut self, data: &[u8]) -> Result<()> {
        self.conn.send(Message::ping(data.to_vec())).await
    }

    /// Receive the next text message.
    ///
    /// Skips other message kinds; returns `Ok(None)` once the
    /// connection closes.
    pub async fn recv_text(&mut self) -> Result<Option<String>> {
        loop {
            match self.conn.recv().await? {
                Some(Message::Text(text)) => return Ok(Some(text)),
                Some(Message::Close(_)) | None => return Ok(None),
                Some(_) => {}
            }
        }
    }

    /// Receive the next message of any kind.
    pub async fn recv_message(&mut self) -> Result<Option<Message>> {
        self.conn.recv().await
    }

    /// Wait for the server to start the close handshake, returning its
    /// close frame.
    pub async fn recv_close(&mut self) -> Result<Option<CloseFrame>> {
        loop {
            match self.conn.recv().await? {
                Some(Message::Close(frame)) => return Ok(frame),
                Some(_) => {}
                None => return Ok(None),
            }
        }
    }

    /// Run the full client-initiated close handshake.
    pub async fn close(&mut self) -> Result<()> {
        self.conn.close(CloseCode::Normal, "").await?;
        loop {
            match self.conn.recv().await {
                Ok(Some(Message::Close(_))) | Ok(None) | Err(_) => return Ok(()),
                Ok(Some(_)) => {}
            }
        }
    }
}

/// Handshake on `addr` and hand back the raw stream, for tests that
/// need to put hand-built bytes on the wire.
pub async fn raw_connect(addr: SocketAddr) -> Result<TcpStream> {
    let mut stream = TcpStream::connect(addr).await?;

    let request = format!(
        "GET / HTTP/1.1\r\n\
         Host: {addr}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {CLIENT_KEY}\r\n\
         Sec-WebSocket-Version: 13\r\n\
         \r\n"
    );
    stream.write_all(request.as_bytes()).await?;

    let response = read_response_head(&mut stream).await?;
    check_response(&response)?;
    Ok(stream)
}

/// Read bytes until the end of the HTTP response head.
async fn read_response_head(stream: &mut TcpStream) -> Result<Vec<u8>> {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if head.len() >= MAX_RESPONSE {
            return Err(Error::InvalidHandshake("response head too large".into()));
        }
        let n = stream.read(&mut byte).await?;
        if n == 0 {
            return Err(Error::InvalidHandshake(
                "connection closed during handshake".into(),
            ));
        }
        head.push(byte[0]);
    }
    Ok(head)
}

/// Check the status line and accept key of the server's response.
fn check_response(head: &[u8]) -> Result<()> {
    let text = std::str::from_utf8(head)
        .map_err(|_| Error::InvalidHandshake("response is not valid UTF-8".into()))?;

    let status = text
        .lines()
        .next()
        .ok_or_else(|| Error::InvalidHandshake("empty response".into()))?;
    if !status.starts_with("HTTP/1.1 101") {
        return Err(Error::InvalidHandshake(format!(
            "unexpected status line: {status}"
        )));
    }

    let accept = text
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("sec-websocket-accept"))
        .map(|(_, value)| value.trim())
        .ok_or_else(|| Error::InvalidHandshake("missing Sec-WebSocket-Accept".into()))?;

    let expected = compute_accept_key(CLIENT_KEY);
    if accept != expected {
        return Err(Error::InvalidHandshake(format!(
            "bad accept key: {accept}"
        )));
    }
    Ok(())
}
