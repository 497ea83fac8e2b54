//! A single WebSocket connection over an async stream.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::codec::FrameCodec;
use crate::config::{Config, Limits};
use crate::connection::fragmenter::MessageFragmenter;
use crate::connection::{ConnectionState, Role};
use crate::error::{Error, Result};
use crate::message::{CloseCode, CloseFrame, Message};
use crate::protocol::assembler::MessageAssembler;
use crate::protocol::handshake::{self, HandshakeRequest, HandshakeResponse};
use crate::protocol::{Frame, OpCode};

/// Message-level view of one WebSocket connection.
///
/// Wraps a raw stream with framing, reassembly, keepalive handling, and
/// the connection state machine. The server obtains one by driving the
/// opening handshake with [`Connection::accept`]; test clients wrap an
/// already-upgraded stream with [`Connection::new`].
pub struct Connection<T> {
    codec: FrameCodec<T>,
    state: ConnectionState,
    assembler: MessageAssembler,
    pending_pong: Option<Vec<u8>>,
    limits: Limits,
    fragment_size: usize,
}

impl<T> Connection<T> {
    /// Wrap a stream on which the handshake has already happened.
    #[must_use]
    pub fn new(io: T, role: Role, config: &Config) -> Self {
        Self::from_codec(FrameCodec::new(io, role, config), config)
    }

    fn from_codec(codec: FrameCodec<T>, config: &Config) -> Self {
        Self {
            codec,
            state: ConnectionState::Open,
            assembler: MessageAssembler::new(config.limits.clone()),
            pending_pong: None,
            limits: config.limits.clone(),
            fragment_size: config.fragment_size,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether messages can currently be sent.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> Connection<T> {
    /// Perform the server side of the opening handshake.
    ///
    /// Reads the upgrade request, validates it (including the origin
    /// allow-list when configured), and answers with `101 Switching
    /// Protocols`. A rejected request is answered with `400 Bad Request`
    /// before the error is returned. Bytes received past the end of the
    /// request are kept and decoded as the first frames.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHandshake` for malformed or oversized
    /// requests and `Error::Io` on transport failure.
    pub async fn accept(mut io: T, config: &Config) -> Result<(Self, HandshakeRequest)> {
        let mut buf = BytesMut::with_capacity(config.read_buffer_size);

        let end = loop {
            if let Some(end) = handshake::find_request_end(&buf) {
                break end;
            }
            config.limits.check_handshake_size(buf.len())?;

            let n = io.read_buf(&mut buf).await?;
            if n == 0 {
                return Err(Error::InvalidHandshake(
                    "connection closed before request completed".into(),
                ));
            }
        };
        config.limits.check_handshake_size(end)?;

        let (request, response) = match Self::negotiate(&buf[..end], config) {
            Ok(accepted) => accepted,
            Err(e) => {
                let rejection = handshake::bad_request_response(&e.to_string());
                let _ = io.write_all(&rejection).await;
                let _ = io.flush().await;
                return Err(e);
            }
        };

        io.write_all(&response).await?;
        io.flush().await?;
        debug!(path = %request.path, "handshake complete");

        let leftover = buf.split_off(end);
        let codec = FrameCodec::with_leftover(io, Role::Server, config, leftover);
        Ok((Self::from_codec(codec, config), request))
    }

    fn negotiate(raw: &[u8], config: &Config) -> Result<(HandshakeRequest, Vec<u8>)> {
        let request = HandshakeRequest::parse(raw)?;
        request.validate()?;

        if let Some(allowed) = &config.allowed_origins {
            handshake::validate_origin(request.origin.as_deref(), allowed)?;
        }

        let mut response = Vec::new();
        HandshakeResponse::from_request(&request).write(&mut response)?;
        Ok((request, response))
    }

    /// Send a message, flushing it to the stream.
    ///
    /// Text and binary payloads larger than the configured fragment size
    /// are split into continuation frames. Control messages go out as a
    /// single frame.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidState` unless the connection is open
    /// - `Error::MessageTooLarge` / `Error::ControlFrameTooLarge` for
    ///   payloads over the limits
    /// - `Error::Io` on transport failure
    pub async fn send(&mut self, message: Message) -> Result<()> {
        self.write_message(message).await?;
        self.codec.flush().await
    }

    /// Send several messages with a single flush at the end.
    ///
    /// # Errors
    ///
    /// Same as [`Connection::send`]; messages before the failing one may
    /// already be on the wire.
    pub async fn send_all(&mut self, messages: impl IntoIterator<Item = Message>) -> Result<()> {
        for message in messages {
            self.write_message(message).await?;
        }
        self.codec.flush().await
    }

    /// Flush buffered writes to the stream.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` on transport failure.
    pub async fn flush(&mut self) -> Result<()> {
        self.codec.flush().await
    }

    async fn write_message(&mut self, message: Message) -> Result<()> {
        if !self.state.can_send() {
            return Err(Error::InvalidState(format!(
                "cannot send while {}",
                self.state
            )));
        }

        // An unanswered ping must be answered before any frame queued
        // after it, including our own.
        if let Some(data) = self.pending_pong.take() {
            let pong = Frame::pong(data);
            self.codec.write_frame(&pong).await?;
        }

        match message {
            Message::Text(text) => self.write_data(OpCode::Text, text.into_bytes()).await,
            Message::Binary(data) => self.write_data(OpCode::Binary, data).await,
            Message::Ping(data) => self.write_control(Frame::ping(data)).await,
            Message::Pong(data) => self.write_control(Frame::pong(data)).await,
            Message::Close(frame) => {
                let (code, reason) = match frame {
                    Some(cf) => (cf.code, cf.reason),
                    None => (CloseCode::Normal, String::new()),
                };
                self.close(code, &reason).await
            }
        }
    }

    async fn write_data(&mut self, opcode: OpCode, payload: Vec<u8>) -> Result<()> {
        self.limits.check_message_size(payload.len())?;

        for frame in MessageFragmenter::new(opcode, &payload, self.fragment_size) {
            self.codec.write_frame(&frame).await?;
        }
        Ok(())
    }

    async fn write_control(&mut self, frame: Frame) -> Result<()> {
        frame.validate()?;
        self.codec.write_frame(&frame).await
    }

    /// Receive the next message.
    ///
    /// Handles the protocol machinery between messages: pings are
    /// answered with pongs in arrival order, fragments are reassembled,
    /// and an inbound close frame is echoed to complete the close
    /// handshake. Once the connection has started closing, inbound data
    /// frames are read and dropped.
    ///
    /// Returns `Ok(None)` once the connection is closed.
    ///
    /// # Errors
    ///
    /// Protocol violations and transport failures. After an error the
    /// connection is no longer usable; callers map the error to a close
    /// code via [`Error::close_code`](crate::Error::close_code).
    pub async fn recv(&mut self) -> Result<Option<Message>> {
        loop {
            if self.state == ConnectionState::Closed {
                return Ok(None);
            }

            if let Some(data) = self.pending_pong.take() {
                let pong = Frame::pong(data);
                self.codec.write_frame(&pong).await?;
                self.codec.flush().await?;
            }

            let frame = match self.codec.read_frame().await {
                Ok(frame) => frame,
                Err(Error::ConnectionClosed(code)) => {
                    self.state = ConnectionState::Closed;
                    return Err(Error::ConnectionClosed(code));
                }
                Err(e) => return Err(e),
            };
            frame.validate()?;

            match frame.opcode {
                OpCode::Ping => {
                    if self.state == ConnectionState::Open {
                        self.pending_pong = Some(frame.payload().to_vec());
                        return Ok(Some(Message::Ping(frame.into_payload())));
                    }
                    // Closing: the close frame must be our last frame, so
                    // the ping goes unanswered.
                }
                OpCode::Pong => {
                    if self.state == ConnectionState::Open {
                        return Ok(Some(Message::Pong(frame.into_payload())));
                    }
                }
                OpCode::Close => {
                    let close_frame = parse_close_payload(frame.payload())?;

                    if self.state == ConnectionState::Open {
                        let echo_code = close_frame
                            .as_ref()
                            .map_or(CloseCode::Normal, |cf| cf.code);
                        let echo = Frame::close(Some(echo_code.as_u16()), "");
                        self.codec.write_frame(&echo).await?;
                        self.codec.flush().await?;
                    }

                    self.state = ConnectionState::Closed;
                    return Ok(Some(Message::Close(close_frame)));
                }
                OpCode::Text | OpCode::Binary | OpCode::Continuation => {
                    if self.state.delivers_inbound() {
                        if let Some(message) = self.assembler.push(frame)? {
                            return Ok(Some(message));
                        }
                    }
                }
            }
        }
    }

    /// Start the close handshake.
    ///
    /// Sends a close frame and moves to `Closing`. The connection is done
    /// once [`recv`](Connection::recv) observes the peer's close echo or
    /// the transport ends. Calling this when not open is a no-op.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidCloseCode` for codes that must not go on the wire
    /// - `Error::Io` on transport failure
    pub async fn close(&mut self, code: CloseCode, reason: &str) -> Result<()> {
        if code.is_reserved() || !code.is_valid() {
            return Err(Error::InvalidCloseCode(code.as_u16()));
        }
        if self.state != ConnectionState::Open {
            return Ok(());
        }

        self.state = ConnectionState::Closing;
        let frame = Frame::close(Some(code.as_u16()), reason);
        self.codec.write_frame(&frame).await?;
        self.codec.flush().await
    }
}

/// Decode a close frame payload into code and reason.
fn parse_close_payload(payload: &[u8]) -> Result<Option<CloseFrame>> {
    match payload.len() {
        0 => Ok(None),
        1 => Err(Error::ProtocolViolation(
            "close payload of a single byte".into(),
        )),
        _ => {
            let code = CloseCode::from_u16(u16::from_be_bytes([payload[0], payload[1]]));
            if !code.is_valid() {
                return Err(Error::InvalidCloseCode(code.as_u16()));
            }
            let reason = std::str::from_utf8(&payload[2..])?;
            Ok(Some(CloseFrame::new(code, reason)))
        }
    }
}
