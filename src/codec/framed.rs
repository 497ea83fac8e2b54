//! Frame-level I/O over an async byte stream.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::Config;
use crate::connection::Role;
use crate::error::{Error, Result};
use crate::protocol::validation::FrameValidator;
use crate::protocol::{Frame, FrameHeader};

/// Seed for the outbound mask generator.
///
/// Masking keys defend against cache poisoning by intermediaries, not
/// against the peer, so a seeded PRNG is sufficient after the initial
/// entropy draw. Falls back to the clock if the OS source is unavailable.
fn mask_seed() -> u32 {
    let mut buf = [0u8; 4];
    if getrandom::getrandom(&mut buf).is_ok() {
        u32::from_le_bytes(buf)
    } else {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u32)
            .unwrap_or(0x6d61_736b)
    }
}

/// Reads and writes [`Frame`]s over any `AsyncRead + AsyncWrite` stream.
///
/// Inbound headers are checked against the masking rule, reserved bits,
/// and the frame size limit before the payload is buffered, so a frame
/// that would be rejected never costs its declared size in memory.
pub struct FrameCodec<T> {
    io: T,
    read_buf: BytesMut,
    write_buf: BytesMut,
    role: Role,
    read_chunk: usize,
    validator: FrameValidator,
    mask_state: u32,
}

impl<T> FrameCodec<T> {
    /// Wrap a stream, with empty read and write buffers.
    #[must_use]
    pub fn new(io: T, role: Role, config: &Config) -> Self {
        Self::with_leftover(io, role, config, BytesMut::new())
    }

    /// Wrap a stream together with bytes already read from it.
    ///
    /// The opening handshake is parsed from raw bytes before framing
    /// starts; anything the handshake reader consumed past the request
    /// end belongs to the first frame and is handed over here.
    #[must_use]
    pub fn with_leftover(io: T, role: Role, config: &Config, leftover: BytesMut) -> Self {
        let mut read_buf = leftover;
        read_buf.reserve(config.read_buffer_size);
        Self {
            io,
            read_buf,
            write_buf: BytesMut::with_capacity(config.write_buffer_size),
            role,
            read_chunk: config.read_buffer_size,
            validator: FrameValidator::new(role, config),
            mask_state: mask_seed(),
        }
    }

    /// Endpoint role of this codec.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Unwrap the underlying stream, discarding buffered data.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.io
    }

    /// Next masking key, xorshift over the seeded state.
    fn next_mask(&mut self) -> [u8; 4] {
        let mut x = self.mask_state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        // xorshift32 has a fixed point at zero
        self.mask_state = if x == 0 { 0x6d61_736b } else { x };
        self.mask_state.to_le_bytes()
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> FrameCodec<T> {
    /// Read the next complete frame from the stream.
    ///
    /// Partial delivery is handled by buffering; a frame split across any
    /// number of reads is reassembled transparently.
    ///
    /// # Errors
    ///
    /// - `Error::ConnectionClosed(None)` if the stream ends between frames
    /// - Header policy errors from [`FrameValidator`]
    /// - `Error::Io` on transport failure
    pub async fn read_frame(&mut self) -> Result<Frame> {
        loop {
            match FrameHeader::parse(&self.read_buf) {
                Ok(header) => {
                    self.validator.check_header(&header)?;
                    let total = header.frame_len()?;

                    if self.read_buf.len() >= total {
                        let raw = self.read_buf.split_to(total).freeze();
                        let (frame, _) = Frame::parse_zero_copy(&raw)?;
                        return Ok(frame);
                    }
                    self.read_buf.reserve(total - self.read_buf.len());
                }
                Err(Error::IncompleteFrame { .. }) => {
                    self.read_buf.reserve(self.read_chunk);
                }
                Err(e) => return Err(e),
            }

            let n = self.io.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Err(Error::ConnectionClosed(None));
            }
        }
    }

    /// Encode and send a single frame, masking it when the role requires.
    ///
    /// Cancellation-safe: encoded bytes stay in the write buffer until
    /// the stream has taken them, so a frame interrupted mid-write goes
    /// out intact on the next write or flush instead of leaving a torn
    /// frame on the wire.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` on transport failure.
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let mask = self.role.masks_outgoing().then(|| self.next_mask());

        frame.write(&mut self.write_buf, mask);
        self.drain_write_buf().await
    }

    /// Flush the underlying stream, draining any bytes a cancelled write
    /// left behind.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` on transport failure.
    pub async fn flush(&mut self) -> Result<()> {
        self.drain_write_buf().await?;
        self.io.flush().await?;
        Ok(())
    }

    async fn drain_write_buf(&mut self) -> Result<()> {
        while !self.write_buf.is_empty() {
            let n = self.io.write(&self.write_buf).await?;
            if n == 0 {
                return Err(Error::Io("stream refused to accept bytes".into()));
            }
            self.write_buf.advance(n);
        }
        Ok(())
    }

    /// Shut down the write half of the stream.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` on transport failure.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.io.shutdown().await?;
        Ok(())
    }
}
