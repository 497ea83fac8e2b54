//! WebSocket frame parsing and serialization (RFC 6455 Section 5.2).

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::protocol::OpCode;
use crate::protocol::mask::{apply_mask, apply_mask_fast};

/// Maximum payload size for control frames (RFC 6455 Section 5.5).
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

/// Decoded frame header, available before the payload has arrived.
///
/// Parsing the header alone lets a reader enforce masking rules and size
/// limits without buffering the payload first.
#[derive(Debug, Clone)]
pub struct FrameHeader {
    /// Final fragment flag.
    pub fin: bool,
    /// Reserved bit 1, must be zero.
    pub rsv1: bool,
    /// Reserved bit 2, must be zero.
    pub rsv2: bool,
    /// Reserved bit 3, must be zero.
    pub rsv3: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    /// Declared payload length in bytes.
    pub payload_len: usize,
    mask: Option<[u8; 4]>,
    header_len: usize,
}

impl FrameHeader {
    /// Parse a frame header from the start of `buf`.
    ///
    /// # Errors
    ///
    /// Returns `Error::IncompleteFrame` with the number of additional bytes
    /// needed when the buffer ends mid-header.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 2 {
            return Err(Error::IncompleteFrame {
                needed: 2 - buf.len(),
            });
        }

        let byte0 = buf[0];
        let byte1 = buf[1];

        let fin = (byte0 & 0x80) != 0;
        let rsv1 = (byte0 & 0x40) != 0;
        let rsv2 = (byte0 & 0x20) != 0;
        let rsv3 = (byte0 & 0x10) != 0;
        let opcode = OpCode::from_u8(byte0 & 0x0F)?;

        let masked = (byte1 & 0x80) != 0;
        let short_len = byte1 & 0x7F;

        // Overlong extended encodings are accepted; only the value matters.
        let (payload_len, len_end) = match short_len {
            0..=125 => (short_len as usize, 2),
            126 => {
                if buf.len() < 4 {
                    return Err(Error::IncompleteFrame {
                        needed: 4 - buf.len(),
                    });
                }
                (u16::from_be_bytes([buf[2], buf[3]]) as usize, 4)
            }
            127 => {
                if buf.len() < 10 {
                    return Err(Error::IncompleteFrame {
                        needed: 10 - buf.len(),
                    });
                }
                let len = u64::from_be_bytes([
                    buf[2], buf[3], buf[4], buf[5], buf[6], buf[7], buf[8], buf[9],
                ]);
                let len = usize::try_from(len).map_err(|_| Error::FrameTooLarge {
                    size: usize::MAX,
                    max: usize::MAX,
                })?;
                (len, 10)
            }
            _ => unreachable!(),
        };

        let header_len = if masked { len_end + 4 } else { len_end };
        if buf.len() < header_len {
            return Err(Error::IncompleteFrame {
                needed: header_len - buf.len(),
            });
        }

        let mask = if masked {
            Some([buf[len_end], buf[len_end + 1], buf[len_end + 2], buf[len_end + 3]])
        } else {
            None
        };

        Ok(FrameHeader {
            fin,
            rsv1,
            rsv2,
            rsv3,
            opcode,
            mask,
            payload_len,
            header_len,
        })
    }

    /// Whether the MASK bit was set.
    #[inline]
    #[must_use]
    pub const fn masked(&self) -> bool {
        self.mask.is_some()
    }

    /// Total on-wire length of the frame, header plus payload.
    ///
    /// # Errors
    ///
    /// Returns `Error::FrameTooLarge` if the total would overflow `usize`.
    pub fn frame_len(&self) -> Result<usize> {
        self.header_len
            .checked_add(self.payload_len)
            .ok_or(Error::FrameTooLarge {
                size: self.payload_len,
                max: usize::MAX - self.header_len,
            })
    }
}

/// Frame payload storage.
///
/// Unmasked frames parsed from a `Bytes` buffer share the underlying
/// allocation; masked frames must be copied for the in-place XOR.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Payload {
    Owned(Vec<u8>),
    Shared(Bytes),
}

/// A single WebSocket frame.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |F|R|R|R| opcode |M| Payload len |    Extended payload length    |
/// |I|S|S|S|  (4)   |A|     (7)     |             (16/64)           |
/// |N|V|V|V|       |S|             |   (if payload len==126/127)   |
/// | |1|2|3|       |K|             |                               |
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |                         Masking key (if present)              |
/// +---------------------------------------------------------------+
/// |                     Payload data                              |
/// +---------------------------------------------------------------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag.
    pub fin: bool,
    /// Reserved bit 1, must be zero.
    pub rsv1: bool,
    /// Reserved bit 2, must be zero.
    pub rsv2: bool,
    /// Reserved bit 3, must be zero.
    pub rsv3: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    payload: Payload,
}

impl Frame {
    /// Create a frame with the given FIN flag, opcode, and payload.
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: Vec<u8>) -> Self {
        Self {
            fin,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode,
            payload: Payload::Owned(payload),
        }
    }

    /// Create a final text frame.
    #[must_use]
    pub fn text(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Text, data.into())
    }

    /// Create a final binary frame.
    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Binary, data.into())
    }

    /// Create a close frame with optional status code and reason.
    #[must_use]
    pub fn close(code: Option<u16>, reason: &str) -> Self {
        let payload = if let Some(code) = code {
            let mut data = code.to_be_bytes().to_vec();
            data.extend_from_slice(reason.as_bytes());
            data
        } else {
            Vec::new()
        };
        Self::new(true, OpCode::Close, payload)
    }

    /// Create a ping frame.
    #[must_use]
    pub fn ping(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Ping, data.into())
    }

    /// Create a pong frame.
    #[must_use]
    pub fn pong(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Pong, data.into())
    }

    /// Payload bytes.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        match &self.payload {
            Payload::Owned(data) => data,
            Payload::Shared(data) => data,
        }
    }

    /// Take ownership of the payload.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        match self.payload {
            Payload::Owned(data) => data,
            Payload::Shared(data) => data.to_vec(),
        }
    }

    /// Total on-wire length of the frame at the start of `buf`.
    ///
    /// # Errors
    ///
    /// Returns `Error::IncompleteFrame` when the buffer ends before the
    /// header is complete, and header-validity errors otherwise.
    pub fn frame_len(buf: &[u8]) -> Result<usize> {
        FrameHeader::parse(buf)?.frame_len()
    }

    /// Decode one frame from the start of `buf`.
    ///
    /// Returns the frame and the number of bytes consumed. Masked payloads
    /// are unmasked during decoding.
    ///
    /// # Errors
    ///
    /// Returns `Error::IncompleteFrame` when `buf` holds only part of a
    /// frame, and a protocol error for malformed headers.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize)> {
        let header = FrameHeader::parse(buf)?;
        let total = header.frame_len()?;

        if buf.len() < total {
            return Err(Error::IncompleteFrame {
                needed: total - buf.len(),
            });
        }

        let mut data = buf[header.header_len..total].to_vec();
        if let Some(mask) = header.mask {
            apply_mask_fast(&mut data, mask);
        }

        Ok((
            Frame {
                fin: header.fin,
                rsv1: header.rsv1,
                rsv2: header.rsv2,
                rsv3: header.rsv3,
                opcode: header.opcode,
                payload: Payload::Owned(data),
            },
            total,
        ))
    }

    /// Decode one frame from a `Bytes` buffer, sharing the payload
    /// allocation for unmasked frames.
    ///
    /// # Errors
    ///
    /// Same as [`Frame::parse`].
    pub fn parse_zero_copy(buf: &Bytes) -> Result<(Self, usize)> {
        let header = FrameHeader::parse(buf)?;
        let total = header.frame_len()?;

        if buf.len() < total {
            return Err(Error::IncompleteFrame {
                needed: total - buf.len(),
            });
        }

        let payload = if let Some(mask) = header.mask {
            let mut data = buf[header.header_len..total].to_vec();
            apply_mask_fast(&mut data, mask);
            Payload::Owned(data)
        } else {
            Payload::Shared(buf.slice(header.header_len..total))
        };

        Ok((
            Frame {
                fin: header.fin,
                rsv1: header.rsv1,
                rsv2: header.rsv2,
                rsv3: header.rsv3,
                opcode: header.opcode,
                payload,
            },
            total,
        ))
    }

    /// Validate the frame per RFC 6455.
    ///
    /// # Errors
    ///
    /// - `Error::ReservedBitsSet` if any RSV bit is set
    /// - `Error::FragmentedControlFrame` if a control frame has FIN clear
    /// - `Error::ControlFrameTooLarge` if a control payload exceeds 125 bytes
    pub fn validate(&self) -> Result<()> {
        if self.rsv1 || self.rsv2 || self.rsv3 {
            return Err(Error::ReservedBitsSet);
        }

        if self.opcode.is_control() {
            if !self.fin {
                return Err(Error::FragmentedControlFrame);
            }
            if self.payload().len() > MAX_CONTROL_FRAME_PAYLOAD {
                return Err(Error::ControlFrameTooLarge(self.payload().len()));
            }
        }

        Ok(())
    }

    /// Encode the frame into `buf`, returning the number of bytes written.
    ///
    /// A `Some` mask produces a masked client frame; server frames pass
    /// `None` and are never masked.
    pub fn write(&self, buf: &mut BytesMut, mask: Option<[u8; 4]>) -> usize {
        let payload = self.payload();
        let payload_len = payload.len();
        buf.reserve(self.wire_size(mask.is_some()));

        let mut byte0 = self.opcode.as_u8();
        if self.fin {
            byte0 |= 0x80;
        }
        if self.rsv1 {
            byte0 |= 0x40;
        }
        if self.rsv2 {
            byte0 |= 0x20;
        }
        if self.rsv3 {
            byte0 |= 0x10;
        }
        buf.put_u8(byte0);

        let mask_bit = if mask.is_some() { 0x80 } else { 0x00 };
        if payload_len <= 125 {
            buf.put_u8(mask_bit | payload_len as u8);
        } else if payload_len <= 65535 {
            buf.put_u8(mask_bit | 126);
            buf.put_u16(payload_len as u16);
        } else {
            buf.put_u8(mask_bit | 127);
            buf.put_u64(payload_len as u64);
        }

        if let Some(key) = mask {
            buf.put_slice(&key);
            let start = buf.len();
            buf.put_slice(payload);
            apply_mask(&mut buf[start..], key);
        } else {
            buf.put_slice(payload);
        }

        self.wire_size(mask.is_some())
    }

    /// On-wire size of this frame when encoded.
    #[must_use]
    pub fn wire_size(&self, masked: bool) -> usize {
        let payload_len = self.payload().len();
        let extended = if payload_len <= 125 {
            0
        } else if payload_len <= 65535 {
            2
        } else {
            8
        };
        let mask_len = if masked { 4 } else { 0 };
        2 + extended + mask_len + payload_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unmasked_text_frame() {
        // FIN=1, opcode=1 (text), unmasked, payload="Hello"
        let data = &[0x81, 0x05, 0x48, 0x65, 0x6c, 0x6c, 0x6f];
        let (frame, len) = Frame::parse(data).unwrap();
        assert_eq!(len, 7);
        assert!(frame.fin);
        assert!(!frame.rsv1);
        assert_eq!(frame.opcode, OpCode::Text);
        assert_eq!(frame.payload(), b"Hello");
    }

    #[test]
    fn test_parse_masked_text_frame() {
        // Mask key 0x37fa213d, masked "Hello" per the RFC example
        let data = &[
            0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58,
        ];
        let (frame, len) = Frame::parse(data).unwrap();
        assert_eq!(len, 11);
        assert!(frame.fin);
        assert_eq!(frame.opcode, OpCode::Text);
        assert_eq!(frame.payload(), b"Hello");
    }

    #[test]
    fn test_parse_binary_frame() {
        let data = &[0x82, 0x03, 0x01, 0x02, 0x03];
        let (frame, len) = Frame::parse(data).unwrap();
        assert_eq!(len, 5);
        assert_eq!(frame.opcode, OpCode::Binary);
        assert_eq!(frame.payload(), &[0x01, 0x02, 0x03]);
    }

    #[test]
    fn test_parse_control_frames() {
        // Close with code 1000
        let (frame, len) = Frame::parse(&[0x88, 0x02, 0x03, 0xe8]).unwrap();
        assert_eq!(len, 4);
        assert_eq!(frame.opcode, OpCode::Close);
        assert_eq!(frame.payload(), &[0x03, 0xe8]);

        let (frame, _) = Frame::parse(&[0x89, 0x04, 0x70, 0x69, 0x6e, 0x67]).unwrap();
        assert_eq!(frame.opcode, OpCode::Ping);
        assert_eq!(frame.payload(), b"ping");

        let (frame, _) = Frame::parse(&[0x8a, 0x04, 0x70, 0x6f, 0x6e, 0x67]).unwrap();
        assert_eq!(frame.opcode, OpCode::Pong);
        assert_eq!(frame.payload(), b"pong");
    }

    #[test]
    fn test_parse_fragment_frames() {
        // FIN=0 text "Hel" followed by FIN=1 continuation "lo"
        let (first, _) = Frame::parse(&[0x01, 0x03, 0x48, 0x65, 0x6c]).unwrap();
        assert!(!first.fin);
        assert_eq!(first.opcode, OpCode::Text);
        assert_eq!(first.payload(), b"Hel");

        let (rest, _) = Frame::parse(&[0x80, 0x02, 0x6c, 0x6f]).unwrap();
        assert!(rest.fin);
        assert_eq!(rest.opcode, OpCode::Continuation);
        assert_eq!(rest.payload(), b"lo");
    }

    #[test]
    fn test_parse_extended_length_16() {
        let mut data = vec![0x82, 0x7e, 0x01, 0x00];
        data.extend(vec![0xab; 256]);

        let (frame, len) = Frame::parse(&data).unwrap();
        assert_eq!(len, 4 + 256);
        assert_eq!(frame.payload().len(), 256);
        assert!(frame.payload().iter().all(|&b| b == 0xab));
    }

    #[test]
    fn test_parse_extended_length_64() {
        let mut data = vec![0x82, 0x7f];
        data.extend(65536u64.to_be_bytes());
        data.extend(vec![0xcd; 65536]);

        let (frame, len) = Frame::parse(&data).unwrap();
        assert_eq!(len, 10 + 65536);
        assert_eq!(frame.payload().len(), 65536);
    }

    #[test]
    fn test_parse_empty_payload() {
        let (frame, len) = Frame::parse(&[0x81, 0x00]).unwrap();
        assert_eq!(len, 2);
        assert_eq!(frame.payload(), b"");
    }

    #[test]
    fn test_parse_reserved_opcodes() {
        assert!(matches!(
            Frame::parse(&[0x83, 0x00]),
            Err(Error::ReservedOpcode(0x03))
        ));
        assert!(matches!(
            Frame::parse(&[0x8b, 0x00]),
            Err(Error::ReservedOpcode(0x0B))
        ));
    }

    #[test]
    fn test_parse_incomplete_header() {
        assert!(matches!(
            Frame::parse(&[0x81]),
            Err(Error::IncompleteFrame { needed: 1 })
        ));
    }

    #[test]
    fn test_parse_incomplete_payload() {
        // Header says 5 payload bytes, only 3 present
        let data = &[0x81, 0x05, 0x48, 0x65, 0x6c];
        assert!(matches!(
            Frame::parse(data),
            Err(Error::IncompleteFrame { needed: 2 })
        ));
    }

    #[test]
    fn test_parse_incomplete_extended_lengths() {
        assert!(matches!(
            Frame::parse(&[0x82, 0x7e, 0x01]),
            Err(Error::IncompleteFrame { needed: 1 })
        ));
        assert!(matches!(
            Frame::parse(&[0x82, 0x7f, 0x00, 0x00, 0x00]),
            Err(Error::IncompleteFrame { needed: 5 })
        ));
    }

    #[test]
    fn test_parse_incomplete_mask_key() {
        let data = &[0x81, 0x85, 0x37, 0xfa];
        assert!(matches!(
            Frame::parse(data),
            Err(Error::IncompleteFrame { .. })
        ));
    }

    #[test]
    fn test_header_probe_before_payload() {
        // Masked text frame header, no payload bytes yet
        let header = FrameHeader::parse(&[0x81, 0xfe, 0x01, 0x00, 1, 2, 3, 4]).unwrap();
        assert!(header.fin);
        assert!(header.masked());
        assert_eq!(header.opcode, OpCode::Text);
        assert_eq!(header.payload_len, 256);
        assert_eq!(header.frame_len().unwrap(), 8 + 256);
    }

    #[test]
    fn test_frame_len() {
        assert_eq!(Frame::frame_len(&[0x81, 0x05]).unwrap(), 7);
        assert_eq!(Frame::frame_len(&[0x81, 0x85, 1, 2, 3, 4]).unwrap(), 11);
        assert!(matches!(
            Frame::frame_len(&[0x81]),
            Err(Error::IncompleteFrame { needed: 1 })
        ));
    }

    #[test]
    fn test_write_unmasked_text_frame() {
        let frame = Frame::text(b"Hello".to_vec());
        let mut buf = BytesMut::new();

        let len = frame.write(&mut buf, None);

        assert_eq!(len, 7);
        assert_eq!(&buf[..], &[0x81, 0x05, 0x48, 0x65, 0x6c, 0x6c, 0x6f]);
    }

    #[test]
    fn test_write_masked_text_frame() {
        let frame = Frame::text(b"Hello".to_vec());
        let mask = [0x37, 0xfa, 0x21, 0x3d];
        let mut buf = BytesMut::new();

        let len = frame.write(&mut buf, Some(mask));

        assert_eq!(len, 11);
        assert_eq!(buf[0], 0x81);
        assert_eq!(buf[1], 0x85);
        assert_eq!(&buf[2..6], &mask);
        assert_eq!(&buf[6..11], &[0x7f, 0x9f, 0x4d, 0x51, 0x58]);
    }

    #[test]
    fn test_write_extended_lengths() {
        let mut buf = BytesMut::new();
        let len = Frame::binary(vec![0xab; 256]).write(&mut buf, None);
        assert_eq!(len, 4 + 256);
        assert_eq!(buf[0], 0x82);
        assert_eq!(buf[1], 0x7e);
        assert_eq!(&buf[2..4], &[0x01, 0x00]);

        let mut buf = BytesMut::new();
        let len = Frame::binary(vec![0xcd; 65536]).write(&mut buf, None);
        assert_eq!(len, 10 + 65536);
        assert_eq!(buf[1], 0x7f);
        assert_eq!(&buf[2..10], &65536u64.to_be_bytes());
    }

    #[test]
    fn test_roundtrip_unmasked() {
        let original = Frame::text(b"WebSocket roundtrip test!".to_vec());
        let mut buf = BytesMut::new();

        let written = original.write(&mut buf, None);
        let (parsed, consumed) = Frame::parse(&buf).unwrap();

        assert_eq!(consumed, written);
        assert_eq!(parsed.fin, original.fin);
        assert_eq!(parsed.opcode, original.opcode);
        assert_eq!(parsed.payload(), original.payload());
    }

    #[test]
    fn test_roundtrip_masked() {
        let original = Frame::binary(vec![0xde, 0xad, 0xbe, 0xef, 0x01]);
        let mut buf = BytesMut::new();

        let written = original.write(&mut buf, Some([0x12, 0x34, 0x56, 0x78]));
        let (parsed, consumed) = Frame::parse(&buf).unwrap();

        assert_eq!(consumed, written);
        assert_eq!(parsed.payload(), original.payload());
    }

    #[test]
    fn test_validate_fragmented_control_frame() {
        let mut frame = Frame::ping(b"test".to_vec());
        frame.fin = false;
        assert!(matches!(
            frame.validate(),
            Err(Error::FragmentedControlFrame)
        ));
    }

    #[test]
    fn test_validate_control_frame_too_large() {
        let frame = Frame::ping(vec![0u8; 126]);
        assert!(matches!(
            frame.validate(),
            Err(Error::ControlFrameTooLarge(126))
        ));

        // 125 bytes is still legal
        assert!(Frame::ping(vec![0u8; 125]).validate().is_ok());
    }

    #[test]
    fn test_validate_reserved_bits() {
        let mut frame = Frame::text(b"test".to_vec());
        frame.rsv1 = true;
        assert!(matches!(frame.validate(), Err(Error::ReservedBitsSet)));

        // RSV bits survive parsing and fail validation afterwards
        let (parsed, _) = Frame::parse(&[0xc1, 0x00]).unwrap();
        assert!(parsed.rsv1);
        assert!(matches!(parsed.validate(), Err(Error::ReservedBitsSet)));
    }

    #[test]
    fn test_close_frame_with_reason() {
        let frame = Frame::close(Some(1000), "Normal closure");
        assert_eq!(frame.opcode, OpCode::Close);
        assert!(frame.fin);

        let payload = frame.payload();
        assert_eq!(u16::from_be_bytes([payload[0], payload[1]]), 1000);
        assert_eq!(&payload[2..], b"Normal closure");

        let empty = Frame::close(None, "");
        assert!(empty.payload().is_empty());
    }

    #[test]
    fn test_wire_size() {
        let frame = Frame::text(b"Hello".to_vec());
        assert_eq!(frame.wire_size(false), 7);
        assert_eq!(frame.wire_size(true), 11);

        let frame = Frame::binary(vec![0u8; 256]);
        assert_eq!(frame.wire_size(false), 260);

        let frame = Frame::binary(vec![0u8; 65536]);
        assert_eq!(frame.wire_size(false), 65546);
    }

    #[test]
    fn test_into_payload() {
        let frame = Frame::text(b"Owned data".to_vec());
        assert_eq!(frame.into_payload(), b"Owned data");
    }

    #[test]
    fn test_parse_zero_copy_shares_unmasked_payload() {
        let data = Bytes::from_static(&[0x81, 0x05, 0x48, 0x65, 0x6c, 0x6c, 0x6f]);
        let (frame, len) = Frame::parse_zero_copy(&data).unwrap();
        assert_eq!(len, 7);
        assert_eq!(frame.payload(), b"Hello");
        assert!(matches!(frame.payload, Payload::Shared(_)));
    }

    #[test]
    fn test_parse_zero_copy_copies_masked_payload() {
        let data = Bytes::from_static(&[
            0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58,
        ]);
        let (frame, _) = Frame::parse_zero_copy(&data).unwrap();
        assert_eq!(frame.payload(), b"Hello");
        assert!(matches!(frame.payload, Payload::Owned(_)));
    }

    #[test]
    fn test_huge_claimed_length_does_not_panic() {
        // Header claims u64::MAX payload bytes
        let mut data = vec![0x82, 0xFF];
        data.extend_from_slice(&u64::MAX.to_be_bytes());
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

        assert!(Frame::parse(&data).is_err());
    }
}
