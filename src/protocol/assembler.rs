//! Reassembly of fragmented messages (RFC 6455 Section 5.4).

use bytes::BytesMut;

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::protocol::utf8::Utf8Validator;
use crate::protocol::{Frame, OpCode};

/// Collects data frames into complete messages.
///
/// Fragment ordering rules are enforced as frames arrive: a message opens
/// with a Text or Binary frame, continues with Continuation frames, and
/// ends at the first frame with FIN set. Text payloads are UTF-8 checked
/// incrementally, so a malformed fragment fails fast instead of after the
/// whole message has been buffered.
#[derive(Debug)]
pub struct MessageAssembler {
    limits: Limits,
    buffer: BytesMut,
    kind: Option<OpCode>,
    fragments: usize,
    utf8: Utf8Validator,
}

impl MessageAssembler {
    /// Create an assembler enforcing the given limits.
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            limits,
            buffer: BytesMut::new(),
            kind: None,
            fragments: 0,
            utf8: Utf8Validator::new(),
        }
    }

    /// Feed the next inbound data frame.
    ///
    /// Returns the complete message once the final fragment arrives, and
    /// `None` while a fragmented message is still accumulating. Control
    /// frames are ignored; they are handled before reassembly and may be
    /// interleaved with fragments.
    ///
    /// # Errors
    ///
    /// - `Error::ProtocolViolation` on misordered fragments
    /// - `Error::TooManyFragments` / `Error::MessageTooLarge` when a
    ///   limit is exceeded
    /// - `Error::InvalidUtf8` for malformed text payloads
    pub fn push(&mut self, frame: Frame) -> Result<Option<Message>> {
        if frame.opcode.is_control() {
            return Ok(None);
        }

        match (frame.opcode, self.kind) {
            (OpCode::Continuation, None) => {
                return Err(Error::ProtocolViolation(
                    "continuation frame without a message in progress".into(),
                ));
            }
            (OpCode::Continuation, Some(_)) => {}
            (_, Some(_)) => {
                return Err(Error::ProtocolViolation(
                    "data frame interleaved with a fragmented message".into(),
                ));
            }
            (opcode, None) => self.kind = Some(opcode),
        }

        self.fragments += 1;
        self.limits.check_fragment_count(self.fragments)?;
        self.limits
            .check_message_size(self.buffer.len() + frame.payload().len())?;

        if self.kind == Some(OpCode::Text) {
            self.utf8.push(frame.payload())?;
            if frame.fin {
                self.utf8.finish()?;
            }
        }

        self.buffer.extend_from_slice(frame.payload());

        if !frame.fin {
            return Ok(None);
        }

        let kind = self.kind.take();
        let payload = self.buffer.split().to_vec();
        self.fragments = 0;

        let message = if kind == Some(OpCode::Text) {
            Message::Text(String::from_utf8(payload).map_err(|_| Error::InvalidUtf8)?)
        } else {
            Message::Binary(payload)
        };
        Ok(Some(message))
    }

    /// Whether a fragmented message is currently accumulating.
    #[must_use]
    pub fn in_progress(&self) -> bool {
        self.kind.is_some()
    }

    /// Bytes buffered for the message in progress.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any partially assembled message.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.kind = None;
        self.fragments = 0;
        self.utf8.reset();
    }
}
