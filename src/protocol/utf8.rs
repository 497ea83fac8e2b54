//! Incremental UTF-8 validation for fragmented text messages.
//!
//! RFC 6455 Section 8.1 requires text payloads to be valid UTF-8 across
//! the whole message, while fragment boundaries may fall in the middle of
//! a multi-byte sequence. The validator accepts fragments one at a time
//! and carries a truncated sequence over to the next fragment.

use crate::error::{Error, Result};

/// Streaming UTF-8 validator.
///
/// Feed each text fragment with [`push`](Utf8Validator::push) and call
/// [`finish`](Utf8Validator::finish) when the final fragment has been
/// consumed. Validation never allocates; at most three bytes of a pending
/// multi-byte sequence are held between fragments.
#[derive(Debug, Clone, Default)]
pub struct Utf8Validator {
    pending: [u8; 4],
    pending_len: u8,
}

impl Utf8Validator {
    /// Create a validator with no pending sequence.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the next fragment of the message.
    ///
    /// A multi-byte sequence truncated at the end of `data` is carried
    /// over and completed by subsequent calls.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUtf8` on any malformed sequence.
    pub fn push(&mut self, data: &[u8]) -> Result<()> {
        let mut rest = data;

        // Top up a sequence carried over from the previous fragment one
        // byte at a time until it decodes or turns out malformed.
        while self.pending_len > 0 && !rest.is_empty() {
            self.pending[self.pending_len as usize] = rest[0];
            self.pending_len += 1;
            rest = &rest[1..];

            match std::str::from_utf8(&self.pending[..self.pending_len as usize]) {
                Ok(_) => {
                    self.pending_len = 0;
                }
                Err(e) if e.error_len().is_some() => {
                    self.pending_len = 0;
                    return Err(Error::InvalidUtf8);
                }
                // Still truncated; a sequence is at most 4 bytes, so this
                // cannot recur past pending_len == 3.
                Err(_) => {}
            }
        }

        match std::str::from_utf8(rest) {
            Ok(_) => Ok(()),
            Err(e) if e.error_len().is_some() => Err(Error::InvalidUtf8),
            Err(e) => {
                let tail = &rest[e.valid_up_to()..];
                self.pending[..tail.len()].copy_from_slice(tail);
                self.pending_len = tail.len() as u8;
                Ok(())
            }
        }
    }

    /// Declare the message complete.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUtf8` if a multi-byte sequence is still
    /// waiting for continuation bytes.
    pub fn finish(&mut self) -> Result<()> {
        if self.pending_len > 0 {
            self.pending_len = 0;
            return Err(Error::InvalidUtf8);
        }
        Ok(())
    }

    /// Discard any pending sequence, ready for a new message.
    pub fn reset(&mut self) {
        self.pending_len = 0;
    }

    /// Whether the last fragment ended inside a multi-byte sequence.
    #[must_use]
    pub fn is_mid_sequence(&self) -> bool {
        self.pending_len > 0
    }
}

/// Validate a complete, unfragmented payload.
///
/// # Errors
///
/// Returns `Error::InvalidUtf8` if `data` is not valid UTF-8.
pub fn validate_utf8(data: &[u8]) -> Result<()> {
    std::str::from_utf8(data)
        .map(|_| ())
        .map_err(|_| Error::InvalidUtf8)
}
