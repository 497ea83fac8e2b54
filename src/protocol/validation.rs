//! Inbound frame policy checks.
//!
//! Applied to a [`FrameHeader`] before the payload is buffered, so a
//! hostile peer cannot force a large allocation with a header that would
//! be rejected anyway. Covers the masking rule (RFC 6455 Section 5.1),
//! reserved bits (Section 5.2), and the configured frame size limit.

use crate::config::{Config, Limits};
use crate::connection::Role;
use crate::error::{Error, Result};
use crate::protocol::frame::FrameHeader;

/// Policy checks for inbound frame headers.
#[derive(Debug, Clone)]
pub struct FrameValidator {
    role: Role,
    limits: Limits,
    accept_unmasked: bool,
}

impl FrameValidator {
    /// Build a validator for `role` from the engine configuration.
    ///
    /// `Config::accept_unmasked_frames` only relaxes the rule on the
    /// server side; a client still rejects masked server frames.
    #[must_use]
    pub fn new(role: Role, config: &Config) -> Self {
        Self {
            role,
            limits: config.limits.clone(),
            accept_unmasked: config.accept_unmasked_frames,
        }
    }

    /// Check a parsed header against the inbound policy.
    ///
    /// # Errors
    ///
    /// - `Error::UnmaskedClientFrame` when a server sees an unmasked frame
    /// - `Error::MaskedServerFrame` when a client sees a masked frame
    /// - `Error::ReservedBitsSet` when any RSV bit is set
    /// - `Error::FrameTooLarge` when the declared payload exceeds the limit
    pub fn check_header(&self, header: &FrameHeader) -> Result<()> {
        match self.role {
            Role::Server => {
                if !header.masked() && !self.accept_unmasked {
                    return Err(Error::UnmaskedClientFrame);
                }
            }
            Role::Client => {
                if header.masked() {
                    return Err(Error::MaskedServerFrame);
                }
            }
        }

        if header.rsv1 || header.rsv2 || header.rsv3 {
            return Err(Error::ReservedBitsSet);
        }

        self.limits.check_frame_size(header.payload_len)
    }
}
