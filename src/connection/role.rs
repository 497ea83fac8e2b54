//! Endpoint role, which fixes the masking direction.

/// Which end of the connection this endpoint is.
///
/// RFC 6455 Section 5.1: clients mask every frame they send, servers
/// never do. Both directions of the rule follow from the role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Initiating endpoint. Masks outgoing frames.
    Client,
    /// Accepting endpoint. Sends frames unmasked.
    Server,
}

impl Role {
    /// Whether frames sent by this endpoint carry a masking key.
    #[inline]
    #[must_use]
    pub const fn masks_outgoing(self) -> bool {
        matches!(self, Role::Client)
    }

    /// Whether frames received by this endpoint must carry a masking key.
    #[inline]
    #[must_use]
    pub const fn requires_masked_input(self) -> bool {
        matches!(self, Role::Server)
    }

    /// The role at the other end of the connection.
    #[inline]
    #[must_use]
    pub const fn peer(self) -> Self {
        match self {
            Role::Client => Role::Server,
            Role::Server => Role::Client,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Client => f.write_str("client"),
            Role::Server => f.write_str("server"),
        }
    }
}
