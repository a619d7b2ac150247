use crate::types::{AccessGrant, MembershipRole, Principal, TokenType};

/// Authentication metadata attached to a session, describing how the caller authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Metadata {
    Empty,
    /// Authenticated through a persisted token.
    Token {
        token_type: TokenType,
        token_id: i64,
        grants: AccessGrant,
    },
    /// Authenticated through an ephemeral membership grant embedded in the credential.
    Membership {
        space_id: i64,
        role: MembershipRole,
    },
}

impl Metadata {
    /// Returns true if the metadata by itself grants authorization beyond the
    /// principal's stored memberships. Such sessions cannot mint further credentials.
    #[must_use]
    pub fn impacts_authorization(&self) -> bool {
        match self {
            Self::Empty | Self::Token { .. } => false,
            Self::Membership { .. } => true,
        }
    }
}

/// The authenticated identity of a single request.
#[derive(Debug, Clone)]
pub struct Session {
    pub principal: Principal,
    pub metadata: Metadata,
}

impl Session {
    #[must_use]
    pub fn new(principal: Principal, metadata: Metadata) -> Self {
        Self {
            principal,
            metadata,
        }
    }
}
