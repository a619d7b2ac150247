use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccessGrant, MembershipRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalType {
    User,
    Service,
    ServiceAccount,
}

impl PrincipalType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Service => "service",
            Self::ServiceAccount => "service_account",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "service" => Some(Self::Service),
            "service_account" => Some(Self::ServiceAccount),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub id: i64,
    pub uid: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub principal_type: PrincipalType,
    pub admin: bool,
    pub blocked: bool,
    /// Per-principal HMAC secret; rotating it invalidates every token issued to the principal.
    #[serde(skip)]
    pub salt: String,
    #[serde(skip)]
    pub password_hash: Option<String>,
    /// Raw parent discriminator, only set for service accounts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Pat,
    Sat,
    Session,
}

impl TokenType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pat => "pat",
            Self::Sat => "sat",
            Self::Session => "session",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pat" => Some(Self::Pat),
            "sat" => Some(Self::Sat),
            "session" => Some(Self::Session),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: i64,
    pub uid: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub principal_id: i64,
    pub grants: AccessGrant,
    pub issued_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MembershipKey {
    pub space_id: i64,
    pub principal_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub space_id: i64,
    pub principal_id: i64,
    pub role: MembershipRole,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Membership {
    #[must_use]
    pub fn key(&self) -> MembershipKey {
        MembershipKey {
            space_id: self.space_id,
            principal_id: self.principal_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Space {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    pub uid: String,
    /// Full path from the root space, e.g. `acme/platform/infra`.
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub id: i64,
    pub parent_id: i64,
    pub uid: String,
    /// Full path including the owning space, e.g. `acme/platform/api`.
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
