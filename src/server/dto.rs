use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{MembershipRole, Principal, Token};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub uid: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub uid: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub password: String,
    #[serde(default)]
    pub admin: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAdminRequest {
    pub admin: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateTokenRequest {
    pub uid: String,
    /// Grant names such as `view` or `edit`. Defaults to every grant.
    #[serde(default)]
    pub grants: Option<Vec<String>>,
    #[serde(default)]
    pub lifetime_secs: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub id: i64,
    pub uid: String,
    #[serde(rename = "type")]
    pub token_type: &'static str,
    pub grants: Vec<&'static str>,
    pub issued_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<&Token> for TokenResponse {
    fn from(token: &Token) -> Self {
        Self {
            id: token.id,
            uid: token.uid.clone(),
            token_type: token.token_type.as_str(),
            grants: token.grants.to_strings(),
            issued_at: token.issued_at,
            expires_at: token.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateTokenResponse {
    /// The signed credential. It is only ever returned once.
    pub access_token: String,
    pub token: TokenResponse,
}

#[derive(Debug, Deserialize)]
pub struct CreateSpaceRequest {
    pub uid: String,
    /// Path or id of the parent space; omitted for root spaces.
    #[serde(default)]
    pub parent_ref: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRepoRequest {
    pub uid: String,
    pub parent_ref: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_uid: String,
    pub role: MembershipRole,
}

#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub principal: Principal,
    pub role: MembershipRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct MembershipTokenRequest {
    /// Defaults to the caller.
    #[serde(default)]
    pub principal_uid: Option<String>,
    pub role: MembershipRole,
}

#[derive(Debug, Serialize)]
pub struct MembershipTokenResponse {
    pub access_token: String,
    pub space_id: i64,
    pub role: MembershipRole,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateServiceAccountRequest {
    pub uid: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub parent_type: String,
    pub parent_id: i64,
}
