//! Bearer credential codec.
//!
//! Credentials are compact JWTs signed with HMAC, keyed by the salt of the
//! principal they were issued to. The payload carries the principal id and
//! exactly one sub-claim: a reference to a persisted token (`tkn`) or an
//! ephemeral membership grant (`ms`).

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{MembershipRole, Token, TokenType};

pub const ISSUER: &str = "canopy";

const HMAC_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    pub pid: i64,
    #[serde(rename = "tkn", default, skip_serializing_if = "Option::is_none")]
    pub token: Option<TokenClaims>,
    #[serde(rename = "ms", default, skip_serializing_if = "Option::is_none")]
    pub membership: Option<MembershipClaims>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipClaims {
    pub role: MembershipRole,
    #[serde(rename = "sid")]
    pub space_id: i64,
}

/// Generates the credential for a persisted token.
pub fn generate_for_token(token: &Token, salt: &str) -> Result<String> {
    let claims = Claims {
        iss: ISSUER.to_string(),
        iat: token.issued_at.timestamp(),
        exp: token.expires_at.map(|e| e.timestamp()),
        pid: token.principal_id,
        token: Some(TokenClaims {
            token_type: token.token_type,
            id: token.id,
        }),
        membership: None,
    };
    sign(&claims, salt)
}

/// Generates a short-lived credential granting `role` in `space_id` without a stored membership.
pub fn generate_with_membership(
    principal_id: i64,
    space_id: i64,
    role: MembershipRole,
    lifetime: Duration,
    salt: &str,
) -> Result<String> {
    let now = Utc::now();
    let claims = Claims {
        iss: ISSUER.to_string(),
        iat: now.timestamp(),
        exp: Some((now + lifetime).timestamp()),
        pid: principal_id,
        token: None,
        membership: Some(MembershipClaims { role, space_id }),
    };
    sign(&claims, salt)
}

fn sign(claims: &Claims, salt: &str) -> Result<String> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(salt.as_bytes()),
    )
    .map_err(|e| Error::Token(format!("failed to sign credential: {e}")))
}

/// Reads the claims without verifying the signature. Only `pid` may be trusted
/// from the result, and only to find the key for [`verify`].
pub fn decode_unverified(raw: &str) -> Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<Claims>(raw, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| Error::auth_failed(format!("malformed credential: {e}")))
}

/// Verifies signature and expiry with the principal's salt and returns the claims.
pub fn verify(raw: &str, salt: &str) -> Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.algorithms = HMAC_ALGORITHMS.to_vec();
    validation.leeway = 0;
    validation.validate_aud = false;
    validation.set_required_spec_claims(&["iss"]);

    decode::<Claims>(raw, &DecodingKey::from_secret(salt.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| Error::auth_failed(format!("credential verification failed: {e}")))
}
