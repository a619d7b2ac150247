use std::sync::Arc;

use axum::http::request::Parts;

use super::helpers::extract_token;
use super::jwt::{self, MembershipClaims, TokenClaims};
use super::session::{Metadata, Session};
use crate::error::{Error, Result};
use crate::store::{PrincipalStore, TokenStore};
use crate::types::Principal;

/// Turns an inbound request into a verified session.
pub trait Authenticator: Send + Sync {
    /// Returns [`Error::NoAuthData`] if the request carries no credential at all,
    /// and [`Error::AuthenticationFailed`] if it carries one that does not verify.
    fn authenticate(&self, parts: &Parts) -> Result<Session>;
}

/// Authenticates HMAC-signed credentials keyed by per-principal salts.
pub struct JwtAuthenticator {
    principals: Arc<dyn PrincipalStore>,
    tokens: Arc<dyn TokenStore>,
    cookie_name: String,
}

impl JwtAuthenticator {
    pub fn new(
        principals: Arc<dyn PrincipalStore>,
        tokens: Arc<dyn TokenStore>,
        cookie_name: impl Into<String>,
    ) -> Self {
        Self {
            principals,
            tokens,
            cookie_name: cookie_name.into(),
        }
    }

    /// Verifies a raw credential string.
    pub fn authenticate_token(&self, raw: &str) -> Result<Session> {
        let unverified = jwt::decode_unverified(raw)?;

        let principal = self
            .principals
            .find_principal(unverified.pid)?
            .ok_or_else(|| {
                Error::auth_failed(format!("principal {} not found", unverified.pid))
            })?;

        let claims = jwt::verify(raw, &principal.salt)?;
        if claims.pid != principal.id {
            return Err(Error::auth_failed("principal id changed during verification"));
        }

        if principal.blocked {
            return Err(Error::auth_failed(format!(
                "principal {} is blocked",
                principal.id
            )));
        }

        let metadata = match (&claims.token, &claims.membership) {
            (Some(tkn), None) => self.metadata_from_token_claims(&principal, tkn)?,
            (None, Some(ms)) => metadata_from_membership_claims(ms),
            (Some(_), Some(_)) => {
                return Err(Error::auth_failed("credential carries both sub-claims"));
            }
            (None, None) => {
                return Err(Error::auth_failed("credential missing required sub-claim"));
            }
        };

        Ok(Session::new(principal, metadata))
    }

    fn metadata_from_token_claims(
        &self,
        principal: &Principal,
        claims: &TokenClaims,
    ) -> Result<Metadata> {
        let token = self
            .tokens
            .find_token(claims.id)?
            .ok_or_else(|| Error::auth_failed(format!("token {} not found", claims.id)))?;

        // a leaked salt must not allow forging credentials for tokens of other principals
        if token.principal_id != principal.id {
            return Err(Error::auth_failed(format!(
                "credential was for principal {} while token {} belongs to principal {}",
                principal.id, token.id, token.principal_id
            )));
        }

        Ok(Metadata::Token {
            token_type: token.token_type,
            token_id: token.id,
            grants: token.grants,
        })
    }
}

fn metadata_from_membership_claims(claims: &MembershipClaims) -> Metadata {
    Metadata::Membership {
        space_id: claims.space_id,
        role: claims.role,
    }
}

impl Authenticator for JwtAuthenticator {
    fn authenticate(&self, parts: &Parts) -> Result<Session> {
        let raw = extract_token(parts, &self.cookie_name).ok_or(Error::NoAuthData)?;
        self.authenticate_token(&raw)
    }
}
