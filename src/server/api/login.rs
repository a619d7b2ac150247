use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
};

use super::find_principal_of_type;
use crate::auth::{Metadata, RequireAuth, TokenRequest, issue_token};
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{CreateTokenResponse, LoginRequest, TokenResponse};
use crate::server::response::{ApiResponse, ApiResult};
use crate::types::{PrincipalType, TokenType};

fn session_cookie(name: &str, value: &str, max_age_secs: i64) -> String {
    format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}")
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Response> {
    let principal = find_principal_of_type(&state, &req.uid, PrincipalType::User)
        .map_err(|_| Error::auth_failed(format!("login for unknown user '{}'", req.uid)))?;

    if principal.blocked {
        return Err(Error::auth_failed(format!("login for blocked user '{}'", principal.uid)).into());
    }

    let hash = principal.password_hash.as_deref().ok_or_else(|| {
        Error::auth_failed(format!("user '{}' has no password", principal.uid))
    })?;
    if !state.password_hasher.verify(&req.password, hash)? {
        return Err(Error::auth_failed(format!("wrong password for '{}'", principal.uid)).into());
    }

    let lifetime = state.config.session_lifetime();
    let (token, access_token) = issue_token(
        state.store.as_ref(),
        &principal,
        TokenRequest::session(&principal, lifetime),
    )?;

    tracing::info!(user = %principal.uid, "user logged in");

    let cookie = session_cookie(
        &state.config.cookie_name,
        &access_token,
        lifetime.num_seconds(),
    );
    let body = ApiResponse::success(CreateTokenResponse {
        token: TokenResponse::from(&token),
        access_token,
    });

    Ok(([(SET_COOKIE, cookie)], body).into_response())
}

/// Revokes the session token the request authenticated with.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    RequireAuth(session): RequireAuth,
) -> ApiResult<Response> {
    let token_id = match session.metadata {
        Metadata::Token {
            token_type: TokenType::Session,
            token_id,
            ..
        } => token_id,
        _ => {
            return Err(Error::BadRequest(
                "only session credentials can be logged out".into(),
            )
            .into());
        }
    };

    state.store.delete_token(token_id)?;

    tracing::info!(user = %session.principal.uid, "user logged out");

    let cookie = session_cookie(&state.config.cookie_name, "", 0);
    Ok((StatusCode::NO_CONTENT, [(SET_COOKIE, cookie)]).into_response())
}
