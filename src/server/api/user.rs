use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;

use super::{parse_grants, require_persistent_credential, token_lifetime};
use crate::auth::{Metadata, RequireAuth, TokenRequest, issue_token};
use crate::error::Error;
use crate::server::AppState;
use crate::server::access::check_user;
use crate::server::dto::{CreateTokenRequest, CreateTokenResponse, TokenResponse, UpdateUserRequest};
use crate::server::response::{ApiResponse, ApiResult};
use crate::types::{Permission, Principal, TokenType};

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    RequireAuth(session): RequireAuth,
) -> ApiResult<ApiResponse<Principal>> {
    check_user(
        state.authorizer.as_ref(),
        Some(&session),
        &session.principal,
        Permission::UserView,
    )?;

    Ok(ApiResponse::success(session.principal))
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    RequireAuth(session): RequireAuth,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<ApiResponse<Principal>> {
    check_user(
        state.authorizer.as_ref(),
        Some(&session),
        &session.principal,
        Permission::UserEdit,
    )?;

    let mut principal = session.principal;
    if let Some(display_name) = req.display_name {
        principal.display_name = display_name;
    }
    if let Some(password) = req.password {
        if password.is_empty() {
            return Err(Error::BadRequest("password cannot be empty".into()).into());
        }
        principal.password_hash = Some(state.password_hasher.hash(&password)?);
    }
    principal.updated_at = Utc::now();

    state.store.update_principal(&principal)?;

    Ok(ApiResponse::success(principal))
}

pub async fn list_tokens(
    State(state): State<Arc<AppState>>,
    RequireAuth(session): RequireAuth,
) -> ApiResult<ApiResponse<Vec<TokenResponse>>> {
    check_user(
        state.authorizer.as_ref(),
        Some(&session),
        &session.principal,
        Permission::UserView,
    )?;

    let tokens = state
        .store
        .list_principal_tokens(session.principal.id, TokenType::Pat)?;

    Ok(ApiResponse::success(
        tokens.iter().map(TokenResponse::from).collect(),
    ))
}

/// Creates a personal access token for the caller.
pub async fn create_token(
    State(state): State<Arc<AppState>>,
    RequireAuth(session): RequireAuth,
    Json(req): Json<CreateTokenRequest>,
) -> ApiResult<(StatusCode, ApiResponse<CreateTokenResponse>)> {
    check_user(
        state.authorizer.as_ref(),
        Some(&session),
        &session.principal,
        Permission::UserEdit,
    )?;
    require_persistent_credential(&session)?;

    let grants = parse_grants(req.grants.as_deref())?;

    // a narrowed credential cannot mint a broader one
    if let Metadata::Token { grants: held, .. } = &session.metadata {
        if !held.has(grants) {
            return Err(Error::NotAuthorized.into());
        }
    }

    let (token, access_token) = issue_token(
        state.store.as_ref(),
        &session.principal,
        TokenRequest {
            uid: req.uid,
            token_type: TokenType::Pat,
            grants,
            lifetime: token_lifetime(req.lifetime_secs)?,
            created_by: session.principal.id,
        },
    )?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::success(CreateTokenResponse {
            token: TokenResponse::from(&token),
            access_token,
        }),
    ))
}
