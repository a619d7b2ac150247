use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use super::{
    find_principal_of_type, new_principal, parse_grants, require_persistent_credential,
    token_lifetime,
};
use crate::auth::{MaybeAuth, TokenRequest, issue_token};
use crate::error::Error;
use crate::server::AppState;
use crate::server::access::{check_child, check_service_account};
use crate::server::dto::{
    CreateServiceAccountRequest, CreateTokenRequest, CreateTokenResponse, TokenResponse,
};
use crate::server::response::{ApiResponse, ApiResult};
use crate::types::{Permission, Principal, PrincipalType, ResourceType, TokenType};

pub async fn create_service_account(
    State(state): State<Arc<AppState>>,
    MaybeAuth(session): MaybeAuth,
    Json(req): Json<CreateServiceAccountRequest>,
) -> ApiResult<(StatusCode, ApiResponse<Principal>)> {
    check_child(
        state.authorizer.as_ref(),
        state.store.as_ref(),
        session.as_ref(),
        &req.parent_type,
        req.parent_id,
        ResourceType::ServiceAccount,
        "",
        Permission::ServiceAccountEdit,
    )?;

    let mut account = new_principal(&req.uid, req.display_name, PrincipalType::ServiceAccount)?;
    account.parent_type = Some(req.parent_type);
    account.parent_id = Some(req.parent_id);
    account.id = state.store.create_principal(&account)?;

    tracing::info!(
        service_account = %account.uid,
        parent_type = account.parent_type.as_deref().unwrap_or_default(),
        parent_id = req.parent_id,
        "created service account"
    );

    Ok((StatusCode::CREATED, ApiResponse::success(account)))
}

pub async fn get_service_account(
    State(state): State<Arc<AppState>>,
    MaybeAuth(session): MaybeAuth,
    Path(uid): Path<String>,
) -> ApiResult<ApiResponse<Principal>> {
    let account = find_principal_of_type(&state, &uid, PrincipalType::ServiceAccount)?;

    check_service_account(
        state.authorizer.as_ref(),
        state.store.as_ref(),
        session.as_ref(),
        &account,
        Permission::ServiceAccountView,
    )?;

    Ok(ApiResponse::success(account))
}

pub async fn create_service_account_token(
    State(state): State<Arc<AppState>>,
    MaybeAuth(session): MaybeAuth,
    Path(uid): Path<String>,
    Json(req): Json<CreateTokenRequest>,
) -> ApiResult<(StatusCode, ApiResponse<CreateTokenResponse>)> {
    let account = find_principal_of_type(&state, &uid, PrincipalType::ServiceAccount)?;

    check_service_account(
        state.authorizer.as_ref(),
        state.store.as_ref(),
        session.as_ref(),
        &account,
        Permission::ServiceAccountEdit,
    )?;
    let session = session.ok_or(Error::NotAuthenticated)?;
    require_persistent_credential(&session)?;
    let caller = session.principal;

    let grants = parse_grants(req.grants.as_deref())?;

    let (token, access_token) = issue_token(
        state.store.as_ref(),
        &account,
        TokenRequest {
            uid: req.uid,
            token_type: TokenType::Sat,
            grants,
            lifetime: token_lifetime(req.lifetime_secs)?,
            created_by: caller.id,
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
