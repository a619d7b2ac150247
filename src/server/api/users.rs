use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;

use super::{find_principal_of_type, new_principal};
use crate::auth::MaybeAuth;
use crate::error::Error;
use crate::server::AppState;
use crate::server::access::{check, check_user};
use crate::server::dto::{CreateUserRequest, UpdateAdminRequest};
use crate::server::response::{ApiResponse, ApiResult};
use crate::types::{Permission, Principal, PrincipalType, Resource, ResourceType, Scope};

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    MaybeAuth(session): MaybeAuth,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, ApiResponse<Principal>)> {
    // no user owns an unnamed user, so only admins pass
    check(
        state.authorizer.as_ref(),
        session.as_ref(),
        &Scope::global(),
        &Resource::new(ResourceType::User, ""),
        Permission::UserEdit,
    )?;

    if req.password.is_empty() {
        return Err(Error::BadRequest("password cannot be empty".into()).into());
    }

    let mut user = new_principal(&req.uid, req.display_name, PrincipalType::User)?;
    user.admin = req.admin;
    user.password_hash = Some(state.password_hasher.hash(&req.password)?);
    user.id = state.store.create_principal(&user)?;

    tracing::info!(user = %user.uid, admin = user.admin, "created user");

    Ok((StatusCode::CREATED, ApiResponse::success(user)))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    MaybeAuth(session): MaybeAuth,
    Path(uid): Path<String>,
) -> ApiResult<ApiResponse<Principal>> {
    let user = find_principal_of_type(&state, &uid, PrincipalType::User)?;

    check_user(
        state.authorizer.as_ref(),
        session.as_ref(),
        &user,
        Permission::UserView,
    )?;

    Ok(ApiResponse::success(user))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    MaybeAuth(session): MaybeAuth,
    Path(uid): Path<String>,
) -> ApiResult<StatusCode> {
    let user = find_principal_of_type(&state, &uid, PrincipalType::User)?;

    check_user(
        state.authorizer.as_ref(),
        session.as_ref(),
        &user,
        Permission::UserDelete,
    )?;

    state.store.delete_principal(user.id)?;

    tracing::info!(user = %user.uid, "deleted user");

    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_admin(
    State(state): State<Arc<AppState>>,
    MaybeAuth(session): MaybeAuth,
    Path(uid): Path<String>,
    Json(req): Json<UpdateAdminRequest>,
) -> ApiResult<ApiResponse<Principal>> {
    let mut user = find_principal_of_type(&state, &uid, PrincipalType::User)?;

    check_user(
        state.authorizer.as_ref(),
        session.as_ref(),
        &user,
        Permission::UserEditAdmin,
    )?;

    user.admin = req.admin;
    user.updated_at = Utc::now();
    state.store.update_principal(&user)?;

    tracing::info!(user = %user.uid, admin = user.admin, "changed admin flag");

    Ok(ApiResponse::success(user))
}
