use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;

use super::{find_principal_of_type, find_space, require_persistent_credential};
use crate::auth::{MaybeAuth, jwt};
use crate::error::Error;
use crate::paths;
use crate::server::AppState;
use crate::server::access::{check, check_space, check_space_scope};
use crate::server::dto::{
    AddMemberRequest, CreateSpaceRequest, MemberResponse, MembershipTokenRequest,
    MembershipTokenResponse,
};
use crate::server::response::{ApiResponse, ApiResult};
use crate::types::{
    Membership, MembershipKey, MembershipRole, Permission, PrincipalType, Resource, ResourceType,
    Scope, Space,
};

pub async fn create_space(
    State(state): State<Arc<AppState>>,
    MaybeAuth(session): MaybeAuth,
    Json(req): Json<CreateSpaceRequest>,
) -> ApiResult<(StatusCode, ApiResponse<Space>)> {
    paths::validate_segment(&req.uid)
        .map_err(|_| Error::BadRequest(format!("invalid space uid '{}'", req.uid)))?;

    let parent = match req.parent_ref.as_deref() {
        Some(parent_ref) => {
            let parent = find_space(&state, parent_ref)?;
            check_space_scope(
                state.authorizer.as_ref(),
                session.as_ref(),
                &parent,
                ResourceType::Space,
                Permission::SpaceEdit,
            )?;
            Some(parent)
        }
        None => {
            // root spaces have no owning space, so only admins pass
            check(
                state.authorizer.as_ref(),
                session.as_ref(),
                &Scope::global(),
                &Resource::new(ResourceType::Space, ""),
                Permission::SpaceEdit,
            )?;
            None
        }
    };
    // the checks above reject anonymous callers
    let creator = session.ok_or(Error::NotAuthenticated)?.principal;

    let now = Utc::now();
    let mut space = Space {
        id: 0,
        parent_id: parent.as_ref().map(|p| p.id),
        uid: req.uid.clone(),
        path: paths::concatenate(parent.as_ref().map_or("", |p| p.path.as_str()), &req.uid),
        description: req.description,
        created_by: creator.id,
        created_at: now,
        updated_at: now,
    };
    space.id = state.store.create_space(&space)?;

    if space.parent_id.is_none() {
        state.store.upsert_membership(&Membership {
            space_id: space.id,
            principal_id: creator.id,
            role: MembershipRole::SpaceOwner,
            created_by: creator.id,
            created_at: now,
            updated_at: now,
        })?;
    }

    tracing::info!(space = %space.path, creator = %creator.uid, "created space");

    Ok((StatusCode::CREATED, ApiResponse::success(space)))
}

pub async fn get_space(
    State(state): State<Arc<AppState>>,
    MaybeAuth(session): MaybeAuth,
    Path(space_ref): Path<String>,
) -> ApiResult<ApiResponse<Space>> {
    let space = find_space(&state, &space_ref)?;

    check_space(
        state.authorizer.as_ref(),
        session.as_ref(),
        &space,
        Permission::SpaceView,
    )?;

    Ok(ApiResponse::success(space))
}

pub async fn list_members(
    State(state): State<Arc<AppState>>,
    MaybeAuth(session): MaybeAuth,
    Path(space_ref): Path<String>,
) -> ApiResult<ApiResponse<Vec<MemberResponse>>> {
    let space = find_space(&state, &space_ref)?;

    check_space(
        state.authorizer.as_ref(),
        session.as_ref(),
        &space,
        Permission::SpaceView,
    )?;

    let mut members = Vec::new();
    for membership in state.store.list_space_memberships(space.id)? {
        if let Some(principal) = state.store.find_principal(membership.principal_id)? {
            members.push(MemberResponse {
                principal,
                role: membership.role,
                created_at: membership.created_at,
            });
        }
    }

    Ok(ApiResponse::success(members))
}

/// Adds a member or changes the role of an existing one.
pub async fn add_member(
    State(state): State<Arc<AppState>>,
    MaybeAuth(session): MaybeAuth,
    Path(space_ref): Path<String>,
    Json(req): Json<AddMemberRequest>,
) -> ApiResult<(StatusCode, ApiResponse<MemberResponse>)> {
    let space = find_space(&state, &space_ref)?;

    check_space(
        state.authorizer.as_ref(),
        session.as_ref(),
        &space,
        Permission::SpaceEdit,
    )?;
    let creator = session.ok_or(Error::NotAuthenticated)?.principal;

    let principal = state
        .store
        .find_principal_by_uid(&req.user_uid)?
        .ok_or_else(|| Error::not_found(format!("principal '{}'", req.user_uid)))?;

    let now = Utc::now();
    let membership = Membership {
        space_id: space.id,
        principal_id: principal.id,
        role: req.role,
        created_by: creator.id,
        created_at: now,
        updated_at: now,
    };
    state.store.upsert_membership(&membership)?;

    tracing::info!(
        space = %space.path,
        principal = %principal.uid,
        role = membership.role.as_str(),
        "set membership"
    );

    Ok((
        StatusCode::CREATED,
        ApiResponse::success(MemberResponse {
            principal,
            role: membership.role,
            created_at: membership.created_at,
        }),
    ))
}

pub async fn remove_member(
    State(state): State<Arc<AppState>>,
    MaybeAuth(session): MaybeAuth,
    Path((space_ref, user_uid)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let space = find_space(&state, &space_ref)?;

    check_space(
        state.authorizer.as_ref(),
        session.as_ref(),
        &space,
        Permission::SpaceEdit,
    )?;

    let principal = state
        .store
        .find_principal_by_uid(&user_uid)?
        .ok_or_else(|| Error::not_found(format!("principal '{user_uid}'")))?;

    let removed = state.store.delete_membership(MembershipKey {
        space_id: space.id,
        principal_id: principal.id,
    })?;
    if !removed {
        return Err(Error::not_found(format!("membership of '{user_uid}'")).into());
    }

    tracing::info!(space = %space.path, principal = %principal.uid, "removed membership");

    Ok(StatusCode::NO_CONTENT)
}

/// Mints a short-lived credential granting a role in this space and its descendants.
///
/// The grant is carried in the credential itself; no membership row is written.
pub async fn create_membership_token(
    State(state): State<Arc<AppState>>,
    MaybeAuth(session): MaybeAuth,
    Path(space_ref): Path<String>,
    Json(req): Json<MembershipTokenRequest>,
) -> ApiResult<(StatusCode, ApiResponse<MembershipTokenResponse>)> {
    let space = find_space(&state, &space_ref)?;

    check_space(
        state.authorizer.as_ref(),
        session.as_ref(),
        &space,
        Permission::SpaceEdit,
    )?;
    let session = session.ok_or(Error::NotAuthenticated)?;
    require_persistent_credential(&session)?;
    let caller = session.principal;

    let principal = match req.principal_uid.as_deref() {
        Some(uid) if uid != caller.uid => {
            find_principal_of_type(&state, uid, PrincipalType::ServiceAccount)?
        }
        _ => caller,
    };

    let lifetime = state.config.membership_token_lifetime();
    let access_token =
        jwt::generate_with_membership(principal.id, space.id, req.role, lifetime, &principal.salt)?;

    tracing::info!(
        space = %space.path,
        principal = %principal.uid,
        role = req.role.as_str(),
        "issued membership credential"
    );

    Ok((
        StatusCode::CREATED,
        ApiResponse::success(MembershipTokenResponse {
            access_token,
            space_id: space.id,
            role: req.role,
            expires_at: Utc::now() + lifetime,
        }),
    ))
}
