use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;

use super::{find_repo, find_space};
use crate::auth::MaybeAuth;
use crate::error::Error;
use crate::paths;
use crate::server::AppState;
use crate::server::access::{check_repo, check_space_scope};
use crate::server::dto::CreateRepoRequest;
use crate::server::response::{ApiResponse, ApiResult};
use crate::types::{Permission, Repository, ResourceType};

/// Registers a repository. The bare repository on disk is created on first git access.
pub async fn create_repo(
    State(state): State<Arc<AppState>>,
    MaybeAuth(session): MaybeAuth,
    Json(req): Json<CreateRepoRequest>,
) -> ApiResult<(StatusCode, ApiResponse<Repository>)> {
    paths::validate_segment(&req.uid)
        .map_err(|_| Error::BadRequest(format!("invalid repository uid '{}'", req.uid)))?;

    let parent = find_space(&state, &req.parent_ref)?;
    check_space_scope(
        state.authorizer.as_ref(),
        session.as_ref(),
        &parent,
        ResourceType::Repo,
        Permission::RepoEdit,
    )?;
    let creator = session.ok_or(Error::NotAuthenticated)?.principal;

    let now = Utc::now();
    let mut repo = Repository {
        id: 0,
        parent_id: parent.id,
        uid: req.uid.clone(),
        path: paths::concatenate(&parent.path, &req.uid),
        description: req.description,
        created_by: creator.id,
        created_at: now,
        updated_at: now,
    };
    repo.id = state.store.create_repo(&repo)?;

    tracing::info!(repo = %repo.path, creator = %creator.uid, "created repository");

    Ok((StatusCode::CREATED, ApiResponse::success(repo)))
}

pub async fn get_repo(
    State(state): State<Arc<AppState>>,
    MaybeAuth(session): MaybeAuth,
    Path(repo_ref): Path<String>,
) -> ApiResult<ApiResponse<Repository>> {
    let repo = find_repo(&state, &repo_ref)?;

    check_repo(
        state.authorizer.as_ref(),
        session.as_ref(),
        &repo,
        Permission::RepoView,
    )?;

    Ok(ApiResponse::success(repo))
}
