use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::{Session, attach_session};
use crate::error::{Error, Result};
use crate::server::AppState;
use crate::server::access::check_repo;
use crate::server::response::{ApiError, BASIC_CHALLENGE};
use crate::types::{Permission, Repository};

/// Converts an error into a git lane response.
///
/// git only prompts for credentials on a Basic challenge.
pub fn git_error(err: Error) -> Response {
    ApiError::from(err)
        .with_challenge(BASIC_CHALLENGE)
        .into_response()
}

/// Authenticates git requests. git clients send the credential as the Basic auth password.
pub async fn attempt_git_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();

    if let Err(e) = attach_session(state.authenticator.as_ref(), &mut parts) {
        return git_error(e);
    }

    next.run(Request::from_parts(parts, body)).await
}

/// Resolves the repository addressed by a git path and checks access to it.
pub fn authorize_repo(
    state: &AppState,
    session: Option<&Session>,
    repo_ref: &str,
    permission: Permission,
) -> Result<Repository> {
    let repo = state
        .store
        .find_repo_by_path(repo_ref)?
        .ok_or_else(|| Error::not_found(format!("repository '{repo_ref}'")))?;

    check_repo(state.authorizer.as_ref(), session, &repo, permission)?;

    Ok(repo)
}
