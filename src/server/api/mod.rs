//! REST API lane, mounted under `/api`.

mod login;
mod repos;
mod service_accounts;
mod spaces;
mod user;
mod users;

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, patch, post},
};
use chrono::{Duration, Utc};

use crate::auth::{Session, attempt_auth, generate_salt};
use crate::error::{Error, Result};
use crate::paths;
use crate::server::AppState;
use crate::types::{AccessGrant, Principal, PrincipalType, Repository, Space};

pub fn api_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/login", post(login::login))
        .route("/v1/logout", post(login::logout))
        // Current user
        .route("/v1/user", get(user::get_user).patch(user::update_user))
        .route(
            "/v1/user/tokens",
            get(user::list_tokens).post(user::create_token),
        )
        // Users
        .route("/v1/users", post(users::create_user))
        .route(
            "/v1/users/{uid}",
            get(users::get_user).delete(users::delete_user),
        )
        .route("/v1/users/{uid}/admin", patch(users::update_admin))
        // Spaces
        .route("/v1/spaces", post(spaces::create_space))
        .route("/v1/spaces/{space_ref}", get(spaces::get_space))
        .route(
            "/v1/spaces/{space_ref}/members",
            get(spaces::list_members).post(spaces::add_member),
        )
        .route(
            "/v1/spaces/{space_ref}/members/{user_uid}",
            axum::routing::delete(spaces::remove_member),
        )
        .route(
            "/v1/spaces/{space_ref}/token",
            post(spaces::create_membership_token),
        )
        // Repositories
        .route("/v1/repos", post(repos::create_repo))
        .route("/v1/repos/{repo_ref}", get(repos::get_repo))
        // Service accounts
        .route(
            "/v1/service-accounts",
            post(service_accounts::create_service_account),
        )
        .route(
            "/v1/service-accounts/{uid}",
            get(service_accounts::get_service_account),
        )
        .route(
            "/v1/service-accounts/{uid}/tokens",
            post(service_accounts::create_service_account_token),
        )
        .layer(middleware::from_fn_with_state(state, attempt_auth))
}

fn new_principal(
    uid: &str,
    display_name: Option<String>,
    principal_type: PrincipalType,
) -> Result<Principal> {
    paths::validate_segment(uid).map_err(|_| Error::BadRequest(format!("invalid uid '{uid}'")))?;

    let now = Utc::now();
    Ok(Principal {
        id: 0,
        uid: uid.to_string(),
        display_name: display_name.unwrap_or_else(|| uid.to_string()),
        principal_type,
        admin: false,
        blocked: false,
        salt: generate_salt(),
        password_hash: None,
        parent_type: None,
        parent_id: None,
        created_at: now,
        updated_at: now,
    })
}

/// Credentials carrying their own membership cannot mint further credentials.
fn require_persistent_credential(session: &Session) -> Result<()> {
    if session.metadata.impacts_authorization() {
        tracing::debug!(
            principal = %session.principal.uid,
            "membership credential cannot issue credentials"
        );
        return Err(Error::NotAuthorized);
    }
    Ok(())
}

fn find_space(state: &AppState, space_ref: &str) -> Result<Space> {
    let not_found = || Error::not_found(format!("space '{space_ref}'"));
    let normalized = paths::normalize_path(space_ref).map_err(|_| not_found())?;

    state.store.find_space_by_path(&normalized)?.ok_or_else(not_found)
}

fn find_repo(state: &AppState, repo_ref: &str) -> Result<Repository> {
    let not_found = || Error::not_found(format!("repository '{repo_ref}'"));
    let normalized = paths::normalize_path(repo_ref).map_err(|_| not_found())?;

    state.store.find_repo_by_path(&normalized)?.ok_or_else(not_found)
}

fn find_principal_of_type(
    state: &AppState,
    uid: &str,
    principal_type: PrincipalType,
) -> Result<Principal> {
    state
        .store
        .find_principal_by_uid(uid)?
        .filter(|p| p.principal_type == principal_type)
        .ok_or_else(|| Error::not_found(format!("{} '{uid}'", principal_type.as_str())))
}

/// Parses requested grant names. No names means every grant.
fn parse_grants(names: Option<&[String]>) -> Result<AccessGrant> {
    match names {
        Some(names) => AccessGrant::parse_many(names)
            .ok_or_else(|| Error::BadRequest(format!("invalid grants: {names:?}"))),
        None => Ok(AccessGrant::ALL),
    }
}

fn token_lifetime(secs: Option<i64>) -> Result<Option<Duration>> {
    secs.map(|s| {
        Duration::try_seconds(s)
            .ok_or_else(|| Error::BadRequest(format!("invalid token lifetime {s}")))
    })
    .transpose()
}
