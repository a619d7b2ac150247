//! git smart-HTTP lane.
//!
//! Paths arrive with the mount prefix stripped and the `.git` reference
//! collapsed into one segment, e.g. `/acme%2Fapi/info/refs`.

mod auth;
mod handlers;
mod process;

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::server::AppState;

pub fn git_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/{repo_ref}/info/refs", get(handlers::info_refs))
        .route("/{repo_ref}/git-upload-pack", post(handlers::git_upload_pack))
        .route(
            "/{repo_ref}/git-receive-pack",
            post(handlers::git_receive_pack),
        )
        .layer(middleware::from_fn_with_state(state, auth::attempt_git_auth))
}
