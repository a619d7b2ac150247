pub mod access;
mod api;
pub mod dto;
pub mod encode;
mod git;
pub mod response;
mod router;
mod web;

pub use api::api_router;
pub use git::git_router;
pub use router::{API_MOUNT_PATH, AppState, GIT_MOUNT_PATH, Lane, TrafficRouter, create_router};
pub use web::web_router;
