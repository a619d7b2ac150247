use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::Request;
use axum::http::header::HOST;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use tower::ServiceExt;

use super::api::api_router;
use super::encode::{
    GIT_MARKER, TERMINATED_PATH_PREFIXES_API, TERMINATOR_MARKER, encode_request_path,
    replace_path,
};
use super::git::git_router;
use super::response::ApiError;
use super::web::web_router;
use crate::auth::{Argon2Hasher, Authenticator, JwtAuthenticator, PasswordHasher};
use crate::authz::{Authorizer, MembershipAuthorizer, PERMISSION_CACHE_TTL, PermissionCache};
use crate::config::ServerConfig;
use crate::error::Result;
use crate::store::Store;

pub const GIT_MOUNT_PATH: &str = "/git";
pub const API_MOUNT_PATH: &str = "/api";

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub authenticator: Arc<dyn Authenticator>,
    pub authorizer: Arc<dyn Authorizer>,
    pub permission_cache: Arc<PermissionCache>,
    pub password_hasher: Arc<dyn PasswordHasher>,
    pub config: ServerConfig,
    pub data_dir: std::path::PathBuf,
}

impl AppState {
    /// Wires the default authenticator and authorizer over `store`.
    pub fn new<S: Store + 'static>(store: Arc<S>, config: ServerConfig) -> Self {
        let permission_cache = Arc::new(PermissionCache::new(
            store.clone(),
            store.clone(),
            PERMISSION_CACHE_TTL,
        ));

        Self {
            authenticator: Arc::new(JwtAuthenticator::new(
                store.clone(),
                store.clone(),
                config.cookie_name.clone(),
            )),
            authorizer: Arc::new(MembershipAuthorizer::new(
                permission_cache.clone(),
                store.clone(),
            )),
            permission_cache,
            password_hasher: Arc::new(Argon2Hasher::new()),
            data_dir: config.data_dir.clone(),
            store,
            config,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    Git,
    Api,
    Web,
}

/// Dispatches every request to exactly one of the git, API and web routers.
pub struct TrafficRouter {
    git: Router,
    api: Router,
    web: Router,
    git_host: Option<String>,
}

fn has_mount_prefix(path: &str, mount: &str) -> bool {
    path.strip_prefix(mount)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

fn request_host(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| request.uri().host())
        .map(|host| host.split(':').next().unwrap_or(host))
}

impl TrafficRouter {
    pub fn new(git: Router, api: Router, web: Router, git_host: Option<String>) -> Self {
        Self {
            git,
            api,
            web,
            git_host: git_host.filter(|h| !h.is_empty()),
        }
    }

    pub fn classify(&self, request: &Request) -> Lane {
        let path = request.uri().path();

        let git_host_matches = match (&self.git_host, request_host(request)) {
            (Some(git_host), Some(host)) => host.eq_ignore_ascii_case(git_host),
            _ => false,
        };

        if has_mount_prefix(path, GIT_MOUNT_PATH) || git_host_matches {
            Lane::Git
        } else if has_mount_prefix(path, API_MOUNT_PATH) {
            Lane::Api
        } else {
            Lane::Web
        }
    }

    /// Strips the lane's mount prefix and re-encodes terminated references.
    fn rewrite(&self, lane: Lane, request: &mut Request) -> Result<()> {
        let mount = match lane {
            Lane::Git => GIT_MOUNT_PATH,
            Lane::Api => API_MOUNT_PATH,
            Lane::Web => return Ok(()),
        };

        // requests routed by host may arrive without the mount prefix
        if has_mount_prefix(request.uri().path(), mount) {
            let rest = &request.uri().path()[mount.len()..];
            let stripped = if rest.is_empty() { "/" } else { rest };
            *request.uri_mut() = replace_path(request.uri(), stripped)?;
        }

        match lane {
            Lane::Api => {
                for prefix in TERMINATED_PATH_PREFIXES_API {
                    if encode_request_path(request, prefix, TERMINATOR_MARKER, false)? {
                        break;
                    }
                }
            }
            Lane::Git => {
                encode_request_path(request, "", GIT_MARKER, false)?;
            }
            Lane::Web => {}
        }

        Ok(())
    }

    pub async fn serve(&self, mut request: Request) -> Response {
        let lane = self.classify(&request);

        if let Err(e) = self.rewrite(lane, &mut request) {
            return ApiError::from(e).into_response();
        }

        let router = match lane {
            Lane::Git => self.git.clone(),
            Lane::Api => self.api.clone(),
            Lane::Web => self.web.clone(),
        };

        match router.oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }

    /// Wraps the traffic router into a single axum router with request logging.
    pub fn into_router(self) -> Router {
        let traffic = Arc::new(self);
        Router::new()
            .fallback(move |request: Request| {
                let traffic = traffic.clone();
                async move { traffic.serve(request).await }
            })
            .layer(middleware::from_fn(log_request))
    }
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let api = api_router(state.clone()).with_state(state.clone());
    let git = git_router(state.clone()).with_state(state.clone());

    TrafficRouter::new(git, api, web_router(), state.config.git_host.clone()).into_router()
}
