use std::sync::Arc;

use async_compression::tokio::bufread::GzipDecoder;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tracing::warn;

use super::auth::{authorize_repo, git_error};
use super::process::{
    GitService, ensure_bare_repo, format_pkt_line_header, repo_path, run_git_command,
};
use crate::auth::MaybeAuth;
use crate::server::AppState;

#[derive(Deserialize)]
pub struct InfoRefsQuery {
    service: Option<String>,
}

fn build_git_response(body: Vec<u8>, content_type: &'static str) -> Response {
    let mut response = body.into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

fn git_command_failed(context: &str, err: impl std::fmt::Display) -> Response {
    warn!("{context}: {err}");
    (StatusCode::INTERNAL_SERVER_ERROR, "Git command failed").into_response()
}

pub async fn info_refs(
    State(state): State<Arc<AppState>>,
    Path(repo_ref): Path<String>,
    Query(query): Query<InfoRefsQuery>,
    MaybeAuth(session): MaybeAuth,
) -> Response {
    let Some(service) = query.service.as_deref().and_then(GitService::parse) else {
        return (StatusCode::BAD_REQUEST, "Invalid service").into_response();
    };

    let repo = match authorize_repo(
        &state,
        session.as_ref(),
        &repo_ref,
        service.required_permission(),
    ) {
        Ok(repo) => repo,
        Err(e) => return git_error(e),
    };

    let path = repo_path(&state.data_dir, repo.id);
    if let Err(e) = ensure_bare_repo(&path).await {
        return git_command_failed("failed to init bare repo", e);
    }

    let output = match run_git_command(&path, service, true, None).await {
        Ok(o) => o,
        Err(e) => return git_command_failed("git advertisement failed", e),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return git_command_failed("git advertisement failed", stderr);
    }

    let mut body = format_pkt_line_header(service);
    body.extend_from_slice(&output.stdout);

    build_git_response(body, service.advertisement_content_type())
}

pub async fn git_upload_pack(
    State(state): State<Arc<AppState>>,
    Path(repo_ref): Path<String>,
    MaybeAuth(session): MaybeAuth,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    run_service(&state, session, &repo_ref, GitService::UploadPack, &headers, body).await
}

pub async fn git_receive_pack(
    State(state): State<Arc<AppState>>,
    Path(repo_ref): Path<String>,
    MaybeAuth(session): MaybeAuth,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    run_service(&state, session, &repo_ref, GitService::ReceivePack, &headers, body).await
}

async fn run_service(
    state: &AppState,
    session: Option<crate::auth::Session>,
    repo_ref: &str,
    service: GitService,
    headers: &HeaderMap,
    body: Bytes,
) -> Response {
    let repo = match authorize_repo(
        state,
        session.as_ref(),
        repo_ref,
        service.required_permission(),
    ) {
        Ok(repo) => repo,
        Err(e) => return git_error(e),
    };

    let path = repo_path(&state.data_dir, repo.id);
    if let Err(e) = ensure_bare_repo(&path).await {
        return git_command_failed("failed to init bare repo", e);
    }

    let input = match decompress_if_gzip(headers, body).await {
        Ok(data) => data,
        Err(e) => return e,
    };

    let output = match run_git_command(&path, service, false, Some(&input)).await {
        Ok(o) => o,
        Err(e) => return git_command_failed(service.command_name(), e),
    };

    if service == GitService::ReceivePack {
        tracing::info!(repo = %repo.path, "received push");
    }

    build_git_response(output.stdout, service.content_type())
}

async fn decompress_if_gzip(headers: &HeaderMap, body: Bytes) -> Result<Vec<u8>, Response> {
    let content_encoding = headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok());

    if content_encoding != Some("gzip") {
        return Ok(body.to_vec());
    }

    let reader = std::io::Cursor::new(body);
    let mut decoder = GzipDecoder::new(tokio::io::BufReader::new(reader));
    let mut decompressed = Vec::new();

    decoder
        .read_to_end(&mut decompressed)
        .await
        .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid gzip body").into_response())?;

    Ok(decompressed)
}
