//! Web lane: everything not claimed by the git or API lanes.

use axum::{Router, routing::get};

use super::response::{ApiError, ApiResult};

async fn index() -> &'static str {
    "canopy"
}

async fn health() -> &'static str {
    "OK"
}

async fn not_found() -> ApiResult<()> {
    Err(ApiError::not_found("Not found"))
}

pub fn web_router() -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .fallback(not_found)
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn test_health_and_unknown_paths() {
        let response = web_router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"OK");

        let response = web_router()
            .oneshot(Request::get("/nowhere").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
