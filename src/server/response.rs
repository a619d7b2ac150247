use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::error::Error;

pub const BEARER_CHALLENGE: &str = "Bearer realm=\"canopy\"";
pub const BASIC_CHALLENGE: &str = "Basic realm=\"canopy\"";

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    #[must_use]
    pub fn success(data: T) -> Self {
        Self { data }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// API error that converts to a proper HTTP response
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    challenge: &'static str,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            challenge: BEARER_CHALLENGE,
        }
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Replaces the `WWW-Authenticate` challenge sent with a 401.
    #[must_use]
    pub fn with_challenge(mut self, challenge: &'static str) -> Self {
        self.challenge = challenge;
        self
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let (status, message) = match &err {
            Error::NoAuthData | Error::NotAuthenticated => {
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            Error::AuthenticationFailed(cause) => {
                tracing::warn!(%cause, "authentication failed");
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            Error::NotAuthorized => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            Error::ParentResourceTypeUnknown(_) | Error::BadRequest(_) | Error::InvalidPath(_) => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            Error::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found")),
            Error::AlreadyExists => (StatusCode::CONFLICT, "Resource already exists".to_string()),
            Error::Database(_)
            | Error::Io(_)
            | Error::Config(_)
            | Error::PathEncoding(_)
            | Error::Token(_) => {
                tracing::error!(error = %err, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        Self::new(status, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "message": self.message });
        let mut response = (self.status, Json(body)).into_response();

        if self.status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static(self.challenge));
        }

        response
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: Error) -> StatusCode {
        ApiError::from(err).status
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(status_of(Error::NoAuthData), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(Error::NotAuthenticated), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(Error::auth_failed("bad signature")),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_of(Error::NotAuthorized), StatusCode::FORBIDDEN);
        assert_eq!(
            status_of(Error::ParentResourceTypeUnknown("org".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(Error::not_found("space")), StatusCode::NOT_FOUND);
        assert_eq!(status_of(Error::AlreadyExists), StatusCode::CONFLICT);
        assert_eq!(
            status_of(Error::PathEncoding("prefix".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_auth_failure_cause_is_not_leaked() {
        let err = ApiError::from(Error::auth_failed("token 7 belongs to principal 3"));
        assert_eq!(err.message, "Unauthorized");
    }

    #[test]
    fn test_unauthorized_carries_challenge() {
        let response = ApiError::from(Error::NotAuthenticated).into_response();
        assert_eq!(
            response.headers().get(WWW_AUTHENTICATE).unwrap(),
            BEARER_CHALLENGE
        );

        let response = ApiError::from(Error::NotAuthenticated)
            .with_challenge(BASIC_CHALLENGE)
            .into_response();
        assert_eq!(
            response.headers().get(WWW_AUTHENTICATE).unwrap(),
            BASIC_CHALLENGE
        );
    }

    #[test]
    fn test_forbidden_has_no_challenge() {
        let response = ApiError::from(Error::NotAuthorized).into_response();
        assert!(response.headers().get(WWW_AUTHENTICATE).is_none());
    }
}
