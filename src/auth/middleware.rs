use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::authn::Authenticator;
use super::session::Session;
use crate::error::Error;
use crate::server::AppState;
use crate::server::response::ApiError;

/// Extractor that requires an authenticated session
pub struct RequireAuth(pub Session);

/// Extractor for handlers that also serve anonymous callers
pub struct MaybeAuth(pub Option<Session>);

/// Authenticates the request and stores the session in its extensions.
///
/// A request without any credential is left anonymous. A credential that
/// fails to verify is an error.
pub fn attach_session(
    authenticator: &dyn Authenticator,
    parts: &mut Parts,
) -> crate::error::Result<()> {
    match authenticator.authenticate(parts) {
        Ok(session) => {
            tracing::debug!(
                principal = %session.principal.uid,
                "authenticated request"
            );
            parts.extensions.insert(session);
            Ok(())
        }
        Err(Error::NoAuthData) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Middleware running [`attach_session`] for API routes.
pub async fn attempt_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();

    if let Err(e) = attach_session(state.authenticator.as_ref(), &mut parts) {
        return ApiError::from(e).into_response();
    }

    next.run(Request::from_parts(parts, body)).await
}

impl<S: Send + Sync> FromRequestParts<S> for RequireAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .map(RequireAuth)
            .ok_or_else(|| Error::NotAuthenticated.into())
    }
}

impl<S: Send + Sync> FromRequestParts<S> for MaybeAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuth(parts.extensions.get::<Session>().cloned()))
    }
}
