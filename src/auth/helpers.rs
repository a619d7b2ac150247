use axum::extract::Query;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use serde::Deserialize;

#[derive(Deserialize)]
struct AccessTokenQuery {
    access_token: Option<String>,
}

/// Extracts the raw credential of a request.
///
/// Sources are checked in order: the `access_token` query parameter, the
/// `Authorization` header, then the named cookie. Returns None if no source
/// carries a non-empty credential.
pub fn extract_token(parts: &Parts, cookie_name: &str) -> Option<String> {
    if let Some(token) = token_from_query(parts) {
        return Some(token);
    }

    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    if let Some(encoded) = header.strip_prefix("Basic ") {
        // git sends the token as the basic auth password; an unreadable header yields no token
        return extract_basic_auth_password(encoded).filter(|p| !p.is_empty());
    }
    if let Some(token) = header.strip_prefix("Bearer ") {
        return Some(token.to_string()).filter(|t| !t.is_empty());
    }
    if !header.is_empty() {
        return Some(header.to_string());
    }

    token_from_cookie(parts, cookie_name)
}

fn token_from_query(parts: &Parts) -> Option<String> {
    Query::<AccessTokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(q)| q.access_token)
        .filter(|t| !t.is_empty())
}

/// Decodes a Basic auth payload, `base64(user:password)`, and returns the password.
pub fn extract_basic_auth_password(encoded: &str) -> Option<String> {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;

    let (_username, password) = credentials.split_once(':')?;

    Some(password.to_string())
}

fn token_from_cookie(parts: &Parts, cookie_name: &str) -> Option<String> {
    parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value.trim_matches('"').to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    fn parts(uri: &str, headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_query_wins_over_cookie() {
        let p = parts(
            "/api/v1/user?access_token=from-query",
            &[("cookie", "token=from-cookie")],
        );
        assert_eq!(extract_token(&p, "token").as_deref(), Some("from-query"));
    }

    #[test]
    fn test_query_wins_over_header() {
        let p = parts(
            "/?access_token=from-query",
            &[("authorization", "Bearer from-header")],
        );
        assert_eq!(extract_token(&p, "token").as_deref(), Some("from-query"));
    }

    #[test]
    fn test_header_wins_over_cookie() {
        let p = parts(
            "/",
            &[
                ("authorization", "Bearer from-header"),
                ("cookie", "token=from-cookie"),
            ],
        );
        assert_eq!(extract_token(&p, "token").as_deref(), Some("from-header"));
    }

    #[test]
    fn test_basic_auth_uses_password() {
        let encoded = STANDARD.encode("git-user:secret-token");
        let p = parts("/", &[("authorization", &format!("Basic {encoded}"))]);
        assert_eq!(extract_token(&p, "token").as_deref(), Some("secret-token"));
    }

    #[test]
    fn test_basic_auth_with_empty_password_is_no_token() {
        let encoded = STANDARD.encode("git-user:");
        let p = parts(
            "/",
            &[
                ("authorization", &format!("Basic {encoded}")),
                ("cookie", "token=ignored"),
            ],
        );
        assert_eq!(extract_token(&p, "token"), None);
    }

    #[test]
    fn test_raw_header_value_is_used_as_is() {
        let p = parts("/", &[("authorization", "raw-token")]);
        assert_eq!(extract_token(&p, "token").as_deref(), Some("raw-token"));
    }

    #[test]
    fn test_named_cookie() {
        let p = parts("/", &[("cookie", "theme=dark; session=abc; token=xyz")]);
        assert_eq!(extract_token(&p, "session").as_deref(), Some("abc"));
        assert_eq!(extract_token(&p, "token").as_deref(), Some("xyz"));
        assert_eq!(extract_token(&p, "missing"), None);
    }

    #[test]
    fn test_no_credential() {
        let p = parts("/api/v1/user?other=1", &[]);
        assert_eq!(extract_token(&p, "token"), None);
    }
}
