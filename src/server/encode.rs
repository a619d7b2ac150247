//! Re-encoding of paths that embed a `/`-separated reference followed by a marker.
//!
//! `/v1/spaces/acme/platform/+/members` addresses the space `acme/platform`.
//! Before routing, the reference is collapsed into a single segment,
//! `/v1/spaces/acme%2Fplatform/members`, so that route patterns can treat it
//! as one path parameter.

use std::borrow::Cow;

use axum::extract::Request;
use axum::http::Uri;
use axum::http::uri::PathAndQuery;

use crate::error::{Error, Result};
use crate::paths::PATH_SEPARATOR;

pub const ENCODED_PATH_SEPARATOR: &str = "%2F";

/// Marks the end of a space or repository reference in API paths.
pub const TERMINATOR_MARKER: &str = "/+";

/// Marks the end of a repository reference in git paths.
pub const GIT_MARKER: &str = ".git";

/// API paths whose first segments may be a terminated reference.
pub const TERMINATED_PATH_PREFIXES_API: [&str; 2] = ["/v1/spaces/", "/v1/repos/"];

/// Characters other than ASCII alphanumerics that stay unescaped in a path.
const PATH_SAFE: &str = "-_.~$&+,/:;=@";

/// Escapes `path` the default way, leaving separators in place.
pub fn escape_path(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    let mut buf = [0u8; 4];
    for c in path.chars() {
        if c.is_ascii_alphanumeric() || PATH_SAFE.contains(c) {
            escaped.push(c);
        } else {
            escaped.push_str(&urlencoding::encode(c.encode_utf8(&mut buf)));
        }
    }
    escaped
}

/// The decoded path of a request plus its raw form when the raw form is not
/// the default escaping of the decoded one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPath {
    pub path: String,
    pub raw_path: Option<String>,
}

impl RequestPath {
    pub fn from_uri(uri: &Uri) -> Self {
        let raw = uri.path();
        let path = match urlencoding::decode(raw) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => raw.to_string(),
        };
        let raw_path = (escape_path(&path) != raw).then(|| raw.to_string());
        Self { path, raw_path }
    }

    /// The form of the path that goes on the wire.
    pub fn escaped(&self) -> Cow<'_, str> {
        match &self.raw_path {
            Some(raw) => Cow::Borrowed(raw),
            None => Cow::Owned(escape_path(&self.path)),
        }
    }
}

/// Finds the reference that ends at the first `marker` followed by `/` or the end of `sub_path`.
fn cut_out_terminated_path<'a>(sub_path: &'a str, marker: &str) -> Option<&'a str> {
    sub_path.match_indices(marker).find_map(|(idx, _)| {
        let after = &sub_path[idx + marker.len()..];
        (after.is_empty() || after.starts_with(PATH_SEPARATOR)).then(|| &sub_path[..idx])
    })
}

/// Collapses the reference after `prefix` and before `marker` into one escaped segment.
///
/// Returns false when the path does not start with `prefix` or contains no
/// terminated reference. The marker is dropped unless `keep_marker` is set.
/// Path and raw path are rewritten together. The remainder of the raw path is
/// kept as sent; when the raw reference is not in its default escaping, the
/// raw path is rebuilt from the decoded one.
pub fn encode_terminated_path(
    request_path: &mut RequestPath,
    prefix: &str,
    marker: &str,
    keep_marker: bool,
) -> bool {
    let Some(sub_path) = request_path.path.strip_prefix(prefix) else {
        return false;
    };
    let Some(reference) = cut_out_terminated_path(sub_path, marker) else {
        return false;
    };
    if reference.is_empty() {
        return false;
    }

    // a leading separator stays a separator
    let first_len = reference.chars().next().map_or(0, char::len_utf8);
    let (head, tail) = reference.split_at(first_len);
    let kept_marker = if keep_marker { marker } else { "" };

    let new_prefix = format!(
        "{prefix}{head}{}{kept_marker}",
        tail.replace(PATH_SEPARATOR, ENCODED_PATH_SEPARATOR)
    );
    let new_raw_prefix = format!(
        "{}{}{}{kept_marker}",
        escape_path(prefix),
        escape_path(head),
        tail.split(PATH_SEPARATOR)
            .map(escape_path)
            .collect::<Vec<_>>()
            .join(ENCODED_PATH_SEPARATOR),
    );

    let old_len = prefix.len() + reference.len() + marker.len();
    let rest = &request_path.path[old_len..];
    let old_raw_prefix = escape_path(&request_path.path[..old_len]);

    let raw_rest = match request_path.escaped().strip_prefix(old_raw_prefix.as_str()) {
        Some(raw_rest) => raw_rest.to_string(),
        None => escape_path(rest),
    };

    request_path.raw_path = Some(format!("{new_raw_prefix}{raw_rest}"));
    request_path.path = format!("{new_prefix}{rest}");

    true
}

/// Applies [`encode_terminated_path`] to the URI of `request`, keeping its query.
pub fn encode_request_path(
    request: &mut Request,
    prefix: &str,
    marker: &str,
    keep_marker: bool,
) -> Result<bool> {
    let mut request_path = RequestPath::from_uri(request.uri());
    if !encode_terminated_path(&mut request_path, prefix, marker, keep_marker) {
        return Ok(false);
    }

    *request.uri_mut() = replace_path(request.uri(), &request_path.escaped())?;
    Ok(true)
}

/// Returns `uri` with its path replaced and its query preserved.
pub fn replace_path(uri: &Uri, path: &str) -> Result<Uri> {
    let path_and_query = match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(
        PathAndQuery::try_from(path_and_query)
            .map_err(|e| Error::PathEncoding(format!("invalid path '{path}': {e}")))?,
    );

    Uri::from_parts(parts).map_err(|e| Error::PathEncoding(format!("invalid uri: {e}")))
}
