//! Helpers for the `/`-separated paths of spaces and repositories.

use crate::error::{Error, Result};

pub const PATH_SEPARATOR: char = '/';

/// Splits a path into its parent path and leaf name.
///
/// `acme/platform/api` becomes `("acme/platform", "api")`. A path without a
/// separator has no parent and is rejected.
pub fn disect_leaf(path: &str) -> Result<(String, String)> {
    let path = path.trim_matches(PATH_SEPARATOR);
    if path.is_empty() {
        return Err(Error::InvalidPath("path is empty".to_string()));
    }

    match path.rsplit_once(PATH_SEPARATOR) {
        Some((parent, leaf)) => Ok((parent.to_string(), leaf.to_string())),
        None => Err(Error::InvalidPath(format!("path '{path}' has no parent"))),
    }
}

/// Joins path fragments, skipping empty ones.
#[must_use]
pub fn concatenate(a: &str, b: &str) -> String {
    let a = a.trim_matches(PATH_SEPARATOR);
    let b = b.trim_matches(PATH_SEPARATOR);
    match (a.is_empty(), b.is_empty()) {
        (true, _) => b.to_string(),
        (_, true) => a.to_string(),
        _ => format!("{a}{PATH_SEPARATOR}{b}"),
    }
}

#[must_use]
pub fn segments(path: &str) -> Vec<&str> {
    path.split(PATH_SEPARATOR).filter(|s| !s.is_empty()).collect()
}

/// Returns true if `ancestor` equals `path` or is one of its parents (case-insensitive).
#[must_use]
pub fn is_ancestor_or_self(ancestor: &str, path: &str) -> bool {
    let ancestor = ancestor.trim_matches(PATH_SEPARATOR).to_lowercase();
    let path = path.trim_matches(PATH_SEPARATOR).to_lowercase();
    if ancestor.is_empty() {
        return false;
    }

    path == ancestor
        || path
            .strip_prefix(&ancestor)
            .is_some_and(|rest| rest.starts_with(PATH_SEPARATOR))
}

/// Validates and normalizes a path: trims separators, collapses empty segments.
pub fn normalize_path(path: &str) -> Result<String> {
    let segments = segments(path.trim());

    if segments.is_empty() {
        return Err(Error::InvalidPath("path cannot be empty".to_string()));
    }

    for segment in &segments {
        validate_segment(segment)?;
    }

    Ok(segments.join("/"))
}

/// Validates a single identifier (space, repo or principal uid).
pub fn validate_segment(segment: &str) -> Result<()> {
    if segment.is_empty() {
        return Err(Error::InvalidPath("path segment cannot be empty".to_string()));
    }

    if segment.len() > 100 {
        return Err(Error::InvalidPath(
            "path segment cannot exceed 100 characters".to_string(),
        ));
    }

    let valid = segment
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if !valid || segment == "." || segment == ".." {
        return Err(Error::InvalidPath(format!(
            "path segment '{segment}' contains invalid characters"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disect_leaf_nested() {
        assert_eq!(
            disect_leaf("acme/platform/api").unwrap(),
            ("acme/platform".to_string(), "api".to_string())
        );
        assert_eq!(
            disect_leaf("/acme/api/").unwrap(),
            ("acme".to_string(), "api".to_string())
        );
    }

    #[test]
    fn test_disect_leaf_without_parent_fails() {
        assert!(matches!(disect_leaf("acme"), Err(Error::InvalidPath(_))));
        assert!(matches!(disect_leaf("/"), Err(Error::InvalidPath(_))));
        assert!(matches!(disect_leaf(""), Err(Error::InvalidPath(_))));
    }

    #[test]
    fn test_concatenate_skips_empty() {
        assert_eq!(concatenate("acme", "api"), "acme/api");
        assert_eq!(concatenate("", "acme"), "acme");
        assert_eq!(concatenate("acme/", ""), "acme");
    }

    #[test]
    fn test_is_ancestor_or_self() {
        assert!(is_ancestor_or_self("acme", "acme"));
        assert!(is_ancestor_or_self("acme", "Acme/platform"));
        assert!(!is_ancestor_or_self("acme", "acmecorp/platform"));
        assert!(!is_ancestor_or_self("acme/platform", "acme"));
        assert!(!is_ancestor_or_self("", "acme"));
    }

    #[test]
    fn test_normalize_path_collapses_slashes() {
        assert_eq!(
            normalize_path("//acme//platform//").unwrap(),
            "acme/platform"
        );
        assert!(normalize_path("/").is_err());
        assert!(normalize_path("acme/../etc").is_err());
        assert!(normalize_path("acme/pl atform").is_err());
    }
}
