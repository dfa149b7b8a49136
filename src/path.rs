//! Absolute path handling for the partition namespace.

use crate::error::{FsError, Result};

/// Trims whitespace and surrounding quotes, and makes the path absolute.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Splits an absolute path into its non-empty, trimmed segments.
/// The root path yields an empty list.
pub fn components(path: &str) -> Result<Vec<String>> {
    let path = path.trim();
    if !path.starts_with('/') {
        return Err(FsError::validation(format!("path '{path}' is not absolute")));
    }
    Ok(path
        .split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect())
}

/// Parent segments and leaf name of a non-root path.
pub fn split_parent(path: &str) -> Result<(Vec<String>, String)> {
    let mut parts = components(path)?;
    match parts.pop() {
        Some(leaf) => Ok((parts, leaf)),
        None => Err(FsError::validation("the root directory has no parent")),
    }
}

pub fn join(parent: &str, name: &str) -> String {
    if parent == "/" || parent.is_empty() {
        format!("/{name}")
    } else {
        format!("{}/{name}", parent.trim_end_matches('/'))
    }
}

pub fn from_components(parts: &[String]) -> String {
    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_quotes_and_anchors() {
        assert_eq!(normalize("  \"home/u\" "), "/home/u");
        assert_eq!(normalize("/a/b"), "/a/b");
        assert_eq!(normalize(""), "/");
    }

    #[test]
    fn components_drop_empty_segments() {
        assert_eq!(components("/a//b/ c /").unwrap(), vec!["a", "b", "c"]);
        assert!(components("/").unwrap().is_empty());
        assert!(matches!(components("a/b"), Err(FsError::Validation(_))));
    }

    #[test]
    fn split_parent_and_join() {
        let (parent, leaf) = split_parent("/home/u/hi.txt").unwrap();
        assert_eq!(parent, vec!["home", "u"]);
        assert_eq!(leaf, "hi.txt");
        assert!(split_parent("/").is_err());
        assert_eq!(join("/", "x"), "/x");
        assert_eq!(join("/a", "x"), "/a/x");
        assert_eq!(from_components(&parent), "/home/u");
    }
}
