//! URI validation for custom bundle/behavior registration.
//!
//! Validation is a separate operation from registration: a client may
//! validate a URI without registering it, or (less usefully) register one
//! that was never validated. Two schemes are recognized: `git+https://…`
//! and `file://…`.

use std::path::{Component, Path, PathBuf};

use crate::errors::{Result, SettingsError};

/// System prefixes a `file://` URI must never resolve under.
const DENIED_PREFIXES: &[&str] = &["/etc", "/var", "/usr", "/bin", "/sbin", "/System", "/Library"];

/// Roots allowed in addition to the user's home directory.
const EXTRA_ALLOWED_ROOTS: &[&str] = &["/tmp"];

/// Validate a custom bundle/behavior URI.
pub fn validate_uri(uri: &str) -> Result<()> {
    validate_uri_under(uri, home_dir().as_deref())
}

fn validate_uri_under(uri: &str, home: Option<&Path>) -> Result<()> {
    if let Some(rest) = uri.strip_prefix("git+https://") {
        return validate_git_uri(uri, rest);
    }
    if let Some(rest) = uri.strip_prefix("file://") {
        return validate_file_uri(uri, rest, home);
    }
    Err(SettingsError::UnsupportedScheme(uri.to_string()))
}

fn validate_git_uri(uri: &str, rest: &str) -> Result<()> {
    if rest.is_empty() || !rest.contains('/') {
        return Err(SettingsError::InvalidUri(uri.to_string()));
    }
    Ok(())
}

fn validate_file_uri(uri: &str, raw_path: &str, home: Option<&Path>) -> Result<()> {
    let path = Path::new(raw_path);
    if !path.is_absolute() {
        return Err(SettingsError::InvalidUri(uri.to_string()));
    }

    let normalized = normalize_lexically(path);
    if normalized.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(SettingsError::PathEscapesAllowedRoots(normalized));
    }

    for denied in DENIED_PREFIXES {
        if normalized.starts_with(denied) {
            return Err(SettingsError::DeniedPath(normalized));
        }
    }

    let under_home = home.is_some_and(|home| normalized.starts_with(home));
    let under_extra = EXTRA_ALLOWED_ROOTS.iter().any(|root| normalized.starts_with(root));
    if !under_home && !under_extra {
        return Err(SettingsError::PathEscapesAllowedRoots(normalized));
    }

    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

/// Collapse `.` and `..` components without touching the filesystem — the
/// target of a `file://` registration need not exist yet.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.last(), Some(Component::Normal(_))) {
                    let _ = out.pop();
                } else {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out.into_iter().collect()
}
