//! Path validation for template identifiers
//!
//! Dotted identifiers (`components.header`) are mapped onto the template root
//! one segment at a time. Every segment must be a single, plain directory or
//! file stem: no separators, no `.`/`..`, no roots or drive prefixes.
//!
//! Component-based checks are used instead of `Path::is_absolute()`, which is
//! platform dependent:
//!
//! - Unix: `Path::new("/tmp").is_absolute()` → `true`
//! - Windows: `Path::new("/tmp").is_absolute()` → `false` (rooted, not absolute!)

use anyhow::{Result, bail};
use std::io;
use std::path::{Component, Path, PathBuf};

/// Check if path is absolute OR rooted (cross-platform)
///
/// # Examples
///
/// ```rust
/// use std::path::Path;
/// use pageweave_core::path::has_absolute_or_rooted_component;
///
/// assert!(has_absolute_or_rooted_component(Path::new("/etc/passwd")));
/// assert!(!has_absolute_or_rooted_component(Path::new("views/home")));
/// ```
pub fn has_absolute_or_rooted_component(path: &Path) -> bool {
    if path.is_absolute() {
        return true;
    }

    // Windows rooted paths (`/tmp`) are not absolute
    path.components()
        .any(|c| matches!(c, Component::RootDir | Component::Prefix(_)))
}

/// Check if path is safe for use as a single directory or file name
///
/// # Errors
///
/// Describes the first rule the path breaks.
pub fn is_safe_single_component(path: &Path) -> Result<()> {
    if has_absolute_or_rooted_component(path) {
        bail!("cannot be absolute or rooted");
    }

    let mut normal_count = 0;
    for component in path.components() {
        match component {
            Component::Normal(_) => normal_count += 1,
            Component::Prefix(_) => bail!("cannot contain a drive prefix"),
            Component::RootDir => bail!("cannot be absolute or rooted"),
            Component::CurDir => bail!("cannot be the current directory (.)"),
            Component::ParentDir => bail!("cannot be the parent directory (..)"),
        }
    }

    if normal_count != 1 {
        bail!("must be a single path component, found {}", normal_count);
    }
    Ok(())
}

/// Validate one segment of a dotted identifier
///
/// Segments are non-empty and made of ASCII letters, digits, `_` and `-`.
///
/// ```rust
/// use pageweave_core::path::validate_segment;
///
/// assert!(validate_segment("header").is_ok());
/// assert!(validate_segment("").is_err());
/// assert!(validate_segment("..").is_err());
/// assert!(validate_segment("a/b").is_err());
/// ```
pub fn validate_segment(segment: &str) -> Result<()> {
    if segment.is_empty() {
        bail!("empty segment");
    }
    is_safe_single_component(Path::new(segment)).map_err(|e| anyhow::anyhow!("segment '{}' {}", segment, e))?;
    if let Some(bad) = segment
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        bail!(
            "segment '{}' contains '{}'; only letters, digits, '_' and '-' are allowed",
            segment,
            bad
        );
    }
    Ok(())
}

/// Split a dotted identifier into validated segments
pub fn identifier_segments(identifier: &str) -> Result<Vec<&str>> {
    if identifier.is_empty() {
        bail!("identifier is empty");
    }
    identifier
        .split('.')
        .map(|segment| validate_segment(segment).map(|()| segment))
        .collect()
}

/// Canonicalize `path` and require it to stay under the canonical `root`
///
/// Returns `Ok(None)` when the canonical path escapes the root (including via
/// symlinks).
pub fn canonical_within(root: &Path, path: &Path) -> io::Result<Option<PathBuf>> {
    let canonical = path.canonicalize()?;
    if canonical.starts_with(root) {
        Ok(Some(canonical))
    } else {
        Ok(None)
    }
}
