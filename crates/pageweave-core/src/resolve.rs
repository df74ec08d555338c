//! Dotted identifier → template file resolution
//!
//! `components.header` maps onto `<root>/components/header.<ext>` for each
//! configured extension in order, then onto the folder-per-view form
//! `<root>/components/header/<index>.<ext>`. Resolution reads the file system
//! but never modifies it.

use crate::error::{PageweaveError, Result};
use crate::path::{canonical_within, identifier_segments};
use crate::template::TemplateError;
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Default template file extensions, in lookup order
pub const DEFAULT_EXTENSIONS: &[&str] = &["php", "html"];

/// Default index file stems for folder-per-view pages, in lookup order
pub const DEFAULT_INDEX_NAMES: &[&str] = &["index", "default"];

/// A resolved template source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// The identifier as requested
    pub identifier: String,
    /// Canonical path of the template file
    pub path: PathBuf,
}

/// Maps dotted identifiers to template files under a root directory
#[derive(Debug, Clone)]
pub struct IdentifierResolver {
    root: PathBuf,
    extensions: Vec<String>,
    index_names: Vec<String>,
}

impl IdentifierResolver {
    /// Create a resolver; `root` must be an existing directory
    ///
    /// # Errors
    ///
    /// [`PageweaveError::TemplateRootNotFound`] when `root` is missing or not
    /// a directory.
    pub fn new(root: impl AsRef<Path>, extensions: Vec<String>, index_names: Vec<String>) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(PageweaveError::TemplateRootNotFound {
                path: root.to_path_buf(),
            });
        }
        Ok(Self {
            root: root.canonicalize()?,
            extensions,
            index_names,
        })
    }

    /// Resolver with the default extensions and index names
    pub fn with_defaults(root: impl AsRef<Path>) -> Result<Self> {
        Self::new(
            root,
            DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            DEFAULT_INDEX_NAMES.iter().map(|s| s.to_string()).collect(),
        )
    }

    /// Canonical template root
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn index_names(&self) -> &[String] {
        &self.index_names
    }

    fn with_extension(base: &Path, extension: &str) -> PathBuf {
        let mut file = OsString::from(base.as_os_str());
        file.push(".");
        file.push(extension);
        PathBuf::from(file)
    }

    /// Candidate files for a validated identifier, in lookup order
    fn candidates(&self, segments: &[&str]) -> Vec<PathBuf> {
        let base: PathBuf = segments.iter().fold(self.root.clone(), |path, s| path.join(s));
        let direct = self
            .extensions
            .iter()
            .map(|ext| Self::with_extension(&base, ext));
        let indexed = self.index_names.iter().flat_map(|index| {
            let stem = base.join(index);
            self.extensions
                .iter()
                .map(move |ext| Self::with_extension(&stem, ext))
        });
        direct.chain(indexed).collect()
    }

    /// Resolve a dotted identifier to a template file
    ///
    /// # Errors
    ///
    /// - [`TemplateError::InvalidIdentifier`] for malformed identifiers
    /// - [`TemplateError::PathEscape`] when the match leaves the root
    /// - [`TemplateError::UnresolvedIdentifier`] when nothing matches
    pub fn resolve(&self, identifier: &str) -> std::result::Result<SourceLocation, TemplateError> {
        let segments = identifier_segments(identifier).map_err(|e| TemplateError::InvalidIdentifier {
            identifier: identifier.to_string(),
            reason: e.to_string(),
        })?;

        for candidate in self.candidates(&segments) {
            if !candidate.is_file() {
                continue;
            }
            let canonical = canonical_within(&self.root, &candidate).map_err(|e| TemplateError::Io {
                path: candidate.clone(),
                message: e.to_string(),
            })?;
            let Some(path) = canonical else {
                return Err(TemplateError::PathEscape {
                    identifier: identifier.to_string(),
                });
            };
            debug!(identifier, path = %path.display(), "resolved template");
            return Ok(SourceLocation {
                identifier: identifier.to_string(),
                path,
            });
        }

        Err(TemplateError::UnresolvedIdentifier {
            identifier: identifier.to_string(),
        })
    }

    /// The identifier naming a file under the root, if it has one
    ///
    /// `components/header.php` → `components.header`,
    /// `home/index.php` → `home`.
    pub fn identifier_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let extension = relative.extension()?.to_str()?;
        if !self.extensions.iter().any(|ext| ext == extension) {
            return None;
        }

        let mut segments: Vec<&str> = relative
            .parent()?
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        let stem = relative.file_stem()?.to_str()?;
        let is_index = self.index_names.iter().any(|name| name == stem);
        if !(is_index && !segments.is_empty()) {
            segments.push(stem);
        }

        let identifier = segments.join(".");
        identifier_segments(&identifier).ok()?;
        Some(identifier)
    }

    /// Every identifier under the root that resolves to its own file, sorted
    pub fn list_identifiers(&self) -> Vec<String> {
        let mut identifiers = BTreeSet::new();
        for entry in WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
        {
            let Some(identifier) = self.identifier_for(entry.path()) else {
                continue;
            };
            // shadowed files (e.g. home.php next to home/index.php) do not count
            let resolves_here = self
                .resolve(&identifier)
                .is_ok_and(|location| Some(location.path) == entry.path().canonicalize().ok());
            if resolves_here {
                identifiers.insert(identifier);
            }
        }
        identifiers.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pageweave_testkit::temp_dir_in_workspace;
    use std::fs;

    fn tree(files: &[&str]) -> (tempfile::TempDir, IdentifierResolver) {
        let dir = temp_dir_in_workspace();
        for file in files {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, "x").unwrap();
        }
        let resolver = IdentifierResolver::with_defaults(dir.path()).unwrap();
        (dir, resolver)
    }

    #[test]
    fn test_resolve_component_file() {
        let (_dir, resolver) = tree(&["components/header.php"]);
        let location = resolver.resolve("components.header").unwrap();
        assert_eq!(location.identifier, "components.header");
        assert!(location.path.ends_with("components/header.php"));
    }

    #[test]
    fn test_resolve_prefers_extension_order() {
        let (_dir, resolver) = tree(&["page.html", "page.php"]);
        assert!(resolver.resolve("page").unwrap().path.ends_with("page.php"));
    }

    #[test]
    fn test_resolve_folder_index_and_default() {
        let (_dir, resolver) = tree(&["home/index.php", "login/default.html"]);
        assert!(resolver.resolve("home").unwrap().path.ends_with("home/index.php"));
        assert!(resolver.resolve("login").unwrap().path.ends_with("login/default.html"));
    }

    #[test]
    fn test_resolve_direct_file_wins_over_folder() {
        let (_dir, resolver) = tree(&["home.php", "home/index.php"]);
        assert!(resolver.resolve("home").unwrap().path.ends_with("home.php"));
    }

    #[test]
    fn test_resolve_unknown() {
        let (_dir, resolver) = tree(&["home/index.php"]);
        assert!(matches!(
            resolver.resolve("components.footer"),
            Err(TemplateError::UnresolvedIdentifier { .. })
        ));
    }

    #[test]
    fn test_resolve_rejects_malformed_identifiers() {
        let (_dir, resolver) = tree(&["home/index.php"]);
        for bad in ["", "..", "components..header", "../secret", "/etc/passwd", "a b"] {
            assert!(
                matches!(resolver.resolve(bad), Err(TemplateError::InvalidIdentifier { .. })),
                "{:?} should be invalid",
                bad
            );
        }
    }

    #[test]
    fn test_missing_root() {
        let dir = temp_dir_in_workspace();
        let result = IdentifierResolver::with_defaults(dir.path().join("nope"));
        assert!(matches!(result, Err(PageweaveError::TemplateRootNotFound { .. })));
    }

    #[test]
    fn test_identifier_for() {
        let (dir, resolver) = tree(&["components/header.php", "home/index.php", "notes.txt"]);
        let root = dir.path().canonicalize().unwrap();
        assert_eq!(
            resolver.identifier_for(&root.join("components/header.php")).as_deref(),
            Some("components.header")
        );
        assert_eq!(resolver.identifier_for(&root.join("home/index.php")).as_deref(), Some("home"));
        assert_eq!(resolver.identifier_for(&root.join("notes.txt")), None);
    }

    #[test]
    fn test_list_identifiers_sorted_and_deduplicated() {
        let (_dir, resolver) = tree(&[
            "components/header.php",
            "home/index.php",
            "home.php",
            "login/index.php",
            "register/default.php",
            "README.md",
        ]);
        assert_eq!(
            resolver.list_identifiers(),
            vec!["components.header", "home", "login", "register"]
        );
    }
}
