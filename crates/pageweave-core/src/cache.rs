//! Parsed template cache
//!
//! Keyed by canonical template path. Entries are replaced only by loads that
//! started after the key's last invalidation: a loader records the key's epoch
//! before reading the file and inserts only if the epoch is unchanged once it
//! holds the write lock.

use crate::template::{ParseOptions, Template, TemplateError, parse_with};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;
use tracing::debug;

/// Cheap identity of a file's contents: modification time and length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    modified: Option<SystemTime>,
    len: u64,
}

impl Fingerprint {
    pub fn of(path: &Path) -> Option<Self> {
        let metadata = fs::metadata(path).ok()?;
        Some(Self {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        })
    }
}

#[derive(Debug)]
struct CacheEntry {
    template: Arc<Template>,
    fingerprint: Option<Fingerprint>,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<PathBuf, CacheEntry>,
    epochs: HashMap<PathBuf, u64>,
    generation: u64,
}

impl CacheState {
    fn epoch(&self, path: &Path) -> (u64, u64) {
        (self.generation, self.epochs.get(path).copied().unwrap_or(0))
    }
}

/// Read a template file into a string
pub fn load_source(path: &Path) -> Result<String, TemplateError> {
    fs::read_to_string(path).map_err(|e| TemplateError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Concurrent map of canonical path → parsed template
#[derive(Debug)]
pub struct TemplateCache {
    state: RwLock<CacheState>,
    enabled: bool,
    revalidate: bool,
    parse_options: ParseOptions,
}

impl TemplateCache {
    /// Enabled cache without revalidation
    pub fn new() -> Self {
        Self::with_options(true, false)
    }

    /// `enabled = false` parses on every load; `revalidate = true` stats the
    /// file on every hit and reloads when its fingerprint changed
    pub fn with_options(enabled: bool, revalidate: bool) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            enabled,
            revalidate,
            parse_options: ParseOptions::default(),
        }
    }

    /// Limits applied when parsing loaded templates
    pub fn with_parse_options(self, parse_options: ParseOptions) -> Self {
        Self { parse_options, ..self }
    }

    pub fn parse_options(&self) -> &ParseOptions {
        &self.parse_options
    }

    fn parse_file(&self, path: &Path) -> Result<Template, TemplateError> {
        parse_with(&load_source(path)?, &self.parse_options)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    // Poisoned locks only mean another reader panicked mid-render
    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Cached template for `path`, parsing it on a miss
    ///
    /// `path` must already be canonical (as produced by the resolver).
    pub fn get_or_load(&self, path: &Path) -> Result<Arc<Template>, TemplateError> {
        if !self.enabled {
            return Ok(Arc::new(self.parse_file(path)?));
        }

        let epoch = {
            let state = self.read();
            if let Some(entry) = state.entries.get(path) {
                let fresh = !self.revalidate || entry.fingerprint == Fingerprint::of(path);
                if fresh {
                    debug!(path = %path.display(), "template cache hit");
                    return Ok(Arc::clone(&entry.template));
                }
                debug!(path = %path.display(), "template changed on disk");
            }
            state.epoch(path)
        };

        debug!(path = %path.display(), "template cache miss");
        let fingerprint = Fingerprint::of(path);
        let template = Arc::new(self.parse_file(path)?);

        let mut state = self.write();
        if state.epoch(path) == epoch {
            state.entries.insert(
                path.to_path_buf(),
                CacheEntry {
                    template: Arc::clone(&template),
                    fingerprint,
                },
            );
        } else {
            debug!(path = %path.display(), "template invalidated during load; not caching");
        }
        Ok(template)
    }

    /// Drop the entry for `path` and fence out loads already in flight
    ///
    /// Accepts paths that no longer exist: the parent directory is
    /// canonicalized instead so deleted files still match their entry.
    pub fn invalidate(&self, path: &Path) -> bool {
        let key = normalize_key(path);
        let mut state = self.write();
        *state.epochs.entry(key.clone()).or_insert(0) += 1;
        let removed = state.entries.remove(&key).is_some();
        debug!(path = %key.display(), removed, "template cache invalidated");
        removed
    }

    /// Drop every entry
    pub fn clear(&self) {
        let mut state = self.write();
        state.entries.clear();
        state.generation += 1;
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.read().entries.contains_key(&normalize_key(path))
    }
}

impl Default for TemplateCache {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_key(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|parent| parent.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::template::render;
    use pageweave_testkit::ViewTree;

    fn render_cached(cache: &TemplateCache, path: &Path) -> String {
        let template = cache.get_or_load(path).unwrap();
        render(&template, &Context::empty()).unwrap()
    }

    #[test]
    fn test_hit_returns_same_tree() {
        let tree = ViewTree::new();
        let path = tree.write("page.php", "hello").canonicalize().unwrap();
        let cache = TemplateCache::new();

        let first = cache.get_or_load(&path).unwrap();
        let second = cache.get_or_load(&path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&path));
    }

    #[test]
    fn test_invalidate_reloads_new_content() {
        let tree = ViewTree::new();
        let path = tree.write("page.php", "old").canonicalize().unwrap();
        let cache = TemplateCache::new();
        assert_eq!(render_cached(&cache, &path), "old");

        tree.write("page.php", "new");
        assert_eq!(render_cached(&cache, &path), "old");
        assert!(cache.invalidate(&path));
        assert_eq!(render_cached(&cache, &path), "new");
    }

    #[test]
    fn test_invalidate_deleted_file() {
        let tree = ViewTree::new();
        let path = tree.write("gone.php", "x").canonicalize().unwrap();
        let cache = TemplateCache::new();
        cache.get_or_load(&path).unwrap();

        tree.remove("gone.php");
        assert!(cache.invalidate(&tree.root().join("gone.php")));
        assert!(cache.is_empty());
        assert!(matches!(cache.get_or_load(&path), Err(TemplateError::Io { .. })));
    }

    #[test]
    fn test_invalidate_unknown_path_is_noop() {
        let cache = TemplateCache::new();
        assert!(!cache.invalidate(Path::new("/nonexistent/page.php")));
    }

    #[test]
    fn test_disabled_cache_always_parses() {
        let tree = ViewTree::new();
        let path = tree.write("page.php", "one").canonicalize().unwrap();
        let cache = TemplateCache::with_options(false, false);
        assert_eq!(render_cached(&cache, &path), "one");
        tree.write("page.php", "two");
        assert_eq!(render_cached(&cache, &path), "two");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_revalidate_detects_length_change() {
        let tree = ViewTree::new();
        let path = tree.write("page.php", "short").canonicalize().unwrap();
        let cache = TemplateCache::with_options(true, true);
        assert_eq!(render_cached(&cache, &path), "short");
        tree.write("page.php", "much longer");
        assert_eq!(render_cached(&cache, &path), "much longer");
    }

    #[test]
    fn test_parse_errors_are_not_cached() {
        let tree = ViewTree::new();
        let path = tree.write("bad.php", "<?= ?>").canonicalize().unwrap();
        let cache = TemplateCache::new();
        assert!(matches!(cache.get_or_load(&path), Err(TemplateError::Parse { .. })));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_parse_options_apply_to_loads() {
        let tree = ViewTree::new();
        let path = tree
            .write("nested.php", "<?php if (true): ?><?php if (true): ?>x<?php endif ?><?php endif ?>")
            .canonicalize()
            .unwrap();

        assert_eq!(render_cached(&TemplateCache::new(), &path), "x");
        let strict = TemplateCache::new().with_parse_options(ParseOptions { max_block_depth: 1 });
        assert!(matches!(strict.get_or_load(&path), Err(TemplateError::Parse { .. })));
        assert!(strict.is_empty());
    }

    #[test]
    fn test_clear() {
        let tree = ViewTree::new();
        let a = tree.write("a.php", "a").canonicalize().unwrap();
        let b = tree.write("b.php", "b").canonicalize().unwrap();
        let cache = TemplateCache::new();
        cache.get_or_load(&a).unwrap();
        cache.get_or_load(&b).unwrap();
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }
}
