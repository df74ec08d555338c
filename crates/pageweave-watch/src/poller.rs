use anyhow::{Context as _, Result, ensure};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use pageweave_core::cache::Fingerprint;
use pageweave_core::{Config, ReloadNotifier};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

/// A template file that differs from the previous scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Snapshot-diffing watcher over a template root
#[derive(Debug)]
pub struct PollingWatcher {
    root: PathBuf,
    extensions: Vec<String>,
    ignore: Gitignore,
    snapshot: BTreeMap<PathBuf, Fingerprint>,
}

impl PollingWatcher {
    /// Watch files under `root` with one of `extensions`, skipping paths that
    /// match any gitignore-style pattern in `ignore`
    pub fn new(root: impl AsRef<Path>, extensions: Vec<String>, ignore: &[String]) -> Result<Self> {
        let root = root.as_ref();
        let root = root
            .canonicalize()
            .with_context(|| format!("template root '{}' is not accessible", root.display()))?;

        let mut builder = GitignoreBuilder::new(&root);
        for pattern in ignore {
            builder
                .add_line(None, pattern)
                .with_context(|| format!("invalid ignore pattern '{}'", pattern))?;
        }
        let ignore = builder.build().context("failed to build ignore patterns")?;

        let mut watcher = Self {
            root,
            extensions,
            ignore,
            snapshot: BTreeMap::new(),
        };
        watcher.snapshot = watcher.take_snapshot();
        Ok(watcher)
    }

    /// Watcher for the template root of the project at `project_root`
    pub fn from_config(config: &Config, project_root: &Path) -> Result<Self> {
        Self::new(
            config.template_root(project_root),
            config.templates.extensions.clone(),
            &config.watch.ignore,
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of files in the current snapshot
    pub fn tracked(&self) -> usize {
        self.snapshot.len()
    }

    fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        self.ignore.matched(path, is_dir).is_ignore()
    }

    fn is_template(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|known| known == ext))
    }

    fn take_snapshot(&self) -> BTreeMap<PathBuf, Fingerprint> {
        WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !self.is_ignored(entry.path(), entry.file_type().is_dir()))
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file() && self.is_template(entry.path()))
            .filter_map(|entry| {
                let fingerprint = Fingerprint::of(entry.path())?;
                Some((entry.into_path(), fingerprint))
            })
            .collect()
    }

    /// Rescan and report what changed since the previous scan
    pub fn scan(&mut self) -> Vec<Change> {
        let current = self.take_snapshot();
        let mut changes = Vec::new();

        for (path, fingerprint) in &current {
            match self.snapshot.get(path) {
                None => changes.push(Change {
                    path: path.clone(),
                    kind: ChangeKind::Created,
                }),
                Some(previous) if previous != fingerprint => changes.push(Change {
                    path: path.clone(),
                    kind: ChangeKind::Modified,
                }),
                Some(_) => {}
            }
        }
        for path in self.snapshot.keys() {
            if !current.contains_key(path) {
                changes.push(Change {
                    path: path.clone(),
                    kind: ChangeKind::Removed,
                });
            }
        }

        self.snapshot = current;
        if !changes.is_empty() {
            debug!(changes = changes.len(), tracked = self.snapshot.len(), "template scan");
        }
        changes
    }
}

/// Scan every `interval` and call [`ReloadNotifier::notify_changed`] per change
///
/// Runs until the scan task fails; callers stop it by dropping the future.
/// A zero `interval` is an error.
pub async fn watch(mut watcher: PollingWatcher, notifier: Arc<ReloadNotifier>, interval: Duration) -> Result<()> {
    ensure!(!interval.is_zero(), "watch interval must be non-zero");
    info!(
        root = %watcher.root().display(),
        files = watcher.tracked(),
        "watching templates"
    );
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let (returned, changes) = tokio::task::spawn_blocking(move || {
            let changes = watcher.scan();
            (watcher, changes)
        })
        .await
        .context("template scan task failed")?;
        watcher = returned;

        for change in &changes {
            info!(path = %change.path.display(), kind = ?change.kind, "template changed");
            notifier.notify_changed(&change.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pageweave_testkit::ViewTree;

    fn watcher(tree: &ViewTree) -> PollingWatcher {
        PollingWatcher::new(
            tree.root(),
            vec!["php".to_string(), "html".to_string()],
            &["*.tmp".to_string(), "drafts/".to_string()],
        )
        .unwrap()
    }

    fn kinds(changes: &[Change]) -> Vec<(String, ChangeKind)> {
        changes
            .iter()
            .map(|c| (c.path.file_name().unwrap().to_string_lossy().into_owned(), c.kind))
            .collect()
    }

    #[test]
    fn test_initial_snapshot_counts_templates_only() {
        let tree = ViewTree::portfolio();
        tree.write("notes.txt", "x");
        tree.write("scratch.tmp", "x");
        assert_eq!(watcher(&tree).tracked(), 4);
    }

    #[test]
    fn test_no_changes() {
        let tree = ViewTree::portfolio();
        let mut watcher = watcher(&tree);
        assert!(watcher.scan().is_empty());
    }

    #[test]
    fn test_created_modified_removed() {
        let tree = ViewTree::new();
        tree.write("a.php", "a");
        tree.write("b.php", "b");
        let mut watcher = watcher(&tree);

        tree.write("c.html", "c");
        tree.write("a.php", "a, but longer");
        tree.remove("b.php");

        let mut changes = kinds(&watcher.scan());
        changes.sort_by(|x, y| x.0.cmp(&y.0));
        assert_eq!(
            changes,
            vec![
                ("a.php".to_string(), ChangeKind::Modified),
                ("b.php".to_string(), ChangeKind::Removed),
                ("c.html".to_string(), ChangeKind::Created),
            ]
        );
        assert!(watcher.scan().is_empty());
        assert_eq!(watcher.tracked(), 2);
    }

    #[test]
    fn test_ignored_paths() {
        let tree = ViewTree::new();
        let mut watcher = watcher(&tree);
        tree.write("drafts/page.php", "x");
        tree.write("page.tmp", "x");
        tree.write("page.md", "x");
        assert!(watcher.scan().is_empty());
    }

    #[test]
    fn test_invalid_root() {
        let tree = ViewTree::new();
        assert!(PollingWatcher::new(tree.root().join("missing"), vec![], &[]).is_err());
    }

    #[test]
    fn test_from_config() {
        let tree = ViewTree::portfolio();
        let config = Config::default();
        let watcher = PollingWatcher::from_config(&config, tree.project_root()).unwrap();
        assert_eq!(watcher.tracked(), 4);
    }
}
