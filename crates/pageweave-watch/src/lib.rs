//! Template change detection for live reload
//!
//! [`PollingWatcher`] compares `(mtime, len)` snapshots of the template tree;
//! [`watch`] runs it on an interval and reports every change to a
//! [`ReloadNotifier`](pageweave_core::ReloadNotifier).

mod poller;

pub use poller::{Change, ChangeKind, PollingWatcher, watch};
