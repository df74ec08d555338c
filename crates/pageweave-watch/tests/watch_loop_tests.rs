//! The watch loop invalidates cached templates and notifies subscribers.

use pageweave_core::{Context, ReloadEvent, ReloadNotifier, ViewEngine};
use pageweave_testkit::ViewTree;
use pageweave_watch::{PollingWatcher, watch};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_watch_notifies_on_change() {
    let tree = ViewTree::new();
    tree.write("page.php", "first");
    let notifier = Arc::new(ReloadNotifier::new(8));
    let engine = ViewEngine::new(tree.root()).unwrap().with_notifier(Arc::clone(&notifier));
    assert_eq!(engine.render("page", &Context::empty()).unwrap(), "first");

    let mut subscription = notifier.subscribe();
    let watcher = PollingWatcher::new(tree.root(), vec!["php".to_string()], &[]).unwrap();
    let task = tokio::spawn(watch(watcher, Arc::clone(&notifier), Duration::from_millis(20)));

    tree.write("page.php", "second version");
    let event = tokio::time::timeout(Duration::from_secs(5), subscription.recv())
        .await
        .expect("no reload within timeout");
    assert_eq!(event, Some(ReloadEvent::Reload));
    assert_eq!(engine.render("page", &Context::empty()).unwrap(), "second version");

    task.abort();
}

#[tokio::test]
async fn test_watch_reports_new_component() {
    let tree = ViewTree::new();
    tree.write("page.php", r#"<?= include("components.footer") ?>"#);
    let notifier = Arc::new(ReloadNotifier::new(8));
    let engine = ViewEngine::new(tree.root()).unwrap().with_notifier(Arc::clone(&notifier));
    assert!(engine.render("page", &Context::empty()).is_err());

    let mut subscription = notifier.subscribe();
    let watcher = PollingWatcher::new(tree.root(), vec!["php".to_string()], &[]).unwrap();
    let task = tokio::spawn(watch(watcher, Arc::clone(&notifier), Duration::from_millis(20)));

    tree.write("components/footer.php", "<footer></footer>");
    tokio::time::timeout(Duration::from_secs(5), subscription.recv())
        .await
        .expect("no reload within timeout");
    assert_eq!(engine.render("page", &Context::empty()).unwrap(), "<footer></footer>");

    task.abort();
}

#[tokio::test]
async fn test_watch_rejects_zero_interval() {
    let tree = ViewTree::new();
    let notifier = Arc::new(ReloadNotifier::new(8));
    let watcher = PollingWatcher::new(tree.root(), vec!["php".to_string()], &[]).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), watch(watcher, notifier, Duration::ZERO))
        .await
        .expect("watch should return immediately");
    let err = result.unwrap_err();
    assert!(err.to_string().contains("non-zero"), "{}", err);
}
