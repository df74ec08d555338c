//! Cache invalidation and reload delivery, in-process and over SSE.

use futures_util::StreamExt;
use pageweave_core::reload::sse::{self, SseOptions};
use pageweave_core::{Context, ReloadEvent, ReloadNotifier, ViewEngine};
use pageweave_testkit::ViewTree;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

fn replace_file(path: &Path, content: &str) {
    let staged = path.with_extension("staged");
    fs::write(&staged, content).unwrap();
    fs::rename(&staged, path).unwrap();
}

#[test]
fn test_notify_changed_reflects_new_content() {
    let tree = ViewTree::new();
    let path = tree.write("page.php", "<p><?= $Name ?> v1</p>");
    let notifier = Arc::new(ReloadNotifier::new(4));
    let engine = ViewEngine::new(tree.root()).unwrap().with_notifier(Arc::clone(&notifier));
    let mut subscription = notifier.subscribe();
    let ctx = Context::empty().with("Name", "page");

    assert_eq!(engine.render("page", &ctx).unwrap(), "<p>page v1</p>");
    tree.write("page.php", "<p><?= $Name ?> v2</p>");
    assert_eq!(engine.render("page", &ctx).unwrap(), "<p>page v1</p>");

    let report = notifier.notify_changed(&path);
    assert_eq!(report.delivered, 1);
    assert_eq!(subscription.try_recv(), Some(ReloadEvent::Reload));
    assert_eq!(engine.render("page", &ctx).unwrap(), "<p>page v2</p>");
}

#[test]
fn test_component_change_reaches_including_page() {
    let tree = ViewTree::new();
    let header = tree.write("components/header.php", "<h1>old</h1>");
    tree.write("home/index.php", r#"<?= include("components.header") ?><p>body</p>"#);
    let engine = ViewEngine::new(tree.root()).unwrap().with_notifier(Arc::new(ReloadNotifier::new(4)));

    assert_eq!(engine.render("home", &Context::empty()).unwrap(), "<h1>old</h1><p>body</p>");
    tree.write("components/header.php", "<h1>new</h1>");
    engine.notify_changed(&header);
    assert_eq!(engine.render("home", &Context::empty()).unwrap(), "<h1>new</h1><p>body</p>");
}

#[test]
fn test_invalidation_under_concurrent_readers() {
    let tree = ViewTree::new();
    let path = tree.write("page.php", "v1");
    let engine = ViewEngine::new(tree.root()).unwrap().with_notifier(Arc::new(ReloadNotifier::new(4)));
    let done = AtomicBool::new(false);

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                while !done.load(Ordering::Relaxed) {
                    let html = engine.render("page", &Context::empty()).unwrap();
                    assert!(html == "v1" || html == "v2", "unexpected render {:?}", html);
                }
            });
        }

        std::thread::sleep(Duration::from_millis(20));
        replace_file(&path, "v2");
        engine.notify_changed(&path);
        for _ in 0..100 {
            assert_eq!(engine.render("page", &Context::empty()).unwrap(), "v2");
        }
        done.store(true, Ordering::Relaxed);
    });

    assert_eq!(engine.render("page", &Context::empty()).unwrap(), "v2");
}

#[test]
fn test_deleted_template_after_notify() {
    let tree = ViewTree::new();
    let path = tree.write("gone.php", "here");
    let engine = ViewEngine::new(tree.root()).unwrap();
    assert_eq!(engine.render("gone", &Context::empty()).unwrap(), "here");

    tree.remove("gone.php");
    engine.notify_changed(&path);
    assert!(engine.render("gone", &Context::empty()).is_err());
}

#[tokio::test]
async fn test_subscription_stream() {
    let notifier = ReloadNotifier::new(2);
    let mut stream = notifier.subscribe();
    notifier.notify_changed(Path::new("/views/page.php"));
    notifier.notify_changed(Path::new("/views/page.php"));

    let events: Vec<ReloadEvent> = (&mut stream).take(2).collect().await;
    assert_eq!(events, vec![ReloadEvent::Reload, ReloadEvent::Reload]);
}

#[tokio::test]
async fn test_subscription_ends_when_notifier_dropped() {
    let notifier = ReloadNotifier::new(2);
    let mut subscription = notifier.subscribe();
    drop(notifier);
    assert_eq!(subscription.recv().await, None);
}

async fn start_server(notifier: Arc<ReloadNotifier>, heartbeat: Duration) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let options = SseOptions {
        path: "/hot-reload".to_string(),
        heartbeat,
    };
    tokio::spawn(sse::serve(listener, notifier, options));
    address
}

async fn read_until(stream: &mut TcpStream, buffer: &mut String, needle: &str) {
    let read = async {
        let mut chunk = [0u8; 1024];
        while !buffer.contains(needle) {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before {:?}; got {:?}", needle, buffer);
            buffer.push_str(&String::from_utf8_lossy(&chunk[..n]));
        }
    };
    tokio::time::timeout(Duration::from_secs(5), read)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {:?}; got {:?}", needle, buffer));
}

#[tokio::test]
async fn test_sse_delivers_reload() {
    let notifier = Arc::new(ReloadNotifier::new(4));
    let address = start_server(Arc::clone(&notifier), Duration::from_secs(60)).await;

    let mut client = TcpStream::connect(address).await.unwrap();
    client
        .write_all(b"GET /hot-reload HTTP/1.1\r\nHost: localhost\r\nAccept: text/event-stream\r\n\r\n")
        .await
        .unwrap();

    let mut received = String::new();
    read_until(&mut client, &mut received, "connected\n\n").await;
    let lower = received.to_ascii_lowercase();
    assert!(received.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(lower.contains("content-type: text/event-stream\r\n"));
    assert!(lower.contains("access-control-allow-origin: *\r\n"));
    assert_eq!(notifier.subscriber_count(), 1);

    let report = notifier.notify_changed(Path::new("/views/home/index.php"));
    assert_eq!(report.delivered, 1);
    read_until(&mut client, &mut received, "data: reload\n\n").await;
}

#[tokio::test]
async fn test_sse_disconnect_unsubscribes() {
    let notifier = Arc::new(ReloadNotifier::new(4));
    let address = start_server(Arc::clone(&notifier), Duration::from_secs(60)).await;

    let mut client = TcpStream::connect(address).await.unwrap();
    client.write_all(b"GET /hot-reload HTTP/1.1\r\nHost: localhost\r\n\r\n").await.unwrap();
    let mut received = String::new();
    read_until(&mut client, &mut received, "connected\n\n").await;
    assert_eq!(notifier.subscriber_count(), 1);
    drop(client);

    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            notifier.notify_changed(Path::new("/views/page.php"));
            if notifier.subscriber_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "subscriber still registered after disconnect");
}

#[tokio::test]
async fn test_sse_heartbeat() {
    let notifier = Arc::new(ReloadNotifier::new(4));
    let address = start_server(notifier, Duration::from_millis(50)).await;

    let mut client = TcpStream::connect(address).await.unwrap();
    client.write_all(b"GET /hot-reload HTTP/1.1\r\nHost: localhost\r\n\r\n").await.unwrap();

    let mut received = String::new();
    read_until(&mut client, &mut received, "ping\n\n").await;
}

#[tokio::test]
async fn test_sse_unknown_path_is_404() {
    let notifier = Arc::new(ReloadNotifier::new(4));
    let address = start_server(Arc::clone(&notifier), Duration::from_secs(60)).await;

    let mut client = TcpStream::connect(address).await.unwrap();
    client.write_all(b"GET /other HTTP/1.1\r\nHost: localhost\r\n\r\n").await.unwrap();

    let mut response = String::new();
    read_until(&mut client, &mut response, "\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert_eq!(notifier.subscriber_count(), 0);
}

#[tokio::test]
async fn test_sse_other_method_is_405() {
    let notifier = Arc::new(ReloadNotifier::new(4));
    let address = start_server(Arc::clone(&notifier), Duration::from_secs(60)).await;

    let mut client = TcpStream::connect(address).await.unwrap();
    client
        .write_all(b"POST /hot-reload HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\n\r\n")
        .await
        .unwrap();

    let mut response = String::new();
    read_until(&mut client, &mut response, "\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
    assert!(response.to_ascii_lowercase().contains("allow: "));
    assert_eq!(notifier.subscriber_count(), 0);
}

#[tokio::test]
async fn test_sse_cors_preflight() {
    let notifier = Arc::new(ReloadNotifier::new(4));
    let address = start_server(Arc::clone(&notifier), Duration::from_secs(60)).await;

    let mut client = TcpStream::connect(address).await.unwrap();
    client
        .write_all(
            b"OPTIONS /hot-reload HTTP/1.1\r\nHost: localhost\r\nOrigin: http://localhost:3000\r\n\
Access-Control-Request-Method: GET\r\n\r\n",
        )
        .await
        .unwrap();

    let mut response = String::new();
    read_until(&mut client, &mut response, "\r\n\r\n").await;
    let lower = response.to_ascii_lowercase();
    assert!(response.starts_with("HTTP/1.1 204 No Content\r\n"));
    assert!(lower.contains("access-control-allow-origin: *\r\n"));
    assert!(lower.contains("access-control-allow-methods: get, options\r\n"));
    assert_eq!(notifier.subscriber_count(), 0);
}

#[tokio::test]
async fn test_sse_oversized_headers_rejected() {
    let notifier = Arc::new(ReloadNotifier::new(4));
    let address = start_server(Arc::clone(&notifier), Duration::from_secs(60)).await;

    let mut client = TcpStream::connect(address).await.unwrap();
    client.write_all(b"GET /hot-reload HTTP/1.1\r\nX-Filler: ").await.unwrap();
    let filler = vec![b'a'; 64 * 1024];
    let flood = async {
        for _ in 0..64 {
            if client.write_all(&filler).await.is_err() {
                return;
            }
        }
    };
    let _ = tokio::time::timeout(Duration::from_secs(5), flood).await;

    let mut response = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut response)).await;
    let response = String::from_utf8_lossy(&response);
    assert!(!response.starts_with("HTTP/1.1 200"), "{}", response);
    assert_eq!(notifier.subscriber_count(), 0);
}

#[tokio::test]
async fn test_sse_query_string_ignored() {
    let notifier = Arc::new(ReloadNotifier::new(4));
    let address = start_server(notifier, Duration::from_secs(60)).await;

    let mut client = TcpStream::connect(address).await.unwrap();
    client
        .write_all(b"GET /hot-reload?tab=1 HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    let mut received = String::new();
    read_until(&mut client, &mut received, "connected\n\n").await;
    assert!(received.starts_with("HTTP/1.1 200 OK\r\n"));
}
