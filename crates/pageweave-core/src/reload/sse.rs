//! Server-Sent Events transport for reload notifications
//!
//! One long-lived `GET <path>` per browser tab. Each subscriber gets
//! `data: reload` messages and a periodic `ping` comment. Unknown paths are
//! 404 and other methods on the stream path are 405; `OPTIONS` answers CORS
//! preflights.

use super::{ReloadEvent, ReloadNotifier};
use axum::Router;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use futures_util::{StreamExt, stream};
use std::convert::Infallible;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Default event stream path
pub const DEFAULT_PATH: &str = "/hot-reload";

#[derive(Debug, Clone)]
pub struct SseOptions {
    /// Request path served as the event stream
    pub path: String,
    /// Interval between `ping` comments
    pub heartbeat: Duration,
}

impl Default for SseOptions {
    fn default() -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
            heartbeat: Duration::from_secs(15),
        }
    }
}

#[derive(Debug)]
struct StreamState {
    notifier: Arc<ReloadNotifier>,
    heartbeat: Duration,
}

/// Event stream for one client
///
/// Subscribes before the response is built, so no event after the
/// `connected` comment is missed.
async fn reload_stream(State(state): State<Arc<StreamState>>) -> impl IntoResponse {
    let subscription = state.notifier.subscribe();
    debug!(
        subscriber = subscription.id(),
        subscribers = state.notifier.subscriber_count(),
        "live reload client connected"
    );

    let events = stream::once(async { Event::default().comment("connected") })
        .chain(subscription.map(|event: ReloadEvent| Event::default().data(event.as_str())))
        .map(Ok::<_, Infallible>);

    Sse::new(events).keep_alive(KeepAlive::new().interval(state.heartbeat).text("ping"))
}

/// CORS preflight for the event stream
async fn preflight() -> Response {
    (
        StatusCode::NO_CONTENT,
        [
            (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, OPTIONS"),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "*"),
        ],
    )
        .into_response()
}

/// Pages are served from another origin than the event stream
async fn allow_any_origin(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    if status >= 400 {
        warn!("{} {} {} {:.1}ms", status, method, path, latency_ms);
    } else {
        debug!("{} {} {} {:.1}ms", status, method, path, latency_ms);
    }
    response
}

/// Router serving the event stream at `options.path`
pub fn router(notifier: Arc<ReloadNotifier>, options: &SseOptions) -> Router {
    let state = Arc::new(StreamState {
        notifier,
        heartbeat: options.heartbeat,
    });
    Router::new()
        .route(&options.path, get(reload_stream).options(preflight))
        .with_state(state)
        .layer(middleware::from_fn(allow_any_origin))
        .layer(middleware::from_fn(log_requests))
}

/// Serve the event stream on `listener` until the server fails
pub async fn serve(listener: TcpListener, notifier: Arc<ReloadNotifier>, options: SseOptions) -> io::Result<()> {
    info!(
        address = %listener.local_addr()?,
        path = %options.path,
        "live reload server listening"
    );
    axum::serve(listener, router(notifier, &options)).await
}
