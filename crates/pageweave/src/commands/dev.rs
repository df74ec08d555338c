//! Dev command - watch templates and stream reload events

use crate::context::AppContext;
use anyhow::{Context as _, Result};
use pageweave_core::reload::sse::{self, SseOptions};
use pageweave_core::reload::ReloadNotifier;
use pageweave_watch::{PollingWatcher, watch};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

/// Run the watcher and the SSE server until Ctrl-C
pub fn run(root: Option<std::path::PathBuf>, verbose: bool) -> Result<()> {
    let ctx = AppContext::new(root, verbose)?;
    let settings = ctx.config.live_reload.clone();
    let watcher = PollingWatcher::from_config(&ctx.config, &ctx.root)?;
    let notifier = ReloadNotifier::init_global(settings.channel_capacity);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    rt.block_on(async move {
        let listener = TcpListener::bind(&settings.address)
            .await
            .with_context(|| format!("Failed to listen on {}", settings.address))?;
        let options = SseOptions {
            path: settings.path.clone(),
            heartbeat: Duration::from_secs(settings.heartbeat_secs),
        };
        println!("Live reload: {}", settings.url());

        let interval = Duration::from_millis(ctx.config.watch.debounce_ms);
        tokio::select! {
            result = sse::serve(listener, notifier.clone(), options) => {
                result.context("Live reload server stopped")
            }
            result = watch(watcher, notifier, interval) => result,
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                Ok(())
            }
        }
    })
}
