//! Keeps one invoice watcher running while the node is ready.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::history::PaymentHistory;
use crate::watcher::WatcherHandle;

/// Poll node readiness every `interval` until `shutdown`.
///
/// Nothing touches the node while it is not ready. A missing or finished
/// watcher is (re)started on the next ready tick; starting it also syncs sent
/// payments. A watcher that survives a readiness drop gets a sync of its own
/// when the node comes back.
pub async fn supervise(
    history: Arc<PaymentHistory>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut was_ready = false;
    let mut watcher: Option<WatcherHandle> = None;
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let ready = history.node.refresh_readiness().await;
        let became_ready = ready && !was_ready;
        was_ready = ready;
        if !ready {
            continue;
        }

        if watcher.as_ref().is_some_and(|w| !w.is_finished()) {
            if became_ready {
                info!("{} is ready again, syncing sent payments", history.node.node_name());
                if let Err(e) = history.sync().await {
                    warn!("Sent payment sync failed: {}", e);
                }
            }
            continue;
        }
        if let Some(finished) = watcher.take() {
            if let Err(e) = finished.join().await {
                warn!("Invoice watcher ended: {}", e);
            }
        }
        match history.start_watching(shutdown.child_token()).await {
            Ok(handle) => watcher = Some(handle),
            Err(e) => error!("Failed to subscribe to invoices: {}", e),
        }
    }

    if let Some(handle) = watcher {
        handle.shutdown();
        if let Err(e) = handle.join().await {
            warn!("Invoice watcher ended: {}", e);
        }
    }
}
