//! payhist daemon.
//!
//! Connects to LND, keeps the payment history in a JSON file and serves it
//! over HTTP. A supervisor task polls LND readiness and, while LND is ready,
//! keeps the invoice watcher running from the persisted settle index.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use payhist_common::node::LightningNode;
use payhist_daemon::api;
use payhist_daemon::backup::{BackupHook, BackupScheduler, FileCopyBackupHook, LogBackupHook};
use payhist_daemon::config::Config;
use payhist_daemon::history::PaymentHistory;
use payhist_daemon::lightning::LndNode;
use payhist_daemon::notify::Notifier;
use payhist_daemon::store::JsonFileStore;
use payhist_daemon::supervisor::supervise;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();

    let store_path = config.store_path();
    let store = Arc::new(
        JsonFileStore::open(&store_path)
            .with_context(|| format!("opening payment store {}", store_path.display()))?,
    );

    let node = Arc::new(
        LndNode::connect(config.lnd())
            .await
            .context("connecting to LND")?,
    );
    node.refresh_readiness().await;

    let shutdown = CancellationToken::new();

    let hook: Arc<dyn BackupHook> = match &config.backup_dir {
        Some(dir) => Arc::new(FileCopyBackupHook {
            source: store_path.clone(),
            target_dir: dir.clone(),
        }),
        None => Arc::new(LogBackupHook),
    };
    let (backups, backup_task) =
        BackupScheduler::spawn(hook, config.backup_delay(), shutdown.clone());

    let history = Arc::new(PaymentHistory::new(
        node.clone(),
        store,
        config.routing_node_pubkey.clone(),
        Notifier::default(),
        backups,
    ));

    let supervisor = tokio::spawn(supervise(
        history.clone(),
        config.readiness_interval(),
        shutdown.clone(),
    ));

    let app = api::router(history);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("payhistd listening on {}", addr);

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Shutting down"),
                _ = signal.cancelled() => {}
            }
            signal.cancel();
        })
        .await
        .context("HTTP server failed")?;

    shutdown.cancel();
    if let Err(e) = supervisor.await {
        error!("Supervisor task failed: {}", e);
    }
    if let Err(e) = backup_task.await {
        error!("Backup task failed: {}", e);
    }
    Ok(())
}
