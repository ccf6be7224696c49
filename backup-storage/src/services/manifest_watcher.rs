use crate::services::ingest::ingest_pending;
use crate::state::AppState;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Poll for a pending manifest and ingest it. A zero interval disables polling.
pub fn start_manifest_watcher(state: Arc<AppState>, cancel: CancellationToken) {
    let period = state.config.poll_interval;
    if period.is_zero() {
        tracing::info!("Manifest polling disabled, waiting for ingest requests");
        return;
    }

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if !state.config.manifest_path().exists() {
                        continue;
                    }
                    tracing::info!("Manifest found, starting ingest");
                    if let Err(e) = ingest_pending(state.clone()).await {
                        tracing::error!("Ingest failed: {e:#}");
                    }
                }
            }
        }
        tracing::info!("Manifest watcher stopped");
    });
}
