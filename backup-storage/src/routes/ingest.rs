use crate::error::AppError;
use crate::models::archive_history::ArchiveHistory;
use crate::services::ingest::ingest_pending;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ingest", post(trigger_ingest))
        .route("/archives", get(list_archives))
}

/// Start an ingest in the background; the client does not wait for it.
async fn trigger_ingest(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let manifest = state.config.manifest_path();
    if !manifest.exists() {
        return Err(AppError::NotFound(format!(
            "No manifest pending at {}",
            manifest.display()
        )));
    }

    tokio::spawn(async move {
        match ingest_pending(state).await {
            Ok(Some(report)) => tracing::info!(
                verified = report.verified.len(),
                rejected = report.rejected.len(),
                "Triggered ingest finished"
            ),
            Ok(None) => tracing::info!("Manifest already consumed"),
            Err(e) => tracing::error!("Triggered ingest failed: {e:#}"),
        }
    });

    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "accepted" }))))
}

async fn list_archives(State(state): State<Arc<AppState>>) -> Result<Json<ArchiveHistory>, AppError> {
    let path = state.config.history_path();
    let history = tokio::task::spawn_blocking(move || ArchiveHistory::load(&path))
        .await
        .map_err(|e| anyhow::anyhow!(e))?
        .map_err(anyhow::Error::from)?;
    Ok(Json(history))
}
