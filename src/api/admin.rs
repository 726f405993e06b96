use crate::api::middleware::RequireAdmin;
use crate::api::AppState;
use crate::error::Result;
use crate::models::{MergeRequest, MergeResult, ScanProgress, UserInfo};
use crate::services::dedup;
use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::{stream::Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, sync::Arc};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/scan-duplicates", get(scan_duplicates))
        .route("/merge-albums", post(merge_albums))
        .route("/releases/refresh", post(refresh_releases))
        .route("/users", get(list_users))
}

#[derive(Debug, Deserialize)]
struct ScanQuery {
    threshold: Option<f64>,
}

/// SSE endpoint: streams duplicate-scan progress, ending with the groups.
async fn scan_duplicates(
    State(state): State<Arc<AppState>>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<ScanQuery>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let threshold = query.threshold.unwrap_or(dedup::DEFAULT_THRESHOLD);
    let scanner = state.scanner.clone();

    let (progress_tx, progress_rx) = mpsc::channel::<ScanProgress>(32);

    tokio::spawn(async move {
        // Completed (with groups) is sent by the scanner itself
        if let Err(e) = scanner.scan(threshold, progress_tx.clone()).await {
            let _ = progress_tx
                .send(ScanProgress::Error {
                    message: e.to_string(),
                })
                .await;
        }
    });

    let stream = ReceiverStream::new(progress_rx).map(|progress| {
        let data = serde_json::to_string(&progress).unwrap_or_else(|_| "{}".to_string());
        Ok(Event::default().data(data))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

async fn merge_albums(
    State(state): State<Arc<AppState>>,
    RequireAdmin(_): RequireAdmin,
    Json(req): Json<MergeRequest>,
) -> Result<Json<MergeResult>> {
    let result = state.scanner.merge(&req).await?;
    Ok(Json(result))
}

#[derive(Debug, Serialize)]
struct RefreshResponse {
    stored: usize,
}

async fn refresh_releases(
    State(state): State<Arc<AppState>>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<RefreshResponse>> {
    let stored = state.release_tracker.refresh().await?;
    Ok(Json(RefreshResponse { stored }))
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Vec<UserInfo>>> {
    let users = sqlx::query_as::<_, crate::models::User>(
        "SELECT * FROM users ORDER BY created_at",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(users.into_iter().map(UserInfo::from).collect()))
}
