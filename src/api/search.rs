use crate::api::middleware::RequireAuth;
use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::services::lastfm::AlbumInfo;
use crate::services::spotify::AlbumSearchResult;
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

pub fn search_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/search/albums", get(search_albums))
        .route("/search/album-info", get(album_info))
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: String,
    limit: Option<usize>,
}

async fn search_albums(
    State(state): State<Arc<AppState>>,
    RequireAuth(_): RequireAuth,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<AlbumSearchResult>>> {
    if query.q.trim().is_empty() {
        return Err(AppError::Validation("Search query cannot be empty".to_string()));
    }

    let results = state
        .spotify
        .search_albums(query.q.trim(), query.limit.unwrap_or(20))
        .await?;
    Ok(Json(results))
}

#[derive(Debug, Deserialize)]
struct AlbumInfoQuery {
    artist: String,
    title: String,
}

async fn album_info(
    State(state): State<Arc<AppState>>,
    RequireAuth(_): RequireAuth,
    Query(query): Query<AlbumInfoQuery>,
) -> Result<Json<AlbumInfo>> {
    if query.artist.trim().is_empty() || query.title.trim().is_empty() {
        return Err(AppError::Validation(
            "Both artist and title are required".to_string(),
        ));
    }

    let info = state
        .lastfm
        .album_info(query.artist.trim(), query.title.trim())
        .await?;
    Ok(Json(info))
}
