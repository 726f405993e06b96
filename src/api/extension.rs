use crate::api::lists::{insert_album_into_list, list_summaries, owned_list};
use crate::api::middleware::{ExtensionAuth, RequireAuth};
use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::models::{
    AlbumPayload, CreateTokenRequest, IssuedToken, ListEntry, ListSummary, TokenInfo,
};
use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Token management (session-authenticated) and the endpoints the browser
/// extension itself calls (token-authenticated).
pub fn extension_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tokens", get(list_tokens).post(create_token))
        .route("/tokens/:id", delete(revoke_token))
        .route("/lists", get(extension_lists))
        .route("/albums", post(extension_add_album))
        .route("/logout", post(extension_logout))
}

async fn create_token(
    State(state): State<Arc<AppState>>,
    RequireAuth(claims): RequireAuth,
    Json(req): Json<CreateTokenRequest>,
) -> Result<Json<IssuedToken>> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let issued = state.extension_tokens.issue(claims.sub, req.label).await?;
    Ok(Json(issued))
}

async fn list_tokens(
    State(state): State<Arc<AppState>>,
    RequireAuth(claims): RequireAuth,
) -> Result<Json<Vec<TokenInfo>>> {
    Ok(Json(state.extension_tokens.list(claims.sub).await?))
}

async fn revoke_token(
    State(state): State<Arc<AppState>>,
    RequireAuth(claims): RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<()>> {
    state.extension_tokens.revoke(claims.sub, id).await?;
    Ok(Json(()))
}

/// The extension's "refreshLists" action.
async fn extension_lists(
    State(state): State<Arc<AppState>>,
    ExtensionAuth(token): ExtensionAuth,
) -> Result<Json<Vec<ListSummary>>> {
    Ok(Json(list_summaries(&state.db, token.user_id).await?))
}

#[derive(Debug, Deserialize)]
struct ExtensionAddRequest {
    list_id: Uuid,
    album: AlbumPayload,
    comment: Option<String>,
}

/// The extension's "extractAlbumData" forwarding: scraped album metadata
/// lands in one of the token owner's lists.
async fn extension_add_album(
    State(state): State<Arc<AppState>>,
    ExtensionAuth(token): ExtensionAuth,
    Json(req): Json<ExtensionAddRequest>,
) -> Result<Json<ListEntry>> {
    req.album
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    owned_list(&state.db, req.list_id, token.user_id).await?;
    let entry = insert_album_into_list(&state.db, req.list_id, &req.album, req.comment).await?;
    Ok(Json(entry))
}

/// The extension's "logout" action revokes the presented token.
async fn extension_logout(
    State(state): State<Arc<AppState>>,
    ExtensionAuth(token): ExtensionAuth,
) -> Result<Json<()>> {
    state.extension_tokens.revoke_by_value(&token.token).await?;
    Ok(Json(()))
}
