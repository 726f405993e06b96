use crate::api::middleware::RequireAuth;
use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::models::{SetPickRequest, TrackPick};
use axum::{
    extract::{Path, State},
    routing::put,
    Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

pub fn pick_routes() -> Router<Arc<AppState>> {
    Router::new().route("/albums/:album_id/pick", put(set_pick).delete(clear_pick))
}

async fn set_pick(
    State(state): State<Arc<AppState>>,
    RequireAuth(claims): RequireAuth,
    Path(album_id): Path<Uuid>,
    Json(req): Json<SetPickRequest>,
) -> Result<Json<TrackPick>> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let album_exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM albums WHERE id = $1)")
            .bind(album_id)
            .fetch_one(&state.db)
            .await?;
    if !album_exists {
        return Err(AppError::NotFound("Album not found".to_string()));
    }

    let pick = sqlx::query_as::<_, TrackPick>(
        r#"
        INSERT INTO track_picks (user_id, album_id, track_title)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, album_id)
        DO UPDATE SET track_title = EXCLUDED.track_title, updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(claims.sub)
    .bind(album_id)
    .bind(req.track_title.trim())
    .fetch_one(&state.db)
    .await?;

    Ok(Json(pick))
}

async fn clear_pick(
    State(state): State<Arc<AppState>>,
    RequireAuth(claims): RequireAuth,
    Path(album_id): Path<Uuid>,
) -> Result<Json<()>> {
    let result = sqlx::query("DELETE FROM track_picks WHERE user_id = $1 AND album_id = $2")
        .bind(claims.sub)
        .bind(album_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("No track pick for this album".to_string()));
    }

    Ok(Json(()))
}
