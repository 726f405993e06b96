use crate::api::middleware::RequireAuth;
use crate::api::AppState;
use crate::error::Result;
use crate::models::WeeklyRelease;
use axum::{extract::State, routing::get, Json, Router};
use std::sync::Arc;

pub fn release_routes() -> Router<Arc<AppState>> {
    Router::new().route("/releases/weekly", get(weekly_releases))
}

async fn weekly_releases(
    State(state): State<Arc<AppState>>,
    RequireAuth(_): RequireAuth,
) -> Result<Json<Vec<WeeklyRelease>>> {
    let releases = sqlx::query_as::<_, WeeklyRelease>(
        r#"
        SELECT * FROM weekly_new_releases
        ORDER BY release_date DESC NULLS LAST, fetched_at DESC
        LIMIT 100
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(releases))
}
