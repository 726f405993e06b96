use crate::api::middleware::RequireAuth;
use crate::api::AppState;
use crate::db;
use crate::error::{AppError, Result};
use crate::models::{
    Album, AlbumPayload, CreateListRequest, ExportedAlbum, List, ListDetail, ListEntry,
    ListExport, ListSummary, RenameListRequest, ReorderRequest,
};
use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Attempts at finding a free name during import before giving up.
const IMPORT_NAME_ATTEMPTS: u32 = 50;

pub fn list_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/lists", get(list_lists).post(create_list))
        .route("/lists/import", post(import_list))
        .route(
            "/lists/:id",
            get(get_list).patch(rename_list).delete(delete_list),
        )
        .route("/lists/:id/albums", post(add_album))
        .route(
            "/lists/:id/albums/:album_id",
            axum::routing::delete(remove_album),
        )
        .route("/lists/:id/reorder", put(reorder_list))
        .route("/lists/:id/export", get(export_list))
}

pub(crate) async fn list_summaries(db: &PgPool, user_id: Uuid) -> Result<Vec<ListSummary>> {
    let summaries = sqlx::query_as::<_, ListSummary>(
        r#"
        SELECT l.id, l.name, COUNT(li.id) AS album_count, l.created_at, l.updated_at
        FROM lists l
        LEFT JOIN list_items li ON li.list_id = l.id
        WHERE l.user_id = $1
        GROUP BY l.id
        ORDER BY l.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;

    Ok(summaries)
}

async fn list_lists(
    State(state): State<Arc<AppState>>,
    RequireAuth(claims): RequireAuth,
) -> Result<Json<Vec<ListSummary>>> {
    Ok(Json(list_summaries(&state.db, claims.sub).await?))
}

async fn create_list(
    State(state): State<Arc<AppState>>,
    RequireAuth(claims): RequireAuth,
    Json(req): Json<CreateListRequest>,
) -> Result<Json<List>> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let list = sqlx::query_as::<_, List>(
        "INSERT INTO lists (user_id, name) VALUES ($1, $2) RETURNING *",
    )
    .bind(claims.sub)
    .bind(req.name.trim())
    .fetch_one(&state.db)
    .await
    .map_err(|e| {
        if e.to_string().contains("unique") {
            AppError::Validation("A list with that name already exists".to_string())
        } else {
            AppError::Database(e)
        }
    })?;

    Ok(Json(list))
}

/// Fetch a list only if the caller owns it; anything else is a 404.
pub(crate) async fn owned_list(db: &PgPool, list_id: Uuid, user_id: Uuid) -> Result<List> {
    sqlx::query_as::<_, List>("SELECT * FROM lists WHERE id = $1 AND user_id = $2")
        .bind(list_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::NotFound("List not found".to_string()))
}

async fn list_entries(db: &PgPool, list_id: Uuid, user_id: Uuid) -> Result<Vec<ListEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT li.position, li.comment, li.added_at,
               a.id AS album_id, a.artist, a.title, a.release_date, a.country,
               a.genres, a.cover_url, a.created_at AS album_created_at,
               tp.track_title AS track_pick
        FROM list_items li
        JOIN albums a ON a.id = li.album_id
        LEFT JOIN track_picks tp ON tp.album_id = a.id AND tp.user_id = $2
        WHERE li.list_id = $1
        ORDER BY li.position
        "#,
    )
    .bind(list_id)
    .bind(user_id)
    .fetch_all(db)
    .await?;

    Ok(rows.iter().map(entry_from_row).collect())
}

fn entry_from_row(row: &PgRow) -> ListEntry {
    use sqlx::Row;
    let genres: Vec<String> =
        serde_json::from_value(row.get::<serde_json::Value, _>("genres")).unwrap_or_default();

    ListEntry {
        position: row.get("position"),
        comment: row.get("comment"),
        track_pick: row.get("track_pick"),
        added_at: row.get("added_at"),
        album: Album {
            id: row.get("album_id"),
            artist: row.get("artist"),
            title: row.get("title"),
            release_date: row.get("release_date"),
            country: row.get("country"),
            genres,
            cover_url: row.get("cover_url"),
            created_at: row.get("album_created_at"),
        },
    }
}

async fn get_list(
    State(state): State<Arc<AppState>>,
    RequireAuth(claims): RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<ListDetail>> {
    let list = owned_list(&state.db, id, claims.sub).await?;
    let items = list_entries(&state.db, id, claims.sub).await?;

    Ok(Json(ListDetail {
        id: list.id,
        name: list.name,
        created_at: list.created_at,
        updated_at: list.updated_at,
        items,
    }))
}

async fn rename_list(
    State(state): State<Arc<AppState>>,
    RequireAuth(claims): RequireAuth,
    Path(id): Path<Uuid>,
    Json(req): Json<RenameListRequest>,
) -> Result<Json<List>> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let list = sqlx::query_as::<_, List>(
        "UPDATE lists SET name = $1, updated_at = NOW() WHERE id = $2 AND user_id = $3 RETURNING *",
    )
    .bind(req.name.trim())
    .bind(id)
    .bind(claims.sub)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| {
        if e.to_string().contains("unique") {
            AppError::Validation("A list with that name already exists".to_string())
        } else {
            AppError::Database(e)
        }
    })?
    .ok_or_else(|| AppError::NotFound("List not found".to_string()))?;

    Ok(Json(list))
}

async fn delete_list(
    State(state): State<Arc<AppState>>,
    RequireAuth(claims): RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<()>> {
    let result = sqlx::query("DELETE FROM lists WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(claims.sub)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("List not found".to_string()));
    }

    Ok(Json(()))
}

#[derive(Debug, serde::Deserialize)]
struct AddAlbumRequest {
    #[serde(flatten)]
    album: AlbumPayload,
    comment: Option<String>,
}

async fn add_album(
    State(state): State<Arc<AppState>>,
    RequireAuth(claims): RequireAuth,
    Path(id): Path<Uuid>,
    Json(req): Json<AddAlbumRequest>,
) -> Result<Json<ListEntry>> {
    req.album
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    owned_list(&state.db, id, claims.sub).await?;
    let entry = insert_album_into_list(&state.db, id, &req.album, req.comment).await?;
    Ok(Json(entry))
}

/// Upsert the album row and append it to the list. Shared with the
/// extension ingest endpoint.
pub(crate) async fn insert_album_into_list(
    db: &PgPool,
    list_id: Uuid,
    payload: &AlbumPayload,
    comment: Option<String>,
) -> Result<ListEntry> {
    let mut tx = db.begin().await?;

    let album = upsert_album(&mut tx, payload).await?;

    let already_in_list: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM list_items WHERE list_id = $1 AND album_id = $2)",
    )
    .bind(list_id)
    .bind(album.id)
    .fetch_one(&mut *tx)
    .await?;

    if already_in_list {
        return Err(AppError::Validation(
            "Album is already in this list".to_string(),
        ));
    }

    let position: i32 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(position), 0) + 1 FROM list_items WHERE list_id = $1",
    )
    .bind(list_id)
    .fetch_one(&mut *tx)
    .await?;

    let (added_at,): (DateTime<Utc>,) = sqlx::query_as(
        r#"
        INSERT INTO list_items (list_id, album_id, position, comment)
        VALUES ($1, $2, $3, $4)
        RETURNING added_at
        "#,
    )
    .bind(list_id)
    .bind(album.id)
    .bind(position)
    .bind(&comment)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE lists SET updated_at = NOW() WHERE id = $1")
        .bind(list_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(ListEntry {
        position,
        album,
        comment,
        track_pick: None,
        added_at,
    })
}

async fn upsert_album(conn: &mut PgConnection, payload: &AlbumPayload) -> Result<Album> {
    let album = sqlx::query_as::<_, Album>(
        r#"
        INSERT INTO albums (artist, title, release_date, country, genres, cover_url)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (LOWER(artist), LOWER(title)) DO UPDATE SET
            release_date = COALESCE(albums.release_date, EXCLUDED.release_date),
            country = COALESCE(albums.country, EXCLUDED.country),
            cover_url = COALESCE(albums.cover_url, EXCLUDED.cover_url),
            genres = CASE WHEN albums.genres = '[]'::jsonb
                          THEN EXCLUDED.genres ELSE albums.genres END
        RETURNING *
        "#,
    )
    .bind(payload.artist.trim())
    .bind(payload.title.trim())
    .bind(payload.release_date)
    .bind(&payload.country)
    .bind(serde_json::to_value(&payload.genres).unwrap())
    .bind(&payload.cover_url)
    .fetch_one(conn)
    .await?;

    Ok(album)
}

async fn remove_album(
    State(state): State<Arc<AppState>>,
    RequireAuth(claims): RequireAuth,
    Path((id, album_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<()>> {
    owned_list(&state.db, id, claims.sub).await?;

    let mut tx = state.db.begin().await?;

    let result = sqlx::query("DELETE FROM list_items WHERE list_id = $1 AND album_id = $2")
        .bind(id)
        .bind(album_id)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Album is not in this list".to_string()));
    }

    db::renumber_list(&mut *tx, id).await?;

    sqlx::query("UPDATE lists SET updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(Json(()))
}

async fn reorder_list(
    State(state): State<Arc<AppState>>,
    RequireAuth(claims): RequireAuth,
    Path(id): Path<Uuid>,
    Json(req): Json<ReorderRequest>,
) -> Result<Json<ListDetail>> {
    owned_list(&state.db, id, claims.sub).await?;

    let current: Vec<(Uuid,)> =
        sqlx::query_as("SELECT album_id FROM list_items WHERE list_id = $1")
            .bind(id)
            .fetch_all(&state.db)
            .await?;
    let current: Vec<Uuid> = current.into_iter().map(|(id,)| id).collect();

    if !is_permutation(&current, &req.album_ids) {
        return Err(AppError::Validation(
            "Reorder must contain exactly the albums currently in the list".to_string(),
        ));
    }

    let mut tx = state.db.begin().await?;
    for (index, album_id) in req.album_ids.iter().enumerate() {
        sqlx::query("UPDATE list_items SET position = $1 WHERE list_id = $2 AND album_id = $3")
            .bind(index as i32 + 1)
            .bind(id)
            .bind(album_id)
            .execute(&mut *tx)
            .await?;
    }
    sqlx::query("UPDATE lists SET updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    get_list(State(state), RequireAuth(claims), Path(id)).await
}

/// True when `requested` is exactly the albums in `current`, each once.
fn is_permutation(current: &[Uuid], requested: &[Uuid]) -> bool {
    if current.len() != requested.len() {
        return false;
    }
    let mut a = current.to_vec();
    let mut b = requested.to_vec();
    a.sort();
    b.sort();
    if b.windows(2).any(|w| w[0] == w[1]) {
        return false;
    }
    a == b
}

async fn export_list(
    State(state): State<Arc<AppState>>,
    RequireAuth(claims): RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<ListExport>> {
    let list = owned_list(&state.db, id, claims.sub).await?;
    let entries = list_entries(&state.db, id, claims.sub).await?;

    let albums = entries
        .into_iter()
        .map(|entry| ExportedAlbum {
            artist: entry.album.artist,
            title: entry.album.title,
            release_date: entry.album.release_date,
            country: entry.album.country,
            genres: entry.album.genres,
            cover_url: entry.album.cover_url,
            comment: entry.comment,
            track_pick: entry.track_pick,
        })
        .collect();

    Ok(Json(ListExport {
        name: list.name,
        exported_at: Utc::now(),
        albums,
    }))
}

async fn import_list(
    State(state): State<Arc<AppState>>,
    RequireAuth(claims): RequireAuth,
    Json(doc): Json<ListExport>,
) -> Result<Json<ListSummary>> {
    let base_name = doc.name.trim();
    if base_name.is_empty() || base_name.len() > 100 {
        return Err(AppError::Validation(
            "List name must be between 1 and 100 characters".to_string(),
        ));
    }
    if doc.albums.is_empty() {
        return Err(AppError::Validation(
            "Imported list has no albums".to_string(),
        ));
    }

    // Find a free name, suffixing on collision
    let mut name = base_name.to_string();
    for attempt in 0..IMPORT_NAME_ATTEMPTS {
        let candidate = import_name(base_name, attempt);
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM lists WHERE user_id = $1 AND LOWER(name) = LOWER($2))",
        )
        .bind(claims.sub)
        .bind(&candidate)
        .fetch_one(&state.db)
        .await?;
        if !taken {
            name = candidate;
            break;
        }
        if attempt + 1 == IMPORT_NAME_ATTEMPTS {
            return Err(AppError::Validation(
                "Could not find a free name for the imported list".to_string(),
            ));
        }
    }

    let mut tx = state.db.begin().await?;

    let list = sqlx::query_as::<_, List>(
        "INSERT INTO lists (user_id, name) VALUES ($1, $2) RETURNING *",
    )
    .bind(claims.sub)
    .bind(&name)
    .fetch_one(&mut *tx)
    .await?;

    for (index, imported) in doc.albums.iter().enumerate() {
        let payload = AlbumPayload {
            artist: imported.artist.clone(),
            title: imported.title.clone(),
            release_date: imported.release_date,
            country: imported.country.clone(),
            genres: imported.genres.clone(),
            cover_url: imported.cover_url.clone(),
        };
        payload
            .validate()
            .map_err(|e| AppError::Validation(format!("Album {}: {}", index + 1, e)))?;

        let album = upsert_album(&mut tx, &payload).await?;

        // Tolerate the same album appearing twice in the document
        sqlx::query(
            r#"
            INSERT INTO list_items (list_id, album_id, position, comment)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (list_id, album_id) DO NOTHING
            "#,
        )
        .bind(list.id)
        .bind(album.id)
        .bind(index as i32 + 1)
        .bind(&imported.comment)
        .execute(&mut *tx)
        .await?;

        if let Some(track_pick) = &imported.track_pick {
            sqlx::query(
                r#"
                INSERT INTO track_picks (user_id, album_id, track_title)
                VALUES ($1, $2, $3)
                ON CONFLICT (user_id, album_id)
                DO UPDATE SET track_title = EXCLUDED.track_title, updated_at = NOW()
                "#,
            )
            .bind(claims.sub)
            .bind(album.id)
            .bind(track_pick)
            .execute(&mut *tx)
            .await?;
        }
    }

    db::renumber_list(&mut *tx, list.id).await?;

    let album_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM list_items WHERE list_id = $1")
            .bind(list.id)
            .fetch_one(&mut *tx)
            .await?;

    tx.commit().await?;

    Ok(Json(ListSummary {
        id: list.id,
        name: list.name,
        album_count,
        created_at: list.created_at,
        updated_at: list.updated_at,
    }))
}

fn import_name(base: &str, attempt: u32) -> String {
    if attempt == 0 {
        base.to_string()
    } else {
        format!("{} ({})", base, attempt + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn permutation_accepts_any_order_of_the_same_set() {
        let current = ids(3);
        let mut reversed = current.clone();
        reversed.reverse();
        assert!(is_permutation(&current, &reversed));
        assert!(is_permutation(&[], &[]));
    }

    #[test]
    fn permutation_rejects_missing_extra_or_repeated_albums() {
        let current = ids(3);

        let missing = &current[..2];
        assert!(!is_permutation(&current, missing));

        let mut extra = current.clone();
        extra.push(Uuid::new_v4());
        assert!(!is_permutation(&current, &extra));

        let mut repeated = current.clone();
        repeated[2] = repeated[0];
        assert!(!is_permutation(&current, &repeated));

        let mut swapped_out = current.clone();
        swapped_out[0] = Uuid::new_v4();
        assert!(!is_permutation(&current, &swapped_out));
    }

    #[test]
    fn import_names_suffix_after_the_first_attempt() {
        assert_eq!(import_name("AOTY 2024", 0), "AOTY 2024");
        assert_eq!(import_name("AOTY 2024", 1), "AOTY 2024 (2)");
        assert_eq!(import_name("AOTY 2024", 7), "AOTY 2024 (8)");
    }
}
