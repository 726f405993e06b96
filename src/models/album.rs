use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Album {
    pub id: Uuid,
    pub artist: String,
    pub title: String,
    pub release_date: Option<NaiveDate>,
    pub country: Option<String>,
    #[sqlx(json)]
    pub genres: Vec<String>,
    pub cover_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Album metadata as submitted by clients (web UI or browser extension).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AlbumPayload {
    #[validate(length(min = 1, max = 255))]
    pub artist: String,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub release_date: Option<NaiveDate>,
    #[validate(length(max = 64))]
    pub country: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[validate(url)]
    pub cover_url: Option<String>,
}
