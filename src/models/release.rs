use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WeeklyRelease {
    pub id: Uuid,
    pub artist: String,
    pub title: String,
    pub release_date: Option<NaiveDate>,
    pub spotify_id: String,
    pub cover_url: Option<String>,
    pub fetched_at: DateTime<Utc>,
}
