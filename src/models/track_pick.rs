use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// A user's highlighted track for an album. One per (user, album).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrackPick {
    pub id: Uuid,
    pub user_id: Uuid,
    pub album_id: Uuid,
    pub track_title: String,
    pub picked_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetPickRequest {
    #[validate(length(min = 1, max = 255))]
    pub track_title: String,
}
