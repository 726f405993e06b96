use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One album inside a duplicate group, with how widely it is referenced.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DuplicateAlbum {
    pub id: Uuid,
    pub artist: String,
    pub title: String,
    pub release_date: Option<NaiveDate>,
    pub list_count: i64,
    pub pick_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub albums: Vec<DuplicateAlbum>,
}

/// Progress update for the admin duplicate scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step")]
pub enum ScanProgress {
    #[serde(rename = "started")]
    Started {
        total_albums: usize,
        threshold: f64,
        message: String,
    },
    #[serde(rename = "comparing")]
    Comparing {
        current: usize,
        total: usize,
        message: String,
    },
    #[serde(rename = "completed")]
    Completed {
        groups: Vec<DuplicateGroup>,
        message: String,
    },
    #[serde(rename = "error")]
    Error { message: String },
}

#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    pub canonical_id: Uuid,
    pub duplicate_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct MergeResult {
    pub items_moved: u64,
    pub picks_moved: u64,
    pub albums_deleted: u64,
}
