use crate::models::Album;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct List {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ListSummary {
    pub id: Uuid,
    pub name: String,
    pub album_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One ranked entry of a list, with the album and the caller's track pick.
#[derive(Debug, Clone, Serialize)]
pub struct ListEntry {
    pub position: i32,
    pub album: Album,
    pub comment: Option<String>,
    pub track_pick: Option<String>,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListDetail {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<ListEntry>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateListRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RenameListRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub album_ids: Vec<Uuid>,
}

/// Portable list document used by export and import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListExport {
    pub name: String,
    pub exported_at: DateTime<Utc>,
    pub albums: Vec<ExportedAlbum>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedAlbum {
    pub artist: String,
    pub title: String,
    #[serde(default)]
    pub release_date: Option<NaiveDate>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub track_pick: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_documents_tolerate_missing_optional_fields() {
        let doc: ListExport = serde_json::from_str(
            r#"{
                "name": "AOTY 2024",
                "exported_at": "2024-12-31T00:00:00Z",
                "albums": [
                    {"artist": "Oranssi Pazuzu", "title": "Muuntautuja"},
                    {
                        "artist": "Blood Incantation",
                        "title": "Absolute Elsewhere",
                        "release_date": "2024-10-04",
                        "genres": ["Death Metal"],
                        "track_pick": "The Stargate [Tablet I]"
                    }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(doc.albums.len(), 2);
        assert!(doc.albums[0].release_date.is_none());
        assert!(doc.albums[0].genres.is_empty());
        assert_eq!(
            doc.albums[1].track_pick.as_deref(),
            Some("The Stargate [Tablet I]")
        );
    }

    #[test]
    fn export_round_trips_through_json() {
        let doc = ListExport {
            name: "Best of Doom".to_string(),
            exported_at: Utc::now(),
            albums: vec![ExportedAlbum {
                artist: "Ahab".to_string(),
                title: "The Call of the Wretched Sea".to_string(),
                release_date: None,
                country: Some("Germany".to_string()),
                genres: vec!["Funeral Doom".to_string()],
                cover_url: None,
                comment: Some("slow".to_string()),
                track_pick: None,
            }],
        };

        let parsed: ListExport =
            serde_json::from_str(&serde_json::to_string(&doc).unwrap()).unwrap();
        assert_eq!(parsed.name, doc.name);
        assert_eq!(parsed.albums[0].country.as_deref(), Some("Germany"));
    }
}
