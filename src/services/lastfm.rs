use crate::error::{AppError, Result};
use crate::services::cache::Cache;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const API_ROOT: &str = "https://ws.audioscrobbler.com/2.0/";
const ALBUM_INFO_TTL_SECS: usize = 24 * 60 * 60;

#[derive(Clone)]
pub struct LastfmClient {
    api_key: Option<String>,
    client: Client,
    cache: Cache,
}

/// Album detail assembled from Last.fm `album.getinfo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumInfo {
    pub artist: String,
    pub title: String,
    pub tags: Vec<String>,
    pub tracks: Vec<String>,
    pub cover_url: Option<String>,
    pub summary: Option<String>,
}

/// Last.fm renders single-element collections as a bare object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

#[derive(Debug, Deserialize)]
struct AlbumInfoResponse {
    album: Option<LastfmAlbum>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LastfmAlbum {
    name: String,
    artist: String,
    #[serde(default)]
    tags: Option<LastfmTags>,
    #[serde(default)]
    tracks: Option<LastfmTracks>,
    #[serde(default)]
    image: Vec<LastfmImage>,
    #[serde(default)]
    wiki: Option<LastfmWiki>,
}

#[derive(Debug, Deserialize)]
struct LastfmTags {
    #[serde(default)]
    tag: OneOrMany<LastfmTag>,
}

#[derive(Debug, Deserialize)]
struct LastfmTag {
    name: String,
}

#[derive(Debug, Deserialize)]
struct LastfmTracks {
    #[serde(default)]
    track: OneOrMany<LastfmTrack>,
}

#[derive(Debug, Deserialize)]
struct LastfmTrack {
    name: String,
}

#[derive(Debug, Deserialize)]
struct LastfmImage {
    #[serde(rename = "#text")]
    url: String,
}

#[derive(Debug, Deserialize)]
struct LastfmWiki {
    summary: String,
}

impl LastfmClient {
    pub fn new(api_key: Option<String>, cache: Cache) -> Self {
        Self {
            api_key,
            client: Client::new(),
            cache,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn album_info(&self, artist: &str, title: &str) -> Result<AlbumInfo> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::ExternalApi("Last.fm is not configured".to_string()))?;

        let cache_key = format!(
            "lastfm:album:{}|{}",
            artist.to_lowercase(),
            title.to_lowercase()
        );
        if let Some(cached) = self.cache.get(&cache_key).await {
            if let Ok(info) = serde_json::from_str(&cached) {
                return Ok(info);
            }
        }

        let response = self
            .client
            .get(API_ROOT)
            .query(&[
                ("method", "album.getinfo"),
                ("api_key", api_key),
                ("artist", artist),
                ("album", title),
                ("autocorrect", "1"),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|e| AppError::ExternalApi(format!("Last.fm request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::ExternalApi(format!(
                "Last.fm returned status {}",
                status
            )));
        }

        let body: AlbumInfoResponse = response
            .json()
            .await
            .map_err(|e| AppError::ExternalApi(format!("Last.fm response unreadable: {}", e)))?;

        let album = body.album.ok_or_else(|| {
            AppError::NotFound(
                body.message
                    .unwrap_or_else(|| "Album not found on Last.fm".to_string()),
            )
        })?;

        let info = AlbumInfo::from(album);

        if let Ok(serialized) = serde_json::to_string(&info) {
            self.cache
                .set_ex(&cache_key, &serialized, ALBUM_INFO_TTL_SECS)
                .await;
        }

        Ok(info)
    }
}

impl From<LastfmAlbum> for AlbumInfo {
    fn from(album: LastfmAlbum) -> Self {
        let tags = album
            .tags
            .map(|t| t.tag.into_vec())
            .unwrap_or_default()
            .into_iter()
            .map(|t| t.name)
            .collect();

        let tracks = album
            .tracks
            .map(|t| t.track.into_vec())
            .unwrap_or_default()
            .into_iter()
            .map(|t| t.name)
            .collect();

        // Images come smallest first; prefer the largest available
        let cover_url = album
            .image
            .iter()
            .rev()
            .find(|img| !img.url.is_empty())
            .map(|img| img.url.clone());

        AlbumInfo {
            artist: album.artist,
            title: album.name,
            tags,
            tracks,
            cover_url,
            summary: album.wiki.map(|w| w.summary),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_album_info_with_track_array() {
        let body: AlbumInfoResponse = serde_json::from_str(
            r##"{
                "album": {
                    "name": "Blackwater Park",
                    "artist": "Opeth",
                    "tags": {"tag": [{"name": "progressive death metal"}, {"name": "2001"}]},
                    "tracks": {"track": [{"name": "The Leper Affinity"}, {"name": "Bleak"}]},
                    "image": [
                        {"#text": "https://img/s.png", "size": "small"},
                        {"#text": "https://img/xl.png", "size": "extralarge"}
                    ],
                    "wiki": {"summary": "Fifth studio album."}
                }
            }"##,
        )
        .unwrap();

        let info = AlbumInfo::from(body.album.unwrap());
        assert_eq!(info.title, "Blackwater Park");
        assert_eq!(info.tags, vec!["progressive death metal", "2001"]);
        assert_eq!(info.tracks.len(), 2);
        assert_eq!(info.cover_url.as_deref(), Some("https://img/xl.png"));
    }

    #[test]
    fn parses_single_track_rendered_as_object() {
        let body: AlbumInfoResponse = serde_json::from_str(
            r#"{
                "album": {
                    "name": "Single",
                    "artist": "Somebody",
                    "tracks": {"track": {"name": "Only Song"}}
                }
            }"#,
        )
        .unwrap();

        let info = AlbumInfo::from(body.album.unwrap());
        assert_eq!(info.tracks, vec!["Only Song"]);
        assert!(info.tags.is_empty());
        assert!(info.cover_url.is_none());
    }

    #[test]
    fn missing_album_surfaces_the_api_message() {
        let body: AlbumInfoResponse =
            serde_json::from_str(r#"{"message": "Album not found", "error": 6}"#).unwrap();
        assert!(body.album.is_none());
        assert_eq!(body.message.as_deref(), Some("Album not found"));
    }
}
