use crate::error::{AppError, Result};
use crate::services::cache::Cache;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_ROOT: &str = "https://api.spotify.com/v1";
const SEARCH_TTL_SECS: usize = 60 * 60;
const TOKEN_CACHE_KEY: &str = "spotify:token";
const NEW_RELEASES_PAGE_SIZE: usize = 50;

#[derive(Clone)]
pub struct SpotifyClient {
    client_id: Option<String>,
    client_secret: Option<String>,
    client: Client,
    cache: Cache,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumSearchResult {
    pub spotify_id: String,
    pub artist: String,
    pub title: String,
    pub release_date: Option<NaiveDate>,
    pub cover_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    albums: AlbumPage,
}

#[derive(Debug, Deserialize)]
struct AlbumPage {
    #[serde(default)]
    items: Vec<SpotifyAlbum>,
}

#[derive(Debug, Deserialize)]
struct SpotifyAlbum {
    id: String,
    name: String,
    #[serde(default)]
    artists: Vec<SpotifyArtist>,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    images: Vec<SpotifyImage>,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpotifyImage {
    url: String,
}

impl SpotifyClient {
    pub fn new(client_id: Option<String>, client_secret: Option<String>, cache: Cache) -> Self {
        Self {
            client_id,
            client_secret,
            client: Client::new(),
            cache,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }

    /// Client-credentials access token, cached until shortly before expiry.
    async fn access_token(&self) -> Result<String> {
        if let Some(token) = self.cache.get(TOKEN_CACHE_KEY).await {
            return Ok(token);
        }

        let (id, secret) = match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => (id, secret),
            _ => {
                return Err(AppError::ExternalApi(
                    "Spotify is not configured".to_string(),
                ))
            }
        };

        let response = self
            .client
            .post(TOKEN_URL)
            .basic_auth(id, Some(secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| AppError::ExternalApi(format!("Spotify token request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalApi(format!(
                "Spotify token endpoint returned status {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::ExternalApi(format!("Spotify token unreadable: {}", e)))?;

        let ttl = token.expires_in.saturating_sub(60) as usize;
        self.cache
            .set_ex(TOKEN_CACHE_KEY, &token.access_token, ttl.max(60))
            .await;

        Ok(token.access_token)
    }

    pub async fn search_albums(&self, query: &str, limit: usize) -> Result<Vec<AlbumSearchResult>> {
        let limit = limit.clamp(1, 50);
        let cache_key = format!(
            "spotify:search:{:x}:{}",
            md5::compute(query.to_lowercase()),
            limit
        );
        if let Some(cached) = self.cache.get(&cache_key).await {
            if let Ok(results) = serde_json::from_str(&cached) {
                return Ok(results);
            }
        }

        let token = self.access_token().await?;
        let limit_param = limit.to_string();
        let response = self
            .client
            .get(format!("{}/search", API_ROOT))
            .bearer_auth(&token)
            .query(&[
                ("type", "album"),
                ("q", query),
                ("limit", limit_param.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::ExternalApi(format!("Spotify search failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalApi(format!(
                "Spotify search returned status {}",
                response.status()
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::ExternalApi(format!("Spotify response unreadable: {}", e)))?;

        let results: Vec<AlbumSearchResult> =
            body.albums.items.into_iter().map(Into::into).collect();

        if let Ok(serialized) = serde_json::to_string(&results) {
            self.cache
                .set_ex(&cache_key, &serialized, SEARCH_TTL_SECS)
                .await;
        }

        Ok(results)
    }

    /// Newest album releases, paged through until `max_results` or the feed
    /// runs dry.
    pub async fn new_releases(&self, max_results: usize) -> Result<Vec<AlbumSearchResult>> {
        let token = self.access_token().await?;
        let mut results = Vec::new();
        let mut offset = 0;

        while results.len() < max_results {
            let response = self
                .client
                .get(format!("{}/browse/new-releases", API_ROOT))
                .bearer_auth(&token)
                .query(&[
                    ("limit", NEW_RELEASES_PAGE_SIZE.to_string()),
                    ("offset", offset.to_string()),
                ])
                .send()
                .await
                .map_err(|e| {
                    AppError::ExternalApi(format!("Spotify new releases failed: {}", e))
                })?;

            if !response.status().is_success() {
                return Err(AppError::ExternalApi(format!(
                    "Spotify new releases returned status {}",
                    response.status()
                )));
            }

            let body: SearchResponse = response.json().await.map_err(|e| {
                AppError::ExternalApi(format!("Spotify response unreadable: {}", e))
            })?;

            let page_len = body.albums.items.len();
            results.extend(body.albums.items.into_iter().map(AlbumSearchResult::from));

            if page_len < NEW_RELEASES_PAGE_SIZE {
                break;
            }
            offset += NEW_RELEASES_PAGE_SIZE;
        }

        results.truncate(max_results);
        Ok(results)
    }
}

impl From<SpotifyAlbum> for AlbumSearchResult {
    fn from(album: SpotifyAlbum) -> Self {
        // Spotify orders images largest first
        let cover_url = album.images.first().map(|img| img.url.clone());
        let artist = album
            .artists
            .first()
            .map(|a| a.name.clone())
            .unwrap_or_else(|| "Unknown Artist".to_string());

        AlbumSearchResult {
            spotify_id: album.id,
            artist,
            title: album.name,
            release_date: album.release_date.as_deref().and_then(parse_release_date),
            cover_url,
        }
    }
}

/// Spotify reports `release_date` at year, month or day precision.
fn parse_release_date(raw: &str) -> Option<NaiveDate> {
    match raw.len() {
        4 => NaiveDate::from_ymd_opt(raw.parse().ok()?, 1, 1),
        7 => NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d").ok(),
        _ => NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_dates_parse_at_every_precision() {
        assert_eq!(
            parse_release_date("2024"),
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
        assert_eq!(
            parse_release_date("2024-03"),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
        assert_eq!(
            parse_release_date("2024-03-15"),
            NaiveDate::from_ymd_opt(2024, 3, 15)
        );
        assert_eq!(parse_release_date("not a date"), None);
    }

    #[test]
    fn search_items_map_to_results() {
        let body: SearchResponse = serde_json::from_str(
            r#"{
                "albums": {
                    "items": [{
                        "id": "4E6Vyqcge5RxOiQsKYYAPz",
                        "name": "Muuntautuja",
                        "artists": [{"name": "Oranssi Pazuzu"}],
                        "release_date": "2024-10-11",
                        "images": [
                            {"url": "https://img/640.jpg"},
                            {"url": "https://img/300.jpg"}
                        ]
                    }]
                }
            }"#,
        )
        .unwrap();

        let result = AlbumSearchResult::from(body.albums.items.into_iter().next().unwrap());
        assert_eq!(result.artist, "Oranssi Pazuzu");
        assert_eq!(result.cover_url.as_deref(), Some("https://img/640.jpg"));
        assert_eq!(
            result.release_date,
            NaiveDate::from_ymd_opt(2024, 10, 11)
        );
    }
}
