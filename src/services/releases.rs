use crate::db;
use crate::error::{AppError, Result};
use crate::services::dedup::normalize_artist;
use crate::services::spotify::SpotifyClient;
use sqlx::PgPool;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// How many entries of the Spotify new-release feed to consider per refresh.
const FEED_DEPTH: usize = 200;

/// Rows older than this are pruned on every refresh.
const RETENTION_DAYS: i32 = 30;

/// Keeps `weekly_new_releases` current with albums by artists that appear in
/// anyone's lists.
pub struct ReleaseTracker {
    db: PgPool,
    spotify: Arc<SpotifyClient>,
}

impl ReleaseTracker {
    pub fn new(db: PgPool, spotify: Arc<SpotifyClient>) -> Self {
        Self { db, spotify }
    }

    /// One refresh pass. Returns how many releases matched a listed artist.
    pub async fn refresh(&self) -> Result<usize> {
        if !self.spotify.is_configured() {
            return Err(AppError::ExternalApi(
                "Spotify is not configured".to_string(),
            ));
        }

        let artists: Vec<(String,)> = db::with_retry(|| {
            sqlx::query_as(
                r#"
                SELECT DISTINCT a.artist
                FROM albums a
                JOIN list_items li ON li.album_id = a.id
                "#,
            )
            .fetch_all(&self.db)
        })
        .await?;

        let listed: HashSet<String> = artists
            .into_iter()
            .map(|(artist,)| normalize_artist(&artist))
            .collect();

        if listed.is_empty() {
            tracing::debug!("No listed artists, skipping new-release refresh");
            return Ok(0);
        }

        let feed = self.spotify.new_releases(FEED_DEPTH).await?;
        let mut matched = 0;

        for release in feed {
            if !listed.contains(&normalize_artist(&release.artist)) {
                continue;
            }

            db::with_retry(|| {
                sqlx::query(
                    r#"
                    INSERT INTO weekly_new_releases
                        (artist, title, release_date, spotify_id, cover_url)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (spotify_id) DO UPDATE SET fetched_at = NOW()
                    "#,
                )
                .bind(&release.artist)
                .bind(&release.title)
                .bind(release.release_date)
                .bind(&release.spotify_id)
                .bind(&release.cover_url)
                .execute(&self.db)
            })
            .await?;
            matched += 1;
        }

        let pruned = db::with_retry(|| {
            sqlx::query(
                "DELETE FROM weekly_new_releases WHERE fetched_at < NOW() - ($1 || ' days')::interval",
            )
            .bind(RETENTION_DAYS.to_string())
            .execute(&self.db)
        })
        .await?
        .rows_affected();

        tracing::info!(
            "New-release refresh: {} matched, {} stale rows pruned",
            matched,
            pruned
        );

        Ok(matched)
    }

    /// Background loop: refresh on startup, then every `interval_hours`.
    pub fn spawn_periodic(self: Arc<Self>, interval_hours: u64) {
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_secs(interval_hours * 60 * 60));
            loop {
                ticker.tick().await;
                if !self.spotify.is_configured() {
                    continue;
                }
                match self.refresh().await {
                    Ok(count) => {
                        tracing::debug!("Periodic new-release refresh stored {} rows", count)
                    }
                    Err(e) => tracing::error!("Periodic new-release refresh failed: {:?}", e),
                }
            }
        });
    }
}
