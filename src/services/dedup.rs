use crate::db;
use crate::error::{AppError, Result};
use crate::models::{DuplicateAlbum, DuplicateGroup, MergeRequest, MergeResult, ScanProgress};
use sqlx::PgPool;
use std::collections::HashMap;
use strsim::normalized_levenshtein;
use tokio::sync::mpsc;
use uuid::Uuid;

pub const DEFAULT_THRESHOLD: f64 = 0.85;

/// Progress is reported once per this many processed albums.
const PROGRESS_EVERY: usize = 250;

/// Trailing parenthetical/bracketed segments carrying one of these words are
/// reissue noise, not part of the title.
const EDITION_MARKERS: &[&str] = &[
    "deluxe",
    "remaster",
    "remastered",
    "edition",
    "reissue",
    "bonus",
    "anniversary",
    "expanded",
    "mono",
    "stereo",
    "demo",
];

/// Finds near-duplicate album rows and merges them.
pub struct DuplicateScanner {
    db: PgPool,
}

impl DuplicateScanner {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Scan all albums, streaming progress events, and return the duplicate
    /// groups found.
    pub async fn scan(
        &self,
        threshold: f64,
        progress_tx: mpsc::Sender<ScanProgress>,
    ) -> Result<Vec<DuplicateGroup>> {
        let threshold = clamp_threshold(threshold);

        let albums = db::with_retry(|| {
            sqlx::query_as::<_, DuplicateAlbum>(
                r#"
                SELECT a.id, a.artist, a.title, a.release_date,
                       COUNT(DISTINCT li.id) AS list_count,
                       COUNT(DISTINCT tp.id) AS pick_count
                FROM albums a
                LEFT JOIN list_items li ON li.album_id = a.id
                LEFT JOIN track_picks tp ON tp.album_id = a.id
                GROUP BY a.id
                ORDER BY LOWER(a.artist), LOWER(a.title)
                "#,
            )
            .fetch_all(&self.db)
        })
        .await?;

        let _ = progress_tx
            .send(ScanProgress::Started {
                total_albums: albums.len(),
                threshold,
                message: format!("Scanning {} albums for duplicates", albums.len()),
            })
            .await;

        let keys: Vec<(String, String)> = albums
            .iter()
            .map(|a| (normalize_artist(&a.artist), normalize_title(&a.title)))
            .collect();

        let total = albums.len();
        let groups = group_indices(&keys, threshold, |done| {
            if done % PROGRESS_EVERY == 0 {
                let tx = progress_tx.clone();
                let message = format!("Compared {} of {} albums", done, total);
                tokio::spawn(async move {
                    let _ = tx
                        .send(ScanProgress::Comparing {
                            current: done,
                            total,
                            message,
                        })
                        .await;
                });
            }
        });

        let groups: Vec<DuplicateGroup> = groups
            .into_iter()
            .map(|indices| DuplicateGroup {
                albums: indices.into_iter().map(|i| albums[i].clone()).collect(),
            })
            .collect();

        let _ = progress_tx
            .send(ScanProgress::Completed {
                message: format!("Found {} duplicate groups", groups.len()),
                groups: groups.clone(),
            })
            .await;

        Ok(groups)
    }

    /// Fold duplicate albums into a canonical one: list items and track
    /// picks move over (except where the target list/user already holds the
    /// canonical album), missing canonical metadata is backfilled, and the
    /// duplicates are deleted. Runs in one transaction.
    pub async fn merge(&self, req: &MergeRequest) -> Result<MergeResult> {
        if req.duplicate_ids.is_empty() {
            return Err(AppError::Validation("No duplicate ids given".to_string()));
        }
        if req.duplicate_ids.contains(&req.canonical_id) {
            return Err(AppError::Validation(
                "Canonical album cannot be one of the duplicates".to_string(),
            ));
        }

        let mut duplicate_ids = req.duplicate_ids.clone();
        duplicate_ids.sort();
        duplicate_ids.dedup();

        let mut tx = self.db.begin().await?;

        let canonical_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM albums WHERE id = $1)")
                .bind(req.canonical_id)
                .fetch_one(&mut *tx)
                .await?;
        if !canonical_exists {
            return Err(AppError::NotFound("Canonical album not found".to_string()));
        }

        // Lists that will need their positions compacted afterwards
        let affected_lists: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT DISTINCT list_id FROM list_items WHERE album_id = ANY($1)",
        )
        .bind(&duplicate_ids)
        .fetch_all(&mut *tx)
        .await?;

        let mut result = MergeResult {
            items_moved: 0,
            picks_moved: 0,
            albums_deleted: 0,
        };

        for dup_id in &duplicate_ids {
            result.items_moved += sqlx::query(
                r#"
                UPDATE list_items SET album_id = $1
                WHERE album_id = $2
                  AND list_id NOT IN (SELECT list_id FROM list_items WHERE album_id = $1)
                "#,
            )
            .bind(req.canonical_id)
            .bind(dup_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            // Items left behind would collide with the canonical entry
            sqlx::query("DELETE FROM list_items WHERE album_id = $1")
                .bind(dup_id)
                .execute(&mut *tx)
                .await?;

            result.picks_moved += sqlx::query(
                r#"
                UPDATE track_picks SET album_id = $1
                WHERE album_id = $2
                  AND user_id NOT IN (SELECT user_id FROM track_picks WHERE album_id = $1)
                "#,
            )
            .bind(req.canonical_id)
            .bind(dup_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            sqlx::query("DELETE FROM track_picks WHERE album_id = $1")
                .bind(dup_id)
                .execute(&mut *tx)
                .await?;

            // Backfill metadata the canonical row is missing
            sqlx::query(
                r#"
                UPDATE albums c SET
                    release_date = COALESCE(c.release_date, d.release_date),
                    country = COALESCE(c.country, d.country),
                    cover_url = COALESCE(c.cover_url, d.cover_url),
                    genres = CASE WHEN c.genres = '[]'::jsonb THEN d.genres ELSE c.genres END
                FROM albums d
                WHERE c.id = $1 AND d.id = $2
                "#,
            )
            .bind(req.canonical_id)
            .bind(dup_id)
            .execute(&mut *tx)
            .await?;

            result.albums_deleted += sqlx::query("DELETE FROM albums WHERE id = $1")
                .bind(dup_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        for (list_id,) in affected_lists {
            db::renumber_list(&mut *tx, list_id).await?;
        }

        tx.commit().await?;

        tracing::info!(
            "Merged {} albums into {} ({} items, {} picks moved)",
            result.albums_deleted,
            req.canonical_id,
            result.items_moved,
            result.picks_moved
        );

        Ok(result)
    }
}

pub fn clamp_threshold(threshold: f64) -> f64 {
    if threshold.is_finite() {
        threshold.clamp(0.5, 1.0)
    } else {
        DEFAULT_THRESHOLD
    }
}

/// Group album indices whose normalized artists match exactly and whose
/// normalized titles are within the similarity threshold. Returns only
/// groups of two or more.
pub fn group_indices<F>(
    keys: &[(String, String)],
    threshold: f64,
    mut on_progress: F,
) -> Vec<Vec<usize>>
where
    F: FnMut(usize),
{
    let mut buckets: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, (artist, _)) in keys.iter().enumerate() {
        buckets.entry(artist.as_str()).or_default().push(i);
    }

    let mut dsu = Dsu::new(keys.len());
    let mut processed = 0;

    for indices in buckets.values() {
        for (a_pos, &a) in indices.iter().enumerate() {
            for &b in &indices[a_pos + 1..] {
                let (_, title_a) = &keys[a];
                let (_, title_b) = &keys[b];
                if title_a == title_b || normalized_levenshtein(title_a, title_b) >= threshold {
                    dsu.union(a, b);
                }
            }
            processed += 1;
            on_progress(processed);
        }
    }

    let mut grouped: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..keys.len() {
        grouped.entry(dsu.find(i)).or_default().push(i);
    }

    let mut groups: Vec<Vec<usize>> = grouped
        .into_values()
        .filter(|members| members.len() >= 2)
        .collect();
    for group in &mut groups {
        group.sort();
    }
    groups.sort();
    groups
}

/// Lowercase, strip punctuation, collapse whitespace, drop a leading "the".
pub fn normalize_artist(raw: &str) -> String {
    let normalized = normalize_text(raw);
    match normalized.strip_prefix("the ") {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => normalized,
    }
}

/// Like artist normalization, after shedding reissue suffixes such as
/// "(Deluxe Edition)" or "[2011 Remaster]".
pub fn normalize_title(raw: &str) -> String {
    normalize_text(strip_edition_suffix(raw))
}

fn normalize_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.ends_with(' ') {
            out.push(' ');
        }
    }
    out.trim().to_string()
}

fn strip_edition_suffix(raw: &str) -> &str {
    let trimmed = raw.trim_end();
    for (open, close) in [('(', ')'), ('[', ']')] {
        if trimmed.ends_with(close) {
            if let Some(start) = trimmed.rfind(open) {
                let inner = &trimmed[start + 1..trimmed.len() - 1];
                let inner_lower = inner.to_lowercase();
                if EDITION_MARKERS.iter().any(|m| inner_lower.contains(m)) {
                    return trimmed[..start].trim_end();
                }
            }
        }
    }
    trimmed
}

/// Union-find over album indices.
struct Dsu {
    parent: Vec<usize>,
}

impl Dsu {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, i: usize) -> usize {
        if self.parent[i] != i {
            let root = self.find(self.parent[i]);
            self.parent[i] = root;
        }
        self.parent[i]
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(artist, title)| (normalize_artist(artist), normalize_title(title)))
            .collect()
    }

    #[test]
    fn normalization_strips_case_punctuation_and_articles() {
        assert_eq!(normalize_artist("The Cure"), "cure");
        assert_eq!(normalize_artist("Motörhead"), "motörhead");
        assert_eq!(normalize_artist("  AC/DC "), "ac dc");
        assert_eq!(normalize_artist("The"), "the");
    }

    #[test]
    fn edition_suffixes_are_stripped_from_titles() {
        assert_eq!(
            normalize_title("Blackwater Park (Deluxe Edition)"),
            "blackwater park"
        );
        assert_eq!(
            normalize_title("Paranoid [2011 Remaster]"),
            "paranoid"
        );
        // A parenthetical that is part of the title stays
        assert_eq!(
            normalize_title("Damnation (And a Day)"),
            "damnation and a day"
        );
    }

    #[test]
    fn exact_normalized_matches_always_group() {
        let keys = keys(&[
            ("The Cure", "Disintegration"),
            ("Cure", "disintegration!"),
            ("Slowdive", "Souvlaki"),
        ]);
        let groups = group_indices(&keys, 1.0, |_| {});
        assert_eq!(groups, vec![vec![0, 1]]);
    }

    #[test]
    fn near_matches_group_above_the_threshold_only() {
        let keys = keys(&[
            ("Opeth", "Blackwater Park"),
            ("Opeth", "Blackwater Parc"),
            ("Opeth", "Ghost Reveries"),
        ]);

        let strict = group_indices(&keys, 0.99, |_| {});
        assert!(strict.is_empty());

        let relaxed = group_indices(&keys, 0.85, |_| {});
        assert_eq!(relaxed, vec![vec![0, 1]]);
    }

    #[test]
    fn different_artists_never_group() {
        let keys = keys(&[("Low", "Ones and Sixes"), ("Lowly", "Ones and Sixes")]);
        assert!(group_indices(&keys, 0.5, |_| {}).is_empty());
    }

    #[test]
    fn transitive_matches_collapse_into_one_group() {
        let keys = keys(&[
            ("Boris", "Heavy Rocks"),
            ("Boris", "Heavy Rockss"),
            ("Boris", "Heavy Rocksss"),
        ]);
        let groups = group_indices(&keys, 0.85, |_| {});
        assert_eq!(groups, vec![vec![0, 1, 2]]);
    }

    #[test]
    fn scans_of_fewer_than_two_albums_find_nothing() {
        assert!(group_indices(&[], 0.85, |_| {}).is_empty());
        let one = keys(&[("Nick Drake", "Pink Moon")]);
        assert!(group_indices(&one, 0.85, |_| {}).is_empty());
    }

    #[test]
    fn thresholds_are_clamped_into_range() {
        assert_eq!(clamp_threshold(0.1), 0.5);
        assert_eq!(clamp_threshold(2.0), 1.0);
        assert_eq!(clamp_threshold(0.9), 0.9);
        assert_eq!(clamp_threshold(f64::NAN), DEFAULT_THRESHOLD);
    }
}
