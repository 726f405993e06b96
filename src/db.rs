use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::future::Future;
use std::time::Duration;

const MAX_ATTEMPTS: u32 = 5;
const BASE_DELAY_MS: u64 = 100;
const MAX_DELAY_MS: u64 = 2_000;

/// Postgres SQLSTATE codes worth retrying: serialization failures,
/// deadlocks, connection exceptions and temporary resource exhaustion.
const RETRYABLE_SQLSTATES: &[&str] = &[
    "40001", // serialization_failure
    "40P01", // deadlock_detected
    "53300", // too_many_connections
    "57P03", // cannot_connect_now
    "08000", // connection_exception
    "08003", // connection_does_not_exist
    "08006", // connection_failure
    "08001", // sqlclient_unable_to_establish_sqlconnection
    "08004", // sqlserver_rejected_establishment_of_sqlconnection
];

/// Run a database operation, retrying transient failures with exponential
/// backoff. Non-retryable errors propagate on the first attempt.
pub async fn with_retry<T, F, Fut>(mut op: F) -> Result<T, sqlx::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 < MAX_ATTEMPTS && is_retryable(&e) => {
                let delay = backoff_delay(attempt);
                tracing::warn!(
                    "Retryable database error (attempt {}/{}), retrying in {:?}: {}",
                    attempt + 1,
                    MAX_ATTEMPTS,
                    delay,
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Connect a pool, retrying while the database comes up.
pub async fn connect_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    with_retry(|| {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
    })
    .await
}

/// Rewrite a list's positions to a contiguous 1..n sequence, preserving the
/// current order (position, then insertion time for duplicates of a gap).
pub async fn renumber_list<'e, E>(executor: E, list_id: uuid::Uuid) -> Result<(), sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r#"
        WITH ranked AS (
            SELECT id, ROW_NUMBER() OVER (ORDER BY position, added_at) AS rn
            FROM list_items
            WHERE list_id = $1
        )
        UPDATE list_items SET position = ranked.rn::int
        FROM ranked
        WHERE list_items.id = ranked.id
        "#,
    )
    .bind(list_id)
    .execute(executor)
    .await?;
    Ok(())
}

pub fn is_retryable(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db) => db
            .code()
            .map(|code| is_retryable_sqlstate(&code))
            .unwrap_or(false),
        _ => false,
    }
}

fn is_retryable_sqlstate(code: &str) -> bool {
    RETRYABLE_SQLSTATES.contains(&code)
}

fn backoff_delay(attempt: u32) -> Duration {
    let ms = BASE_DELAY_MS.saturating_mul(1 << attempt.min(16));
    Duration::from_millis(ms.min(MAX_DELAY_MS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn retryable_sqlstates_match_the_enumerated_set() {
        assert!(is_retryable_sqlstate("40001"));
        assert!(is_retryable_sqlstate("40P01"));
        assert!(is_retryable_sqlstate("08006"));
        assert!(!is_retryable_sqlstate("23505")); // unique_violation
        assert!(!is_retryable_sqlstate("42601")); // syntax_error
    }

    #[test]
    fn io_and_pool_timeout_are_retryable() {
        let io = sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        ));
        assert!(is_retryable(&io));
        assert!(is_retryable(&sqlx::Error::PoolTimedOut));
        assert!(!is_retryable(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn backoff_doubles_and_caps_at_two_seconds() {
        assert_eq!(backoff_delay(0), Duration::from_millis(100));
        assert_eq!(backoff_delay(1), Duration::from_millis(200));
        assert_eq!(backoff_delay(2), Duration::from_millis(400));
        assert_eq!(backoff_delay(4), Duration::from_millis(1_600));
        assert_eq!(backoff_delay(5), Duration::from_millis(2_000));
        assert_eq!(backoff_delay(12), Duration::from_millis(2_000));
    }

    #[tokio::test]
    async fn non_retryable_errors_fail_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(sqlx::Error::RowNotFound) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retryable_errors_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(sqlx::Error::PoolTimedOut)
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
