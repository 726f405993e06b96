use redis::aio::ConnectionManager;
use redis::AsyncCommands;

/// Thin wrapper over the Redis connection manager. The service stays up
/// without Redis; every lookup is then a miss.
#[derive(Clone)]
pub struct Cache {
    conn: Option<ConnectionManager>,
}

impl Cache {
    pub async fn connect(redis_url: &str) -> Self {
        let conn = match redis::Client::open(redis_url) {
            Ok(client) => match ConnectionManager::new(client).await {
                Ok(conn) => {
                    tracing::info!("Connected to Redis");
                    Some(conn)
                }
                Err(e) => {
                    tracing::warn!("Redis unavailable, caching disabled: {}", e);
                    None
                }
            },
            Err(e) => {
                tracing::warn!("Invalid Redis URL, caching disabled: {}", e);
                None
            }
        };

        Self { conn }
    }

    pub fn disabled() -> Self {
        Self { conn: None }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let mut conn = self.conn.clone()?;
        match conn.get::<_, Option<String>>(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!("Cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    pub async fn set_ex(&self, key: &str, value: &str, ttl_secs: usize) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };
        if let Err(e) = conn.set_ex::<_, _, ()>(key, value, ttl_secs as u64).await {
            tracing::debug!("Cache write failed for {}: {}", key, e);
        }
    }
}
