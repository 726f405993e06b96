use crate::error::{AppError, Result};
use crate::models::{ExtensionToken, IssuedToken, TokenInfo};
use chrono::{Duration, Utc};
use rand::RngCore;
use sqlx::PgPool;
use uuid::Uuid;

/// Issues and checks the bearer credentials used by the browser extension.
pub struct ExtensionTokenService {
    db: PgPool,
    ttl_days: i64,
}

impl ExtensionTokenService {
    pub fn new(db: PgPool, ttl_days: i64) -> Self {
        Self { db, ttl_days }
    }

    pub async fn issue(&self, user_id: Uuid, label: String) -> Result<IssuedToken> {
        let token = generate_token_value();
        let expires_at = Utc::now() + Duration::days(self.ttl_days);

        let row = sqlx::query_as::<_, ExtensionToken>(
            r#"
            INSERT INTO extension_tokens (user_id, token, label, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&token)
        .bind(&label)
        .bind(expires_at)
        .fetch_one(&self.db)
        .await?;

        Ok(IssuedToken {
            id: row.id,
            token: row.token,
            label: row.label,
            expires_at: row.expires_at,
        })
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<TokenInfo>> {
        let tokens = sqlx::query_as::<_, ExtensionToken>(
            "SELECT * FROM extension_tokens WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(tokens.into_iter().map(TokenInfo::from).collect())
    }

    pub async fn revoke(&self, user_id: Uuid, token_id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE extension_tokens SET revoked = TRUE WHERE id = $1 AND user_id = $2",
        )
        .bind(token_id)
        .bind(user_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Token not found".to_string()));
        }
        Ok(())
    }

    /// Resolve a presented bearer token. Unknown, revoked and expired tokens
    /// all fail the same way so the response leaks nothing about which.
    pub async fn authenticate(&self, token: &str) -> Result<ExtensionToken> {
        let row = sqlx::query_as::<_, ExtensionToken>(
            "SELECT * FROM extension_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::Unauthorized)?;

        if !row.is_usable(Utc::now()) {
            return Err(AppError::Unauthorized);
        }

        // Best effort; authentication already succeeded
        if let Err(e) = sqlx::query(
            "UPDATE extension_tokens SET last_used_at = NOW() WHERE id = $1",
        )
        .bind(row.id)
        .execute(&self.db)
        .await
        {
            tracing::debug!("Failed to touch extension token {}: {}", row.id, e);
        }

        Ok(row)
    }

    /// Revoke the presented token itself (the extension's logout action).
    pub async fn revoke_by_value(&self, token: &str) -> Result<()> {
        sqlx::query("UPDATE extension_tokens SET revoked = TRUE WHERE token = $1")
            .bind(token)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}

/// 24 random bytes from the OS generator, hex encoded.
fn generate_token_value() -> String {
    let mut bytes = [0u8; 24];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_48_hex_chars() {
        let token = generate_token_value();
        assert_eq!(token.len(), 48);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_tokens_are_unique() {
        assert_ne!(generate_token_value(), generate_token_value());
    }
}
