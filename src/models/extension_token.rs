use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Number of characters of the token value exposed in listings.
const TOKEN_PREFIX_LEN: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExtensionToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked: bool,
}

impl ExtensionToken {
    /// A token authenticates only while unrevoked and unexpired.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at > now
    }
}

/// Listing view: the token value is redacted down to a recognizable prefix.
#[derive(Debug, Clone, Serialize)]
pub struct TokenInfo {
    pub id: Uuid,
    pub label: String,
    pub token_prefix: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked: bool,
}

impl From<ExtensionToken> for TokenInfo {
    fn from(t: ExtensionToken) -> Self {
        let token_prefix = t.token.chars().take(TOKEN_PREFIX_LEN).collect();
        TokenInfo {
            id: t.id,
            label: t.label,
            token_prefix,
            created_at: t.created_at,
            expires_at: t.expires_at,
            last_used_at: t.last_used_at,
            revoked: t.revoked,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTokenRequest {
    #[validate(length(max = 64))]
    #[serde(default)]
    pub label: String,
}

/// Returned exactly once, at issue time; the full value is never shown again.
#[derive(Debug, Serialize)]
pub struct IssuedToken {
    pub id: Uuid,
    pub token: String,
    pub label: String,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(expires_in: Duration, revoked: bool) -> ExtensionToken {
        let now = Utc::now();
        ExtensionToken {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token: "a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718".to_string(),
            label: "laptop".to_string(),
            created_at: now,
            expires_at: now + expires_in,
            last_used_at: None,
            revoked,
        }
    }

    #[test]
    fn expired_tokens_are_unusable() {
        let now = Utc::now();
        assert!(token(Duration::days(1), false).is_usable(now));
        assert!(!token(Duration::seconds(-1), false).is_usable(now));
    }

    #[test]
    fn revoked_tokens_are_unusable_even_before_expiry() {
        let now = Utc::now();
        assert!(!token(Duration::days(30), true).is_usable(now));
    }

    #[test]
    fn listing_redacts_the_token_value() {
        let info: TokenInfo = token(Duration::days(1), false).into();
        assert_eq!(info.token_prefix, "a1b2c3d4");
    }
}
