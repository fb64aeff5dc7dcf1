//! Password reset token model

use chrono::{DateTime, Utc};

/// Stored reset request; only the SHA-256 digest of the mailed token is kept
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PasswordReset {
    pub id: i64,
    pub user_id: i64,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

impl PasswordReset {
    /// Unused and not yet expired at `now`
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.used && self.expires_at > now
    }
}
