use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A session token resolved to the account it belongs to.
///
/// This is what the auth middleware places in request extensions and what
/// the session cache stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSession {
    /// The ID of the account this session belongs to.
    pub account_id: Uuid,
    /// The account's username.
    pub username: String,
    /// The timestamp when the session expires.
    pub expires_at: DateTime<Utc>,
}

impl ResolvedSession {
    /// Whether the session is past its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
