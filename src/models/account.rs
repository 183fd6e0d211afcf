use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Represents a player account.
#[derive(Clone, Debug)]
pub struct Account {
    /// The unique, never reused identity of the account.
    pub id: Uuid,
    /// The account's username (1-16 word characters, unique).
    pub username: String,
    /// Argon2 key derived from the password.
    pub password_hash: Vec<u8>,
    /// Salt used for the derivation.
    pub password_salt: Vec<u8>,
    /// The timestamp when the account was registered.
    pub registered_at: DateTime<Utc>,
    /// The timestamp of the last successful login.
    pub last_logged_in: Option<DateTime<Utc>>,
    /// The timestamp of the last authenticated activity.
    pub last_activity: Option<DateTime<Utc>>,
    /// Whether the account is banned.
    pub banned: bool,
    /// Linked Discord identity, if any.
    pub discord_id: Option<String>,
    /// Linked Google identity, if any.
    pub google_id: Option<String>,
}

impl Account {
    /// Builds a freshly registered account.
    pub fn new(id: Uuid, username: String, password_hash: Vec<u8>, password_salt: Vec<u8>) -> Self {
        Self {
            id,
            username,
            password_hash,
            password_salt,
            registered_at: Utc::now(),
            last_logged_in: None,
            last_activity: None,
            banned: false,
            discord_id: None,
            google_id: None,
        }
    }
}

/// Account summary returned to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub username: String,
    /// Most recently written session slot, or -1 when there is none.
    pub last_session_slot: i32,
}

/// Aggregate counters mirrored from the system save into `account_stats`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountStats {
    pub play_time: i64,
    pub battles: i64,
    pub classic_sessions_played: i64,
    pub sessions_won: i64,
    pub highest_endless_wave: i64,
    pub highest_level: i64,
    pub pokemon_seen: i64,
    pub pokemon_defeated: i64,
    pub pokemon_caught: i64,
    pub pokemon_hatched: i64,
    pub eggs_pulled: i64,
    pub regular_vouchers: i64,
    pub plus_vouchers: i64,
    pub premium_vouchers: i64,
    pub golden_vouchers: i64,
}
