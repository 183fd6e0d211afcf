//! Backend seams.
//!
//! The core talks to its collaborators only through these traits:
//! a relational backend for accounts, tokens and rankings, a blob store for
//! save files, and an optional cache. PostgreSQL, filesystem and Redis
//! implementations live in `repositories`, alongside in-process ones.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::crypto::token::SessionToken;
use crate::error::Result;
use crate::models::account::{Account, AccountStats};
use crate::models::ranking::{AccountDailyRun, Ranking, RankingCategory};
use crate::models::session::ResolvedSession;

/// Accounts, session tokens and per-account statistics.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Inserts a new account. A taken username yields `AppError::Conflict`.
    async fn insert_account(&self, account: &Account) -> Result<()>;

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>>;

    async fn find_by_id(&self, account_id: &Uuid) -> Result<Option<Account>>;

    /// Replaces the password hash and salt. Unknown accounts yield `AppError::NotFound`.
    async fn update_password(&self, account_id: &Uuid, hash: &[u8], salt: &[u8]) -> Result<()>;

    async fn update_last_login(&self, account_id: &Uuid, at: DateTime<Utc>) -> Result<()>;

    async fn update_last_activity(&self, account_id: &Uuid, at: DateTime<Utc>) -> Result<()>;

    async fn set_banned(&self, account_id: &Uuid, banned: bool) -> Result<()>;

    /// Number of accounts active at or after `since`.
    async fn count_active_since(&self, since: DateTime<Utc>) -> Result<i64>;

    async fn upsert_stats(&self, account_id: &Uuid, stats: &AccountStats) -> Result<()>;

    async fn insert_token(&self, token: &SessionToken, account_id: &Uuid, expires_at: DateTime<Utc>) -> Result<()>;

    /// Looks a token up, expired or not. Expiry is the caller's decision.
    async fn find_token(&self, token: &SessionToken) -> Result<Option<ResolvedSession>>;

    /// Deletes a token, returning whether it existed.
    async fn delete_token(&self, token: &SessionToken) -> Result<bool>;

    /// Deletes every token expired at `now`, returning how many were removed.
    async fn delete_expired_tokens(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Daily runs, per-account daily results and seed completions.
#[async_trait]
pub trait RankingRepository: Send + Sync {
    /// First-writer-wins insert of the day's seed. Returns `false` if a seed
    /// was already recorded for `date`.
    async fn insert_daily_run(&self, date: NaiveDate, seed: &str) -> Result<bool>;

    async fn daily_run_seed(&self, date: NaiveDate) -> Result<Option<String>>;

    /// Upserts keeping the maximum score and wave. The timestamp moves only
    /// when the score strictly improves.
    async fn upsert_daily_result(
        &self,
        account_id: &Uuid,
        date: NaiveDate,
        score: i64,
        wave: i32,
        at: DateTime<Utc>,
    ) -> Result<()>;

    async fn daily_result(&self, account_id: &Uuid, date: NaiveDate) -> Result<Option<AccountDailyRun>>;

    /// Insert-once record of a completed seed. Returns `true` if it was new.
    async fn insert_seed_completion(&self, account_id: &Uuid, seed: &str, mode: i32, at: DateTime<Utc>) -> Result<bool>;

    /// One leaderboard page. `since` is today for `Daily` and the start of
    /// the week for `Weekly`. Banned accounts are excluded.
    async fn rankings(&self, category: RankingCategory, since: NaiveDate, limit: i64, offset: i64) -> Result<Vec<Ranking>>;

    /// Number of leaderboard entries for the same selection as `rankings`.
    async fn ranking_entries(&self, category: RankingCategory, since: NaiveDate) -> Result<i64>;
}

/// Path-addressed opaque blobs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replaces the blob at `key`. Readers see either the old or the new
    /// contents, never a partial write.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Removes the blob at `key`. Absence is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    async fn exists(&self, key: &str) -> Result<bool>;
}

/// Ephemeral acceleration layer. Never authoritative.
#[async_trait]
pub trait SessionCache: Send + Sync {
    async fn get_session(&self, token: &SessionToken) -> Result<Option<ResolvedSession>>;

    async fn put_session(&self, token: &SessionToken, session: &ResolvedSession, ttl_secs: u64) -> Result<()>;

    async fn evict_session(&self, token: &SessionToken) -> Result<()>;

    /// Records `account_id` as active now.
    async fn mark_active(&self, account_id: &Uuid) -> Result<()>;

    /// Number of accounts marked active within the activity window.
    async fn active_players(&self) -> Result<i64>;
}
