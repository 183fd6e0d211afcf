//! In-process implementations of every backend trait.
//!
//! They follow the same contracts as the PostgreSQL, filesystem and Redis
//! implementations (uniqueness, first-writer-wins, max-merging upserts,
//! rank ordering) and back the test suite.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::crypto::token::SessionToken;
use crate::error::{AppError, Result};
use crate::models::account::{Account, AccountStats};
use crate::models::ranking::{AccountDailyRun, Ranking, RankingCategory};
use crate::models::session::ResolvedSession;
use crate::repositories::cache::ACTIVE_WINDOW_SECS;
use crate::store::{AccountRepository, BlobStore, RankingRepository, SessionCache};

#[derive(Default)]
struct Tables {
    accounts: HashMap<Uuid, Account>,
    usernames: HashMap<String, Uuid>,
    stats: HashMap<Uuid, AccountStats>,
    tokens: HashMap<SessionToken, (Uuid, DateTime<Utc>)>,
    daily_runs: BTreeMap<NaiveDate, String>,
    daily_results: HashMap<(Uuid, NaiveDate), AccountDailyRun>,
    completions: HashSet<(Uuid, String, i32)>,
}

/// Relational tables kept in memory.
#[derive(Default)]
pub struct MemoryBackend {
    tables: Mutex<Tables>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored statistics for an account, if any were recorded.
    pub async fn stats(&self, account_id: &Uuid) -> Option<AccountStats> {
        self.tables.lock().await.stats.get(account_id).cloned()
    }
}

#[async_trait]
impl AccountRepository for MemoryBackend {
    async fn insert_account(&self, account: &Account) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if tables.usernames.contains_key(&account.username) || tables.accounts.contains_key(&account.id) {
            return Err(AppError::Conflict("username is already taken".to_string()));
        }
        tables.usernames.insert(account.username.clone(), account.id);
        tables.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .usernames
            .get(username)
            .and_then(|id| tables.accounts.get(id))
            .cloned())
    }

    async fn find_by_id(&self, account_id: &Uuid) -> Result<Option<Account>> {
        Ok(self.tables.lock().await.accounts.get(account_id).cloned())
    }

    async fn update_password(&self, account_id: &Uuid, hash: &[u8], salt: &[u8]) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let account = tables.accounts.get_mut(account_id).ok_or(AppError::NotFound)?;
        account.password_hash = hash.to_vec();
        account.password_salt = salt.to_vec();
        Ok(())
    }

    async fn update_last_login(&self, account_id: &Uuid, at: DateTime<Utc>) -> Result<()> {
        if let Some(account) = self.tables.lock().await.accounts.get_mut(account_id) {
            account.last_logged_in = Some(at);
            account.last_activity = Some(at);
        }
        Ok(())
    }

    async fn update_last_activity(&self, account_id: &Uuid, at: DateTime<Utc>) -> Result<()> {
        if let Some(account) = self.tables.lock().await.accounts.get_mut(account_id) {
            account.last_activity = Some(at);
        }
        Ok(())
    }

    async fn set_banned(&self, account_id: &Uuid, banned: bool) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let account = tables.accounts.get_mut(account_id).ok_or(AppError::NotFound)?;
        account.banned = banned;
        Ok(())
    }

    async fn count_active_since(&self, since: DateTime<Utc>) -> Result<i64> {
        let tables = self.tables.lock().await;
        Ok(tables
            .accounts
            .values()
            .filter(|a| a.last_activity.is_some_and(|at| at >= since))
            .count() as i64)
    }

    async fn upsert_stats(&self, account_id: &Uuid, stats: &AccountStats) -> Result<()> {
        self.tables.lock().await.stats.insert(*account_id, stats.clone());
        Ok(())
    }

    async fn insert_token(&self, token: &SessionToken, account_id: &Uuid, expires_at: DateTime<Utc>) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if !tables.accounts.contains_key(account_id) {
            return Err(AppError::NotFound);
        }
        if tables.tokens.contains_key(token) {
            return Err(AppError::Conflict("token already issued".to_string()));
        }
        tables.tokens.insert(token.clone(), (*account_id, expires_at));
        Ok(())
    }

    async fn find_token(&self, token: &SessionToken) -> Result<Option<ResolvedSession>> {
        let tables = self.tables.lock().await;
        Ok(tables.tokens.get(token).and_then(|(account_id, expires_at)| {
            tables.accounts.get(account_id).map(|account| ResolvedSession {
                account_id: *account_id,
                username: account.username.clone(),
                expires_at: *expires_at,
            })
        }))
    }

    async fn delete_token(&self, token: &SessionToken) -> Result<bool> {
        Ok(self.tables.lock().await.tokens.remove(token).is_some())
    }

    async fn delete_expired_tokens(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.tokens.len();
        tables.tokens.retain(|_, (_, expires_at)| *expires_at > now);
        Ok((before - tables.tokens.len()) as u64)
    }
}

impl Tables {
    /// Leaderboard rows before ranking: (username, score, wave, tie-break timestamp).
    fn ranking_rows(&self, category: RankingCategory, since: NaiveDate) -> Vec<(String, i64, i32, DateTime<Utc>)> {
        let eligible = self.daily_results.values().filter(|run| {
            let in_range = match category {
                RankingCategory::Daily => run.date == since,
                RankingCategory::Weekly => run.date >= since,
            };
            in_range
                && self
                    .accounts
                    .get(&run.account_id)
                    .is_some_and(|account| !account.banned)
        });

        let mut grouped: HashMap<Uuid, (i64, i32, DateTime<Utc>)> = HashMap::new();
        for run in eligible {
            grouped
                .entry(run.account_id)
                .and_modify(|(score, wave, timestamp)| {
                    *score += run.score;
                    *wave = (*wave).max(run.wave);
                    *timestamp = (*timestamp).min(run.timestamp);
                })
                .or_insert((run.score, run.wave, run.timestamp));
        }

        let mut rows: Vec<_> = grouped
            .into_iter()
            .filter_map(|(account_id, (score, wave, timestamp))| {
                self.accounts
                    .get(&account_id)
                    .map(|account| (account.username.clone(), score, wave, timestamp))
            })
            .collect();

        rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.3.cmp(&b.3)).then(a.0.cmp(&b.0)));
        rows
    }
}

#[async_trait]
impl RankingRepository for MemoryBackend {
    async fn insert_daily_run(&self, date: NaiveDate, seed: &str) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        if tables.daily_runs.contains_key(&date) {
            return Ok(false);
        }
        tables.daily_runs.insert(date, seed.to_string());
        Ok(true)
    }

    async fn daily_run_seed(&self, date: NaiveDate) -> Result<Option<String>> {
        Ok(self.tables.lock().await.daily_runs.get(&date).cloned())
    }

    async fn upsert_daily_result(
        &self,
        account_id: &Uuid,
        date: NaiveDate,
        score: i64,
        wave: i32,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if !tables.accounts.contains_key(account_id) {
            return Err(AppError::NotFound);
        }
        if !tables.daily_runs.contains_key(&date) {
            return Err(AppError::Internal(format!("no daily run recorded for {}", date)));
        }
        tables
            .daily_results
            .entry((*account_id, date))
            .and_modify(|run| {
                if score > run.score {
                    run.timestamp = at;
                }
                run.score = run.score.max(score);
                run.wave = run.wave.max(wave);
            })
            .or_insert(AccountDailyRun {
                account_id: *account_id,
                date,
                score,
                wave,
                timestamp: at,
            });
        Ok(())
    }

    async fn daily_result(&self, account_id: &Uuid, date: NaiveDate) -> Result<Option<AccountDailyRun>> {
        Ok(self.tables.lock().await.daily_results.get(&(*account_id, date)).cloned())
    }

    async fn insert_seed_completion(&self, account_id: &Uuid, seed: &str, mode: i32, _at: DateTime<Utc>) -> Result<bool> {
        Ok(self
            .tables
            .lock()
            .await
            .completions
            .insert((*account_id, seed.to_string(), mode)))
    }

    async fn rankings(&self, category: RankingCategory, since: NaiveDate, limit: i64, offset: i64) -> Result<Vec<Ranking>> {
        let rows = self.tables.lock().await.ranking_rows(category, since);

        let mut ranked = Vec::with_capacity(rows.len());
        let mut rank = 0i64;
        let mut previous: Option<(i64, DateTime<Utc>)> = None;
        for (position, (username, score, wave, timestamp)) in rows.into_iter().enumerate() {
            if previous != Some((score, timestamp)) {
                rank = position as i64 + 1;
                previous = Some((score, timestamp));
            }
            ranked.push(Ranking { rank, username, score, wave });
        }

        Ok(ranked
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn ranking_entries(&self, category: RankingCategory, since: NaiveDate) -> Result<i64> {
        Ok(self.tables.lock().await.ranking_rows(category, since).len() as i64)
    }
}

/// Blobs kept in memory.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored key, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.blobs.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.blobs.lock().await.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.blobs.lock().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.blobs.lock().await.contains_key(key))
    }
}

#[derive(Default)]
struct CacheEntries {
    sessions: HashMap<SessionToken, (ResolvedSession, DateTime<Utc>)>,
    active: HashMap<Uuid, DateTime<Utc>>,
}

/// Session cache kept in memory, with the same TTL semantics as Redis.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<CacheEntries>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionCache for MemoryCache {
    async fn get_session(&self, token: &SessionToken) -> Result<Option<ResolvedSession>> {
        let now = Utc::now();
        let mut entries = self.entries.lock().await;
        match entries.sessions.get(token) {
            Some((session, evict_at)) if *evict_at > now => Ok(Some(session.clone())),
            Some(_) => {
                entries.sessions.remove(token);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put_session(&self, token: &SessionToken, session: &ResolvedSession, ttl_secs: u64) -> Result<()> {
        if ttl_secs == 0 {
            return Ok(());
        }
        let evict_at = Utc::now() + Duration::seconds(ttl_secs.min(i64::MAX as u64) as i64);
        self.entries
            .lock()
            .await
            .sessions
            .insert(token.clone(), (session.clone(), evict_at));
        Ok(())
    }

    async fn evict_session(&self, token: &SessionToken) -> Result<()> {
        self.entries.lock().await.sessions.remove(token);
        Ok(())
    }

    async fn mark_active(&self, account_id: &Uuid) -> Result<()> {
        self.entries.lock().await.active.insert(*account_id, Utc::now());
        Ok(())
    }

    async fn active_players(&self) -> Result<i64> {
        let since = Utc::now() - Duration::seconds(ACTIVE_WINDOW_SECS);
        let mut entries = self.entries.lock().await;
        entries.active.retain(|_, at| *at >= since);
        Ok(entries.active.len() as i64)
    }
}
