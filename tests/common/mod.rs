#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tempfile::TempDir;
use uuid::Uuid;

use roguevault::config::{Config, KdfSettings};
use roguevault::crypto::token::SessionToken;
use roguevault::error::{AppError, Result};
use roguevault::models::account::{Account, AccountStats};
use roguevault::models::ranking::{AccountDailyRun, Ranking, RankingCategory};
use roguevault::models::session::ResolvedSession;
use roguevault::repositories::memory::{MemoryBackend, MemoryBlobStore, MemoryCache};
use roguevault::state::AppState;
use roguevault::store::{AccountRepository, BlobStore, RankingRepository, SessionCache};

pub const GAME_VERSION: &str = "1.0.4";

/// A fully wired state over in-memory backends.
pub struct TestApp {
    pub state: AppState,
    pub backend: Arc<MemoryBackend>,
    pub blobs: Arc<MemoryBlobStore>,
    pub cache: Option<Arc<MemoryCache>>,
    pub dir: TempDir,
}

pub fn test_config(dir: &TempDir) -> Config {
    Config {
        database_url: String::new(),
        redis_url: None,
        session_duration_days: 7,
        data_dir: dir.path().join("data"),
        daily_secret_path: dir.path().join("secret.key"),
        game_version: GAME_VERSION.to_string(),
        kdf: KdfSettings {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
            max_concurrent: 2,
        },
    }
}

async fn build(with_cache: bool, blobs_override: Option<Arc<dyn BlobStore>>) -> TestApp {
    build_with(with_cache, blobs_override, None).await
}

async fn build_with(with_cache: bool, blobs_override: Option<Arc<dyn BlobStore>>, faults: Option<Faults>) -> TestApp {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = Arc::new(MemoryBackend::new());
    let blobs = Arc::new(MemoryBlobStore::new());
    let cache = with_cache.then(|| Arc::new(MemoryCache::new()));

    let blob_store: Arc<dyn BlobStore> = blobs_override.unwrap_or_else(|| blobs.clone() as Arc<dyn BlobStore>);
    let session_cache: Option<Arc<dyn SessionCache>> = cache.clone().map(|c| c as Arc<dyn SessionCache>);

    let (accounts, rankings): (Arc<dyn AccountRepository>, Arc<dyn RankingRepository>) = match faults {
        Some(faults) => {
            let faulty = Arc::new(FaultyBackend {
                inner: backend.clone(),
                faults,
            });
            (faulty.clone() as Arc<dyn AccountRepository>, faulty as Arc<dyn RankingRepository>)
        }
        None => (
            backend.clone() as Arc<dyn AccountRepository>,
            backend.clone() as Arc<dyn RankingRepository>,
        ),
    };

    let state = AppState::assemble(test_config(&dir), accounts, rankings, blob_store, session_cache)
        .await
        .expect("state");

    TestApp {
        state,
        backend,
        blobs,
        cache,
        dir,
    }
}

pub async fn spawn_app() -> TestApp {
    build(false, None).await
}

pub async fn spawn_app_with_cache() -> TestApp {
    build(true, None).await
}

/// Same as [`spawn_app`] but with saves written through the given store.
pub async fn spawn_app_with_blobs(blobs: Arc<dyn BlobStore>) -> TestApp {
    build(false, Some(blobs)).await
}

/// Same as [`spawn_app`] but with repository calls that misbehave as described.
///
/// `backend` on the returned app is the healthy store underneath, so tests can
/// seed and inspect rows directly.
pub async fn spawn_app_with_faults(faults: Faults, with_cache: bool) -> TestApp {
    build_with(with_cache, None, Some(faults)).await
}

/// Inserts an account directly, skipping password derivation.
pub async fn seed_account(app: &TestApp, username: &str) -> Uuid {
    let account = Account::new(Uuid::new_v4(), username.to_string(), vec![0; 32], vec![0; 16]);
    app.backend.insert_account(&account).await.expect("insert account");
    account.id
}

/// Misbehaviour injected by [`FaultyBackend`].
#[derive(Debug, Default, Clone)]
pub struct Faults {
    /// Delay applied before a token delete reaches the store.
    pub slow_token_delete: Option<Duration>,
    pub fail_last_login: bool,
    pub fail_daily_results: bool,
}

/// Wraps a [`MemoryBackend`] and injects the configured [`Faults`].
pub struct FaultyBackend {
    inner: Arc<MemoryBackend>,
    faults: Faults,
}

fn injected(what: &str) -> AppError {
    AppError::Internal(format!("injected {} failure", what))
}

#[async_trait]
impl AccountRepository for FaultyBackend {
    async fn insert_account(&self, account: &Account) -> Result<()> {
        self.inner.insert_account(account).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>> {
        self.inner.find_by_username(username).await
    }

    async fn find_by_id(&self, account_id: &Uuid) -> Result<Option<Account>> {
        self.inner.find_by_id(account_id).await
    }

    async fn update_password(&self, account_id: &Uuid, hash: &[u8], salt: &[u8]) -> Result<()> {
        self.inner.update_password(account_id, hash, salt).await
    }

    async fn update_last_login(&self, account_id: &Uuid, at: DateTime<Utc>) -> Result<()> {
        if self.faults.fail_last_login {
            return Err(injected("last login"));
        }
        self.inner.update_last_login(account_id, at).await
    }

    async fn update_last_activity(&self, account_id: &Uuid, at: DateTime<Utc>) -> Result<()> {
        self.inner.update_last_activity(account_id, at).await
    }

    async fn set_banned(&self, account_id: &Uuid, banned: bool) -> Result<()> {
        self.inner.set_banned(account_id, banned).await
    }

    async fn count_active_since(&self, since: DateTime<Utc>) -> Result<i64> {
        self.inner.count_active_since(since).await
    }

    async fn upsert_stats(&self, account_id: &Uuid, stats: &AccountStats) -> Result<()> {
        self.inner.upsert_stats(account_id, stats).await
    }

    async fn insert_token(&self, token: &SessionToken, account_id: &Uuid, expires_at: DateTime<Utc>) -> Result<()> {
        self.inner.insert_token(token, account_id, expires_at).await
    }

    async fn find_token(&self, token: &SessionToken) -> Result<Option<ResolvedSession>> {
        self.inner.find_token(token).await
    }

    async fn delete_token(&self, token: &SessionToken) -> Result<bool> {
        if let Some(delay) = self.faults.slow_token_delete {
            tokio::time::sleep(delay).await;
        }
        self.inner.delete_token(token).await
    }

    async fn delete_expired_tokens(&self, now: DateTime<Utc>) -> Result<u64> {
        self.inner.delete_expired_tokens(now).await
    }
}

#[async_trait]
impl RankingRepository for FaultyBackend {
    async fn insert_daily_run(&self, date: NaiveDate, seed: &str) -> Result<bool> {
        self.inner.insert_daily_run(date, seed).await
    }

    async fn daily_run_seed(&self, date: NaiveDate) -> Result<Option<String>> {
        self.inner.daily_run_seed(date).await
    }

    async fn upsert_daily_result(
        &self,
        account_id: &Uuid,
        date: NaiveDate,
        score: i64,
        wave: i32,
        at: DateTime<Utc>,
    ) -> Result<()> {
        if self.faults.fail_daily_results {
            return Err(injected("daily result"));
        }
        self.inner.upsert_daily_result(account_id, date, score, wave, at).await
    }

    async fn daily_result(&self, account_id: &Uuid, date: NaiveDate) -> Result<Option<AccountDailyRun>> {
        self.inner.daily_result(account_id, date).await
    }

    async fn insert_seed_completion(&self, account_id: &Uuid, seed: &str, mode: i32, at: DateTime<Utc>) -> Result<bool> {
        self.inner.insert_seed_completion(account_id, seed, mode, at).await
    }

    async fn rankings(&self, category: RankingCategory, since: NaiveDate, limit: i64, offset: i64) -> Result<Vec<Ranking>> {
        self.inner.rankings(category, since, limit, offset).await
    }

    async fn ranking_entries(&self, category: RankingCategory, since: NaiveDate) -> Result<i64> {
        self.inner.ranking_entries(category, since).await
    }
}
