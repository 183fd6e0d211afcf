use std::sync::Arc;

use crate::config::Config;
use crate::crypto::kdf::KeyDerivationGate;
use crate::error::Result;
use crate::repositories::account::PgAccountRepository;
use crate::repositories::blob::FsBlobStore;
use crate::repositories::cache::RedisCache;
use crate::repositories::ranking::PgRankingRepository;
use crate::services::daily::DailySeed;
use crate::store::{AccountRepository, BlobStore, RankingRepository, SessionCache};

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Config,
    /// Accounts, session tokens and statistics.
    pub accounts: Arc<dyn AccountRepository>,
    /// Daily runs, results and seed completions.
    pub rankings: Arc<dyn RankingRepository>,
    /// Save blobs.
    pub blobs: Arc<dyn BlobStore>,
    /// Optional session and activity cache.
    pub cache: Option<Arc<dyn SessionCache>>,
    /// The bounded password hashing gate.
    pub kdf: Arc<KeyDerivationGate>,
    /// Owner of the daily seed.
    pub daily: Arc<DailySeed>,
}

impl AppState {
    /// Connects every production backend and seeds today's daily run.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = crate::db::create_pool(&config.database_url)?;
        crate::db::ensure_schema(&db).await?;
        tracing::info!("✅ PostgreSQL Pool initialized and schema verified");

        let accounts: Arc<dyn AccountRepository> = Arc::new(PgAccountRepository::new(db.clone()));
        let rankings: Arc<dyn RankingRepository> = Arc::new(PgRankingRepository::new(db));

        let cache: Option<Arc<dyn SessionCache>> = match &config.redis_url {
            Some(url) => {
                let cache: Arc<dyn SessionCache> = Arc::new(RedisCache::connect(url).await?);
                tracing::info!("✅ Redis Connection Manager initialized (session cache)");
                Some(cache)
            }
            None => {
                tracing::info!("ℹ️  REDIS_URL not set, running without session cache");
                None
            }
        };

        let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(config.data_dir.clone()));
        tracing::info!("✅ Save storage rooted at {}", config.data_dir.display());

        Self::assemble(config.clone(), accounts, rankings, blobs, cache).await
    }

    /// Builds the state around already constructed backends.
    ///
    /// Loads the daily secret from `config.daily_secret_path` and reconciles
    /// today's seed against `rankings`.
    pub async fn assemble(
        config: Config,
        accounts: Arc<dyn AccountRepository>,
        rankings: Arc<dyn RankingRepository>,
        blobs: Arc<dyn BlobStore>,
        cache: Option<Arc<dyn SessionCache>>,
    ) -> Result<Self> {
        let kdf = Arc::new(KeyDerivationGate::new(&config.kdf)?);
        tracing::info!(
            "✅ Key derivation gate initialized (max {} concurrent)",
            kdf.max_concurrent()
        );

        let daily = DailySeed::init(&config.daily_secret_path, rankings.clone()).await?;

        Ok(AppState {
            config,
            accounts,
            rankings,
            blobs,
            cache,
            kdf,
            daily,
        })
    }
}
