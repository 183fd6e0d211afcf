//! Daily competitive seed.
//!
//! The seed for a UTC day is `base64(sha256(be_u64(unix_time / 86400) || secret))`.
//! The secret is generated once and persisted with owner-only permissions.
//! Each instance offers its candidate to the `daily_runs` table; whichever
//! insert lands first defines the day's seed and everyone else reads it back.
//! The committed value is cached per process until the day rolls over.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, NaiveDate, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::error::{AppError, Result};
use crate::store::RankingRepository;

/// Length of the daily seed secret in bytes.
pub const SECRET_LEN: usize = 32;

const SECONDS_PER_DAY: i64 = 86_400;

/// The persisted seed secret, zeroized on drop.
pub type DailySecret = Zeroizing<[u8; SECRET_LEN]>;

/// Days since the Unix epoch for `now`.
pub fn day_index(now: DateTime<Utc>) -> i64 {
    now.timestamp().div_euclid(SECONDS_PER_DAY)
}

/// Derives the seed for a day from the secret.
pub fn compute_seed(day: i64, secret: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((day as u64).to_be_bytes());
    hasher.update(secret);
    general_purpose::STANDARD.encode(hasher.finalize())
}

/// Time left until the next UTC midnight.
pub fn until_next_utc_midnight(now: DateTime<Utc>) -> std::time::Duration {
    let next_day = (day_index(now) + 1) * SECONDS_PER_DAY;
    let remaining_ms = next_day * 1000 - now.timestamp_millis();
    std::time::Duration::from_millis(remaining_ms.max(0) as u64)
}

fn secret_from_bytes(bytes: Vec<u8>) -> Result<DailySecret> {
    let bytes = Zeroizing::new(bytes);
    let secret: [u8; SECRET_LEN] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| AppError::Internal(format!("daily secret must be {} bytes", SECRET_LEN)))?;
    Ok(Zeroizing::new(secret))
}

/// Reads the secret at `path`, generating and persisting one on first run.
///
/// A new secret is written in full to a private sibling file and then hard
/// linked into place, so a concurrent reader never sees a partial secret.
pub async fn load_or_create_secret(path: &Path) -> Result<DailySecret> {
    match tokio::fs::read(path).await {
        Ok(bytes) => return secret_from_bytes(bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut secret = Zeroizing::new([0u8; SECRET_LEN]);
    OsRng.fill_bytes(&mut secret[..]);

    let temp = temp_sibling(path)?;
    if let Err(e) = write_private(&temp, &secret[..]).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(e);
    }

    let linked = tokio::fs::hard_link(&temp, path).await;
    if let Err(e) = tokio::fs::remove_file(&temp).await {
        tracing::warn!("⚠️  Failed to remove {}: {}", temp.display(), e);
    }

    match linked {
        Ok(()) => {
            tracing::info!("🔑 Generated new daily seed secret at {}", path.display());
            Ok(secret)
        }
        // Another process won the race to create it.
        Err(e) if e.kind() == ErrorKind::AlreadyExists => secret_from_bytes(tokio::fs::read(path).await?),
        Err(e) => Err(e.into()),
    }
}

fn temp_sibling(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| AppError::Internal(format!("daily secret path {} has no file name", path.display())))?;
    let mut temp = name.to_os_string();
    temp.push(format!(".{}.tmp", Uuid::new_v4().simple()));
    Ok(path.with_file_name(temp))
}

async fn write_private(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}

#[derive(Clone, Debug)]
struct CachedSeed {
    date: NaiveDate,
    seed: String,
}

/// Process-wide owner of the daily seed and its day-rollover job.
pub struct DailySeed {
    secret: DailySecret,
    rankings: Arc<dyn RankingRepository>,
    current: RwLock<Option<CachedSeed>>,
    scheduler: Mutex<Option<JoinHandle<()>>>,
}

impl DailySeed {
    /// Creates an unseeded generator. Nothing is cached until the first
    /// [`refresh`](Self::refresh) or [`seed`](Self::seed).
    pub fn new(secret: DailySecret, rankings: Arc<dyn RankingRepository>) -> Arc<Self> {
        Arc::new(Self {
            secret,
            rankings,
            current: RwLock::new(None),
            scheduler: Mutex::new(None),
        })
    }

    /// Loads (or creates) the secret at `secret_path` and seeds today.
    pub async fn init(secret_path: &Path, rankings: Arc<dyn RankingRepository>) -> Result<Arc<Self>> {
        let secret = load_or_create_secret(secret_path).await?;
        let daily = Self::new(secret, rankings);
        let seed = daily.refresh().await?;
        tracing::info!("✅ Daily seed ready for {}", Utc::now().date_naive());
        tracing::debug!("Daily seed: {}", seed);
        Ok(daily)
    }

    /// Today's seed.
    pub async fn seed(&self) -> Result<String> {
        self.seed_at(Utc::now()).await
    }

    /// The seed for the UTC day containing `now`. Served from the cache when
    /// it holds that day, reconciled with the store otherwise.
    pub async fn seed_at(&self, now: DateTime<Utc>) -> Result<String> {
        let date = now.date_naive();
        if let Some(cached) = self.current.read().await.as_ref() {
            if cached.date == date {
                return Ok(cached.seed.clone());
            }
        }
        self.refresh_at(now).await
    }

    /// Whether the cache currently holds a seed for the day containing `now`.
    pub async fn is_seeded_at(&self, now: DateTime<Utc>) -> bool {
        self.current
            .read()
            .await
            .as_ref()
            .is_some_and(|cached| cached.date == now.date_naive())
    }

    pub async fn refresh(&self) -> Result<String> {
        self.refresh_at(Utc::now()).await
    }

    /// Offers this instance's seed for the day and caches whichever seed the
    /// store committed.
    pub async fn refresh_at(&self, now: DateTime<Utc>) -> Result<String> {
        let date = now.date_naive();
        let candidate = compute_seed(day_index(now), &self.secret[..]);

        let seed = if self.rankings.insert_daily_run(date, &candidate).await? {
            tracing::info!("🌱 Recorded daily seed for {}", date);
            candidate
        } else {
            let committed = self
                .rankings
                .daily_run_seed(date)
                .await?
                .ok_or_else(|| AppError::Internal(format!("daily run for {} disappeared", date)))?;
            if committed != candidate {
                tracing::warn!("⚠️  Daily seed for {} was committed by an instance with a different secret", date);
            }
            committed
        };

        *self.current.write().await = Some(CachedSeed {
            date,
            seed: seed.clone(),
        });
        Ok(seed)
    }

    /// Spawns the job that reconciles the seed right after every UTC midnight.
    ///
    /// The job holds only a weak reference and stops once the generator is dropped.
    pub async fn start_scheduler(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            loop {
                let wait = until_next_utc_midnight(Utc::now()) + std::time::Duration::from_secs(1);
                tokio::time::sleep(wait).await;

                let Some(daily) = weak.upgrade() else {
                    break;
                };

                match daily.refresh().await {
                    Ok(_) => tracing::info!("✅ Daily seed rolled over to {}", Utc::now().date_naive()),
                    Err(e) => tracing::error!("❌ Daily seed rollover failed: {}", e),
                }
            }
        });

        if let Some(previous) = self.scheduler.lock().await.replace(handle) {
            previous.abort();
        }
        tracing::info!("✅ Daily seed scheduler started");
    }

    /// Stops the rollover job, if running.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.scheduler.lock().await.take() {
            handle.abort();
            tracing::info!("🛑 Daily seed scheduler stopped");
        }
    }
}
