use std::env;
use std::path::PathBuf;
use anyhow::{Context, Result};

/// Parameters of the password key-derivation function and its admission gate.
#[derive(Clone, Debug)]
pub struct KdfSettings {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Number of lanes.
    pub parallelism: u32,
    /// Maximum number of derivations running at once.
    pub max_concurrent: usize,
}

impl Default for KdfSettings {
    fn default() -> Self {
        Self {
            memory_kib: 256 * 1024,
            iterations: 1,
            parallelism: 4,
            max_concurrent: 16,
        }
    }
}

/// The application's configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// The URL of the PostgreSQL database.
    pub database_url: String,
    /// The URL of the Redis server. The cache is disabled when unset.
    pub redis_url: Option<String>,
    /// The duration of a session in days.
    pub session_duration_days: i64,
    /// Root directory of the `userdata/` blob tree.
    pub data_dir: PathBuf,
    /// Location of the persisted daily seed secret.
    pub daily_secret_path: PathBuf,
    /// Game version system saves must carry.
    pub game_version: String,
    /// Password hashing parameters.
    pub kdf: KdfSettings,
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("Invalid {}", name)),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        let defaults = KdfSettings::default();

        let kdf = KdfSettings {
            memory_kib: parse_var("KDF_MEMORY_KIB", defaults.memory_kib)?,
            iterations: parse_var("KDF_ITERATIONS", defaults.iterations)?,
            parallelism: parse_var("KDF_PARALLELISM", defaults.parallelism)?,
            max_concurrent: parse_var("KDF_MAX_CONCURRENT", defaults.max_concurrent)?,
        };

        if kdf.max_concurrent == 0 {
            anyhow::bail!("KDF_MAX_CONCURRENT must be at least 1");
        }

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .context("DATABASE_URL must be set")?,
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
            session_duration_days: parse_var("SESSION_DURATION_DAYS", 7)?,
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            daily_secret_path: env::var("DAILY_SECRET_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("secret.key")),
            game_version: env::var("GAME_VERSION")
                .unwrap_or_else(|_| "1.0.4".to_string()),
            kdf,
        })
    }

    /// Session token lifetime.
    pub fn session_duration(&self) -> chrono::Duration {
        chrono::Duration::days(self.session_duration_days)
    }
}
