use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use crate::error::{AppError, Result};
use std::time::Duration;

/// Creates a new database connection pool.
///
/// # Arguments
///
/// * `database_url` - The URL of the PostgreSQL database.
///
/// # Returns
///
/// A `Result` containing the `Pool`.
pub fn create_pool(database_url: &str) -> Result<Pool> {
    let mut cfg = Config::new();
    let pg_config: tokio_postgres::Config = database_url.parse()?;

    if let Some(host) = pg_config.get_hosts().first() {
        if let tokio_postgres::config::Host::Tcp(hostname) = host {
            cfg.host = Some(hostname.to_string());
        }
    }

    if let Some(port) = pg_config.get_ports().first() {
        cfg.port = Some(*port);
    }

    if let Some(dbname) = pg_config.get_dbname() {
        cfg.dbname = Some(dbname.to_string());
    }

    if let Some(user) = pg_config.get_user() {
        cfg.user = Some(user.to_string());
    }

    if let Some(password) = pg_config.get_password() {
        cfg.password = Some(String::from_utf8_lossy(password).to_string());
    }

    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    cfg.pool = Some(PoolConfig {
        max_size: 100,
        timeouts: deadpool_postgres::Timeouts {
            wait: Some(Duration::from_secs(5)),
            create: Some(Duration::from_secs(2)),
            recycle: Some(Duration::from_secs(1)),
        },
        ..Default::default()
    });

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(|e| AppError::Internal(format!("Failed to create pool: {}", e)))
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    uuid            UUID PRIMARY KEY,
    username        VARCHAR(16) NOT NULL UNIQUE,
    hash            BYTEA NOT NULL,
    salt            BYTEA NOT NULL,
    registered      TIMESTAMPTZ NOT NULL,
    last_logged_in  TIMESTAMPTZ,
    last_activity   TIMESTAMPTZ,
    banned          BOOLEAN NOT NULL DEFAULT FALSE,
    discord_id      TEXT UNIQUE,
    google_id       TEXT UNIQUE
);

CREATE INDEX IF NOT EXISTS accounts_last_activity_idx ON accounts (last_activity);

CREATE TABLE IF NOT EXISTS sessions (
    token   BYTEA PRIMARY KEY,
    uuid    UUID NOT NULL REFERENCES accounts (uuid) ON DELETE CASCADE,
    expire  TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS sessions_uuid_idx ON sessions (uuid);
CREATE INDEX IF NOT EXISTS sessions_expire_idx ON sessions (expire);

CREATE TABLE IF NOT EXISTS account_stats (
    uuid                    UUID PRIMARY KEY REFERENCES accounts (uuid) ON DELETE CASCADE,
    play_time               BIGINT NOT NULL DEFAULT 0,
    battles                 BIGINT NOT NULL DEFAULT 0,
    classic_sessions_played BIGINT NOT NULL DEFAULT 0,
    sessions_won            BIGINT NOT NULL DEFAULT 0,
    highest_endless_wave    BIGINT NOT NULL DEFAULT 0,
    highest_level           BIGINT NOT NULL DEFAULT 0,
    pokemon_seen            BIGINT NOT NULL DEFAULT 0,
    pokemon_defeated        BIGINT NOT NULL DEFAULT 0,
    pokemon_caught          BIGINT NOT NULL DEFAULT 0,
    pokemon_hatched         BIGINT NOT NULL DEFAULT 0,
    eggs_pulled             BIGINT NOT NULL DEFAULT 0,
    regular_vouchers        BIGINT NOT NULL DEFAULT 0,
    plus_vouchers           BIGINT NOT NULL DEFAULT 0,
    premium_vouchers        BIGINT NOT NULL DEFAULT 0,
    golden_vouchers         BIGINT NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS daily_runs (
    date    DATE PRIMARY KEY,
    seed    TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS account_daily_runs (
    uuid        UUID NOT NULL REFERENCES accounts (uuid) ON DELETE CASCADE,
    date        DATE NOT NULL REFERENCES daily_runs (date) ON DELETE CASCADE,
    score       BIGINT NOT NULL DEFAULT 0,
    wave        INTEGER NOT NULL DEFAULT 0,
    timestamp   TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (uuid, date)
);

CREATE INDEX IF NOT EXISTS account_daily_runs_date_idx ON account_daily_runs (date);

CREATE TABLE IF NOT EXISTS seed_completions (
    uuid        UUID NOT NULL REFERENCES accounts (uuid) ON DELETE CASCADE,
    seed        TEXT NOT NULL,
    mode        INTEGER NOT NULL,
    timestamp   TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (uuid, seed, mode)
);
"#;

/// Creates every table and index the repositories use, if missing.
pub async fn ensure_schema(pool: &Pool) -> Result<()> {
    let client = pool.get().await?;
    client.batch_execute(SCHEMA).await?;
    tracing::info!("✅ Database schema verified");
    Ok(())
}
