use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use tokio_postgres::Row;
use tokio_postgres::error::SqlState;
use uuid::Uuid;

use crate::{
    crypto::token::SessionToken,
    error::{AppError, Result},
    models::account::{Account, AccountStats},
    models::session::ResolvedSession,
    store::AccountRepository,
};

/// PostgreSQL-backed accounts and session tokens.
#[derive(Clone)]
pub struct PgAccountRepository {
    pool: Pool,
}

impl PgAccountRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

/// A helper function to map a `tokio_postgres::Row` to an `Account`.
fn row_to_account(row: &Row) -> Result<Account> {
    Ok(Account {
        id: row.try_get("uuid").map_err(|_| AppError::MissingData("uuid".to_string()))?,
        username: row.try_get("username").map_err(|_| AppError::MissingData("username".to_string()))?,
        password_hash: row.try_get("hash").map_err(|_| AppError::MissingData("hash".to_string()))?,
        password_salt: row.try_get("salt").map_err(|_| AppError::MissingData("salt".to_string()))?,
        registered_at: row.try_get("registered").map_err(|_| AppError::MissingData("registered".to_string()))?,
        last_logged_in: row.try_get("last_logged_in").map_err(|_| AppError::MissingData("last_logged_in".to_string()))?,
        last_activity: row.try_get("last_activity").map_err(|_| AppError::MissingData("last_activity".to_string()))?,
        banned: row.try_get("banned").map_err(|_| AppError::MissingData("banned".to_string()))?,
        discord_id: row.try_get("discord_id").map_err(|_| AppError::MissingData("discord_id".to_string()))?,
        google_id: row.try_get("google_id").map_err(|_| AppError::MissingData("google_id".to_string()))?,
    })
}

const ACCOUNT_COLUMNS: &str =
    "uuid, username, hash, salt, registered, last_logged_in, last_activity, banned, discord_id, google_id";

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn insert_account(&self, account: &Account) -> Result<()> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached(
                r#"
                INSERT INTO accounts (uuid, username, hash, salt, registered)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .await?;

        client
            .execute(
                &statement,
                &[
                    &account.id,
                    &account.username,
                    &account.password_hash,
                    &account.password_salt,
                    &account.registered_at,
                ],
            )
            .await
            .map_err(|e| {
                if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                    AppError::Conflict("username is already taken".to_string())
                } else {
                    AppError::Database(e)
                }
            })?;

        Ok(())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached(&format!("SELECT {} FROM accounts WHERE username = $1", ACCOUNT_COLUMNS))
            .await?;
        let row = client.query_opt(&statement, &[&username]).await?;
        row.map(|r| row_to_account(&r)).transpose()
    }

    async fn find_by_id(&self, account_id: &Uuid) -> Result<Option<Account>> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached(&format!("SELECT {} FROM accounts WHERE uuid = $1", ACCOUNT_COLUMNS))
            .await?;
        let row = client.query_opt(&statement, &[account_id]).await?;
        row.map(|r| row_to_account(&r)).transpose()
    }

    async fn update_password(&self, account_id: &Uuid, hash: &[u8], salt: &[u8]) -> Result<()> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached("UPDATE accounts SET hash = $1, salt = $2 WHERE uuid = $3")
            .await?;
        let updated = client.execute(&statement, &[&hash, &salt, account_id]).await?;

        if updated == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn update_last_login(&self, account_id: &Uuid, at: DateTime<Utc>) -> Result<()> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached("UPDATE accounts SET last_logged_in = $1, last_activity = $1 WHERE uuid = $2")
            .await?;
        client.execute(&statement, &[&at, account_id]).await?;
        Ok(())
    }

    async fn update_last_activity(&self, account_id: &Uuid, at: DateTime<Utc>) -> Result<()> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached("UPDATE accounts SET last_activity = $1 WHERE uuid = $2")
            .await?;
        client.execute(&statement, &[&at, account_id]).await?;
        Ok(())
    }

    async fn set_banned(&self, account_id: &Uuid, banned: bool) -> Result<()> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached("UPDATE accounts SET banned = $1 WHERE uuid = $2")
            .await?;
        let updated = client.execute(&statement, &[&banned, account_id]).await?;

        if updated == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn count_active_since(&self, since: DateTime<Utc>) -> Result<i64> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached("SELECT COUNT(*) AS active FROM accounts WHERE last_activity >= $1")
            .await?;
        let row = client.query_one(&statement, &[&since]).await?;
        row.try_get("active").map_err(|_| AppError::MissingData("active".to_string()))
    }

    async fn upsert_stats(&self, account_id: &Uuid, stats: &AccountStats) -> Result<()> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached(
                r#"
                INSERT INTO account_stats (
                    uuid, play_time, battles, classic_sessions_played, sessions_won,
                    highest_endless_wave, highest_level, pokemon_seen, pokemon_defeated,
                    pokemon_caught, pokemon_hatched, eggs_pulled,
                    regular_vouchers, plus_vouchers, premium_vouchers, golden_vouchers
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
                ON CONFLICT (uuid) DO UPDATE SET
                    play_time = EXCLUDED.play_time,
                    battles = EXCLUDED.battles,
                    classic_sessions_played = EXCLUDED.classic_sessions_played,
                    sessions_won = EXCLUDED.sessions_won,
                    highest_endless_wave = EXCLUDED.highest_endless_wave,
                    highest_level = EXCLUDED.highest_level,
                    pokemon_seen = EXCLUDED.pokemon_seen,
                    pokemon_defeated = EXCLUDED.pokemon_defeated,
                    pokemon_caught = EXCLUDED.pokemon_caught,
                    pokemon_hatched = EXCLUDED.pokemon_hatched,
                    eggs_pulled = EXCLUDED.eggs_pulled,
                    regular_vouchers = EXCLUDED.regular_vouchers,
                    plus_vouchers = EXCLUDED.plus_vouchers,
                    premium_vouchers = EXCLUDED.premium_vouchers,
                    golden_vouchers = EXCLUDED.golden_vouchers
                "#,
            )
            .await?;

        client
            .execute(
                &statement,
                &[
                    account_id,
                    &stats.play_time,
                    &stats.battles,
                    &stats.classic_sessions_played,
                    &stats.sessions_won,
                    &stats.highest_endless_wave,
                    &stats.highest_level,
                    &stats.pokemon_seen,
                    &stats.pokemon_defeated,
                    &stats.pokemon_caught,
                    &stats.pokemon_hatched,
                    &stats.eggs_pulled,
                    &stats.regular_vouchers,
                    &stats.plus_vouchers,
                    &stats.premium_vouchers,
                    &stats.golden_vouchers,
                ],
            )
            .await?;
        Ok(())
    }

    async fn insert_token(&self, token: &SessionToken, account_id: &Uuid, expires_at: DateTime<Utc>) -> Result<()> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached("INSERT INTO sessions (token, uuid, expire) VALUES ($1, $2, $3)")
            .await?;
        let token_bytes: &[u8] = token.as_bytes();
        client
            .execute(&statement, &[&token_bytes, account_id, &expires_at])
            .await?;
        Ok(())
    }

    async fn find_token(&self, token: &SessionToken) -> Result<Option<ResolvedSession>> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached(
                r#"
                SELECT a.uuid, a.username, s.expire
                FROM sessions s
                JOIN accounts a ON a.uuid = s.uuid
                WHERE s.token = $1
                "#,
            )
            .await?;
        let token_bytes: &[u8] = token.as_bytes();
        let row = client.query_opt(&statement, &[&token_bytes]).await?;

        row.map(|r| {
            Ok(ResolvedSession {
                account_id: r.try_get("uuid").map_err(|_| AppError::MissingData("uuid".to_string()))?,
                username: r.try_get("username").map_err(|_| AppError::MissingData("username".to_string()))?,
                expires_at: r.try_get("expire").map_err(|_| AppError::MissingData("expire".to_string()))?,
            })
        })
        .transpose()
    }

    async fn delete_token(&self, token: &SessionToken) -> Result<bool> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached("DELETE FROM sessions WHERE token = $1")
            .await?;
        let token_bytes: &[u8] = token.as_bytes();
        let deleted = client.execute(&statement, &[&token_bytes]).await?;
        Ok(deleted > 0)
    }

    async fn delete_expired_tokens(&self, now: DateTime<Utc>) -> Result<u64> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached("DELETE FROM sessions WHERE expire <= $1")
            .await?;
        Ok(client.execute(&statement, &[&now]).await?)
    }
}
