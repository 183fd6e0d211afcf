use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use deadpool_postgres::Pool;
use tokio_postgres::Row;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::ranking::{AccountDailyRun, Ranking, RankingCategory},
    store::RankingRepository,
};

/// PostgreSQL-backed daily runs and leaderboards.
#[derive(Clone)]
pub struct PgRankingRepository {
    pool: Pool,
}

impl PgRankingRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

fn row_to_ranking(row: &Row) -> Result<Ranking> {
    Ok(Ranking {
        rank: row.try_get("rank").map_err(|_| AppError::MissingData("rank".to_string()))?,
        username: row.try_get("username").map_err(|_| AppError::MissingData("username".to_string()))?,
        score: row.try_get("score").map_err(|_| AppError::MissingData("score".to_string()))?,
        wave: row.try_get("wave").map_err(|_| AppError::MissingData("wave".to_string()))?,
    })
}

const DAILY_RANKINGS: &str = r#"
    SELECT
        RANK() OVER (ORDER BY r.score DESC, r.timestamp) AS rank,
        a.username,
        r.score,
        r.wave
    FROM account_daily_runs r
    JOIN accounts a ON a.uuid = r.uuid
    WHERE r.date = $1 AND a.banned = false
    ORDER BY rank, a.username
    LIMIT $2 OFFSET $3
"#;

const WEEKLY_RANKINGS: &str = r#"
    SELECT
        RANK() OVER (ORDER BY SUM(r.score) DESC, MIN(r.timestamp)) AS rank,
        a.username,
        SUM(r.score)::BIGINT AS score,
        MAX(r.wave) AS wave
    FROM account_daily_runs r
    JOIN accounts a ON a.uuid = r.uuid
    WHERE r.date >= $1 AND a.banned = false
    GROUP BY a.uuid, a.username
    ORDER BY rank, a.username
    LIMIT $2 OFFSET $3
"#;

const DAILY_ENTRIES: &str = r#"
    SELECT COUNT(*) AS entries
    FROM account_daily_runs r
    JOIN accounts a ON a.uuid = r.uuid
    WHERE r.date = $1 AND a.banned = false
"#;

const WEEKLY_ENTRIES: &str = r#"
    SELECT COUNT(DISTINCT r.uuid) AS entries
    FROM account_daily_runs r
    JOIN accounts a ON a.uuid = r.uuid
    WHERE r.date >= $1 AND a.banned = false
"#;

#[async_trait]
impl RankingRepository for PgRankingRepository {
    async fn insert_daily_run(&self, date: NaiveDate, seed: &str) -> Result<bool> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached("INSERT INTO daily_runs (date, seed) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .await?;
        let inserted = client.execute(&statement, &[&date, &seed]).await?;
        Ok(inserted > 0)
    }

    async fn daily_run_seed(&self, date: NaiveDate) -> Result<Option<String>> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached("SELECT seed FROM daily_runs WHERE date = $1")
            .await?;
        let row = client.query_opt(&statement, &[&date]).await?;
        row.map(|r| r.try_get("seed").map_err(|_| AppError::MissingData("seed".to_string())))
            .transpose()
    }

    async fn upsert_daily_result(
        &self,
        account_id: &Uuid,
        date: NaiveDate,
        score: i64,
        wave: i32,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let client = self.pool.get().await?;
        // SET expressions all read the pre-update row, so the timestamp check
        // sees the old score.
        let statement = client
            .prepare_cached(
                r#"
                INSERT INTO account_daily_runs (uuid, date, score, wave, timestamp)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (uuid, date) DO UPDATE SET
                    timestamp = CASE
                        WHEN EXCLUDED.score > account_daily_runs.score THEN EXCLUDED.timestamp
                        ELSE account_daily_runs.timestamp
                    END,
                    score = GREATEST(account_daily_runs.score, EXCLUDED.score),
                    wave = GREATEST(account_daily_runs.wave, EXCLUDED.wave)
                "#,
            )
            .await?;
        client
            .execute(&statement, &[account_id, &date, &score, &wave, &at])
            .await?;
        Ok(())
    }

    async fn daily_result(&self, account_id: &Uuid, date: NaiveDate) -> Result<Option<AccountDailyRun>> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached(
                "SELECT uuid, date, score, wave, timestamp FROM account_daily_runs WHERE uuid = $1 AND date = $2",
            )
            .await?;
        let row = client.query_opt(&statement, &[account_id, &date]).await?;

        row.map(|r| {
            Ok(AccountDailyRun {
                account_id: r.try_get("uuid").map_err(|_| AppError::MissingData("uuid".to_string()))?,
                date: r.try_get("date").map_err(|_| AppError::MissingData("date".to_string()))?,
                score: r.try_get("score").map_err(|_| AppError::MissingData("score".to_string()))?,
                wave: r.try_get("wave").map_err(|_| AppError::MissingData("wave".to_string()))?,
                timestamp: r.try_get("timestamp").map_err(|_| AppError::MissingData("timestamp".to_string()))?,
            })
        })
        .transpose()
    }

    async fn insert_seed_completion(&self, account_id: &Uuid, seed: &str, mode: i32, at: DateTime<Utc>) -> Result<bool> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached(
                r#"
                INSERT INTO seed_completions (uuid, seed, mode, timestamp)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT DO NOTHING
                "#,
            )
            .await?;
        let inserted = client
            .execute(&statement, &[account_id, &seed, &mode, &at])
            .await?;
        Ok(inserted > 0)
    }

    async fn rankings(&self, category: RankingCategory, since: NaiveDate, limit: i64, offset: i64) -> Result<Vec<Ranking>> {
        let query = match category {
            RankingCategory::Daily => DAILY_RANKINGS,
            RankingCategory::Weekly => WEEKLY_RANKINGS,
        };

        let client = self.pool.get().await?;
        let statement = client.prepare_cached(query).await?;
        let rows = client.query(&statement, &[&since, &limit, &offset]).await?;
        rows.iter().map(row_to_ranking).collect()
    }

    async fn ranking_entries(&self, category: RankingCategory, since: NaiveDate) -> Result<i64> {
        let query = match category {
            RankingCategory::Daily => DAILY_ENTRIES,
            RankingCategory::Weekly => WEEKLY_ENTRIES,
        };

        let client = self.pool.get().await?;
        let statement = client.prepare_cached(query).await?;
        let row = client.query_one(&statement, &[&since]).await?;
        row.try_get("entries").map_err(|_| AppError::MissingData("entries".to_string()))
    }
}
