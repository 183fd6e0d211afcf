use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;

/// Number of entries per leaderboard page.
pub const RANKINGS_PAGE_SIZE: i64 = 10;

/// Leaderboard selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingCategory {
    /// Today's daily run, ranked by best score.
    Daily,
    /// Scores summed since the most recent UTC Sunday.
    Weekly,
}

impl TryFrom<i32> for RankingCategory {
    type Error = AppError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RankingCategory::Daily),
            1 => Ok(RankingCategory::Weekly),
            other => Err(AppError::Validation(format!("invalid ranking category {}", other))),
        }
    }
}

/// One row of a leaderboard page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ranking {
    pub rank: i64,
    pub username: String,
    pub score: i64,
    pub wave: i32,
}

/// An account's best result on one daily run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountDailyRun {
    pub account_id: Uuid,
    pub date: NaiveDate,
    pub score: i64,
    pub wave: i32,
    pub timestamp: DateTime<Utc>,
}
