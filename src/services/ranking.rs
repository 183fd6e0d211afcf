//! Run completion and leaderboards.

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::ranking::{RANKINGS_PAGE_SIZE, Ranking, RankingCategory};
use crate::models::savedata::{BattleType, GameMode, SessionSave};
use crate::state::AppState;

/// Final wave of a classic run.
pub const CLASSIC_FINAL_WAVE: i32 = 200;
/// Final wave of a daily run.
pub const DAILY_FINAL_WAVE: i32 = 50;

/// Whether a session save is a won run.
///
/// Only classic battles count, and only on the final wave of a classic or
/// daily run. Every other mode has no win condition.
pub fn is_session_complete(save: &SessionSave) -> bool {
    if save.battle_type != BattleType::Classic {
        return false;
    }

    match save.game_mode {
        GameMode::Classic => save.wave_index == CLASSIC_FINAL_WAVE,
        GameMode::Daily => save.wave_index == DAILY_FINAL_WAVE,
        _ => false,
    }
}

/// Records the outcome of a run. See [`record_clear_at`].
pub async fn record_clear(state: &AppState, account_id: &Uuid, save: &SessionSave, today_seed: &str) -> Result<bool> {
    record_clear_at(state, account_id, save, today_seed, Utc::now()).await
}

/// Records the outcome of a run at `now`.
///
/// A daily run on today's seed updates the account's daily result, keeping
/// the best score and wave. An unfinished run is credited with the last wave
/// it actually completed. That update is best-effort. A complete run is also
/// recorded as a seed completion, and failures there propagate.
///
/// # Returns
///
/// A `Result` containing `true` only if the run was complete and the account
/// had never completed that seed in that mode before.
pub async fn record_clear_at(
    state: &AppState,
    account_id: &Uuid,
    save: &SessionSave,
    today_seed: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let complete = is_session_complete(save);

    if save.game_mode == GameMode::Daily && save.seed == today_seed {
        let wave = if complete { save.wave_index } else { save.wave_index.saturating_sub(1) };
        match state
            .rankings
            .upsert_daily_result(account_id, now.date_naive(), save.score, wave, now)
            .await
        {
            Ok(()) => tracing::debug!("📈 Daily result recorded for {}: score {}, wave {}", account_id, save.score, wave),
            Err(e) => tracing::warn!("⚠️  Failed to record daily result for {}: {}", account_id, e),
        }
    }

    if !complete {
        return Ok(false);
    }

    let new_completion = state
        .rankings
        .insert_seed_completion(account_id, &save.seed, i32::from(save.game_mode), now)
        .await?;

    if new_completion {
        tracing::info!("🏆 First completion of seed for {}", account_id);
    }
    Ok(new_completion)
}

/// The most recent UTC Sunday on or before `today`.
pub fn week_start(today: NaiveDate) -> NaiveDate {
    today - Days::new(u64::from(today.weekday().num_days_from_sunday()))
}

fn ranking_since(category: RankingCategory, now: DateTime<Utc>) -> NaiveDate {
    let today = now.date_naive();
    match category {
        RankingCategory::Daily => today,
        RankingCategory::Weekly => week_start(today),
    }
}

/// One page of a leaderboard. See [`rankings_at`].
pub async fn rankings(state: &AppState, category: i32, page: i64) -> Result<Vec<Ranking>> {
    rankings_at(state, category, page, Utc::now()).await
}

/// One page of a leaderboard as of `now`.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `category` - `0` for today's runs, `1` for this week's totals.
/// * `page` - 1-based page number. Pages below 1 are treated as 1.
/// * `now` - The reference time.
///
/// # Returns
///
/// A `Result` containing up to ten `Ranking` rows.
pub async fn rankings_at(state: &AppState, category: i32, page: i64, now: DateTime<Utc>) -> Result<Vec<Ranking>> {
    let category = RankingCategory::try_from(category)?;
    let offset = (page.max(1) - 1).saturating_mul(RANKINGS_PAGE_SIZE);

    state
        .rankings
        .rankings(category, ranking_since(category, now), RANKINGS_PAGE_SIZE, offset)
        .await
}

/// Number of leaderboard pages. See [`ranking_page_count_at`].
pub async fn ranking_page_count(state: &AppState, category: i32) -> Result<i64> {
    ranking_page_count_at(state, category, Utc::now()).await
}

pub async fn ranking_page_count_at(state: &AppState, category: i32, now: DateTime<Utc>) -> Result<i64> {
    let category = RankingCategory::try_from(category)?;
    let entries = state
        .rankings
        .ranking_entries(category, ranking_since(category, now))
        .await?;

    Ok((entries + RANKINGS_PAGE_SIZE - 1) / RANKINGS_PAGE_SIZE)
}
