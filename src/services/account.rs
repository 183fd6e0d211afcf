use chrono::{Duration, Utc};
use futures::future::join_all;
use uuid::Uuid;

use crate::error::Result;
use crate::models::account::{AccountInfo, AccountStats};
use crate::models::savedata::{SESSION_SLOT_COUNT, SystemSave};
use crate::repositories::cache::ACTIVE_WINDOW_SECS;
use crate::services::savedata;
use crate::state::AppState;

/// Records authenticated activity for an account.
///
/// Best-effort: failures are logged and never surface to the caller.
pub async fn touch_activity(state: &AppState, account_id: &Uuid) {
    if let Err(e) = state.accounts.update_last_activity(account_id, Utc::now()).await {
        tracing::warn!("⚠️  Failed to update last activity for {}: {}", account_id, e);
    }

    if let Some(cache) = &state.cache {
        if let Err(e) = cache.mark_active(account_id).await {
            tracing::warn!("⚠️  Failed to mark {} active: {}", account_id, e);
        }
    }
}

/// Summary of an account: its username and the most recently saved session slot.
///
/// Slots are read concurrently. A slot that cannot be read is skipped.
pub async fn account_info(state: &AppState, account_id: &Uuid, username: &str) -> Result<AccountInfo> {
    let reads = (0..SESSION_SLOT_COUNT).map(|slot| async move {
        (slot, savedata::get_session(state, account_id, slot).await)
    });

    let mut last_session_slot = -1;
    let mut latest = i64::MIN;
    for (slot, result) in join_all(reads).await {
        match result {
            Ok(save) if save.timestamp > latest => {
                latest = save.timestamp;
                last_session_slot = slot;
            }
            Ok(_) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => tracing::debug!("Skipping unreadable slot {} for {}: {}", slot, account_id, e),
        }
    }

    Ok(AccountInfo {
        username: username.to_string(),
        last_session_slot,
    })
}

/// Number of players active within the last five minutes.
///
/// Served by the cache when one is configured; falls back to the account table.
pub async fn active_player_count(state: &AppState) -> Result<i64> {
    if let Some(cache) = &state.cache {
        match cache.active_players().await {
            Ok(count) => return Ok(count),
            Err(e) => tracing::warn!("⚠️  Active player cache unavailable: {}", e),
        }
    }

    let since = Utc::now() - Duration::seconds(ACTIVE_WINDOW_SECS);
    state.accounts.count_active_since(since).await
}

pub async fn set_banned(state: &AppState, account_id: &Uuid, banned: bool) -> Result<()> {
    state.accounts.set_banned(account_id, banned).await?;
    tracing::info!("🔨 Account {} banned = {}", account_id, banned);
    Ok(())
}

/// Pulls the aggregate counters out of a system save.
///
/// Counters missing from the game stats read as zero. Voucher counts are keyed
/// by tier index: `"0"` regular, `"1"` plus, `"2"` premium, `"3"` golden.
pub fn stats_from_save(save: &SystemSave) -> AccountStats {
    let stat = |key: &str| save.game_stats.get_i64(key).unwrap_or(0);
    let vouchers = |tier: &str| save.voucher_counts.get(tier).copied().unwrap_or(0);

    AccountStats {
        play_time: stat("playTime"),
        battles: stat("battles"),
        classic_sessions_played: stat("classicSessionsPlayed"),
        sessions_won: stat("sessionsWon"),
        highest_endless_wave: stat("highestEndlessWave"),
        highest_level: stat("highestLevel"),
        pokemon_seen: stat("pokemonSeen"),
        pokemon_defeated: stat("pokemonDefeated"),
        pokemon_caught: stat("pokemonCaught"),
        pokemon_hatched: stat("pokemonHatched"),
        eggs_pulled: stat("eggsPulled"),
        regular_vouchers: vouchers("0"),
        plus_vouchers: vouchers("1"),
        premium_vouchers: vouchers("2"),
        golden_vouchers: vouchers("3"),
    }
}
