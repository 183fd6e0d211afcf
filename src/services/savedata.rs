//! Save-data storage engine.
//!
//! Blobs live at `userdata/<hex identity>/<name>.pzs`, where `<name>` is
//! `system`, `session` for slot 0 or `session<slot>` for later slots.
//! Validation runs before any storage call; every mutation touches the
//! account's activity afterwards.

use uuid::Uuid;

use crate::codec::{self, SaveData};
use crate::error::{AppError, Result};
use crate::models::savedata::{SessionSave, SystemSave};
use crate::services::{account, ranking};
use crate::state::AppState;
use crate::validation::savedata::{validate_slot, validate_system_save};

const BLOB_EXTENSION: &str = "pzs";

/// Directory holding every blob of an account.
pub fn account_dir(account_id: &Uuid) -> String {
    format!("userdata/{}", hex::encode(account_id.as_bytes()))
}

pub fn system_key(account_id: &Uuid) -> String {
    format!("{}/system.{}", account_dir(account_id), BLOB_EXTENSION)
}

/// Blob key of a session slot. The slot must already be validated.
pub fn session_key(account_id: &Uuid, slot: i32) -> String {
    if slot == 0 {
        format!("{}/session.{}", account_dir(account_id), BLOB_EXTENSION)
    } else {
        format!("{}/session{}.{}", account_dir(account_id), slot, BLOB_EXTENSION)
    }
}

async fn load<T: SaveData>(state: &AppState, key: &str) -> Result<T> {
    let bytes = state.blobs.get(key).await?.ok_or(AppError::NotFound)?;
    codec::decode(&bytes)
}

async fn store<T: SaveData>(state: &AppState, key: &str, save: &T) -> Result<()> {
    // Fully encoded before the store is touched.
    let bytes = codec::encode(save)?;
    state.blobs.put(key, &bytes).await
}

/// Reads the account's system save.
///
/// # Returns
///
/// A `Result` containing the `SystemSave`, `AppError::NotFound` if none was
/// ever written, or `AppError::Corrupt` if the blob cannot be decoded.
pub async fn get_system(state: &AppState, account_id: &Uuid) -> Result<SystemSave> {
    load(state, &system_key(account_id)).await
}

/// Validates and stores the account's system save, refreshing its statistics.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `account_id` - The owning account.
/// * `save` - The new system save.
///
/// # Returns
///
/// An empty `Result`. Nothing is written when validation fails.
pub async fn update_system(state: &AppState, account_id: &Uuid, save: &SystemSave) -> Result<()> {
    validate_system_save(save, &state.config.game_version)?;

    let stats = account::stats_from_save(save);
    state.accounts.upsert_stats(account_id, &stats).await?;

    store(state, &system_key(account_id), save).await?;
    tracing::debug!("💾 System save updated for {}", account_id);

    account::touch_activity(state, account_id).await;
    Ok(())
}

pub async fn delete_system(state: &AppState, account_id: &Uuid) -> Result<()> {
    state.blobs.delete(&system_key(account_id)).await?;
    tracing::debug!("🗑️  System save deleted for {}", account_id);

    account::touch_activity(state, account_id).await;
    Ok(())
}

/// Reads one session slot.
pub async fn get_session(state: &AppState, account_id: &Uuid, slot: i32) -> Result<SessionSave> {
    validate_slot(slot)?;
    load(state, &session_key(account_id, slot)).await
}

pub async fn update_session(state: &AppState, account_id: &Uuid, slot: i32, save: &SessionSave) -> Result<()> {
    validate_slot(slot)?;

    store(state, &session_key(account_id, slot), save).await?;
    tracing::debug!("💾 Session slot {} updated for {}", slot, account_id);

    account::touch_activity(state, account_id).await;
    Ok(())
}

/// Removes one session slot. A slot that was never written is not an error.
pub async fn delete_session(state: &AppState, account_id: &Uuid, slot: i32) -> Result<()> {
    validate_slot(slot)?;

    state.blobs.delete(&session_key(account_id, slot)).await?;
    tracing::debug!("🗑️  Session slot {} deleted for {}", slot, account_id);

    account::touch_activity(state, account_id).await;
    Ok(())
}

/// Ends a run: records its result against today's seed, then frees the slot
/// whether or not the run was complete.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `account_id` - The owning account.
/// * `slot` - The slot the run occupied.
/// * `today_seed` - Today's daily seed.
/// * `save` - The final state of the run.
///
/// # Returns
///
/// A `Result` containing `true` if this was the account's first completion
/// of the run's seed in its mode.
pub async fn clear(
    state: &AppState,
    account_id: &Uuid,
    slot: i32,
    today_seed: &str,
    save: &SessionSave,
) -> Result<bool> {
    validate_slot(slot)?;

    let new_completion = ranking::record_clear(state, account_id, save, today_seed).await?;

    state.blobs.delete(&session_key(account_id, slot)).await?;
    tracing::info!(
        "🏁 Slot {} cleared for {} (wave {}, new completion: {})",
        slot,
        account_id,
        save.wave_index,
        new_completion
    );

    account::touch_activity(state, account_id).await;
    Ok(new_completion)
}
