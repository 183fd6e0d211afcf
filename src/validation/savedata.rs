use crate::error::{AppError, Result};
use crate::models::savedata::{SESSION_SLOT_COUNT, SystemSave};

/// Rejects slots outside `[0, SESSION_SLOT_COUNT)`.
pub fn validate_slot(slot: i32) -> Result<()> {
    if !(0..SESSION_SLOT_COUNT).contains(&slot) {
        return Err(AppError::Validation(format!(
            "slot {} out of range (0..{})",
            slot, SESSION_SLOT_COUNT
        )));
    }
    Ok(())
}

/// Checks a system save before it is allowed to overwrite the stored one.
///
/// Both trainer identities at zero marks an uninitialized or corrupt save.
pub fn validate_system_save(save: &SystemSave, expected_version: &str) -> Result<()> {
    if save.trainer_id == 0 && save.secret_id == 0 {
        return Err(AppError::Validation("invalid system data".to_string()));
    }

    if save.game_version != expected_version {
        return Err(AppError::VersionMismatch {
            expected: expected_version.to_string(),
            actual: save.game_version.clone(),
        });
    }

    Ok(())
}
