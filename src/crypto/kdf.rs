//! Memory-hard password key derivation behind a fixed-size admission gate.
//!
//! With the production parameters each derivation holds 256 MiB for its
//! duration, so at most `max_concurrent` of them may run at once. Callers
//! beyond that wait for a permit. The permit is moved into the blocking task
//! and dropped when it ends, including when the hash panics.

use std::sync::Arc;

use argon2::{Algorithm, Argon2, Params, Version};
use subtle::ConstantTimeEq;
use tokio::sync::Semaphore;
use zeroize::Zeroizing;

use crate::config::KdfSettings;
use crate::error::{AppError, Result};

/// Length of a derived key in bytes.
pub const KEY_LEN: usize = 32;

/// A derived password key, zeroized on drop.
pub type DerivedKey = Zeroizing<[u8; KEY_LEN]>;

/// Bounded Argon2id key derivation.
#[derive(Clone)]
pub struct KeyDerivationGate {
    semaphore: Arc<Semaphore>,
    params: Params,
    max_concurrent: usize,
}

impl KeyDerivationGate {
    /// Creates a new `KeyDerivationGate`.
    ///
    /// # Arguments
    ///
    /// * `settings` - Argon2 costs and the gate size.
    pub fn new(settings: &KdfSettings) -> Result<Self> {
        let params = Params::new(
            settings.memory_kib,
            settings.iterations,
            settings.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| AppError::Internal(format!("Argon2 params: {}", e)))?;

        if settings.max_concurrent == 0 {
            return Err(AppError::Internal(
                "key derivation gate needs at least one slot".to_string(),
            ));
        }

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(settings.max_concurrent)),
            params,
            max_concurrent: settings.max_concurrent,
        })
    }

    /// Derives the key for `password` and `salt`.
    ///
    /// Waits until a slot is free, then hashes on the blocking pool.
    pub async fn derive(&self, password: &str, salt: &[u8]) -> Result<DerivedKey> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| AppError::Internal("key derivation gate closed".to_string()))?;

        let params = self.params.clone();
        let password = Zeroizing::new(password.as_bytes().to_vec());
        let salt = salt.to_vec();

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let mut key = Zeroizing::new([0u8; KEY_LEN]);
            Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
                .hash_password_into(&password, &salt, &mut key[..])
                .map_err(|e| AppError::Internal(format!("Argon2 key derivation error: {}", e)))?;
            Ok(key)
        })
        .await
        .map_err(|e| AppError::Internal(format!("key derivation task failed: {}", e)))?
    }

    /// Derives the key for `password` and compares it with `expected` in constant time.
    pub async fn verify(&self, password: &str, salt: &[u8], expected: &[u8]) -> Result<bool> {
        let key = self.derive(password, salt).await?;
        Ok(bool::from(key[..].ct_eq(expected)))
    }

    /// Returns the number of free derivation slots.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Returns the gate size.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}
