use chrono::Utc;
use uuid::Uuid;

use crate::crypto::token::{self, SessionToken};
use crate::error::{AppError, Result};
use crate::models::account::Account;
use crate::models::session::ResolvedSession;
use crate::state::AppState;
use crate::validation::auth::{validate_password, validate_username};

/// Upper bound on how long a resolved session stays in the cache, in seconds.
const SESSION_CACHE_TTL_SECS: i64 = 3600;

/// Registers a new account.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `username` - The requested username.
/// * `password` - The account's password.
///
/// # Returns
///
/// A `Result` containing the new account's identity.
pub async fn register(state: &AppState, username: &str, password: &str) -> Result<Uuid> {
    validate_username(username)?;
    validate_password(password)?;

    tracing::debug!("🔐 Registering account: {}", username);

    // Cheap pre-check so a taken name does not cost a derivation.
    // The repository's uniqueness constraint still decides races.
    if state.accounts.find_by_username(username).await?.is_some() {
        tracing::warn!("❌ Username already taken: {}", username);
        return Err(AppError::Conflict("username is already taken".to_string()));
    }

    let salt = token::generate_salt();
    let key = state.kdf.derive(password, &salt).await?;

    let account = Account::new(Uuid::new_v4(), username.to_string(), key.to_vec(), salt.to_vec());
    state.accounts.insert_account(&account).await?;

    tracing::info!("✅ Account registered with ID: {}", account.id);
    Ok(account.id)
}

/// Authenticates an account and issues a session token.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `username` - The account's username.
/// * `password` - The account's password.
///
/// # Returns
///
/// A `Result` containing the new `SessionToken`.
pub async fn login(state: &AppState, username: &str, password: &str) -> Result<SessionToken> {
    validate_username(username)?;
    validate_password(password)?;

    tracing::debug!("🔐 Login attempt: {}", username);

    let account = state
        .accounts
        .find_by_username(username)
        .await?
        .ok_or(AppError::NotFound)?;

    if !state
        .kdf
        .verify(password, &account.password_salt, &account.password_hash)
        .await?
    {
        tracing::warn!("❌ Password mismatch for account: {}", account.id);
        return Err(AppError::Unauthorized("password does not match".to_string()));
    }

    let now = Utc::now();
    let session_token = SessionToken::generate();
    let expires_at = now + state.config.session_duration();

    state
        .accounts
        .insert_token(&session_token, &account.id, expires_at)
        .await?;

    if let Err(e) = state.accounts.update_last_login(&account.id, now).await {
        tracing::warn!("⚠️  Failed to update last login for {}: {}", account.id, e);
    }

    tracing::info!("✅ Account logged in: {}", account.id);
    Ok(session_token)
}

/// Revokes a session token.
///
/// Fails with `AppError::NotFound` when the token does not exist; callers
/// that want idempotent logout can check [`AppError::is_not_found`].
pub async fn logout(state: &AppState, session_token: &SessionToken) -> Result<()> {
    // A stale cache entry would keep the token alive, so eviction failures propagate.
    // Evicting again after the delete drops anything a concurrent resolve
    // cached while the row still existed.
    if let Some(cache) = &state.cache {
        cache.evict_session(session_token).await?;
    }

    let existed = state.accounts.delete_token(session_token).await?;

    if let Some(cache) = &state.cache {
        cache.evict_session(session_token).await?;
    }

    if !existed {
        tracing::debug!("Logout for unknown session token");
        return Err(AppError::NotFound);
    }

    tracing::info!("👋 Session revoked");
    Ok(())
}

/// Resolves the wire form of a token to its account.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `encoded` - The token as sent by the client.
///
/// # Returns
///
/// A `Result` containing the `ResolvedSession`, or `AppError::Unauthorized`
/// if the token is malformed, unknown or expired.
pub async fn resolve_token(state: &AppState, encoded: &str) -> Result<ResolvedSession> {
    let session_token = SessionToken::parse(encoded)?;
    resolve(state, &session_token).await
}

/// Resolves a parsed token to its account.
pub async fn resolve(state: &AppState, session_token: &SessionToken) -> Result<ResolvedSession> {
    let now = Utc::now();

    if let Some(cache) = &state.cache {
        match cache.get_session(session_token).await {
            Ok(Some(session)) if !session.is_expired_at(now) => return Ok(session),
            Ok(_) => {}
            Err(e) => tracing::warn!("⚠️  Session cache lookup failed: {}", e),
        }
    }

    let session = state
        .accounts
        .find_token(session_token)
        .await?
        .ok_or_else(|| AppError::Unauthorized("unknown session token".to_string()))?;

    if session.is_expired_at(now) {
        tracing::debug!("Session expired for account: {}", session.account_id);
        if let Err(e) = state.accounts.delete_token(session_token).await {
            tracing::warn!("⚠️  Failed to delete expired session: {}", e);
        }
        return Err(AppError::Unauthorized("session expired".to_string()));
    }

    if let Some(cache) = &state.cache {
        let ttl = (session.expires_at - now)
            .num_seconds()
            .clamp(0, SESSION_CACHE_TTL_SECS) as u64;
        if let Err(e) = cache.put_session(session_token, &session, ttl).await {
            tracing::warn!("⚠️  Failed to cache session: {}", e);
        }
    }

    Ok(session)
}

/// Replaces an account's password with a freshly salted derivation.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `account_id` - The account's identity.
/// * `new_password` - The new password.
///
/// # Returns
///
/// An empty `Result`.
pub async fn change_password(state: &AppState, account_id: &Uuid, new_password: &str) -> Result<()> {
    validate_password(new_password)?;

    let salt = token::generate_salt();
    let key = state.kdf.derive(new_password, &salt).await?;

    state
        .accounts
        .update_password(account_id, key.as_slice(), &salt)
        .await?;

    tracing::info!("✅ Password changed for account: {}", account_id);
    Ok(())
}

/// Deletes every expired session token.
pub async fn purge_expired_sessions(state: &AppState) -> Result<u64> {
    let removed = state.accounts.delete_expired_tokens(Utc::now()).await?;
    tracing::info!("🧹 Removed {} expired session(s)", removed);
    Ok(removed)
}
