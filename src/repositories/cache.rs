use async_trait::async_trait;
use chrono::Utc;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use uuid::Uuid;

use crate::crypto::token::SessionToken;
use crate::error::{AppError, Result};
use crate::models::session::ResolvedSession;
use crate::store::SessionCache;

/// Window within which a player counts as active, in seconds.
pub const ACTIVE_WINDOW_SECS: i64 = 300;

const ACTIVE_PLAYERS_KEY: &str = "active_players";

/// Redis-backed session and activity cache.
#[derive(Clone)]
pub struct RedisCache {
    redis: ConnectionManager,
}

impl RedisCache {
    /// Connects to the Redis server at `redis_url`.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;
        Ok(Self { redis })
    }

    fn session_key(token: &SessionToken) -> String {
        format!("session:{}", hex::encode(token.as_bytes()))
    }
}

#[async_trait]
impl SessionCache for RedisCache {
    async fn get_session(&self, token: &SessionToken) -> Result<Option<ResolvedSession>> {
        let mut redis = self.redis.clone();
        let cached: Option<Vec<u8>> = redis.get(Self::session_key(token)).await?;

        let Some(bytes) = cached else {
            return Ok(None);
        };

        let (session, _) = bincode::serde::decode_from_slice::<ResolvedSession, _>(
            &bytes,
            bincode::config::standard(),
        )
        .map_err(|e| AppError::Internal(format!("Cached session decode failed: {}", e)))?;

        Ok(Some(session))
    }

    async fn put_session(&self, token: &SessionToken, session: &ResolvedSession, ttl_secs: u64) -> Result<()> {
        if ttl_secs == 0 {
            return Ok(());
        }

        let bytes = bincode::serde::encode_to_vec(session, bincode::config::standard())
            .map_err(|e| AppError::Internal(format!("Session serialization failed: {}", e)))?;

        let mut redis = self.redis.clone();
        let _: () = redis.set_ex(Self::session_key(token), bytes, ttl_secs).await?;
        Ok(())
    }

    async fn evict_session(&self, token: &SessionToken) -> Result<()> {
        let mut redis = self.redis.clone();
        let _: () = redis.del(Self::session_key(token)).await?;
        Ok(())
    }

    async fn mark_active(&self, account_id: &Uuid) -> Result<()> {
        let now = Utc::now().timestamp();
        let mut redis = self.redis.clone();
        let _: () = redis
            .zadd(ACTIVE_PLAYERS_KEY, hex::encode(account_id.as_bytes()), now)
            .await?;
        let _: () = redis
            .zrembyscore(ACTIVE_PLAYERS_KEY, "-inf", now - ACTIVE_WINDOW_SECS)
            .await?;
        Ok(())
    }

    async fn active_players(&self) -> Result<i64> {
        let since = Utc::now().timestamp() - ACTIVE_WINDOW_SECS;
        let mut redis = self.redis.clone();
        let count: i64 = redis.zcount(ACTIVE_PLAYERS_KEY, since, "+inf").await?;
        Ok(count)
    }
}
