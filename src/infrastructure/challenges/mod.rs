//! Redis-backed challenge store.
//!
//! Challenges are ephemeral secrets with a native TTL, shared across
//! processes. `SET` with expiry gives last-issued-wins per (user, purpose);
//! `GETDEL` makes consume an atomic test-and-clear, so concurrent consume
//! calls for the same key yield at most one success even across processes.

use crate::signing::{Challenge, ChallengeStore, Purpose, SignError};
use anyhow::Context;
use chrono::Utc;
use redis::{AsyncCommands, Client};
use std::sync::Arc;
use uuid::Uuid;

/// Creates a Redis-backed challenge store.
pub fn create_redis_challenge_store(client: Client) -> Arc<RedisChallengeStore> {
    // ---
    Arc::new(RedisChallengeStore::new(client))
}

pub struct RedisChallengeStore {
    // ---
    client: Client,
}

impl RedisChallengeStore {
    // ---
    pub fn new(client: Client) -> Self {
        // ---
        Self { client }
    }

    fn key(user_id: Uuid, purpose: Purpose) -> String {
        // ---
        format!("challenge:{}:{}", purpose.as_str(), user_id)
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection, SignError> {
        // ---
        self.client
            .get_multiplexed_async_connection()
            .await
            .context("failed to connect to Redis")
            .map_err(SignError::Storage)
    }
}

#[async_trait::async_trait]
impl ChallengeStore for RedisChallengeStore {
    // ---
    async fn issue(
        &self,
        user_id: Uuid,
        purpose: Purpose,
        ttl_secs: u64,
    ) -> Result<Challenge, SignError> {
        // ---
        let challenge = Challenge::generate(user_id, purpose, ttl_secs);
        let payload = serde_json::to_vec(&challenge)
            .context("failed to serialize challenge")
            .map_err(SignError::Storage)?;

        let mut conn = self.conn().await?;
        // SET with expiry replaces any outstanding challenge for this key.
        conn.set_ex::<_, _, ()>(Self::key(user_id, purpose), payload, ttl_secs)
            .await
            .context("failed to store challenge in Redis")
            .map_err(SignError::Storage)?;

        Ok(challenge)
    }

    async fn consume(
        &self,
        user_id: Uuid,
        purpose: Purpose,
        presented: &[u8],
    ) -> Result<Challenge, SignError> {
        // ---
        let mut conn = self.conn().await?;

        // GETDEL burns the challenge atomically on this attempt, whatever
        // the outcome of the checks below.
        let payload: Option<Vec<u8>> = conn
            .get_del(Self::key(user_id, purpose))
            .await
            .context("failed to consume challenge from Redis")
            .map_err(SignError::Storage)?;

        let payload = payload.ok_or(SignError::ChallengeExpiredOrMissing)?;
        let challenge: Challenge = serde_json::from_slice(&payload)
            .context("failed to deserialize stored challenge")
            .map_err(SignError::Storage)?;

        // Redis TTL already expires the key, but an entry caught between
        // logical expiry and eviction must behave like a missing one.
        if challenge.is_expired(Utc::now()) {
            tracing::warn!("Expired challenge presented for user {}", user_id);
            return Err(SignError::ChallengeExpiredOrMissing);
        }
        if challenge.bytes != presented {
            tracing::warn!("Challenge mismatch for user {}", user_id);
            return Err(SignError::ChallengeExpiredOrMissing);
        }

        Ok(challenge)
    }
}
