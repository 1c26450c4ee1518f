//! Single-use authentication challenges.
//!
//! A challenge binds one verification attempt to one user, one purpose, and
//! one moment in time. Challenges are consumed on the first verification
//! attempt regardless of outcome, so a captured assertion can never be
//! replayed against the same challenge.

use crate::signing::SignError;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Number of random bytes in a challenge. The protocol floor is 16; we issue
/// 32 to match the entropy of the signing keys.
pub const CHALLENGE_LEN: usize = 32;

/// What an issued challenge may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    Login,
    Sign,
}

impl Purpose {
    pub fn as_str(&self) -> &'static str {
        // ---
        match self {
            Purpose::Login => "login",
            Purpose::Sign => "sign",
        }
    }
}

/// An outstanding single-use challenge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    // ---
    pub user_id: Uuid,
    pub purpose: Purpose,
    pub bytes: Vec<u8>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Challenge {
    /// Create a fresh random challenge expiring `ttl_secs` from now.
    pub fn generate(user_id: Uuid, purpose: Purpose, ttl_secs: u64) -> Self {
        // ---
        let mut bytes = vec![0u8; CHALLENGE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);

        let issued_at = Utc::now();
        Self {
            user_id,
            purpose,
            bytes,
            issued_at,
            expires_at: issued_at + Duration::seconds(ttl_secs as i64),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        // ---
        now >= self.expires_at
    }
}

/// Store of outstanding challenges, keyed by (user, purpose).
///
/// Contract:
/// - `issue` replaces any prior outstanding challenge for the same
///   (user, purpose) pair: last-issued-wins.
/// - `consume` is an atomic test-and-clear. The stored challenge is removed
///   on any attempt, and concurrent consumes for the same key yield at most
///   one success. Expired-but-present challenges behave exactly like
///   missing ones.
#[async_trait::async_trait]
pub trait ChallengeStore: Send + Sync {
    // ---
    async fn issue(
        &self,
        user_id: Uuid,
        purpose: Purpose,
        ttl_secs: u64,
    ) -> Result<Challenge, SignError>;

    async fn consume(
        &self,
        user_id: Uuid,
        purpose: Purpose,
        presented: &[u8],
    ) -> Result<Challenge, SignError>;
}

/// In-process challenge store: a mutex-held map.
///
/// Single-process reference implementation; production deployments use the
/// Redis-backed store so challenges survive restarts and are shared across
/// processes.
#[derive(Default)]
pub struct MemoryChallengeStore {
    // ---
    entries: Mutex<HashMap<(Uuid, Purpose), Challenge>>,
}

impl MemoryChallengeStore {
    // ---
    pub fn new() -> Self {
        // ---
        Self::default()
    }
}

#[async_trait::async_trait]
impl ChallengeStore for MemoryChallengeStore {
    // ---
    async fn issue(
        &self,
        user_id: Uuid,
        purpose: Purpose,
        ttl_secs: u64,
    ) -> Result<Challenge, SignError> {
        // ---
        let challenge = Challenge::generate(user_id, purpose, ttl_secs);

        let mut entries = self.entries.lock().expect("challenge store poisoned");
        entries.insert((user_id, purpose), challenge.clone());

        Ok(challenge)
    }

    async fn consume(
        &self,
        user_id: Uuid,
        purpose: Purpose,
        presented: &[u8],
    ) -> Result<Challenge, SignError> {
        // ---
        // Remove unconditionally: a challenge is burned by its first
        // verification attempt whether or not that attempt succeeds.
        let stored = {
            let mut entries = self.entries.lock().expect("challenge store poisoned");
            entries.remove(&(user_id, purpose))
        };

        let challenge = stored.ok_or(SignError::ChallengeExpiredOrMissing)?;

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

/// Type alias for any backend that implements ChallengeStore.
pub type ChallengeStorePtr = std::sync::Arc<dyn ChallengeStore>;
