//! Monotonic signature-counter replay defense.
//!
//! An authenticator reports a counter with every assertion. A verified
//! assertion whose counter has not advanced past the stored value means the
//! signature was produced by a clone or replayed, and must be rejected.
//! Authenticators that do not implement a counter report zero persistently;
//! that case is tolerated, not treated as replay.

use crate::domain::{Credential, CredentialRepositoryPtr};
use crate::signing::SignError;

pub struct ReplayGuard {
    // ---
    credentials: CredentialRepositoryPtr,
}

impl ReplayGuard {
    // ---
    pub fn new(credentials: CredentialRepositoryPtr) -> Self {
        // ---
        Self { credentials }
    }

    /// Validate the candidate counter and persist it.
    ///
    /// The counter is written before the caller may proceed to the state
    /// transition: a crash between verification and the counter update then
    /// burns the assertion instead of leaving it replayable. The cost is
    /// that a crash after this write but before the sign completes forces
    /// the user to request a fresh challenge, which is acceptable.
    pub async fn advance(
        &self,
        credential: &Credential,
        candidate_counter: u32,
    ) -> Result<i64, SignError> {
        // ---
        let candidate = i64::from(candidate_counter);

        // Counter-less authenticators stay at zero forever.
        if !(candidate == 0 && credential.counter == 0) && candidate <= credential.counter {
            tracing::error!(
                "Counter replay detected for credential {}: stored={}, candidate={}",
                hex::encode(&credential.id),
                credential.counter,
                candidate
            );
            return Err(SignError::ReplayDetected);
        }

        if candidate > credential.counter {
            self.credentials
                .update_counter(&credential.id, candidate)
                .await?;
        }

        Ok(candidate)
    }
}
