//! Assertion verification against a stored public key.
//!
//! The client answers a challenge by signing, with its private key, the
//! concatenation of its authenticator data and the SHA-256 hash of its
//! client data JSON (the WebAuthn assertion layout). Verification checks
//! the credential identity, the signature, the type discriminator, the
//! challenge binding, the origin, and the relying-party identifier, in
//! that order, each as a hard gate. The extracted signature counter is returned uncommitted; the
//! replay guard decides whether it may be persisted.

use crate::domain::Credential;
use crate::signing::SignError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::{Signature, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The type discriminator clients must embed when answering a signing or
/// login challenge (WebAuthn "get" ceremony).
pub const CLIENT_DATA_TYPE: &str = "webauthn.get";

/// Authenticator data layout: 32-byte RP-ID hash, 1 flag byte, 4-byte
/// big-endian counter.
const AUTH_DATA_LEN: usize = 37;

/// "User present" bit of the authenticator flags byte.
const FLAG_USER_PRESENT: u8 = 0x01;

/// A client-produced signed assertion, decoded from the wire.
#[derive(Debug, Clone)]
pub struct Assertion {
    // ---
    pub credential_id: Vec<u8>,
    pub client_data_json: Vec<u8>,
    pub authenticator_data: Vec<u8>,
    pub signature: Vec<u8>,
}

/// The JSON the client serializes into `client_data_json`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ClientData {
    // ---
    #[serde(rename = "type")]
    pub type_: String,

    /// base64url (unpadded) encoding of the challenge bytes.
    pub challenge: String,

    pub origin: String,
}

impl Assertion {
    /// Parse the embedded client data JSON.
    pub fn client_data(&self) -> Result<ClientData, SignError> {
        // ---
        serde_json::from_slice(&self.client_data_json)
            .map_err(|_| SignError::InvalidRequest("malformed client data".to_string()))
    }

    /// Decode the challenge bytes the client claims to be answering.
    pub fn presented_challenge(&self) -> Result<Vec<u8>, SignError> {
        // ---
        let client_data = self.client_data()?;
        URL_SAFE_NO_PAD
            .decode(client_data.challenge.as_bytes())
            .map_err(|_| SignError::InvalidRequest("malformed challenge encoding".to_string()))
    }
}

/// Parsed authenticator data fields.
#[derive(Debug, Clone, Copy)]
struct AuthenticatorData {
    // ---
    rp_id_hash: [u8; 32],
    flags: u8,
    counter: u32,
}

impl AuthenticatorData {
    fn parse(bytes: &[u8]) -> Result<Self, SignError> {
        // ---
        if bytes.len() < AUTH_DATA_LEN {
            return Err(SignError::InvalidRequest(
                "authenticator data too short".to_string(),
            ));
        }

        let mut rp_id_hash = [0u8; 32];
        rp_id_hash.copy_from_slice(&bytes[..32]);
        let flags = bytes[32];
        let counter = u32::from_be_bytes([bytes[33], bytes[34], bytes[35], bytes[36]]);

        Ok(Self {
            rp_id_hash,
            flags,
            counter,
        })
    }
}

/// Result of a successful verification. The counter is not yet committed.
#[derive(Debug, Clone, Copy)]
pub struct Verification {
    // ---
    pub new_counter: u32,
}

/// Verifies assertions against the relying party identity configured at
/// startup. Pure CPU-bound work; no I/O, no retries.
pub struct AssertionVerifier {
    // ---
    origin: String,
    rp_id_hash: [u8; 32],
}

impl AssertionVerifier {
    // ---
    pub fn new(rp_id: &str, origin: &str) -> Self {
        // ---
        let digest = Sha256::digest(rp_id.as_bytes());
        let mut rp_id_hash = [0u8; 32];
        rp_id_hash.copy_from_slice(&digest);

        Self {
            origin: origin.to_string(),
            rp_id_hash,
        }
    }

    /// Verify an assertion. `challenge` is the challenge the store just
    /// consumed for this attempt; the caller is responsible for having
    /// consumed it so that the attempt is single-use no matter how
    /// verification turns out.
    ///
    /// Gates, in order, each terminal for the attempt:
    /// 1. the assertion must name the registered credential,
    /// 2. the signed payload `authenticator_data || SHA-256(client_data)`
    ///    must verify under the credential's Ed25519 public key,
    /// 3. the client data type must be the "get" ceremony discriminator and
    ///    the user-present flag must be set,
    /// 4. the challenge embedded in the client data must equal the consumed
    ///    challenge bytes,
    /// 5. the origin and RP-ID hash must match the configured relying party.
    pub fn verify(
        &self,
        assertion: &Assertion,
        credential: &Credential,
        challenge: &[u8],
    ) -> Result<Verification, SignError> {
        // ---
        if assertion.credential_id != credential.id {
            return Err(SignError::SignatureInvalid);
        }

        let client_data = assertion.client_data()?;
        let auth_data = AuthenticatorData::parse(&assertion.authenticator_data)?;

        // Recompute the signed payload and verify the signature.
        let key_bytes: [u8; 32] = credential
            .public_key
            .as_slice()
            .try_into()
            .map_err(|_| SignError::SignatureInvalid)?;
        let verifying_key =
            VerifyingKey::from_bytes(&key_bytes).map_err(|_| SignError::SignatureInvalid)?;
        let signature =
            Signature::from_slice(&assertion.signature).map_err(|_| SignError::SignatureInvalid)?;

        let payload = signed_payload(&assertion.authenticator_data, &assertion.client_data_json);
        verifying_key
            .verify_strict(&payload, &signature)
            .map_err(|_| SignError::SignatureInvalid)?;

        if client_data.type_ != CLIENT_DATA_TYPE {
            return Err(SignError::SignatureInvalid);
        }
        if auth_data.flags & FLAG_USER_PRESENT == 0 {
            return Err(SignError::SignatureInvalid);
        }

        // The signature is over client data naming some challenge; it must
        // be the one this attempt consumed.
        let presented = URL_SAFE_NO_PAD
            .decode(client_data.challenge.as_bytes())
            .map_err(|_| SignError::ChallengeExpiredOrMissing)?;
        if presented != challenge {
            return Err(SignError::ChallengeExpiredOrMissing);
        }

        if client_data.origin != self.origin {
            tracing::warn!(
                "Origin mismatch: expected '{}', assertion carries '{}'",
                self.origin,
                client_data.origin
            );
            return Err(SignError::OriginMismatch);
        }
        if auth_data.rp_id_hash != self.rp_id_hash {
            return Err(SignError::RpIdMismatch);
        }

        Ok(Verification {
            new_counter: auth_data.counter,
        })
    }
}

/// The byte string the client signs: authenticator data followed by the
/// SHA-256 hash of the client data JSON.
pub fn signed_payload(authenticator_data: &[u8], client_data_json: &[u8]) -> Vec<u8> {
    // ---
    let mut payload = Vec::with_capacity(authenticator_data.len() + 32);
    payload.extend_from_slice(authenticator_data);
    payload.extend_from_slice(&Sha256::digest(client_data_json));
    payload
}

/// Build the authenticator data bytes for a given relying party and counter.
/// Used by clients and tests; the server only parses this layout.
pub fn build_authenticator_data(rp_id: &str, flags: u8, counter: u32) -> Vec<u8> {
    // ---
    let mut data = Vec::with_capacity(AUTH_DATA_LEN);
    data.extend_from_slice(&Sha256::digest(rp_id.as_bytes()));
    data.push(flags);
    data.extend_from_slice(&counter.to_be_bytes());
    data
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::Utc;
    use ed25519_dalek::{Signer, SigningKey};
    use uuid::Uuid;

    const RP_ID: &str = "invoices.example.com";
    const ORIGIN: &str = "https://invoices.example.com";

    fn signing_key() -> SigningKey {
        // ---
        SigningKey::from_bytes(&[7u8; 32])
    }

    fn credential_for(key: &SigningKey) -> Credential {
        // ---
        Credential {
            id: vec![1, 2, 3, 4],
            user_id: Uuid::new_v4(),
            public_key: key.verifying_key().to_bytes().to_vec(),
            counter: 0,
            created_at: Utc::now(),
        }
    }

    /// Produce a well-formed assertion the way a client authenticator would.
    fn make_assertion(
        key: &SigningKey,
        challenge: &[u8],
        origin: &str,
        rp_id: &str,
        counter: u32,
    ) -> Assertion {
        // ---
        let client_data = serde_json::to_vec(&ClientData {
            type_: CLIENT_DATA_TYPE.to_string(),
            challenge: URL_SAFE_NO_PAD.encode(challenge),
            origin: origin.to_string(),
        })
        .unwrap();

        let auth_data = build_authenticator_data(rp_id, FLAG_USER_PRESENT, counter);
        let signature = key.sign(&signed_payload(&auth_data, &client_data));

        Assertion {
            credential_id: vec![1, 2, 3, 4],
            client_data_json: client_data,
            authenticator_data: auth_data,
            signature: signature.to_bytes().to_vec(),
        }
    }

    #[test]
    fn valid_assertion_verifies_and_reports_counter() {
        // ---
        let key = signing_key();
        let credential = credential_for(&key);
        let challenge = [0x42u8; 32];

        let assertion = make_assertion(&key, &challenge, ORIGIN, RP_ID, 9);
        let verifier = AssertionVerifier::new(RP_ID, ORIGIN);

        let result = verifier.verify(&assertion, &credential, &challenge).unwrap();
        assert_eq!(result.new_counter, 9);
    }

    #[test]
    fn tampered_signature_fails() {
        // ---
        let key = signing_key();
        let credential = credential_for(&key);
        let challenge = [0x42u8; 32];

        let mut assertion = make_assertion(&key, &challenge, ORIGIN, RP_ID, 1);
        assertion.signature[0] ^= 0x01;

        let verifier = AssertionVerifier::new(RP_ID, ORIGIN);
        let err = verifier
            .verify(&assertion, &credential, &challenge)
            .unwrap_err();
        assert_eq!(err.code(), "signature_invalid");
    }

    #[test]
    fn wrong_key_fails() {
        // ---
        let key = signing_key();
        let other = SigningKey::from_bytes(&[9u8; 32]);
        let credential = credential_for(&other);
        let challenge = [0x42u8; 32];

        let assertion = make_assertion(&key, &challenge, ORIGIN, RP_ID, 1);
        let verifier = AssertionVerifier::new(RP_ID, ORIGIN);
        let err = verifier
            .verify(&assertion, &credential, &challenge)
            .unwrap_err();
        assert_eq!(err.code(), "signature_invalid");
    }

    #[test]
    fn wrong_credential_id_fails() {
        // ---
        let key = signing_key();
        let credential = credential_for(&key);
        let challenge = [0x42u8; 32];

        // Valid signature, but the assertion names a different credential.
        let mut assertion = make_assertion(&key, &challenge, ORIGIN, RP_ID, 1);
        assertion.credential_id = vec![9, 9, 9];

        let verifier = AssertionVerifier::new(RP_ID, ORIGIN);
        let err = verifier
            .verify(&assertion, &credential, &challenge)
            .unwrap_err();
        assert_eq!(err.code(), "signature_invalid");
    }

    #[test]
    fn tampered_counter_invalidates_signature() {
        // ---
        let key = signing_key();
        let credential = credential_for(&key);
        let challenge = [0x42u8; 32];

        let mut assertion = make_assertion(&key, &challenge, ORIGIN, RP_ID, 1);
        // Bump the counter bytes without re-signing.
        let len = assertion.authenticator_data.len();
        assertion.authenticator_data[len - 1] = 0xFF;

        let verifier = AssertionVerifier::new(RP_ID, ORIGIN);
        let err = verifier
            .verify(&assertion, &credential, &challenge)
            .unwrap_err();
        assert_eq!(err.code(), "signature_invalid");
    }

    #[test]
    fn wrong_origin_fails_with_origin_mismatch() {
        // ---
        let key = signing_key();
        let credential = credential_for(&key);
        let challenge = [0x42u8; 32];

        let assertion = make_assertion(&key, &challenge, "https://evil.example.com", RP_ID, 1);
        let verifier = AssertionVerifier::new(RP_ID, ORIGIN);
        let err = verifier
            .verify(&assertion, &credential, &challenge)
            .unwrap_err();
        assert_eq!(err.code(), "origin_mismatch");
    }

    #[test]
    fn wrong_rp_id_fails_with_rpid_mismatch() {
        // ---
        let key = signing_key();
        let credential = credential_for(&key);
        let challenge = [0x42u8; 32];

        let assertion = make_assertion(&key, &challenge, ORIGIN, "other.example.com", 1);
        let verifier = AssertionVerifier::new(RP_ID, ORIGIN);
        let err = verifier
            .verify(&assertion, &credential, &challenge)
            .unwrap_err();
        assert_eq!(err.code(), "rpid_mismatch");
    }

    #[test]
    fn challenge_substitution_fails() {
        // ---
        let key = signing_key();
        let credential = credential_for(&key);

        // Signed over one challenge, verified against another.
        let assertion = make_assertion(&key, &[0x42u8; 32], ORIGIN, RP_ID, 1);
        let verifier = AssertionVerifier::new(RP_ID, ORIGIN);
        let err = verifier
            .verify(&assertion, &credential, &[0x43u8; 32])
            .unwrap_err();
        assert_eq!(err.code(), "challenge_expired_or_missing");
    }

    #[test]
    fn wrong_type_discriminator_fails() {
        // ---
        let key = signing_key();
        let credential = credential_for(&key);
        let challenge = [0x42u8; 32];

        let client_data = serde_json::to_vec(&ClientData {
            type_: "webauthn.create".to_string(),
            challenge: URL_SAFE_NO_PAD.encode(challenge),
            origin: ORIGIN.to_string(),
        })
        .unwrap();
        let auth_data = build_authenticator_data(RP_ID, FLAG_USER_PRESENT, 1);
        let signature = key.sign(&signed_payload(&auth_data, &client_data));
        let assertion = Assertion {
            credential_id: vec![1, 2, 3, 4],
            client_data_json: client_data,
            authenticator_data: auth_data,
            signature: signature.to_bytes().to_vec(),
        };

        let verifier = AssertionVerifier::new(RP_ID, ORIGIN);
        let err = verifier
            .verify(&assertion, &credential, &challenge)
            .unwrap_err();
        assert_eq!(err.code(), "signature_invalid");
    }

    #[test]
    fn truncated_authenticator_data_is_rejected() {
        // ---
        let key = signing_key();
        let credential = credential_for(&key);
        let challenge = [0x42u8; 32];

        let mut assertion = make_assertion(&key, &challenge, ORIGIN, RP_ID, 1);
        assertion.authenticator_data.truncate(10);

        let verifier = AssertionVerifier::new(RP_ID, ORIGIN);
        let err = verifier
            .verify(&assertion, &credential, &challenge)
            .unwrap_err();
        assert_eq!(err.code(), "invalid_request");
    }
}
