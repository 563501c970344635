//! Credential records and password digests.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use bankd_core::UserId;

/// Stored credential, keyed by user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub id: Uuid,
    pub user_id: UserId,
    /// Hex-encoded SHA-256 of the password.
    pub password_digest: String,
}

impl Credential {
    pub fn new(user_id: UserId, password: &str) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            password_digest: digest_password(password),
        }
    }
}

/// Hex-encoded SHA-256 digest of a password.
pub fn digest_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-shape comparison of a candidate password against a stored digest.
pub fn verify_password(password: &str, stored_digest: &str) -> bool {
    let candidate = digest_password(password);
    // Compare full digests byte-for-byte; both sides are fixed length.
    candidate.as_bytes() == stored_digest.as_bytes()
}
