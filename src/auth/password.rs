//! bcrypt password hashing.
//!
//! bcrypt only reads the first 72 bytes of its input. Inputs are cut to that
//! length explicitly so hashes stay verifiable no matter how the underlying
//! crate treats longer inputs.

use std::sync::Arc;
use thiserror::Error;

pub const MAX_PASSWORD_BYTES: usize = 72;
pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;
const MIN_COST: u32 = 4;
const MAX_COST: u32 = 31;

// Verified against on unknown usernames so both login failures cost the same.
const DUMMY_PASSWORD: &str = "visiongate-dummy-password";

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("password worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

pub struct PasswordHasher {
    cost: u32,
    dummy_hash: String,
}

impl PasswordHasher {
    /// Build a hasher; the cost is clamped to the range bcrypt accepts.
    ///
    /// # Errors
    /// Returns an error if the reference hash cannot be computed.
    pub fn new(cost: u32) -> Result<Self, PasswordError> {
        let cost = cost.clamp(MIN_COST, MAX_COST);
        let dummy_hash = bcrypt::hash(DUMMY_PASSWORD, cost)?;
        Ok(Self { cost, dummy_hash })
    }

    #[must_use]
    pub const fn cost(&self) -> u32 {
        self.cost
    }

    /// Salted one-way hash of the (possibly truncated) plaintext.
    ///
    /// # Errors
    /// Returns an error if bcrypt fails to produce a hash.
    pub fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        Ok(bcrypt::hash(truncate(plaintext), self.cost)?)
    }

    /// `true` iff the plaintext matches; malformed hashes yield `false`.
    #[must_use]
    pub fn verify(&self, plaintext: &str, hash: &str) -> bool {
        bcrypt::verify(truncate(plaintext), hash).unwrap_or(false)
    }

    /// Burn one verification against a throwaway hash. Always `false`.
    #[must_use]
    pub fn verify_dummy(&self, plaintext: &str) -> bool {
        let _ = self.verify(plaintext, &self.dummy_hash);
        false
    }

    /// [`Self::hash`] on the blocking pool.
    ///
    /// # Errors
    /// Returns an error if hashing fails or the worker panics.
    pub async fn hash_blocking(self: &Arc<Self>, plaintext: String) -> Result<String, PasswordError> {
        let hasher = Arc::clone(self);
        tokio::task::spawn_blocking(move || hasher.hash(&plaintext)).await?
    }

    /// [`Self::verify`] on the blocking pool. A missing hash runs the dummy
    /// verification instead.
    ///
    /// # Errors
    /// Returns an error only if the worker panics.
    pub async fn verify_blocking(
        self: &Arc<Self>,
        plaintext: String,
        hash: Option<String>,
    ) -> Result<bool, PasswordError> {
        let hasher = Arc::clone(self);
        let matched = tokio::task::spawn_blocking(move || match hash {
            Some(hash) => hasher.verify(&plaintext, &hash),
            None => hasher.verify_dummy(&plaintext),
        })
        .await?;
        Ok(matched)
    }
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("cost", &self.cost)
            .finish_non_exhaustive()
    }
}

/// Cut to at most 72 bytes. The cut may split a UTF-8 sequence; bcrypt
/// works on bytes so that is fine.
fn truncate(plaintext: &str) -> &[u8] {
    let bytes = plaintext.as_bytes();
    &bytes[..bytes.len().min(MAX_PASSWORD_BYTES)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        match PasswordHasher::new(MIN_COST) {
            Ok(hasher) => hasher,
            Err(err) => panic!("hasher: {err}"),
        }
    }

    #[test]
    fn hash_then_verify() -> anyhow::Result<()> {
        let hasher = hasher();
        let hash = hasher.hash("secret1")?;
        assert!(hash.starts_with("$2"));
        assert!(hasher.verify("secret1", &hash));
        assert!(!hasher.verify("wrong", &hash));
        Ok(())
    }

    #[test]
    fn hashes_are_salted() -> anyhow::Result<()> {
        let hasher = hasher();
        let first = hasher.hash("secret1")?;
        let second = hasher.hash("secret1")?;
        assert_ne!(first, second);
        assert!(hasher.verify("secret1", &second));
        Ok(())
    }

    #[test]
    fn malformed_hash_is_false() {
        let hasher = hasher();
        assert!(!hasher.verify("secret1", ""));
        assert!(!hasher.verify("secret1", "not-a-bcrypt-hash"));
        assert!(!hasher.verify("secret1", "$2b$04$tooshort"));
    }

    #[test]
    fn long_passwords_are_truncated_at_72_bytes() -> anyhow::Result<()> {
        let hasher = hasher();
        let prefix = "a".repeat(MAX_PASSWORD_BYTES);
        let first = format!("{prefix}tail-one");
        let second = format!("{prefix}tail-two");

        let hash = hasher.hash(&first)?;
        assert!(hasher.verify(&second, &hash));
        assert!(hasher.verify(&prefix, &hash));

        // One byte short of the limit still matters
        let shorter = "a".repeat(MAX_PASSWORD_BYTES - 1);
        assert!(!hasher.verify(&shorter, &hash));
        Ok(())
    }

    #[test]
    fn truncation_counts_bytes_not_chars() {
        let password = "é".repeat(40);
        assert_eq!(password.len(), 80);
        assert_eq!(truncate(&password).len(), MAX_PASSWORD_BYTES);
    }

    #[test]
    fn cost_is_clamped() -> anyhow::Result<()> {
        let hasher = PasswordHasher::new(1)?;
        assert_eq!(hasher.cost(), MIN_COST);
        Ok(())
    }

    #[test]
    fn dummy_verification_never_matches() {
        let hasher = hasher();
        assert!(!hasher.verify_dummy(DUMMY_PASSWORD));
    }

    #[tokio::test]
    async fn blocking_helpers_round_trip() -> anyhow::Result<()> {
        let hasher = Arc::new(hasher());
        let hash = hasher.hash_blocking("secret1".to_string()).await?;
        assert!(
            hasher
                .verify_blocking("secret1".to_string(), Some(hash))
                .await?
        );
        assert!(!hasher.verify_blocking("secret1".to_string(), None).await?);
        Ok(())
    }
}
