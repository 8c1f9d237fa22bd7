//! Server-side session registry.
//!
//! The cookie carries the raw token; the registry only keys entries by its
//! SHA-256 digest. Entries expire after a fixed TTL and live in process
//! memory, so a restart logs everybody out.

use anyhow::{Context, Result};
use base64::Engine;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};
use tokio::task::JoinHandle;
use tracing::debug;

pub const DEFAULT_SESSION_TTL_SECONDS: u64 = 12 * 60 * 60;

/// Token to username mapping shared by every request handler.
pub trait SessionStore: Send + Sync {
    /// Start a session for `username` and return the raw token.
    ///
    /// # Errors
    /// Returns an error if the OS random generator fails.
    fn create(&self, username: &str) -> Result<String>;

    /// Username for a live token; expired tokens resolve to `None`.
    fn resolve(&self, token: &str) -> Option<String>;

    /// Forget a token. Unknown tokens are a no-op.
    fn delete(&self, token: &str);

    /// Drop every expired entry and return how many were removed.
    fn purge_expired(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct SessionEntry {
    username: String,
    // `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl SessionEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

pub struct MemorySessionStore {
    ttl: Duration,
    entries: Mutex<HashMap<Vec<u8>, SessionEntry>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    // A panic while holding the lock cannot leave an entry half written.
    fn entries(&self) -> MutexGuard<'_, HashMap<Vec<u8>, SessionEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_SESSION_TTL_SECONDS))
    }
}

impl SessionStore for MemorySessionStore {
    fn create(&self, username: &str) -> Result<String> {
        let token = generate_session_token()?;
        let entry = SessionEntry {
            username: username.to_string(),
            expires_at: Instant::now().checked_add(self.ttl),
        };
        self.entries().insert(hash_session_token(&token), entry);
        Ok(token)
    }

    fn resolve(&self, token: &str) -> Option<String> {
        let key = hash_session_token(token);
        let mut entries = self.entries();
        let expired = entries.get(&key)?.is_expired(Instant::now());
        if expired {
            entries.remove(&key);
            return None;
        }
        entries.get(&key).map(|entry| entry.username.clone())
    }

    fn delete(&self, token: &str) {
        self.entries().remove(&hash_session_token(token));
    }

    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    fn len(&self) -> usize {
        self.entries().len()
    }
}

/// Create a new session token for the auth cookie.
pub(crate) fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash a session token so raw values never sit in the registry.
pub(crate) fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Periodically purge expired sessions. A zero period is raised to 1ms.
pub fn spawn_sweeper(store: Arc<dyn SessionStore>, every: Duration) -> JoinHandle<()> {
    let every = every.max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut interval_timer = tokio::time::interval(every);

        loop {
            interval_timer.tick().await;
            let purged = store.purge_expired();
            if purged > 0 {
                debug!(sessions_purged = purged, "Expired sessions purged");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    fn store() -> MemorySessionStore {
        MemorySessionStore::new(Duration::from_secs(60))
    }

    #[test]
    fn create_then_resolve() -> anyhow::Result<()> {
        let store = store();
        let token = store.create("alice")?;
        assert_eq!(store.resolve(&token), Some("alice".to_string()));
        assert_eq!(store.resolve("unknown"), None);
        Ok(())
    }

    #[test]
    fn delete_is_idempotent() -> anyhow::Result<()> {
        let store = store();
        let token = store.create("alice")?;
        store.delete(&token);
        assert_eq!(store.resolve(&token), None);
        store.delete(&token);
        store.delete("never-issued");
        assert!(store.is_empty());
        Ok(())
    }

    #[test]
    fn repeated_logins_yield_independent_sessions() -> anyhow::Result<()> {
        let store = store();
        let first = store.create("alice")?;
        let second = store.create("alice")?;
        assert_ne!(first, second);
        assert_eq!(store.len(), 2);

        store.delete(&first);
        assert_eq!(store.resolve(&second), Some("alice".to_string()));
        Ok(())
    }

    #[test]
    fn expired_sessions_do_not_resolve() -> anyhow::Result<()> {
        let store = MemorySessionStore::new(Duration::ZERO);
        let token = store.create("alice")?;
        assert_eq!(store.resolve(&token), None);
        // Resolution removes the stale entry
        assert!(store.is_empty());
        Ok(())
    }

    #[test]
    fn oversized_ttl_never_expires() -> anyhow::Result<()> {
        let store = MemorySessionStore::new(Duration::from_secs(u64::MAX));
        let token = store.create("alice")?;
        assert_eq!(store.resolve(&token), Some("alice".to_string()));
        assert_eq!(store.purge_expired(), 0);
        Ok(())
    }

    #[test]
    fn purge_removes_only_expired() -> anyhow::Result<()> {
        let expired = MemorySessionStore::new(Duration::ZERO);
        expired.create("alice")?;
        expired.create("bob")?;
        assert_eq!(expired.purge_expired(), 2);
        assert!(expired.is_empty());

        let live = store();
        live.create("carol")?;
        assert_eq!(live.purge_expired(), 0);
        assert_eq!(live.len(), 1);
        Ok(())
    }

    #[test]
    fn token_has_256_bits() -> anyhow::Result<()> {
        let token = generate_session_token()?;
        let decoded = URL_SAFE_NO_PAD.decode(token.as_bytes())?;
        assert_eq!(decoded.len(), 32);
        Ok(())
    }

    #[test]
    fn raw_tokens_are_not_stored() -> anyhow::Result<()> {
        let store = store();
        let token = store.create("alice")?;
        let entries = store.entries();
        assert!(!entries.contains_key(token.as_bytes()));
        assert!(entries.contains_key(&hash_session_token(&token)));
        Ok(())
    }

    #[test]
    fn concurrent_access_is_safe() -> anyhow::Result<()> {
        let store = Arc::new(store());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || -> anyhow::Result<()> {
                    for _ in 0..50 {
                        let token = store.create(&format!("user-{i}"))?;
                        assert_eq!(store.resolve(&token), Some(format!("user-{i}")));
                        store.delete(&token);
                    }
                    Ok(())
                })
            })
            .collect();

        for handle in handles {
            handle
                .join()
                .map_err(|_| anyhow::anyhow!("worker panicked"))??;
        }
        assert!(store.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn sweeper_purges_in_background() -> anyhow::Result<()> {
        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new(Duration::ZERO));
        store.create("alice")?;

        let handle = spawn_sweeper(Arc::clone(&store), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        assert!(store.is_empty());
        Ok(())
    }
}
