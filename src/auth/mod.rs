//! Password hashing, session registry and the authentication gate.

pub mod gate;
pub mod password;
pub mod session;

pub use self::gate::{current_user, SESSION_COOKIE_NAME};
pub use self::password::{PasswordError, PasswordHasher};
pub use self::session::{spawn_sweeper, MemorySessionStore, SessionStore};

use std::sync::Arc;

/// Everything the route layer needs to authenticate requests.
#[derive(Clone)]
pub struct AuthState {
    sessions: Arc<dyn SessionStore>,
    hasher: Arc<PasswordHasher>,
    cookie_secure: bool,
}

impl AuthState {
    #[must_use]
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        hasher: Arc<PasswordHasher>,
        cookie_secure: bool,
    ) -> Self {
        Self {
            sessions,
            hasher,
            cookie_secure,
        }
    }

    #[must_use]
    pub fn sessions(&self) -> &dyn SessionStore {
        self.sessions.as_ref()
    }

    #[must_use]
    pub fn sessions_handle(&self) -> Arc<dyn SessionStore> {
        Arc::clone(&self.sessions)
    }

    #[must_use]
    pub fn hasher(&self) -> &Arc<PasswordHasher> {
        &self.hasher
    }

    #[must_use]
    pub const fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("sessions", &self.sessions.len())
            .field("hasher", &self.hasher)
            .field("cookie_secure", &self.cookie_secure)
            .finish()
    }
}
