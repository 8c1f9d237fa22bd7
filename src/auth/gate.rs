//! Resolve the current user from the `session_id` cookie.

use axum::http::{
    header::{InvalidHeaderValue, COOKIE},
    HeaderMap, HeaderValue,
};
use tracing::{debug, error};

use super::AuthState;
use crate::storage::{Database, StoreError, User};

pub const SESSION_COOKIE_NAME: &str = "session_id";

/// Logged-in user for this request, if any.
///
/// A missing cookie, an unknown or expired token, and a session pointing at a
/// username that no longer exists all yield `Ok(None)`.
///
/// # Errors
/// Returns an error only when the credential store itself fails.
pub async fn current_user(
    headers: &HeaderMap,
    auth: &AuthState,
    db: &Database,
) -> Result<Option<User>, StoreError> {
    let Some(token) = extract_session_token(headers) else {
        return Ok(None);
    };
    let Some(username) = auth.sessions().resolve(&token) else {
        return Ok(None);
    };

    match db.find_by_username(&username).await {
        Ok(Some(user)) => Ok(Some(user)),
        Ok(None) => {
            debug!("Session references a missing user, treating as logged out");
            Ok(None)
        }
        Err(err) => {
            error!("Failed to lookup session user: {err}");
            Err(err)
        }
    }
}

/// Raw session token from the `Cookie` header(s).
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            let val = val.trim();
            (key.trim() == SESSION_COOKIE_NAME && !val.is_empty()).then(|| val.to_string())
        })
}

/// `Set-Cookie` value carrying a new session token.
///
/// No `Max-Age`: the cookie lives for the browser session while the server
/// enforces its own TTL. `Secure` and `SameSite` are only added on request.
pub(crate) fn session_cookie(token: &str, secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly");
    if secure {
        cookie.push_str("; Secure; SameSite=Lax");
    }
    HeaderValue::from_str(&cookie)
}

/// `Set-Cookie` value that removes the session cookie.
pub(crate) fn clear_session_cookie(secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; Max-Age=0");
    if secure {
        cookie.push_str("; Secure; SameSite=Lax");
    }
    HeaderValue::from_str(&cookie)
}
