use super::AppError;
use crate::auth::{
    gate::{clear_session_cookie, extract_session_token},
    AuthState,
};
use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap},
    response::{IntoResponse, Redirect, Response},
};
use tracing::{debug, instrument};

/// Always clears the cookie, even when there was no session to end.
#[utoipa::path(
    get,
    path= "/logout",
    responses (
        (status = 303, description = "Session ended, cookie cleared, redirect to /login"),
    ),
    tag= "pages"
)]
#[instrument(skip_all)]
pub async fn logout(headers: HeaderMap, auth: Extension<AuthState>) -> Result<Response, AppError> {
    if let Some(token) = extract_session_token(&headers) {
        auth.sessions().delete(&token);
        debug!("Session deleted");
    }

    let cookie = clear_session_cookie(auth.cookie_secure())?;
    Ok(([(SET_COOKIE, cookie)], Redirect::to("/login")).into_response())
}
