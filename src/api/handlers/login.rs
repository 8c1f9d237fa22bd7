use super::{views, AppError, FlashQuery};
use crate::{
    auth::{gate::session_cookie, AuthState},
    storage::Database,
};
use axum::{
    extract::{Extension, Query},
    http::header::SET_COOKIE,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

pub const INVALID_CREDENTIALS: &str = "Invalid username or password";

#[derive(ToSchema, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

impl std::fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[utoipa::path(
    get,
    path= "/login",
    params(FlashQuery),
    responses (
        (status = 200, description = "Login form", content_type = "text/html"),
    ),
    tag= "pages"
)]
pub async fn login_form(Query(flash): Query<FlashQuery>) -> Html<String> {
    Html(views::login_page(
        flash.error.as_deref(),
        flash.success.as_deref(),
    ))
}

/// Unknown usernames and wrong passwords produce the same page, and both
/// pay for one bcrypt verification.
#[utoipa::path(
    post,
    path= "/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses (
        (status = 303, description = "Logged in, session cookie set, redirect to /"),
        (status = 200, description = "Form shown again with an error", content_type = "text/html"),
    ),
    tag= "pages"
)]
#[instrument(skip_all)]
pub async fn login(
    db: Extension<Database>,
    auth: Extension<AuthState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let user = db.find_by_username(&form.username).await?;
    let stored_hash = user.as_ref().map(|user| user.password_hash.clone());

    let matched = auth
        .hasher()
        .verify_blocking(form.password, stored_hash)
        .await?;

    let Some(user) = user.filter(|_| matched) else {
        warn!(username = %form.username, "Login failed");
        return Ok(Html(views::login_page(Some(INVALID_CREDENTIALS), None)).into_response());
    };

    let token = auth.sessions().create(&user.username)?;
    let cookie = session_cookie(&token, auth.cookie_secure())?;
    info!(user_id = user.id, "Session started");

    Ok(([(SET_COOKIE, cookie)], Redirect::to("/")).into_response())
}
