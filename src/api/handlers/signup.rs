use super::{views, AppError, FlashQuery};
use crate::{
    auth::AuthState,
    storage::{Database, StoreError},
};
use axum::{
    extract::{Extension, Query},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

pub const PASSWORD_MISMATCH: &str = "Passwords do not match.";
pub const USERNAME_TAKEN: &str = "Username already exists.";
pub const MISSING_FIELDS: &str = "Username and password are required.";
pub const SIGNUP_SUCCESS_REDIRECT: &str = "/login?success=Signup%20successful!%20Please%20login.";

#[derive(ToSchema, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    confirm_password: String,
}

// Never print the passwords.
impl std::fmt::Debug for SignupForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignupForm")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[utoipa::path(
    get,
    path= "/signup",
    params(FlashQuery),
    responses (
        (status = 200, description = "Signup form", content_type = "text/html"),
    ),
    tag= "pages"
)]
pub async fn signup_form(Query(flash): Query<FlashQuery>) -> Html<String> {
    Html(views::signup_page(flash.error.as_deref()))
}

#[utoipa::path(
    post,
    path= "/signup",
    request_body(content = SignupForm, content_type = "application/x-www-form-urlencoded"),
    responses (
        (status = 303, description = "Account created, redirect to /login"),
        (status = 200, description = "Form shown again with an error", content_type = "text/html"),
    ),
    tag= "pages"
)]
#[instrument(skip_all)]
pub async fn signup(
    db: Extension<Database>,
    auth: Extension<AuthState>,
    Form(form): Form<SignupForm>,
) -> Result<Response, AppError> {
    if form.username.is_empty() || form.password.is_empty() {
        return Ok(rejected(MISSING_FIELDS));
    }

    if form.password != form.confirm_password {
        return Ok(rejected(PASSWORD_MISMATCH));
    }

    // Cheap check first so a taken name does not pay for a bcrypt hash
    if db.find_by_username(&form.username).await?.is_some() {
        debug!(username = %form.username, "Username already taken");
        return Ok(rejected(USERNAME_TAKEN));
    }

    let password_hash = auth.hasher().hash_blocking(form.password).await?;

    match db.insert(&form.username, &password_hash).await {
        Ok(user) => {
            info!(user_id = user.id, "Account created");
            Ok(Redirect::to(SIGNUP_SUCCESS_REDIRECT).into_response())
        }
        // Lost a race with a concurrent signup for the same name
        Err(StoreError::DuplicateUsername) => Ok(rejected(USERNAME_TAKEN)),
        Err(err) => Err(err.into()),
    }
}

fn rejected(message: &str) -> Response {
    Html(views::signup_page(Some(message))).into_response()
}
