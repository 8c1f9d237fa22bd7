use super::{views, AppError, SiteConfig};
use crate::{
    auth::{current_user, AuthState},
    storage::Database,
};
use axum::{
    extract::Extension,
    http::HeaderMap,
    response::{Html, IntoResponse, Redirect, Response},
};
use tracing::instrument;

#[utoipa::path(
    get,
    path= "/",
    responses (
        (status = 200, description = "Dashboard with the upload form", content_type = "text/html"),
        (status = 303, description = "Not logged in, redirect to /login"),
    ),
    tag= "pages"
)]
#[instrument(skip_all)]
pub async fn home(
    headers: HeaderMap,
    db: Extension<Database>,
    auth: Extension<AuthState>,
    site: Extension<SiteConfig>,
) -> Result<Response, AppError> {
    let Some(user) = current_user(&headers, &auth, &db).await? else {
        return Ok(Redirect::to("/login").into_response());
    };

    Ok(Html(views::dashboard_page(&user.username, site.prediction_url())).into_response())
}
