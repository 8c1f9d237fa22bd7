use crate::{
    auth::{self, AuthState, MemorySessionStore, PasswordHasher, SessionStore},
    inference::{
        labels, InferenceAdapter, InferencePool, PoolSettings, RtenDetector, YoloSettings,
    },
    storage::{Database, DatabaseConfig},
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, MatchedPath},
    http::{HeaderName, HeaderValue, Request},
    Extension, Router,
};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;
use utoipa_axum::router::OpenApiRouter;

pub(crate) mod handlers;
// Route registration and the OpenAPI document live in openapi.rs.
mod openapi;

pub use handlers::SiteConfig;
pub use openapi::openapi;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Everything `new` needs to bring the server up.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub database: DatabaseConfig,
    pub session_ttl: Duration,
    pub session_sweep: Duration,
    pub cookie_secure: bool,
    pub bcrypt_cost: u32,
    pub model_path: PathBuf,
    pub labels_path: Option<PathBuf>,
    pub yolo: YoloSettings,
    pub jpeg_quality: u8,
    pub pool: PoolSettings,
    pub max_upload_bytes: usize,
    pub prediction_url: String,
}

/// Shared handles injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub auth: AuthState,
    pub inference: Arc<InferencePool>,
    pub site: SiteConfig,
    pub max_upload_bytes: usize,
}

/// Router with the request-id, tracing and body limit layers applied.
pub fn app(state: AppState) -> Router {
    let (router, _openapi) = router().split_for_parts();
    router.layer(DefaultBodyLimit::max(state.max_upload_bytes)).layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(Extension(state.db))
            .layer(Extension(state.auth))
            .layer(Extension(state.inference))
            .layer(Extension(state.site)),
    )
}

/// Start the server
/// # Errors
/// Return error if the database, the model or the listener cannot be set up
pub async fn new(config: ServerConfig) -> Result<()> {
    let db = Database::connect(&config.database).await?;
    db.ensure_schema()
        .await
        .context("Failed to create the users table")?;
    info!(backend = db.backend(), "Credential store ready");

    let labels = labels::load(config.labels_path.as_deref())?;
    let detector = RtenDetector::load(&config.model_path, labels, config.yolo)?;
    let adapter = Arc::new(InferenceAdapter::new(
        Arc::new(detector),
        config.jpeg_quality,
    ));
    let inference = Arc::new(InferencePool::new(adapter, config.pool));

    let hasher = Arc::new(
        PasswordHasher::new(config.bcrypt_cost).context("Failed to initialize password hasher")?,
    );
    let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new(config.session_ttl));
    let sweeper = auth::spawn_sweeper(Arc::clone(&sessions), config.session_sweep);
    let auth_state = AuthState::new(sessions, hasher, config.cookie_secure);

    let app = app(AppState {
        db,
        auth: auth_state,
        inference,
        site: SiteConfig::new(config.prediction_url),
        max_upload_bytes: config.max_upload_bytes,
    });

    let listener = TcpListener::bind(format!("::0:{}", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;

    info!("Listening on [::]:{}", config.port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("Gracefully shutdown");

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
