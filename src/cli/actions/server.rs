use crate::{
    api::{self, ServerConfig},
    cli::commands::{auth, database, inference},
    inference::{PoolSettings, YoloSettings},
    storage::DatabaseConfig,
};
use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub max_upload_bytes: usize,
    pub prediction_url: String,
    pub database: database::Options,
    pub auth: auth::Options,
    pub inference: inference::Options,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database settings are invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let config = server_config(args)?;

    if config.database.is_fallback() {
        warn!(
            "No PostgreSQL database configured, storing users in {:?}",
            config.database
        );
    }
    log_startup(&config);

    api::new(config).await
}

/// Resolve parsed arguments into the server configuration.
/// # Errors
/// Returns an error if the database settings are incomplete or malformed.
pub fn server_config(args: Args) -> Result<ServerConfig> {
    let database = DatabaseConfig::resolve(
        args.database.dsn,
        args.database.parts,
        args.database.sqlite_path,
    )
    .context("Could not resolve database settings")?;

    let inference = args.inference;

    Ok(ServerConfig {
        port: args.port,
        database,
        session_ttl: Duration::from_secs(args.auth.session_ttl_seconds),
        session_sweep: Duration::from_secs(args.auth.session_sweep_seconds),
        cookie_secure: args.auth.cookie_secure,
        bcrypt_cost: args.auth.bcrypt_cost,
        model_path: inference.model_path,
        labels_path: inference.labels_path,
        yolo: YoloSettings {
            input_size: inference.input_size,
            score_threshold: inference.score_threshold,
            iou_threshold: inference.iou_threshold,
            ..YoloSettings::default()
        },
        jpeg_quality: inference.jpeg_quality,
        pool: PoolSettings {
            workers: inference.workers,
            queue: inference.queue,
            timeout: Duration::from_secs(inference.timeout_seconds),
        },
        max_upload_bytes: args.max_upload_bytes,
        prediction_url: args.prediction_url,
    })
}

fn log_startup(config: &ServerConfig) {
    let entries = [
        ("listen", format!("tcp:{}", config.port)),
        ("database", format!("{:?}", config.database)),
        ("model", config.model_path.display().to_string()),
        (
            "labels",
            config
                .labels_path
                .as_ref()
                .map_or_else(|| "coco (built-in)".to_string(), |p| p.display().to_string()),
        ),
        (
            "inference",
            format!(
                "workers={} queue={} timeout={}s",
                config.pool.workers,
                config.pool.queue,
                config.pool.timeout.as_secs()
            ),
        ),
        ("session_ttl", format!("{}s", config.session_ttl.as_secs())),
        ("cookie_secure", config.cookie_secure.to_string()),
        ("max_upload_bytes", config.max_upload_bytes.to_string()),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "visiongate {} - {}\n\nStartup configuration:",
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in &entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}
