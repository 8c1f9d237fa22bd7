//! Credential store backed by PostgreSQL or a local SQLite file.

pub mod config;

pub use self::config::{ConfigError, DatabaseConfig, DatabaseParts};

use anyhow::{Context, Result};
use secrecy::ExposeSecret;
use sqlx::{
    error::ErrorKind,
    postgres::{PgPool, PgPoolOptions},
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    Connection, Row,
};
use std::time::Duration;
use thiserror::Error;
use tracing::{info_span, Instrument};

const POSTGRES_SCHEMA_SQL: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema_postgres.sql"));
const SQLITE_SCHEMA_SQL: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema_sqlite.sql"));

const PG_FIND_USER: &str =
    "SELECT id, username, hashed_password FROM users WHERE username = $1";
const PG_INSERT_USER: &str =
    "INSERT INTO users (username, hashed_password) VALUES ($1, $2) RETURNING id";
const SQLITE_FIND_USER: &str =
    "SELECT id, username, hashed_password FROM users WHERE username = ?";
const SQLITE_INSERT_USER: &str =
    "INSERT INTO users (username, hashed_password) VALUES (?, ?) RETURNING id";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("username already exists")]
    DuplicateUsername,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// A persisted account.
#[derive(Clone, Debug, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[sqlx(rename = "hashed_password")]
    pub password_hash: String,
}

#[derive(Clone, Debug)]
pub enum Database {
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

impl Database {
    /// Open a connection pool for the configured target.
    ///
    /// # Errors
    /// Returns an error if the database cannot be reached.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        match config {
            DatabaseConfig::Postgres { url } => {
                let pool = PgPoolOptions::new()
                    .min_connections(1)
                    .max_connections(5)
                    .max_lifetime(Duration::from_secs(60 * 2))
                    .test_before_acquire(true)
                    .connect(url.expose_secret())
                    .await
                    .context("Failed to connect to database")?;
                Ok(Self::Postgres(pool))
            }
            DatabaseConfig::Sqlite { path } => {
                let options = SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true);
                let pool = SqlitePoolOptions::new()
                    .max_connections(5)
                    .connect_with(options)
                    .await
                    .with_context(|| format!("Failed to open SQLite file {}", path.display()))?;
                Ok(Self::Sqlite(pool))
            }
        }
    }

    /// Private in-memory SQLite database with the schema applied.
    ///
    /// A single long-lived connection keeps the database alive.
    ///
    /// # Errors
    /// Returns an error if SQLite cannot be opened.
    pub async fn sqlite_in_memory() -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        let db = Self::Sqlite(pool);
        db.ensure_schema().await?;
        Ok(db)
    }

    #[must_use]
    pub const fn backend(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgresql",
            Self::Sqlite(_) => "sqlite",
        }
    }

    /// Create the `users` table if it does not exist yet.
    ///
    /// # Errors
    /// Returns an error if the DDL statement fails.
    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        let span = info_span!("db.query", db.system = self.backend(), db.operation = "CREATE");
        match self {
            Self::Postgres(pool) => {
                sqlx::query(POSTGRES_SCHEMA_SQL)
                    .execute(pool)
                    .instrument(span)
                    .await?;
            }
            Self::Sqlite(pool) => {
                sqlx::query(SQLITE_SCHEMA_SQL)
                    .execute(pool)
                    .instrument(span)
                    .await?;
            }
        }
        Ok(())
    }

    /// Acquire a connection and ping it.
    ///
    /// # Errors
    /// Returns an error if no connection is available or the ping fails.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        let span = info_span!("db.ping", db.system = self.backend(), db.operation = "PING");
        async {
            match self {
                Self::Postgres(pool) => {
                    let mut conn = pool.acquire().await?;
                    conn.ping().await
                }
                Self::Sqlite(pool) => {
                    let mut conn = pool.acquire().await?;
                    conn.ping().await
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Exact, case-sensitive lookup.
    ///
    /// # Errors
    /// Returns [`StoreError::Database`] on query failure.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = match self {
            Self::Postgres(pool) => {
                sqlx::query_as::<_, User>(PG_FIND_USER)
                    .bind(username)
                    .fetch_optional(pool)
                    .instrument(select_span(self.backend(), PG_FIND_USER))
                    .await?
            }
            Self::Sqlite(pool) => {
                sqlx::query_as::<_, User>(SQLITE_FIND_USER)
                    .bind(username)
                    .fetch_optional(pool)
                    .instrument(select_span(self.backend(), SQLITE_FIND_USER))
                    .await?
            }
        };
        Ok(user)
    }

    /// Insert a new account; the uniqueness constraint decides races.
    ///
    /// # Errors
    /// Returns [`StoreError::DuplicateUsername`] if the username is taken.
    pub async fn insert(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        let span = info_span!(
            "db.query",
            db.system = self.backend(),
            db.operation = "INSERT",
            db.statement = self.insert_statement()
        );

        let result = match self {
            Self::Postgres(pool) => sqlx::query(PG_INSERT_USER)
                .bind(username)
                .bind(password_hash)
                .fetch_one(pool)
                .instrument(span)
                .await
                .and_then(|row| row.try_get::<i64, _>("id")),
            Self::Sqlite(pool) => sqlx::query(SQLITE_INSERT_USER)
                .bind(username)
                .bind(password_hash)
                .fetch_one(pool)
                .instrument(span)
                .await
                .and_then(|row| row.try_get::<i64, _>("id")),
        };

        match result {
            Ok(id) => Ok(User {
                id,
                username: username.to_string(),
                password_hash: password_hash.to_string(),
            }),
            Err(err) if is_unique_violation(&err) => Err(StoreError::DuplicateUsername),
            Err(err) => Err(StoreError::Database(err)),
        }
    }

    const fn insert_statement(&self) -> &'static str {
        match self {
            Self::Postgres(_) => PG_INSERT_USER,
            Self::Sqlite(_) => SQLITE_INSERT_USER,
        }
    }
}

fn select_span(system: &'static str, statement: &'static str) -> tracing::Span {
    info_span!(
        "db.query",
        db.system = system,
        db.operation = "SELECT",
        db.statement = statement
    )
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.kind() == ErrorKind::UniqueViolation
                || db_err.code().is_some_and(|code| code.as_ref() == "23505")
        }
        _ => false,
    }
}
