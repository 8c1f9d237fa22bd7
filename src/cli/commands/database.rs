use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;
use std::path::PathBuf;

use crate::storage::DatabaseParts;

pub const ARG_DSN: &str = "dsn";
pub const ARG_DB_HOST: &str = "db-host";
pub const ARG_DB_PORT: &str = "db-port";
pub const ARG_DB_NAME: &str = "db-name";
pub const ARG_DB_USER: &str = "db-user";
pub const ARG_DB_PASSWORD: &str = "db-password";
pub const ARG_SQLITE_PATH: &str = "sqlite-path";

pub const DEFAULT_SQLITE_PATH: &str = "visiongate.db";

#[derive(Debug)]
pub struct Options {
    pub dsn: Option<SecretString>,
    pub parts: DatabaseParts,
    pub sqlite_path: PathBuf,
}

impl Options {
    /// Parse database arguments from matches.
    ///
    /// Empty strings, as produced by env vars set to `""`, count as unset.
    ///
    /// # Errors
    /// Returns an error if the SQLite path is missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        let sqlite_path = get_non_empty(ARG_SQLITE_PATH)
            .map(PathBuf::from)
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_SQLITE_PATH}"))?;

        let port = if get_non_empty(ARG_DB_HOST).is_some() {
            matches.get_one::<u16>(ARG_DB_PORT).copied()
        } else {
            None
        };

        Ok(Self {
            dsn: get_non_empty(ARG_DSN).map(SecretString::from),
            parts: DatabaseParts {
                host: get_non_empty(ARG_DB_HOST),
                port,
                name: get_non_empty(ARG_DB_NAME),
                user: get_non_empty(ARG_DB_USER),
                password: get_non_empty(ARG_DB_PASSWORD).map(SecretString::from),
            },
            sqlite_path,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long(ARG_DSN)
                .help("Database connection string (postgres://... or sqlite:path)")
                .long_help(
                    "Database connection string. Takes precedence over the DB_* parts. Without either, a local SQLite file is used.",
                )
                .env("VISIONGATE_DSN"),
        )
        .arg(
            Arg::new(ARG_DB_HOST)
                .long(ARG_DB_HOST)
                .help("PostgreSQL host")
                .env("DB_HOST"),
        )
        .arg(
            Arg::new(ARG_DB_PORT)
                .long(ARG_DB_PORT)
                .help("PostgreSQL port")
                .env("DB_PORT")
                .default_value("5432")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_DB_NAME)
                .long(ARG_DB_NAME)
                .help("PostgreSQL database name")
                .env("DB_NAME"),
        )
        .arg(
            Arg::new(ARG_DB_USER)
                .long(ARG_DB_USER)
                .help("PostgreSQL user")
                .env("DB_USER"),
        )
        .arg(
            Arg::new(ARG_DB_PASSWORD)
                .long(ARG_DB_PASSWORD)
                .help("PostgreSQL password")
                .env("DB_PASS")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_SQLITE_PATH)
                .long(ARG_SQLITE_PATH)
                .help("SQLite file used when no PostgreSQL database is configured")
                .env("VISIONGATE_SQLITE_PATH")
                .default_value(DEFAULT_SQLITE_PATH),
        )
}
