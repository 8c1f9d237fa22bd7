use crate::cli::{
    actions::{server::Args, Action},
    commands::{self, auth, database, inference},
};
use anyhow::{Context, Result};

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches
        .get_one::<u16>(commands::ARG_PORT)
        .copied()
        .unwrap_or(8080);
    let max_upload_bytes = matches
        .get_one::<usize>(commands::ARG_MAX_UPLOAD_BYTES)
        .copied()
        .unwrap_or(crate::api::DEFAULT_MAX_UPLOAD_BYTES);
    let prediction_url = matches
        .get_one::<String>(commands::ARG_PREDICTION_URL)
        .cloned()
        .unwrap_or_default();

    let database = database::Options::parse(matches).context("invalid database settings")?;
    let inference = inference::Options::parse(matches).context("invalid inference settings")?;

    Ok(Action::Server(Args {
        port,
        max_upload_bytes,
        prediction_url,
        database,
        auth: auth::Options::parse(matches),
        inference,
    }))
}
