pub mod auth;
pub mod database;
pub mod inference;
pub mod logging;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

pub const ARG_PORT: &str = "port";
pub const ARG_MAX_UPLOAD_BYTES: &str = "max-upload-bytes";
pub const ARG_PREDICTION_URL: &str = "prediction-url";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("visiongate")
        .about("Authenticated object detection service")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("VISIONGATE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_MAX_UPLOAD_BYTES)
                .long(ARG_MAX_UPLOAD_BYTES)
                .help("Largest accepted request body in bytes")
                .default_value("10485760")
                .env("VISIONGATE_MAX_UPLOAD_BYTES")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_PREDICTION_URL)
                .long(ARG_PREDICTION_URL)
                .help("Form action used by the dashboard upload form")
                .default_value("/predict")
                .env("VISIONGATE_PREDICTION_URL"),
        );

    let command = database::with_args(command);
    let command = auth::with_args(command);
    let command = inference::with_args(command);
    logging::with_args(command)
}
