use clap::{builder::ValueParser, Arg, ArgMatches, Command};
use std::path::PathBuf;

use crate::inference::pool::{MAX_QUEUE, MAX_WORKERS};

pub const ARG_MODEL_PATH: &str = "model-path";
pub const ARG_LABELS_PATH: &str = "labels-path";
pub const ARG_INPUT_SIZE: &str = "input-size";
pub const ARG_SCORE_THRESHOLD: &str = "score-threshold";
pub const ARG_IOU_THRESHOLD: &str = "iou-threshold";
pub const ARG_JPEG_QUALITY: &str = "jpeg-quality";
pub const ARG_INFERENCE_WORKERS: &str = "inference-workers";
pub const ARG_INFERENCE_QUEUE: &str = "inference-queue";
pub const ARG_INFERENCE_TIMEOUT_SECONDS: &str = "inference-timeout-seconds";

pub const DEFAULT_MODEL_PATH: &str = "models/detector.rten";

#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub model_path: PathBuf,
    pub labels_path: Option<PathBuf>,
    pub input_size: u32,
    pub score_threshold: f32,
    pub iou_threshold: f32,
    pub jpeg_quality: u8,
    pub workers: usize,
    pub queue: usize,
    pub timeout_seconds: u64,
}

impl Options {
    /// Parse model and worker pool arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let read_required = |id: &str| -> anyhow::Result<String> {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };
        let read_unit = |id: &str| -> anyhow::Result<f32> {
            matches
                .get_one::<f32>(id)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };

        Ok(Self {
            model_path: PathBuf::from(read_required(ARG_MODEL_PATH)?),
            labels_path: matches
                .get_one::<String>(ARG_LABELS_PATH)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            input_size: matches.get_one::<u32>(ARG_INPUT_SIZE).copied().unwrap_or(640),
            score_threshold: read_unit(ARG_SCORE_THRESHOLD)?,
            iou_threshold: read_unit(ARG_IOU_THRESHOLD)?,
            jpeg_quality: matches.get_one::<u8>(ARG_JPEG_QUALITY).copied().unwrap_or(90),
            workers: matches
                .get_one::<usize>(ARG_INFERENCE_WORKERS)
                .copied()
                .unwrap_or(2),
            queue: matches
                .get_one::<usize>(ARG_INFERENCE_QUEUE)
                .copied()
                .unwrap_or(8),
            timeout_seconds: matches
                .get_one::<u64>(ARG_INFERENCE_TIMEOUT_SECONDS)
                .copied()
                .unwrap_or(30),
        })
    }
}

/// Parse a float in `0.0..=1.0`.
#[must_use]
pub fn validator_unit_interval() -> ValueParser {
    ValueParser::from(move |value: &str| -> std::result::Result<f32, String> {
        let parsed = value
            .trim()
            .parse::<f32>()
            .map_err(|_| format!("'{value}' is not a number"))?;
        if (0.0..=1.0).contains(&parsed) {
            Ok(parsed)
        } else {
            Err(format!("{parsed} is outside 0.0..=1.0"))
        }
    })
}

fn validator_usize_in(min: usize, max: usize) -> ValueParser {
    ValueParser::from(move |value: &str| -> std::result::Result<usize, String> {
        match value.trim().parse::<usize>() {
            Ok(parsed) if (min..=max).contains(&parsed) => Ok(parsed),
            _ => Err(format!("'{value}' must be an integer in {min}..={max}")),
        }
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_model_args(command);
    with_pool_args(command)
}

fn with_model_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_MODEL_PATH)
                .long(ARG_MODEL_PATH)
                .help("Path to the detection model (.rten)")
                .env("VISIONGATE_MODEL_PATH")
                .default_value(DEFAULT_MODEL_PATH),
        )
        .arg(
            Arg::new(ARG_LABELS_PATH)
                .long(ARG_LABELS_PATH)
                .help("Class labels, one per line (default: COCO)")
                .env("VISIONGATE_LABELS_PATH"),
        )
        .arg(
            Arg::new(ARG_INPUT_SIZE)
                .long(ARG_INPUT_SIZE)
                .help("Square input size the model expects")
                .env("VISIONGATE_INPUT_SIZE")
                .default_value("640")
                .value_parser(clap::value_parser!(u32).range(32..=4096)),
        )
        .arg(
            Arg::new(ARG_SCORE_THRESHOLD)
                .long(ARG_SCORE_THRESHOLD)
                .help("Minimum class confidence to keep a detection")
                .env("VISIONGATE_SCORE_THRESHOLD")
                .default_value("0.25")
                .value_parser(validator_unit_interval()),
        )
        .arg(
            Arg::new(ARG_IOU_THRESHOLD)
                .long(ARG_IOU_THRESHOLD)
                .help("Overlap above which same-class boxes are suppressed")
                .env("VISIONGATE_IOU_THRESHOLD")
                .default_value("0.45")
                .value_parser(validator_unit_interval()),
        )
        .arg(
            Arg::new(ARG_JPEG_QUALITY)
                .long(ARG_JPEG_QUALITY)
                .help("JPEG quality of the annotated image (1-100)")
                .env("VISIONGATE_JPEG_QUALITY")
                .default_value("90")
                .value_parser(clap::value_parser!(u8).range(1..=100)),
        )
}

fn with_pool_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_INFERENCE_WORKERS)
                .long(ARG_INFERENCE_WORKERS)
                .help("Concurrent model invocations")
                .env("VISIONGATE_INFERENCE_WORKERS")
                .default_value("2")
                .value_parser(validator_usize_in(1, MAX_WORKERS)),
        )
        .arg(
            Arg::new(ARG_INFERENCE_QUEUE)
                .long(ARG_INFERENCE_QUEUE)
                .help("Requests allowed to wait for a worker before answering 503")
                .env("VISIONGATE_INFERENCE_QUEUE")
                .default_value("8")
                .value_parser(validator_usize_in(0, MAX_QUEUE)),
        )
        .arg(
            Arg::new(ARG_INFERENCE_TIMEOUT_SECONDS)
                .long(ARG_INFERENCE_TIMEOUT_SECONDS)
                .help("Per-request inference deadline in seconds")
                .env("VISIONGATE_INFERENCE_TIMEOUT_SECONDS")
                .default_value("30")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
