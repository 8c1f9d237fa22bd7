//! YOLOv8-style detector running on the rten runtime.
//!
//! The model takes a `[1, 3, S, S]` float input scaled to `0..1` and returns
//! `[1, 4 + classes, anchors]` where the first four rows are box centers and
//! sizes in input pixels. Exports that emit `[1, anchors, 4 + classes]` are
//! accepted too.

use anyhow::{Context, Result};
use image::{imageops::FilterType, RgbImage};
use rten::Model;
use rten_tensor::{prelude::*, NdTensor};
use std::{cmp::Ordering, path::Path};
use tracing::{debug, info};

use super::{labels, BoundingBox, Detection, Detector, InferenceError};

pub const DEFAULT_INPUT_SIZE: u32 = 640;
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.25;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
pub const MAX_DETECTIONS: usize = 300;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct YoloSettings {
    pub input_size: u32,
    pub score_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl Default for YoloSettings {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            max_detections: MAX_DETECTIONS,
        }
    }
}

/// Raw model hit in input coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Candidate {
    pub class_id: usize,
    pub score: f32,
    pub bbox: BoundingBox,
}

pub struct RtenDetector {
    name: String,
    model: Model,
    labels: Vec<String>,
    settings: YoloSettings,
}

impl RtenDetector {
    /// Load a `.rten` model from disk.
    ///
    /// # Errors
    /// Returns an error if the file is missing or not a valid model.
    pub fn load(path: &Path, labels: Vec<String>, settings: YoloSettings) -> Result<Self> {
        let model = Model::load_file(path)
            .with_context(|| format!("failed to load model {}", path.display()))?;
        let name = path
            .file_stem()
            .map_or_else(|| "model".to_string(), |stem| stem.to_string_lossy().into_owned());

        info!(
            model = %path.display(),
            classes = labels.len(),
            input_size = settings.input_size,
            "Detection model loaded"
        );

        Ok(Self {
            name,
            model,
            labels,
            settings,
        })
    }

    fn input_tensor(&self, image: &RgbImage) -> NdTensor<f32, 4> {
        let size = self.settings.input_size;
        let resized = image::imageops::resize(image, size, size, FilterType::Triangle);
        let plane = (size * size) as usize;

        let mut data = vec![0.0f32; 3 * plane];
        for (index, pixel) in resized.pixels().enumerate() {
            for channel in 0..3 {
                data[channel * plane + index] = f32::from(pixel[channel]) / 255.0;
            }
        }
        NdTensor::from_data([1, 3, size as usize, size as usize], data)
    }
}

impl Detector for RtenDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, InferenceError> {
        let input = self.input_tensor(image);
        let output = self
            .model
            .run_one(input.view().into(), None)
            .map_err(|err| InferenceError::Model(err.to_string()))?;
        let output: NdTensor<f32, 3> = output
            .try_into()
            .map_err(|err| InferenceError::Model(format!("unexpected model output: {err:?}")))?;

        let (rows, cols) = (output.size(1), output.size(2));
        let values: Vec<f32> = output.iter().copied().collect();
        // Anchors always outnumber classes; use that to detect transposed exports
        let (values, channels, anchors) = if rows > cols {
            (transpose(&values, rows, cols), cols, rows)
        } else {
            (values, rows, cols)
        };

        let candidates = decode(&values, channels, anchors, self.settings.score_threshold);
        let kept = non_max_suppression(
            candidates,
            self.settings.iou_threshold,
            self.settings.max_detections,
        );
        debug!(anchors, kept = kept.len(), "Decoded model output");

        let (width, height) = image.dimensions();
        let size = self.settings.input_size as f32;
        let (sx, sy) = (width as f32 / size, height as f32 / size);

        Ok(kept
            .into_iter()
            .map(|candidate| Detection {
                class_id: candidate.class_id,
                label: labels::label_for(&self.labels, candidate.class_id),
                confidence: candidate.score,
                bbox: candidate
                    .bbox
                    .scale(sx, sy)
                    .clamp(width as f32, height as f32),
            })
            .collect())
    }
}

fn transpose(values: &[f32], rows: usize, cols: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; values.len()];
    for row in 0..rows {
        for col in 0..cols {
            out[col * rows + row] = values[row * cols + col];
        }
    }
    out
}

/// Channel-major `[4 + classes][anchors]` values to scored boxes at or above
/// `score_threshold`, one per anchor (its best class).
pub(crate) fn decode(
    values: &[f32],
    channels: usize,
    anchors: usize,
    score_threshold: f32,
) -> Vec<Candidate> {
    if channels <= 4 || values.len() < channels * anchors {
        return Vec::new();
    }
    let at = |channel: usize, anchor: usize| values[channel * anchors + anchor];

    (0..anchors)
        .filter_map(|anchor| {
            let (class_id, score) = (4..channels)
                .map(|channel| (channel - 4, at(channel, anchor)))
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))?;
            if score < score_threshold {
                return None;
            }
            Some(Candidate {
                class_id,
                score,
                bbox: BoundingBox::from_center(
                    at(0, anchor),
                    at(1, anchor),
                    at(2, anchor),
                    at(3, anchor),
                ),
            })
        })
        .collect()
}

/// Greedy per-class suppression, highest score first.
pub(crate) fn non_max_suppression(
    mut candidates: Vec<Candidate>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if kept.len() >= max_detections {
            break;
        }
        let overlaps = kept.iter().any(|existing| {
            existing.class_id == candidate.class_id
                && existing.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}
