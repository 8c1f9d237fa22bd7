//! Object detection on uploaded images.
//!
//! [`InferenceAdapter`] turns encoded image bytes into an annotated JPEG using
//! any [`Detector`]. [`InferencePool`] runs the adapter off the async runtime
//! with bounded concurrency and a timeout.

pub mod labels;
pub mod pool;
pub mod render;
#[cfg(test)]
pub(crate) mod test_support;
pub mod yolo;

pub use self::pool::{InferencePool, PoolSettings};
pub use self::yolo::{RtenDetector, YoloSettings};

use image::{codecs::jpeg::JpegEncoder, RgbImage};
use std::{fmt::Write as _, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, instrument};

pub const DEFAULT_JPEG_QUALITY: u8 = 90;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("invalid image: {0}")]
    InvalidImage(#[source] image::ImageError),
    #[error("inference queue is full")]
    Busy,
    #[error("inference timed out after {0:?}")]
    Timeout(Duration),
    #[error("model failure: {0}")]
    Model(String),
    #[error("failed to encode annotated image: {0}")]
    Encode(#[source] image::ImageError),
    #[error("inference worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Axis-aligned box in image pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    #[must_use]
    pub fn from_center(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self {
            x1: cx - width / 2.0,
            y1: cy - height / 2.0,
            x2: cx + width / 2.0,
            y2: cy + height / 2.0,
        }
    }

    #[must_use]
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    #[must_use]
    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    #[must_use]
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union; 0 for disjoint or degenerate boxes.
    #[must_use]
    pub fn iou(&self, other: &Self) -> f32 {
        let overlap = Self {
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
            x2: self.x2.min(other.x2),
            y2: self.y2.min(other.y2),
        };
        let intersection = overlap.area();
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }

    #[must_use]
    pub fn scale(&self, sx: f32, sy: f32) -> Self {
        Self {
            x1: self.x1 * sx,
            y1: self.y1 * sy,
            x2: self.x2 * sx,
            y2: self.y2 * sy,
        }
    }

    #[must_use]
    pub fn clamp(&self, width: f32, height: f32) -> Self {
        Self {
            x1: self.x1.clamp(0.0, width),
            y1: self.y1.clamp(0.0, height),
            x2: self.x2.clamp(0.0, width),
            y2: self.y2.clamp(0.0, height),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub class_id: usize,
    pub label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// A pretrained model that finds objects in an RGB image.
///
/// Implementations run synchronously; callers move them off the async
/// runtime.
pub trait Detector: Send + Sync {
    fn name(&self) -> &str;

    /// # Errors
    /// Returns [`InferenceError::Model`] when the model cannot run.
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, InferenceError>;
}

/// Annotated JPEG plus the detections drawn on it.
#[derive(Clone, Debug)]
pub struct Annotated {
    pub jpeg: Vec<u8>,
    pub detections: Vec<Detection>,
}

impl Annotated {
    /// `label:confidence` pairs, comma separated, ASCII only.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for (index, detection) in self.detections.iter().enumerate() {
            if index > 0 {
                out.push(',');
            }
            let label: String = detection
                .label
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                        c
                    } else {
                        '_'
                    }
                })
                .collect();
            let _ = write!(out, "{label}:{:.2}", detection.confidence);
        }
        out
    }
}

pub struct InferenceAdapter {
    detector: Arc<dyn Detector>,
    jpeg_quality: u8,
}

impl InferenceAdapter {
    #[must_use]
    pub fn new(detector: Arc<dyn Detector>, jpeg_quality: u8) -> Self {
        Self {
            detector,
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    #[must_use]
    pub fn detector_name(&self) -> &str {
        self.detector.name()
    }

    /// Decode, detect, draw, and re-encode as JPEG. Runs on the calling
    /// thread.
    ///
    /// # Errors
    /// [`InferenceError::InvalidImage`] when the bytes are not a decodable
    /// image, plus any detector or encoder failure.
    #[instrument(skip_all, fields(input_bytes = bytes.len(), detector = self.detector.name()))]
    pub fn annotate(&self, bytes: &[u8]) -> Result<Annotated, InferenceError> {
        let mut image = image::load_from_memory(bytes)
            .map_err(InferenceError::InvalidImage)?
            .to_rgb8();

        let detections = self.detector.detect(&image)?;
        debug!(detections = detections.len(), "Detection finished");

        render::draw_detections(&mut image, &detections);

        let jpeg = encode_jpeg(&image, self.jpeg_quality)?;
        Ok(Annotated { jpeg, detections })
    }
}

fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, InferenceError> {
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality)
        .encode_image(image)
        .map_err(InferenceError::Encode)?;
    Ok(jpeg)
}
