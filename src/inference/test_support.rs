use super::{BoundingBox, Detection, Detector, InferenceError};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::{io::Cursor, time::Duration};

/// Deterministic detector: one box over the middle of the image.
#[derive(Default)]
pub(crate) struct StubDetector {
    delay: Option<Duration>,
    fail: bool,
}

impl StubDetector {
    pub(crate) fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            fail: false,
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            delay: None,
            fail: true,
        }
    }
}

impl Detector for StubDetector {
    fn name(&self) -> &str {
        "stub"
    }

    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, InferenceError> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.fail {
            return Err(InferenceError::Model("stub failure".to_string()));
        }
        let (width, height) = image.dimensions();
        Ok(vec![Detection {
            class_id: 0,
            label: "person".to_string(),
            confidence: 0.9,
            bbox: BoundingBox {
                x1: width as f32 / 4.0,
                y1: height as f32 / 4.0,
                x2: width as f32 * 3.0 / 4.0,
                y2: height as f32 * 3.0 / 4.0,
            },
        }])
    }
}

/// Solid grey PNG of the given size.
pub(crate) fn png_fixture(width: u32, height: u32) -> anyhow::Result<Vec<u8>> {
    let image = RgbImage::from_pixel(width, height, Rgb([128, 128, 128]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}
