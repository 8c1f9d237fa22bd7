//! Draw detections onto the source image.

use ab_glyph::{FontRef, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
    drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
    rect::Rect,
};
use std::sync::OnceLock;
use tracing::warn;

use super::Detection;

const LINE_WIDTH: u32 = 3;
const LABEL_SCALE: f32 = 14.0;
const LABEL_PADDING: u32 = 2;
const LABEL_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

static LABEL_FONT_BYTES: &[u8] = include_bytes!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/fonts/DejaVuSansMono.ttf"
));

static LABEL_FONT: OnceLock<Option<FontRef<'static>>> = OnceLock::new();

fn label_font() -> Option<&'static FontRef<'static>> {
    LABEL_FONT
        .get_or_init(|| match FontRef::try_from_slice(LABEL_FONT_BYTES) {
            Ok(font) => Some(font),
            Err(err) => {
                warn!("label font unusable, drawing boxes only: {err}");
                None
            }
        })
        .as_ref()
}

/// Text shown in the tab above a box, e.g. `person 0.91`.
#[must_use]
pub fn label_text(detection: &Detection) -> String {
    format!("{} {:.2}", detection.label, detection.confidence)
}

const PALETTE: [[u8; 3]; 10] = [
    [255, 56, 56],
    [255, 157, 151],
    [255, 112, 31],
    [255, 178, 29],
    [207, 210, 49],
    [72, 249, 10],
    [26, 147, 52],
    [0, 212, 187],
    [52, 69, 147],
    [203, 56, 255],
];

#[must_use]
pub fn class_color(class_id: usize) -> Rgb<u8> {
    Rgb(PALETTE[class_id % PALETTE.len()])
}

/// Outline every detection in its class color with a `label confidence`
/// tab on top of each box. Boxes are clipped to the canvas; the tab moves
/// inside the box when there is no room above it.
pub fn draw_detections(canvas: &mut RgbImage, detections: &[Detection]) {
    let (canvas_width, canvas_height) = canvas.dimensions();
    if canvas_width == 0 || canvas_height == 0 {
        return;
    }

    for detection in detections {
        let bbox = detection
            .bbox
            .clamp(canvas_width as f32, canvas_height as f32);
        let x = bbox.x1.round() as i32;
        let y = bbox.y1.round() as i32;
        let width = (bbox.width().round() as u32).max(1);
        let height = (bbox.height().round() as u32).max(1);
        let color = class_color(detection.class_id);

        draw_label_tab(canvas, x, y, color, &label_text(detection));

        for inset in 0..LINE_WIDTH {
            let inner_width = width.saturating_sub(2 * inset);
            let inner_height = height.saturating_sub(2 * inset);
            if inner_width == 0 || inner_height == 0 {
                break;
            }
            let offset = inset as i32;
            draw_hollow_rect_mut(
                canvas,
                Rect::at(x + offset, y + offset).of_size(inner_width, inner_height),
                color,
            );
        }
    }
}

fn draw_label_tab(canvas: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>, text: &str) {
    let Some(font) = label_font() else {
        return;
    };
    let scale = PxScale::from(LABEL_SCALE);
    let (text_width, text_height) = text_size(scale, font, text);
    let tab_width = text_width + 2 * LABEL_PADDING;
    let tab_height = text_height.max(1) + 2 * LABEL_PADDING;

    let tab_y = if y >= tab_height as i32 {
        y - tab_height as i32
    } else {
        y
    };
    draw_filled_rect_mut(
        canvas,
        Rect::at(x, tab_y).of_size(tab_width, tab_height),
        color,
    );
    draw_text_mut(
        canvas,
        LABEL_COLOR,
        x + LABEL_PADDING as i32,
        tab_y + LABEL_PADDING as i32,
        scale,
        font,
        text,
    );
}
