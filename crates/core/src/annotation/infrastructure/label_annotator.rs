/// Draws each face as a coloured box with a filled caption band above it
/// holding `"{label}: {confidence}"` in white.
///
/// Drawing goes through `imageproc`, which clips every primitive to the
/// canvas, so boxes touching or crossing the image border are safe.
use ab_glyph::{Font, FontArc, InvalidFont, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::emotion::domain::face_result::FaceResult;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::constants::{LABEL_BAND_HEIGHT, LABEL_TEXT_OFFSET_X, LABEL_TEXT_OFFSET_Y};
use crate::shared::frame::Frame;

use super::emotion_palette::color_for_label;

static FONT_BYTES: &[u8] = include_bytes!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/DejaVuSans.ttf"
));

const TEXT_SCALE: f32 = 18.0;
const OUTLINE_WIDTH: u32 = 2;
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

pub struct LabelAnnotator {
    font: FontArc,
    scale: PxScale,
}

impl LabelAnnotator {
    /// Annotator using the bundled DejaVu Sans face.
    pub fn new() -> Result<Self, InvalidFont> {
        Ok(Self {
            font: FontArc::try_from_slice(FONT_BYTES)?,
            scale: PxScale::from(TEXT_SCALE),
        })
    }

    fn draw_face(&self, canvas: &mut RgbImage, result: &FaceResult) {
        let (width, height) = canvas.dimensions();
        let Some(b) = result.bounding_box().clamp_to(width, height) else {
            return;
        };
        let color = color_for_label(result.dominant_emotion().label());

        draw_outline(canvas, &b, color);

        let band_top = b.y.saturating_sub(LABEL_BAND_HEIGHT);
        let band_height = b.y - band_top;
        if band_height > 0 {
            let band = Rect::at(b.x as i32, band_top as i32).of_size(b.width, band_height);
            draw_filled_rect_mut(canvas, band, color);
        }

        // imageproc positions text by its top edge; shift so the baseline
        // sits LABEL_TEXT_OFFSET_Y above the box.
        let ascent = self.font.as_scaled(self.scale).ascent().round() as i32;
        let text_x = b.x as i32 + LABEL_TEXT_OFFSET_X;
        let text_y = b.y as i32 - LABEL_TEXT_OFFSET_Y - ascent;
        draw_text_mut(
            canvas,
            TEXT_COLOR,
            text_x,
            text_y,
            self.scale,
            &self.font,
            &result.label_text(),
        );
    }
}

fn draw_outline(canvas: &mut RgbImage, b: &BoundingBox, color: Rgb<u8>) {
    for inset in 0..OUTLINE_WIDTH {
        if b.width <= 2 * inset || b.height <= 2 * inset {
            break;
        }
        let rect = Rect::at((b.x + inset) as i32, (b.y + inset) as i32)
            .of_size(b.width - 2 * inset, b.height - 2 * inset);
        draw_hollow_rect_mut(canvas, rect, color);
    }
}

impl FrameAnnotator for LabelAnnotator {
    fn annotate(&self, frame: &Frame, results: &[FaceResult]) -> Frame {
        let mut canvas = frame.to_rgb_image();
        for result in results {
            self.draw_face(&mut canvas, result);
        }
        Frame::from_rgb_image(canvas)
    }
}
