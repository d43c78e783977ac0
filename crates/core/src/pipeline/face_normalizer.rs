use image::imageops::{self, FilterType};
use image::GrayImage;
use ndarray::Array4;

use crate::shared::bounding_box::BoundingBox;
use crate::shared::constants::CLASSIFIER_INPUT_SIZE;

/// Cuts `bbox` out of `gray`, clamped to the image.
///
/// Returns `None` when no pixels of the box lie inside the image.
pub fn crop_gray(gray: &GrayImage, bbox: &BoundingBox) -> Option<GrayImage> {
    let (width, height) = gray.dimensions();
    let b = bbox.clamp_to(width, height)?;
    Some(imageops::crop_imm(gray, b.x, b.y, b.width, b.height).to_image())
}

/// Classifier input for one face: 48×48, intensities scaled to `[0, 1]`,
/// shaped `(1, 48, 48, 1)`.
///
/// The triangle filter widens its support when shrinking, which averages
/// over the source area like an area resampler.
pub fn normalize_face(crop: &GrayImage) -> Array4<f32> {
    let side = CLASSIFIER_INPUT_SIZE;
    let resized = if crop.dimensions() == (side, side) {
        crop.clone()
    } else {
        imageops::resize(crop, side, side, FilterType::Triangle)
    };
    let n = side as usize;
    Array4::from_shape_fn((1, n, n, 1), |(_, y, x, _)| {
        resized.get_pixel(x as u32, y as u32).0[0] as f32 / 255.0
    })
}
