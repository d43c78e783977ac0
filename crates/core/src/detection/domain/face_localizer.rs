use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Domain interface for face localization.
///
/// Returned boxes lie inside the frame; their order carries no meaning. An
/// empty result means "no face found", not an error. Implementations are
/// constructed once and shared read-only, hence `&self`.
pub trait FaceLocalizer: Send + Sync {
    fn locate(&self, frame: &Frame) -> Result<Vec<BoundingBox>, Box<dyn std::error::Error>>;
}
