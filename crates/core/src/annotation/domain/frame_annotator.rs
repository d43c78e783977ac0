use crate::emotion::domain::face_result::FaceResult;
use crate::shared::frame::Frame;

/// Draws face results onto a copy of a frame.
///
/// The input is borrowed immutably, so the caller's pixels can never change.
/// Geometry outside the frame is clipped rather than reported.
pub trait FrameAnnotator: Send + Sync {
    fn annotate(&self, frame: &Frame, results: &[FaceResult]) -> Frame;
}
