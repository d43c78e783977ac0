use std::path::Path;

use crate::imaging::domain::image_writer::ImageWriter;
use crate::shared::frame::Frame;

/// Saves frames with the `image` crate, creating missing parent directories.
///
/// Output is always RGB, so JPEG targets work for any input channel count.
pub struct ImageFileWriter;

impl ImageFileWriter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageFileWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageWriter for ImageFileWriter {
    fn write(&self, path: &Path, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        if frame.is_empty() {
            return Err(format!("refusing to write empty image to {}", path.display()).into());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let rgb = frame.to_rgb_image();
        rgb.save(path)?;
        log::debug!("Wrote {}x{} image to {}", rgb.width(), rgb.height(), path.display());
        Ok(())
    }
}
