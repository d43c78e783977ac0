/// Byte-level image I/O at the edge of the pipeline.
///
/// Everything here runs before `FaceEmotionPipeline::process` is entered: a
/// payload that cannot be turned into a non-empty RGB frame is rejected with
/// a [`DecodeError`] and never reaches the localizer.
use std::io::Cursor;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::ImageFormat;
use thiserror::Error;

use crate::pipeline::upload_policy::allowed_file;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("image data is empty")]
    Empty,
    #[error("image is {size} bytes, the limit is {limit}")]
    TooLarge { size: usize, limit: usize },
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("could not decode image: {0}")]
    Raster(#[from] image::ImageError),
    #[error("decoded image has no pixels")]
    NoPixels,
    #[error("file type not allowed: {0}")]
    Extension(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Decodes PNG/JPEG (or any format the `image` crate recognises) into RGB.
pub fn decode_image(bytes: &[u8], max_bytes: usize) -> Result<Frame, DecodeError> {
    check_size(bytes.len(), max_bytes)?;
    let rgb = image::load_from_memory(bytes)?.to_rgb8();
    let frame = Frame::from_rgb_image(rgb);
    if frame.is_empty() {
        return Err(DecodeError::NoPixels);
    }
    Ok(frame)
}

/// Decodes a webcam capture sent as `data:image/...;base64,<payload>`.
/// A bare base64 payload without the `data:` header is accepted too.
pub fn decode_data_url(text: &str, max_bytes: usize) -> Result<Frame, DecodeError> {
    let text = text.trim();
    let payload = match text.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map_or("", |(_, data)| data),
        None => text,
    };
    if payload.is_empty() {
        return Err(DecodeError::Empty);
    }
    let cleaned: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD.decode(cleaned)?;
    decode_image(&bytes, max_bytes)
}

pub fn read_image_file(path: &Path, max_bytes: usize) -> Result<Frame, DecodeError> {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if !allowed_file(name) {
        return Err(DecodeError::Extension(path.display().to_string()));
    }
    let io_err = |source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    };
    let size = std::fs::metadata(path).map_err(io_err)?.len();
    check_size(usize::try_from(size).unwrap_or(usize::MAX), max_bytes)?;
    let bytes = std::fs::read(path).map_err(io_err)?;
    decode_image(&bytes, max_bytes)
}

pub fn encode_image(frame: &Frame, format: ImageFormat) -> Result<Vec<u8>, image::ImageError> {
    let mut out = Cursor::new(Vec::new());
    frame.to_rgb_image().write_to(&mut out, format)?;
    Ok(out.into_inner())
}

/// `data:` URL for an encoded frame, the inverse of [`decode_data_url`].
pub fn encode_data_url(frame: &Frame, format: ImageFormat) -> Result<String, image::ImageError> {
    let bytes = encode_image(frame, format)?;
    Ok(format!(
        "data:{};base64,{}",
        format.to_mime_type(),
        STANDARD.encode(bytes)
    ))
}

fn check_size(size: usize, limit: usize) -> Result<(), DecodeError> {
    if size == 0 {
        return Err(DecodeError::Empty);
    }
    if size > limit {
        return Err(DecodeError::TooLarge { size, limit });
    }
    Ok(())
}
