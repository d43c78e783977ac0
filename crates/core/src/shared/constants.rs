pub const CASCADE_FILE_NAME: &str = "haarcascade_frontalface_default.xml";
pub const CASCADE_URL: &str =
    "https://raw.githubusercontent.com/opencv/opencv/4.x/data/haarcascades/haarcascade_frontalface_default.xml";

/// Search-window growth between pyramid levels.
pub const DEFAULT_SCALE_FACTOR: f64 = 1.1;
/// Overlapping raw hits required to accept a face.
pub const DEFAULT_MIN_NEIGHBORS: u32 = 5;
pub const DEFAULT_MIN_FACE_SIZE: (u32, u32) = (30, 30);

/// Side of the square grayscale face tensor fed to the classifier.
pub const CLASSIFIER_INPUT_SIZE: u32 = 48;

pub const LABEL_BAND_HEIGHT: u32 = 40;
pub const LABEL_TEXT_OFFSET_X: i32 = 5;
pub const LABEL_TEXT_OFFSET_Y: i32 = 10;

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Largest accepted upload, 16 MiB.
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

pub const HISTORY_PAGE_SIZE: usize = 10;
pub const DASHBOARD_RECENT_LIMIT: usize = 5;
