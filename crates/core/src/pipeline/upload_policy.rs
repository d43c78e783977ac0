use std::fmt::Display;

use chrono::{DateTime, TimeZone};

use crate::shared::constants::IMAGE_EXTENSIONS;

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const FALLBACK_NAME: &str = "image";

/// True when `name` ends in one of the accepted image extensions.
pub fn allowed_file(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Reduces a client-supplied file name to a safe single path component.
pub fn secure_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    let trimmed = cleaned.trim_start_matches(['.', '_']);
    if trimmed.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// `annotated_<YYYYmmdd_HHMMSS>_<secure name>`, stamped in `received_at`'s own zone.
pub fn upload_filename<Tz: TimeZone>(received_at: &DateTime<Tz>, original_name: &str) -> String
where
    Tz::Offset: Display,
{
    format!(
        "annotated_{}_{}",
        received_at.format(TIMESTAMP_FORMAT),
        secure_filename(original_name)
    )
}

/// `webcam_<YYYYmmdd_HHMMSS>.jpg`
pub fn webcam_filename<Tz: TimeZone>(received_at: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    format!("webcam_{}.jpg", received_at.format(TIMESTAMP_FORMAT))
}
