use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use moodlens_core::shared::constants::{
    DASHBOARD_RECENT_LIMIT, DEFAULT_MIN_FACE_SIZE, DEFAULT_MIN_NEIGHBORS, DEFAULT_SCALE_FACTOR,
    HISTORY_PAGE_SIZE, MAX_UPLOAD_BYTES,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub upload_dir: PathBuf,
    pub database_path: PathBuf,
    pub cascade_path: Option<PathBuf>,
    pub emotion_model_path: Option<PathBuf>,
    pub classifier_seed: Option<u64>,
    pub scale_factor: f64,
    pub min_neighbors: u32,
    pub min_size: (u32, u32),
    pub max_upload_bytes: usize,
    pub history_page_size: usize,
    pub recent_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            database_path: PathBuf::from("emotions.db"),
            cascade_path: None,
            emotion_model_path: None,
            classifier_seed: None,
            scale_factor: DEFAULT_SCALE_FACTOR,
            min_neighbors: DEFAULT_MIN_NEIGHBORS,
            min_size: DEFAULT_MIN_FACE_SIZE,
            max_upload_bytes: MAX_UPLOAD_BYTES,
            history_page_size: HISTORY_PAGE_SIZE,
            recent_limit: DASHBOARD_RECENT_LIMIT,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("Moodlens").join("settings.json"))
    }

    /// Settings from `path`, or the user config file when `path` is `None`.
    /// A missing or unreadable file yields the defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::config_path(),
        };
        path.and_then(|p| Self::read(&p)).unwrap_or_default()
    }

    fn read(path: &Path) -> Option<Self> {
        let json = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&json) {
            Ok(settings) => Some(settings),
            Err(e) => {
                log::warn!("Ignoring unreadable settings {}: {e}", path.display());
                None
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
