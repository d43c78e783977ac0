use crate::emotion::domain::emotion::Emotion;

use super::detection_record::DetectionRecord;
use super::page::Page;

/// Persistence for per-face detection records.
pub trait ResultStore: Send {
    /// Stores all records of one image atomically and returns their ids.
    fn save(&mut self, records: &[DetectionRecord]) -> Result<Vec<i64>, Box<dyn std::error::Error>>;

    /// Record count per dominant emotion, most frequent first. Emotions that
    /// never occurred are absent.
    fn counts_by_emotion(&self) -> Result<Vec<(Emotion, u64)>, Box<dyn std::error::Error>>;

    /// The `limit` newest records.
    fn recent(&self, limit: usize) -> Result<Vec<DetectionRecord>, Box<dyn std::error::Error>>;

    /// Newest-first page of records; `page` is 1-based.
    fn page(
        &self,
        page: usize,
        per_page: usize,
    ) -> Result<Page<DetectionRecord>, Box<dyn std::error::Error>>;
}
