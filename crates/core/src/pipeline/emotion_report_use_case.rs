use std::collections::BTreeMap;

use serde::Serialize;

use crate::emotion::domain::emotion::Emotion;
use crate::storage::domain::detection_record::DetectionRecord;
use crate::storage::domain::page::Page;
use crate::storage::domain::result_store::ResultStore;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Dashboard {
    /// Faces per dominant emotion, most frequent first.
    pub counts: Vec<(Emotion, u64)>,
    pub total_faces: u64,
    pub recent: Vec<DetectionRecord>,
}

/// Read-side queries over stored detections.
pub struct EmotionReportUseCase {
    store: Box<dyn ResultStore>,
    page_size: usize,
    recent_limit: usize,
}

impl EmotionReportUseCase {
    pub fn new(store: Box<dyn ResultStore>, page_size: usize, recent_limit: usize) -> Self {
        Self {
            store,
            page_size,
            recent_limit,
        }
    }

    pub fn dashboard(&self) -> Result<Dashboard, Box<dyn std::error::Error>> {
        let counts = self.store.counts_by_emotion()?;
        let total_faces = counts.iter().map(|(_, n)| n).sum();
        Ok(Dashboard {
            counts,
            total_faces,
            recent: self.store.recent(self.recent_limit)?,
        })
    }

    pub fn history(&self, page: usize) -> Result<Page<DetectionRecord>, Box<dyn std::error::Error>> {
        self.store.page(page, self.page_size)
    }

    /// `{label: count}` for every emotion seen at least once.
    pub fn stats(&self) -> Result<BTreeMap<String, u64>, Box<dyn std::error::Error>> {
        Ok(self
            .store
            .counts_by_emotion()?
            .into_iter()
            .map(|(emotion, n)| (emotion.label().to_string(), n))
            .collect())
    }
}
