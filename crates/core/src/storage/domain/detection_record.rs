use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::emotion::domain::emotion::Emotion;
use crate::emotion::domain::emotion_distribution::EmotionDistribution;
use crate::emotion::domain::face_result::FaceResult;

/// Where an analysed image came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Upload,
    Webcam,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown source type '{0}'")]
pub struct UnknownSourceType(pub String);

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Upload => "upload",
            SourceType::Webcam => "webcam",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = UnknownSourceType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload" => Ok(SourceType::Upload),
            "webcam" => Ok(SourceType::Webcam),
            other => Err(UnknownSourceType(other.to_string())),
        }
    }
}

/// One persisted face. An image with three faces produces three records
/// sharing `timestamp`, `filename` and `faces_detected`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectionRecord {
    /// Assigned by the store; `None` until saved.
    pub id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub filename: String,
    pub source_type: SourceType,
    pub emotions: EmotionDistribution,
    pub dominant_emotion: Emotion,
    pub confidence: f64,
    pub faces_detected: usize,
}

impl DetectionRecord {
    pub fn from_result(
        result: &FaceResult,
        timestamp: DateTime<Utc>,
        filename: &str,
        source_type: SourceType,
        faces_detected: usize,
    ) -> Self {
        Self {
            id: None,
            timestamp,
            filename: filename.to_string(),
            source_type,
            emotions: result.emotions().clone(),
            dominant_emotion: result.dominant_emotion(),
            confidence: result.confidence(),
            faces_detected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::bounding_box::BoundingBox;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case(SourceType::Upload, "upload")]
    #[case(SourceType::Webcam, "webcam")]
    fn test_source_type_text(#[case] source: SourceType, #[case] text: &str) {
        assert_eq!(source.to_string(), text);
        assert_eq!(text.parse::<SourceType>().unwrap(), source);
        assert_eq!(serde_json::to_value(source).unwrap(), text);
    }

    #[test]
    fn test_unknown_source_type() {
        assert_eq!(
            "scanner".parse::<SourceType>().unwrap_err(),
            UnknownSourceType("scanner".to_string())
        );
    }

    #[test]
    fn test_from_result_copies_face_fields() {
        let mut scores = [0.02; 7];
        scores[Emotion::Sad.index()] = 0.88;
        let result = FaceResult::new(
            BoundingBox::new(1, 2, 30, 30),
            EmotionDistribution::from_f64(&scores).unwrap(),
        );
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        let record = DetectionRecord::from_result(&result, ts, "a.jpg", SourceType::Upload, 2);

        assert_eq!(record.id, None);
        assert_eq!(record.dominant_emotion, Emotion::Sad);
        assert_eq!(record.confidence, result.confidence());
        assert_eq!(record.faces_detected, 2);
        assert_eq!(record.filename, "a.jpg");
        assert_eq!(record.timestamp, ts);
    }
}
