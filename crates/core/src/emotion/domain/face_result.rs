use serde::Serialize;

use super::emotion::Emotion;
use super::emotion_distribution::EmotionDistribution;
use crate::shared::bounding_box::BoundingBox;

/// One located face with its emotion distribution.
///
/// The dominant label and confidence are derived once at construction and
/// the record is immutable afterwards.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FaceResult {
    #[serde(rename = "box")]
    bounding_box: BoundingBox,
    emotions: EmotionDistribution,
    dominant_emotion: Emotion,
    confidence: f64,
}

impl FaceResult {
    pub fn new(bounding_box: BoundingBox, emotions: EmotionDistribution) -> Self {
        let (dominant_emotion, confidence) = emotions.dominant();
        Self {
            bounding_box,
            emotions,
            dominant_emotion,
            confidence,
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    pub fn emotions(&self) -> &EmotionDistribution {
        &self.emotions
    }

    pub fn dominant_emotion(&self) -> Emotion {
        self.dominant_emotion
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Overlay text, e.g. `happy: 0.90`.
    pub fn label_text(&self) -> String {
        format!("{}: {:.2}", self.dominant_emotion, self.confidence)
    }
}
