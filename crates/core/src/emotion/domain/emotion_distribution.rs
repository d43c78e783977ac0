use std::collections::HashMap;

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::emotion::{Emotion, EMOTION_COUNT};

/// How far a classifier's raw output may drift from summing to 1.0.
pub const SUM_TOLERANCE: f64 = 1e-3;

#[derive(Error, Debug, PartialEq)]
pub enum DistributionError {
    #[error("expected 7 scores, got {0}")]
    WrongLength(usize),
    #[error("score for '{label}' is not a finite non-negative number: {value}")]
    InvalidScore { label: &'static str, value: f64 },
    #[error("scores sum to {0}, expected 1.0")]
    NotNormalized(f64),
    #[error("missing probability for '{0}'")]
    MissingLabel(&'static str),
}

/// Probability per emotion label, always covering all 7 labels and summing
/// to 1.0.
#[derive(Clone, Debug, PartialEq)]
pub struct EmotionDistribution {
    probabilities: [f64; EMOTION_COUNT],
}

impl EmotionDistribution {
    /// Validates a classifier 7-vector and renormalises away rounding drift.
    pub fn from_scores(scores: &[f32]) -> Result<Self, DistributionError> {
        let values: Vec<f64> = scores.iter().map(|&s| s as f64).collect();
        Self::from_f64(&values)
    }

    pub fn from_f64(scores: &[f64]) -> Result<Self, DistributionError> {
        if scores.len() != EMOTION_COUNT {
            return Err(DistributionError::WrongLength(scores.len()));
        }
        for (emotion, &value) in Emotion::ALL.iter().zip(scores) {
            if !value.is_finite() || value < 0.0 {
                return Err(DistributionError::InvalidScore {
                    label: emotion.label(),
                    value,
                });
            }
        }
        let sum: f64 = scores.iter().sum();
        if (sum - 1.0).abs() > SUM_TOLERANCE {
            return Err(DistributionError::NotNormalized(sum));
        }

        let mut probabilities = [0.0; EMOTION_COUNT];
        for (p, &value) in probabilities.iter_mut().zip(scores) {
            *p = value / sum;
        }
        Ok(Self { probabilities })
    }

    pub fn get(&self, emotion: Emotion) -> f64 {
        self.probabilities[emotion.index()]
    }

    pub fn as_array(&self) -> &[f64; EMOTION_COUNT] {
        &self.probabilities
    }

    pub fn iter(&self) -> impl Iterator<Item = (Emotion, f64)> + '_ {
        Emotion::ALL.into_iter().zip(self.probabilities.iter().copied())
    }

    /// Highest-probability label; the earliest label in [`Emotion::ALL`] wins
    /// exact ties.
    pub fn dominant(&self) -> (Emotion, f64) {
        let mut best = 0;
        for i in 1..EMOTION_COUNT {
            if self.probabilities[i] > self.probabilities[best] {
                best = i;
            }
        }
        (Emotion::ALL[best], self.probabilities[best])
    }
}

impl Serialize for EmotionDistribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(EMOTION_COUNT))?;
        for (emotion, p) in self.iter() {
            map.serialize_entry(emotion.label(), &p)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for EmotionDistribution {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = HashMap::<String, f64>::deserialize(deserializer)?;
        let mut scores = [0.0; EMOTION_COUNT];
        for emotion in Emotion::ALL {
            scores[emotion.index()] = *raw
                .get(emotion.label())
                .ok_or_else(|| D::Error::custom(DistributionError::MissingLabel(emotion.label())))?;
        }
        EmotionDistribution::from_f64(&scores).map_err(D::Error::custom)
    }
}
