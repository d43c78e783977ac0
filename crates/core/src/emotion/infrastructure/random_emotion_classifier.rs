/// Reference emotion classifier that ignores the face and returns a random
/// distribution.
///
/// Carries no visual signal at all. It exists so the pipeline can run end to
/// end until a trained model is plugged in behind [`EmotionClassifier`].
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use ndarray::ArrayView4;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::emotion::domain::emotion::EMOTION_COUNT;
use crate::emotion::domain::emotion_classifier::EmotionClassifier;

pub struct RandomEmotionClassifier {
    seed: Option<u64>,
}

impl RandomEmotionClassifier {
    /// Unseeded: every call draws from the thread-local RNG.
    pub fn new() -> Self {
        Self { seed: None }
    }

    /// Deterministic: the RNG for each call is derived from `seed` and the
    /// tensor contents, so the same face always gets the same distribution.
    pub fn seeded(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }
}

impl Default for RandomEmotionClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl EmotionClassifier for RandomEmotionClassifier {
    fn classify(&self, face: ArrayView4<'_, f32>) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        let draws = match self.seed {
            Some(seed) => {
                let mut rng = StdRng::seed_from_u64(seed ^ fingerprint(face));
                draw(&mut rng)
            }
            None => draw(&mut rand::rng()),
        };
        Ok(l1_normalize(draws))
    }
}

fn draw<R: Rng>(rng: &mut R) -> [f64; EMOTION_COUNT] {
    let mut values = [0.0; EMOTION_COUNT];
    for v in values.iter_mut() {
        *v = rng.random::<f64>();
    }
    values
}

fn l1_normalize(values: [f64; EMOTION_COUNT]) -> Vec<f32> {
    let sum: f64 = values.iter().sum();
    if sum <= 0.0 {
        return vec![1.0 / EMOTION_COUNT as f32; EMOTION_COUNT];
    }
    values.iter().map(|v| (v / sum) as f32).collect()
}

fn fingerprint(face: ArrayView4<'_, f32>) -> u64 {
    let mut hasher = DefaultHasher::new();
    face.shape().hash(&mut hasher);
    for v in face.iter() {
        v.to_bits().hash(&mut hasher);
    }
    hasher.finish()
}
