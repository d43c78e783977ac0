/// Emotion classifier backed by an ONNX model via `ort`.
///
/// Expects a FER-style network: input `(1, 48, 48, 1)` float32 in `[0, 1]`,
/// output 7 values in angry/disgust/fear/happy/sad/surprise/neutral order.
/// Raw logits are softmaxed; outputs that already form a probability vector
/// are passed through.
use std::path::Path;
use std::sync::Mutex;

use ndarray::ArrayView4;

use crate::emotion::domain::emotion::EMOTION_COUNT;
use crate::emotion::domain::emotion_classifier::EmotionClassifier;

/// Tolerance for treating model output as already normalized.
const PROBABILITY_SUM_EPS: f32 = 1e-3;

pub struct OnnxEmotionClassifier {
    // `Session::run` needs exclusive access.
    session: Mutex<ort::session::Session>,
}

impl OnnxEmotionClassifier {
    /// Load an ONNX emotion model. Fails fast on a missing or invalid file.
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if !model_path.exists() {
            return Err(format!("Emotion model not found: {}", model_path.display()).into());
        }
        // Parallelism comes from batch worker threads, not from the session.
        let session = ort::session::Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_inter_threads(1)?
            .with_intra_threads(1)?
            .with_execution_providers(execution_providers())?
            .commit_from_file(model_path)?;
        log::info!("Loaded emotion model from {}", model_path.display());
        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

impl EmotionClassifier for OnnxEmotionClassifier {
    fn classify(&self, face: ArrayView4<'_, f32>) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        let input_value = ort::value::Tensor::from_array(face.to_owned())?;

        let raw: Vec<f32> = {
            let mut session = self
                .session
                .lock()
                .map_err(|_| "Emotion model session lock poisoned")?;
            let outputs = session.run(ort::inputs![input_value])?;
            let scores = outputs[0].try_extract_array::<f32>()?;
            let values: Vec<f32> = scores.iter().copied().collect();
            values
        };

        if raw.len() != EMOTION_COUNT {
            return Err(format!(
                "Emotion model expected {EMOTION_COUNT} outputs, got {}",
                raw.len()
            )
            .into());
        }
        Ok(to_probabilities(raw))
    }
}

/// Platform accelerator if the `ort` build has one; CPU otherwise.
fn execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        Vec::new()
    }
}

fn to_probabilities(raw: Vec<f32>) -> Vec<f32> {
    let sum: f32 = raw.iter().sum();
    let is_probability = raw.iter().all(|&v| (0.0..=1.0).contains(&v))
        && (sum - 1.0).abs() <= PROBABILITY_SUM_EPS;
    if is_probability {
        raw
    } else {
        softmax(&raw)
    }
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&v| (v - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.iter().map(|&e| e / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_missing_model_fails_fast() {
        let result = OnnxEmotionClassifier::new(Path::new("/nonexistent/fer.onnx"));
        assert!(result.is_err());
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        let sum: f32 = probs.iter().sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-6);
        assert!(probs.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_softmax_is_stable_for_large_logits() {
        let probs = softmax(&[1000.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(probs.iter().all(|p| p.is_finite()));
        assert_relative_eq!(probs[0], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_probabilities_pass_through() {
        let raw = vec![0.1, 0.1, 0.1, 0.4, 0.1, 0.1, 0.1];
        assert_eq!(to_probabilities(raw.clone()), raw);
    }

    #[test]
    fn test_logits_are_softmaxed() {
        let probs = to_probabilities(vec![-2.0, 0.5, 3.0, 1.0, 0.0, 0.0, 0.0]);
        let sum: f32 = probs.iter().sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-6);
        assert!(probs.iter().all(|&p| p > 0.0));
    }
}
