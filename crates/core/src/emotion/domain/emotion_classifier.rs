use ndarray::ArrayView4;

/// Domain interface for emotion classification.
///
/// Input is one normalized face tensor of shape `(1, 48, 48, 1)` with values
/// in `[0, 1]`. Output is 7 non-negative scores in [`Emotion::ALL`] order that
/// sum to 1.0. Implementations are shared across callers, hence `&self`.
///
/// Any `Fn(ArrayView4<f32>) -> Result<Vec<f32>, _>` closure is a classifier,
/// which keeps test doubles and real models interchangeable.
///
/// [`Emotion::ALL`]: super::emotion::Emotion::ALL
pub trait EmotionClassifier: Send + Sync {
    fn classify(&self, face: ArrayView4<'_, f32>) -> Result<Vec<f32>, Box<dyn std::error::Error>>;
}

impl<F> EmotionClassifier for F
where
    F: Fn(ArrayView4<'_, f32>) -> Result<Vec<f32>, Box<dyn std::error::Error>> + Send + Sync,
{
    fn classify(&self, face: ArrayView4<'_, f32>) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        self(face)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    #[test]
    fn test_closure_is_a_classifier() {
        let classifier = |face: ArrayView4<'_, f32>| -> Result<Vec<f32>, Box<dyn std::error::Error>> {
            assert_eq!(face.shape(), &[1, 48, 48, 1]);
            Ok(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0])
        };
        let boxed: Box<dyn EmotionClassifier> = Box::new(classifier);
        let tensor = Array4::<f32>::zeros((1, 48, 48, 1));
        let scores = boxed.classify(tensor.view()).unwrap();
        assert_eq!(scores[3], 1.0);
    }
}
