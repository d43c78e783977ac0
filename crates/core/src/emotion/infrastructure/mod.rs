pub mod onnx_emotion_classifier;
pub mod random_emotion_classifier;
