pub mod emotion;
pub mod emotion_classifier;
pub mod emotion_distribution;
pub mod face_result;
