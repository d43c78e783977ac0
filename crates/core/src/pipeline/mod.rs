pub mod analyze_image_use_case;
pub mod emotion_report_use_case;
pub mod face_emotion_pipeline;
pub mod face_normalizer;
pub mod infrastructure;
pub mod pipeline_logger;
pub mod upload_policy;
