pub mod haar_face_localizer;
pub mod model_resolver;
