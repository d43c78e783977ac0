pub mod cascade_params;
pub mod face_localizer;
