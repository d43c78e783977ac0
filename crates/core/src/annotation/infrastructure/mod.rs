pub mod emotion_palette;
pub mod label_annotator;
