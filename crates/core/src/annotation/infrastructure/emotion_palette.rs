use image::Rgb;

use crate::emotion::domain::emotion::Emotion;

const FALLBACK_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

fn color_for_emotion(emotion: Emotion) -> Rgb<u8> {
    match emotion {
        Emotion::Angry => Rgb([255, 0, 0]),
        Emotion::Disgust => Rgb([0, 128, 0]),
        Emotion::Fear => Rgb([255, 0, 255]),
        Emotion::Happy => Rgb([255, 255, 0]),
        Emotion::Sad => Rgb([0, 0, 255]),
        Emotion::Surprise => Rgb([128, 0, 128]),
        Emotion::Neutral => Rgb([128, 128, 128]),
    }
}

/// Box colour for a label; anything outside the seven emotions is white.
pub fn color_for_label(label: &str) -> Rgb<u8> {
    label
        .parse::<Emotion>()
        .map(color_for_emotion)
        .unwrap_or(FALLBACK_COLOR)
}
