use image::{GrayImage, RgbImage};

/// A decoded raster: contiguous bytes in row-major order.
///
/// Colour frames are RGB (or RGBA). Format conversion happens at the codec
/// boundary only; the pipeline treats pixel data as opaque apart from
/// grayscale conversion.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8) -> Self {
        debug_assert!(
            (1..=4).contains(&channels),
            "channels must be between 1 and 4"
        );
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
        }
    }

    pub fn from_rgb_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, 3)
    }

    pub fn from_gray_image(image: GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, 1)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Single-channel luminance copy (BT.601 weights, rounded).
    pub fn to_gray(&self) -> GrayImage {
        let pixels = match self.channels {
            1 => self.data.clone(),
            2 => self.data.chunks_exact(2).map(|px| px[0]).collect(),
            c => self
                .data
                .chunks_exact(c as usize)
                .map(|px| luminance(px[0], px[1], px[2]))
                .collect(),
        };
        GrayImage::from_raw(self.width, self.height, pixels)
            .expect("Frame data length must match dimensions")
    }

    /// RGB copy; grey is replicated, alpha is dropped.
    pub fn to_rgb_image(&self) -> RgbImage {
        let pixels = match self.channels {
            3 => self.data.clone(),
            1 => self.data.iter().flat_map(|&v| [v, v, v]).collect(),
            2 => self.data.chunks_exact(2).flat_map(|px| [px[0], px[0], px[0]]).collect(),
            c => self
                .data
                .chunks_exact(c as usize)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect(),
        };
        RgbImage::from_raw(self.width, self.height, pixels)
            .expect("Frame data length must match dimensions")
    }
}

fn luminance(r: u8, g: u8, b: u8) -> u8 {
    let y = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
    y.round().clamp(0.0, 255.0) as u8
}
