use thiserror::Error;

use crate::shared::constants::{
    DEFAULT_MIN_FACE_SIZE, DEFAULT_MIN_NEIGHBORS, DEFAULT_SCALE_FACTOR,
};

#[derive(Error, Debug, PartialEq)]
pub enum CascadeParamsError {
    #[error("scale factor must be greater than 1.0, got {0}")]
    ScaleFactor(f64),
    #[error("minimum face size must be positive, got {0}x{1}")]
    MinSize(u32, u32),
}

/// Multi-scale search settings for cascade localization.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CascadeParams {
    scale_factor: f64,
    min_neighbors: u32,
    min_size: (u32, u32),
}

impl CascadeParams {
    pub fn new(
        scale_factor: f64,
        min_neighbors: u32,
        min_size: (u32, u32),
    ) -> Result<Self, CascadeParamsError> {
        if !scale_factor.is_finite() || scale_factor <= 1.0 {
            return Err(CascadeParamsError::ScaleFactor(scale_factor));
        }
        if min_size.0 == 0 || min_size.1 == 0 {
            return Err(CascadeParamsError::MinSize(min_size.0, min_size.1));
        }
        Ok(Self {
            scale_factor,
            min_neighbors,
            min_size,
        })
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    pub fn min_neighbors(&self) -> u32 {
        self.min_neighbors
    }

    pub fn min_size(&self) -> (u32, u32) {
        self.min_size
    }
}

impl Default for CascadeParams {
    fn default() -> Self {
        Self {
            scale_factor: DEFAULT_SCALE_FACTOR,
            min_neighbors: DEFAULT_MIN_NEIGHBORS,
            min_size: DEFAULT_MIN_FACE_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let p = CascadeParams::default();
        assert_eq!(p.scale_factor(), 1.1);
        assert_eq!(p.min_neighbors(), 5);
        assert_eq!(p.min_size(), (30, 30));
    }

    #[rstest]
    #[case::one(1.0)]
    #[case::below_one(0.9)]
    #[case::nan(f64::NAN)]
    fn test_rejects_non_growing_scale(#[case] scale: f64) {
        assert!(matches!(
            CascadeParams::new(scale, 5, (30, 30)),
            Err(CascadeParamsError::ScaleFactor(_))
        ));
    }

    #[test]
    fn test_rejects_zero_min_size() {
        assert_eq!(
            CascadeParams::new(1.2, 3, (0, 30)).unwrap_err(),
            CascadeParamsError::MinSize(0, 30)
        );
    }

    #[test]
    fn test_zero_neighbors_is_allowed() {
        assert!(CascadeParams::new(1.05, 0, (24, 24)).is_ok());
    }
}
