use serde::{Deserialize, Serialize};

/// Axis-aligned face box in source-image pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Intersects the box with a `width × height` image.
    ///
    /// Returns `None` when nothing of the box remains inside the image.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<BoundingBox> {
        let x1 = self.x.min(width);
        let y1 = self.y.min(height);
        let x2 = self.right().min(width);
        let y2 = self.bottom().min(height);
        let clamped = BoundingBox::new(x1, y1, x2 - x1, y2 - y1);
        (!clamped.is_degenerate()).then_some(clamped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_edges() {
        let b = BoundingBox::new(10, 20, 30, 40);
        assert_eq!(b.right(), 40);
        assert_eq!(b.bottom(), 60);
    }

    // ── Clamping ─────────────────────────────────────────────────────

    #[test]
    fn test_clamp_inside_is_identity() {
        let b = BoundingBox::new(5, 5, 10, 10);
        assert_eq!(b.clamp_to(100, 100), Some(b));
    }

    #[test]
    fn test_clamp_trims_overhang() {
        let b = BoundingBox::new(90, 80, 30, 40);
        assert_eq!(b.clamp_to(100, 100), Some(BoundingBox::new(90, 80, 10, 20)));
    }

    #[rstest]
    #[case::outside(BoundingBox::new(120, 10, 10, 10))]
    #[case::on_edge(BoundingBox::new(100, 10, 10, 10))]
    #[case::empty(BoundingBox::new(10, 10, 0, 10))]
    fn test_clamp_without_overlap_is_none(#[case] b: BoundingBox) {
        assert_eq!(b.clamp_to(100, 100), None);
    }
}
