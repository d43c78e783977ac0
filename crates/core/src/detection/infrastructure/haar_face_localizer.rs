/// Face localizer backed by OpenCV's boosted Haar cascade.
///
/// `detectMultiScale` does the pyramid search and clusters overlapping
/// windows; `min_neighbors` is the cluster size a face needs to survive.
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use opencv::core::{Mat, Rect, Size, Vector};
use opencv::objdetect::CascadeClassifier;
use opencv::prelude::*;
use thiserror::Error;

use crate::detection::domain::cascade_params::CascadeParams;
use crate::detection::domain::face_localizer::FaceLocalizer;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum CascadeLoadError {
    #[error("cascade file not found: {0}")]
    NotFound(PathBuf),
    #[error("cascade path is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),
    #[error("failed to load cascade {path}: {source}")]
    OpenCv {
        path: PathBuf,
        #[source]
        source: opencv::Error,
    },
    #[error("{0} is not a usable Haar cascade")]
    Empty(PathBuf),
}

pub struct HaarFaceLocalizer {
    // `detect_multi_scale` needs `&mut self`.
    classifier: Mutex<CascadeClassifier>,
    params: CascadeParams,
}

impl HaarFaceLocalizer {
    /// Load the cascade from disk. Fails when the file is missing or invalid.
    pub fn from_file(path: &Path, params: CascadeParams) -> Result<Self, CascadeLoadError> {
        if !path.exists() {
            return Err(CascadeLoadError::NotFound(path.to_path_buf()));
        }
        let name = path
            .to_str()
            .ok_or_else(|| CascadeLoadError::NonUtf8Path(path.to_path_buf()))?;
        let classifier = CascadeClassifier::new(name).map_err(|source| CascadeLoadError::OpenCv {
            path: path.to_path_buf(),
            source,
        })?;
        let empty = classifier.empty().map_err(|source| CascadeLoadError::OpenCv {
            path: path.to_path_buf(),
            source,
        })?;
        if empty {
            return Err(CascadeLoadError::Empty(path.to_path_buf()));
        }
        log::info!("Loaded Haar cascade from {}", path.display());
        Ok(Self {
            classifier: Mutex::new(classifier),
            params,
        })
    }
}

impl FaceLocalizer for HaarFaceLocalizer {
    fn locate(&self, frame: &Frame) -> Result<Vec<BoundingBox>, Box<dyn std::error::Error>> {
        if frame.is_empty() {
            return Ok(Vec::new());
        }
        let gray = frame.to_gray();
        let flat = Mat::from_slice(gray.as_raw())?;
        let mat = flat.reshape(1, cv_len(frame.height())?)?.try_clone()?;

        let (min_w, min_h) = self.params.min_size();
        let mut hits = Vector::<Rect>::new();
        {
            let mut classifier = self
                .classifier
                .lock()
                .map_err(|_| "Haar cascade lock poisoned")?;
            classifier.detect_multi_scale(
                &mat,
                &mut hits,
                self.params.scale_factor(),
                i32::try_from(self.params.min_neighbors())?,
                0,
                Size::new(cv_len(min_w)?, cv_len(min_h)?),
                Size::new(0, 0),
            )?;
        }

        let faces: Vec<BoundingBox> = hits
            .iter()
            .filter_map(|r| to_bounding_box(r)?.clamp_to(frame.width(), frame.height()))
            .collect();
        log::debug!(
            "Haar search on {}x{}: {} faces",
            frame.width(),
            frame.height(),
            faces.len()
        );
        Ok(faces)
    }
}

fn cv_len(value: u32) -> Result<i32, std::num::TryFromIntError> {
    i32::try_from(value)
}

fn to_bounding_box(rect: Rect) -> Option<BoundingBox> {
    let x = u32::try_from(rect.x.max(0)).ok()?;
    let y = u32::try_from(rect.y.max(0)).ok()?;
    let width = u32::try_from(rect.width).ok()?;
    let height = u32::try_from(rect.height).ok()?;
    Some(BoundingBox::new(x, y, width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use tempfile::TempDir;

    const BLOCK: BoundingBox = BoundingBox {
        x: 30,
        y: 30,
        width: 60,
        height: 60,
    };

    /// One-stage, one-stump cascade that fires when the right half of a
    /// 24×24 window is clearly brighter than the left half.
    const EDGE_CASCADE: &str = r#"<?xml version="1.0"?>
<opencv_storage>
<cascade type_id="opencv-cascade-classifier">
  <stageType>BOOST</stageType>
  <featureType>HAAR</featureType>
  <height>24</height>
  <width>24</width>
  <stageParams><maxWeakCount>1</maxWeakCount></stageParams>
  <featureParams><maxCatCount>0</maxCatCount></featureParams>
  <stageNum>1</stageNum>
  <stages>
    <_>
      <maxWeakCount>1</maxWeakCount>
      <stageThreshold>0.</stageThreshold>
      <weakClassifiers>
        <_>
          <internalNodes>0 -1 0 2.5e-01</internalNodes>
          <leafValues>-1. 1.</leafValues>
        </_>
      </weakClassifiers>
    </_>
  </stages>
  <features>
    <_><rects><_>0 0 12 24 -1.</_><_>12 0 12 24 1.</_></rects></_>
  </features>
</cascade>
</opencv_storage>
"#;

    fn write_cascade(dir: &TempDir, xml: &str) -> PathBuf {
        let path = dir.path().join("edge.xml");
        std::fs::write(&path, xml).unwrap();
        path
    }

    fn localizer(min_neighbors: u32, min_size: u32) -> HaarFaceLocalizer {
        let dir = tempfile::tempdir().unwrap();
        let params = CascadeParams::new(1.1, min_neighbors, (min_size, min_size)).unwrap();
        HaarFaceLocalizer::from_file(&write_cascade(&dir, EDGE_CASCADE), params).unwrap()
    }

    fn overlaps(a: &BoundingBox, b: &BoundingBox) -> bool {
        a.x < b.right() && b.x < a.right() && a.y < b.bottom() && b.y < a.bottom()
    }

    /// Grey canvas with a dark-left / bright-right block the edge cascade fires on.
    fn scene() -> Frame {
        let img = GrayImage::from_fn(120, 120, |x, y| {
            let inside = x >= BLOCK.x && x < BLOCK.right() && y >= BLOCK.y && y < BLOCK.bottom();
            if inside {
                Luma([if x < BLOCK.x + BLOCK.width / 2 { 0 } else { 255 }])
            } else {
                Luma([128])
            }
        });
        Frame::from_gray_image(img)
    }

    #[test]
    fn test_blank_image_has_no_faces() {
        let frame = Frame::from_rgb_image(RgbImage::from_pixel(120, 90, Rgb([200, 200, 200])));
        assert!(localizer(2, 24).locate(&frame).unwrap().is_empty());
    }

    #[test]
    fn test_finds_block_and_stays_in_bounds() {
        let frame = scene();
        let faces = localizer(2, 24).locate(&frame).unwrap();
        assert!(!faces.is_empty());
        for face in &faces {
            assert!(face.right() <= frame.width() && face.bottom() <= frame.height());
            assert!(overlaps(face, &BLOCK), "{face:?} misses the block");
        }
    }

    #[test]
    fn test_colour_and_grey_inputs_agree() {
        let grey = scene();
        let rgb = Frame::from_rgb_image(image::DynamicImage::ImageLuma8(grey.to_gray()).to_rgb8());
        let loc = localizer(2, 24);
        let mut a = loc.locate(&grey).unwrap();
        let mut b = loc.locate(&rgb).unwrap();
        a.sort_by_key(|r| (r.x, r.y, r.width));
        b.sort_by_key(|r| (r.x, r.y, r.width));
        assert_eq!(a, b);
    }

    #[test]
    fn test_min_size_larger_than_image_finds_nothing() {
        assert!(localizer(2, 200).locate(&scene()).unwrap().is_empty());
    }

    #[test]
    fn test_min_size_filters_small_windows() {
        let faces = localizer(0, 48).locate(&scene()).unwrap();
        assert!(!faces.is_empty());
        assert!(faces.iter().all(|f| f.width >= 48 && f.height >= 48));
    }

    #[test]
    fn test_image_smaller_than_window() {
        let frame = Frame::from_gray_image(GrayImage::from_pixel(10, 10, Luma([0])));
        assert!(localizer(0, 1).locate(&frame).unwrap().is_empty());
    }

    #[test]
    fn test_grouping_reduces_raw_hits() {
        let frame = scene();
        let raw = localizer(0, 24).locate(&frame).unwrap();
        let grouped = localizer(3, 24).locate(&frame).unwrap();
        assert!(grouped.len() < raw.len());
    }

    #[test]
    fn test_missing_cascade_file_fails_fast() {
        let result =
            HaarFaceLocalizer::from_file(Path::new("/nonexistent.xml"), CascadeParams::default());
        assert!(matches!(result, Err(CascadeLoadError::NotFound(_))));
    }

    #[test]
    fn test_garbage_cascade_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_cascade(&dir, "<?xml version=\"1.0\"?>\n<opencv_storage></opencv_storage>\n");
        assert!(HaarFaceLocalizer::from_file(&path, CascadeParams::default()).is_err());
    }

    #[test]
    fn test_negative_rect_origin_is_clamped() {
        let b = to_bounding_box(Rect::new(-4, 3, 10, 12)).unwrap();
        assert_eq!(b, BoundingBox::new(0, 3, 10, 12));
        assert!(to_bounding_box(Rect::new(0, 0, -1, 5)).is_none());
    }
}
