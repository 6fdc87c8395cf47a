use anyhow::Result;
use image::RgbImage;
use sha2::{Digest, Sha256};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection};

/// Label emitted by `MotionBackend`.
pub const MOTION_LABEL: &str = "motion";

const MOTION_SCORE: f32 = 0.85;

/// CPU backend for frame-difference motion detection.
///
/// Hashes the pixels of each frame and compares against the previous one. A change
/// produces a single full-frame `"motion"` detection.
#[derive(Default)]
pub struct MotionBackend {
    last_hash: Option<[u8; 32]>,
}

impl MotionBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DetectorBackend for MotionBackend {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>> {
        let mut hasher = Sha256::new();
        hasher.update(image.width().to_le_bytes());
        hasher.update(image.height().to_le_bytes());
        hasher.update(image.as_raw());
        let current_hash: [u8; 32] = hasher.finalize().into();

        let motion = self.last_hash.is_some_and(|prev| prev != current_hash);

        self.last_hash = Some(current_hash);

        if motion {
            Ok(vec![Detection::new(
                MOTION_LABEL,
                MOTION_SCORE,
                BoundingBox::full_frame(image.width(), image.height()),
            )])
        } else {
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn motion_backend_detects_changes() {
        let mut backend = MotionBackend::new();
        let still = RgbImage::from_pixel(8, 6, Rgb([10, 10, 10]));
        let moved = RgbImage::from_pixel(8, 6, Rgb([200, 10, 10]));

        assert!(backend.detect(&still).unwrap().is_empty());

        let dets = backend.detect(&moved).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].label(), MOTION_LABEL);
        assert_eq!(dets[0].score(), 0.85);
        assert_eq!(dets[0].bounds(), BoundingBox::new(0, 0, 7, 5));

        assert!(backend.detect(&moved).unwrap().is_empty());
    }
}
