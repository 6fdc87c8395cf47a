use anyhow::Result;
use image::RgbImage;

use crate::detect::result::Detection;

/// Detector backend trait.
///
/// A backend is one vision service: it maps a frame to a set of detections.
/// Calls may block for the duration of a model inference. Errors are returned
/// to the caller unchanged; the pipeline never retries on a backend's behalf.
pub trait DetectorBackend: Send {
    /// Run detection on a frame.
    ///
    /// The image is borrowed for the duration of the call only.
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
