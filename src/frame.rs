//! Frame ownership layer.
//!
//! Every frame pulled from an upstream source carries a release obligation.
//!
//! - `ReleaseHandle`: Runs the source's cleanup exactly once, on `release()` or on drop.
//! - `Frame`: A decoded RGB image paired with its `ReleaseHandle`.
//! - `FramePurpose`: Why a frame was requested (interactive display vs. background capture).
//!
//! The release obligation travels with the frame through every pipeline branch:
//! annotated output, raw output, capture suppression and post-acquisition failures.

use std::fmt;

use image::RgbImage;

// ----------------------------------------------------------------------------
// ReleaseHandle: exactly-once cleanup
// ----------------------------------------------------------------------------

/// Cleanup obligation for a frame produced by an upstream source.
///
/// The wrapped closure runs at most once. Calling `release()` consumes the handle;
/// dropping an unreleased handle runs the closure as well, so a frame can never leak
/// its upstream buffer regardless of which code path the caller takes.
pub struct ReleaseHandle {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl ReleaseHandle {
    pub fn new<F>(release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Handle for frames whose source holds no buffer to return.
    pub fn noop() -> Self {
        Self { release: None }
    }

    /// Release the frame now.
    pub fn release(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for ReleaseHandle {
    fn drop(&mut self) {
        self.run();
    }
}

impl fmt::Debug for ReleaseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleaseHandle")
            .field("pending", &self.release.is_some())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// One raster image plus its release obligation.
#[derive(Debug)]
pub struct Frame {
    image: RgbImage,
    release: ReleaseHandle,
}

impl Frame {
    pub fn new(image: RgbImage, release: ReleaseHandle) -> Self {
        Self { image, release }
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Split the frame so the image can be replaced while the obligation is kept.
    pub fn into_parts(self) -> (RgbImage, ReleaseHandle) {
        (self.image, self.release)
    }

    /// Release the upstream buffer and drop the image.
    pub fn release(self) {
        self.release.release();
    }
}

/// Why a frame is being requested.
///
/// Background data capture may be told there is nothing to store; interactive
/// consumers always receive a frame (or an error).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FramePurpose {
    #[default]
    Interactive,
    Capture,
}

impl FramePurpose {
    pub fn is_capture(self) -> bool {
        matches!(self, FramePurpose::Capture)
    }
}
