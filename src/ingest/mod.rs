//! Upstream camera interface.
//!
//! The object filter wraps another camera. This module defines what it needs from
//! that camera:
//! - `Camera`: opens streams and answers property/projector/image queries
//! - `VideoStream`: yields `Frame`s in order, each with a release obligation
//!
//! A synthetic `stub://` camera is provided for demos and tests.

use std::time::SystemTime;

use anyhow::Result;
use image::RgbImage;
use serde::Serialize;

use crate::frame::Frame;

pub mod synthetic;

pub use synthetic::{SyntheticCamera, SyntheticConfig, SyntheticStats};

/// A camera that can be streamed and queried.
pub trait Camera: Send + Sync {
    /// Open a new ordered frame stream.
    fn stream(&self) -> Result<Box<dyn VideoStream>>;

    /// Capture the current set of named images with response metadata.
    fn images(&self) -> Result<(Vec<NamedImage>, ResponseMetadata)>;

    fn properties(&self) -> Result<CameraProperties>;

    fn projector(&self) -> Result<Projector>;
}

/// Ordered sequence of frames from one camera.
pub trait VideoStream: Send {
    /// Pull the next frame. The caller owns its release obligation.
    fn next_frame(&mut self) -> Result<Frame>;

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Image returned by `Camera::images`, tagged with its source name.
#[derive(Clone, Debug)]
pub struct NamedImage {
    pub name: String,
    pub image: RgbImage,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResponseMetadata {
    pub captured_at: SystemTime,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum ImageType {
    #[default]
    Color,
    Depth,
}

/// Pinhole camera intrinsics in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PinholeIntrinsics {
    pub width_px: u32,
    pub height_px: u32,
    pub focal_x_px: f64,
    pub focal_y_px: f64,
    pub center_x_px: f64,
    pub center_y_px: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CameraProperties {
    pub supports_pcd: bool,
    pub image_type: ImageType,
    pub intrinsics: Option<PinholeIntrinsics>,
    pub frame_rate: Option<f32>,
}

/// Maps image pixels to camera-frame rays.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projector {
    intrinsics: PinholeIntrinsics,
}

impl Projector {
    pub fn new(intrinsics: PinholeIntrinsics) -> Self {
        Self { intrinsics }
    }

    pub fn intrinsics(&self) -> PinholeIntrinsics {
        self.intrinsics
    }

    /// Back-project pixel `(x, y)` at `depth` (same unit as the result) into camera space.
    pub fn image_point_to_3d(&self, x: f64, y: f64, depth: f64) -> [f64; 3] {
        let k = &self.intrinsics;
        [
            (x - k.center_x_px) * depth / k.focal_x_px,
            (y - k.center_y_px) * depth / k.focal_y_px,
            depth,
        ]
    }
}

/// Point cloud type for the point-cloud query, which 2-D pipelines never answer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointCloud {
    pub points: Vec<[f32; 3]>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projector_back_projects_center_to_optical_axis() {
        let projector = Projector::new(PinholeIntrinsics {
            width_px: 640,
            height_px: 480,
            focal_x_px: 500.0,
            focal_y_px: 500.0,
            center_x_px: 320.0,
            center_y_px: 240.0,
        });
        assert_eq!(projector.image_point_to_3d(320.0, 240.0, 2.0), [0.0, 0.0, 2.0]);
        assert_eq!(projector.image_point_to_3d(820.0, 240.0, 1.0), [1.0, 0.0, 1.0]);
    }
}
