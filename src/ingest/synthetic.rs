//! Synthetic `stub://` camera.
//!
//! Produces deterministic RGB frames: a vertical gradient background with a bright
//! block that moves to a new position every `scene_period` frames. Frame captures
//! and releases are counted so callers can check the release obligation is met.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};

use super::{
    Camera, CameraProperties, ImageType, NamedImage, PinholeIntrinsics, Projector,
    ResponseMetadata, VideoStream,
};
use crate::frame::{Frame, ReleaseHandle};

const BLOCK_SIZE: u32 = 16;

/// Configuration for a synthetic camera.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    /// Source URL (must use the `stub://` scheme).
    pub url: String,
    pub width: u32,
    pub height: u32,
    /// Nominal frame rate reported in properties.
    pub target_fps: u32,
    /// Number of frames between scene changes.
    pub scene_period: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            url: "stub://camera".to_string(),
            width: 640,
            height: 480,
            target_fps: 10,
            scene_period: 10,
        }
    }
}

/// Statistics for a synthetic camera.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntheticStats {
    pub frames_captured: u64,
    pub frames_released: u64,
    pub url: String,
}

#[derive(Default)]
struct Counters {
    captured: AtomicU64,
    released: AtomicU64,
}

/// Camera producing synthetic frames.
pub struct SyntheticCamera {
    config: SyntheticConfig,
    counters: Arc<Counters>,
}

impl SyntheticCamera {
    pub fn new(config: SyntheticConfig) -> Result<Self> {
        if !config.url.starts_with("stub://") {
            return Err(anyhow!(
                "synthetic camera only supports stub:// urls, got {}",
                config.url
            ));
        }
        if config.width < BLOCK_SIZE || config.height < BLOCK_SIZE {
            return Err(anyhow!(
                "synthetic frames must be at least {}x{} pixels",
                BLOCK_SIZE,
                BLOCK_SIZE
            ));
        }
        if config.scene_period == 0 {
            return Err(anyhow!("scene_period must be greater than zero"));
        }
        Ok(Self {
            config,
            counters: Arc::new(Counters::default()),
        })
    }

    pub fn stats(&self) -> SyntheticStats {
        SyntheticStats {
            frames_captured: self.counters.captured.load(Ordering::SeqCst),
            frames_released: self.counters.released.load(Ordering::SeqCst),
            url: self.config.url.clone(),
        }
    }

    fn intrinsics(&self) -> PinholeIntrinsics {
        let focal = self.config.width as f64;
        PinholeIntrinsics {
            width_px: self.config.width,
            height_px: self.config.height,
            focal_x_px: focal,
            focal_y_px: focal,
            center_x_px: self.config.width as f64 / 2.0,
            center_y_px: self.config.height as f64 / 2.0,
        }
    }
}

impl Camera for SyntheticCamera {
    fn stream(&self) -> Result<Box<dyn VideoStream>> {
        log::info!("SyntheticCamera: stream opened on {}", self.config.url);
        Ok(Box::new(SyntheticStream {
            config: self.config.clone(),
            counters: self.counters.clone(),
            frame_count: 0,
        }))
    }

    fn images(&self) -> Result<(Vec<NamedImage>, ResponseMetadata)> {
        let image = render_scene(&self.config, 0);
        Ok((
            vec![NamedImage {
                name: "color".to_string(),
                image,
            }],
            ResponseMetadata {
                captured_at: SystemTime::now(),
            },
        ))
    }

    fn properties(&self) -> Result<CameraProperties> {
        Ok(CameraProperties {
            supports_pcd: false,
            image_type: ImageType::Color,
            intrinsics: Some(self.intrinsics()),
            frame_rate: Some(self.config.target_fps as f32),
        })
    }

    fn projector(&self) -> Result<Projector> {
        Ok(Projector::new(self.intrinsics()))
    }
}

struct SyntheticStream {
    config: SyntheticConfig,
    counters: Arc<Counters>,
    frame_count: u64,
}

impl VideoStream for SyntheticStream {
    fn next_frame(&mut self) -> Result<Frame> {
        let image = render_scene(&self.config, self.frame_count / self.config.scene_period);
        self.frame_count += 1;
        self.counters.captured.fetch_add(1, Ordering::SeqCst);

        let counters = self.counters.clone();
        let release = ReleaseHandle::new(move || {
            counters.released.fetch_add(1, Ordering::SeqCst);
        });
        Ok(Frame::new(image, release))
    }

    fn close(&mut self) -> Result<()> {
        log::debug!(
            "SyntheticCamera: stream on {} closed after {} frames",
            self.config.url,
            self.frame_count
        );
        Ok(())
    }
}

/// Draw the scene for a given scene index.
fn render_scene(config: &SyntheticConfig, scene: u64) -> RgbImage {
    let height = config.height.max(1);
    let mut image = RgbImage::from_fn(config.width, config.height, |_, y| {
        let shade = (y * 160 / height) as u8;
        Rgb([shade, shade, 40])
    });

    let cols = (config.width / BLOCK_SIZE).max(1) as u64;
    let rows = (config.height / BLOCK_SIZE).max(1) as u64;
    let cell = scene.wrapping_mul(7) % (cols * rows);
    let x0 = (cell % cols) as u32 * BLOCK_SIZE;
    let y0 = (cell / cols) as u32 * BLOCK_SIZE;
    for y in y0..(y0 + BLOCK_SIZE).min(config.height) {
        for x in x0..(x0 + BLOCK_SIZE).min(config.width) {
            image.put_pixel(x, y, Rgb([250, 250, 250]));
        }
    }
    image
}
