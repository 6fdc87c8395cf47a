//! Bounding-box overlay rendering.

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::detect::{BoundingBox, Detection};

/// Draws detections onto a frame, returning a new image.
pub trait Overlay: Send + Sync {
    fn render(&self, image: &RgbImage, detections: &[Detection]) -> Result<RgbImage>;
}

/// Hollow rectangle renderer.
#[derive(Clone, Debug)]
pub struct BoxOverlay {
    color: Rgb<u8>,
    thickness: u32,
}

impl Default for BoxOverlay {
    fn default() -> Self {
        Self {
            color: Rgb([0, 255, 0]),
            thickness: 2,
        }
    }
}

impl BoxOverlay {
    pub fn new(color: Rgb<u8>, thickness: u32) -> Self {
        Self {
            color,
            thickness: thickness.max(1),
        }
    }
}

impl Overlay for BoxOverlay {
    fn render(&self, image: &RgbImage, detections: &[Detection]) -> Result<RgbImage> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(anyhow!("cannot overlay boxes on an empty frame"));
        }

        let mut out = image.clone();
        for detection in detections {
            let clamped = clamp_to_frame(detection.bounds(), width, height).ok_or_else(|| {
                anyhow!(
                    "bounding box {:?} for '{}' does not intersect the {}x{} frame",
                    detection.bounds(),
                    detection.label(),
                    width,
                    height
                )
            })?;
            draw_hollow_rect(&mut out, clamped, self.thickness, self.color)?;
        }
        Ok(out)
    }
}

/// Clip a box to the frame. `None` when the box is inverted or entirely outside.
fn clamp_to_frame(bounds: BoundingBox, width: u32, height: u32) -> Option<BoundingBox> {
    if !bounds.is_well_formed() || bounds.x_min >= width || bounds.y_min >= height {
        return None;
    }
    Some(BoundingBox::new(
        bounds.x_min,
        bounds.y_min,
        bounds.x_max.min(width - 1),
        bounds.y_max.min(height - 1),
    ))
}

/// Draw `thickness` nested one-pixel rings, innermost last, stopping at the center.
fn draw_hollow_rect(
    image: &mut RgbImage,
    rect: BoundingBox,
    thickness: u32,
    color: Rgb<u8>,
) -> Result<()> {
    for i in 0..thickness {
        if rect.x_min + i > rect.x_max.saturating_sub(i)
            || rect.y_min + i > rect.y_max.saturating_sub(i)
        {
            break;
        }
        let (left, top) = (rect.x_min + i, rect.y_min + i);
        let width = rect.x_max - i - left + 1;
        let height = rect.y_max - i - top + 1;
        let ring = Rect::at(
            i32::try_from(left).map_err(|_| anyhow!("box corner {} out of range", left))?,
            i32::try_from(top).map_err(|_| anyhow!("box corner {} out of range", top))?,
        )
        .of_size(width, height);
        draw_hollow_rect_mut(image, ring, color);
    }
    Ok(())
}
