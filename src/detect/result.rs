use serde::Serialize;

/// Axis-aligned bounding box in pixel coordinates (inclusive corners).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x_min: u32,
    pub y_min: u32,
    pub x_max: u32,
    pub y_max: u32,
}

impl BoundingBox {
    pub fn new(x_min: u32, y_min: u32, x_max: u32, y_max: u32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Box covering a whole `width` x `height` frame.
    pub fn full_frame(width: u32, height: u32) -> Self {
        Self::new(0, 0, width.saturating_sub(1), height.saturating_sub(1))
    }

    /// True when the corners are ordered.
    pub fn is_well_formed(&self) -> bool {
        self.x_min <= self.x_max && self.y_min <= self.y_max
    }
}

/// One labelled, scored, spatially bounded result from a detector.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Detection {
    label: String,
    score: f32,
    bounds: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, score: f32, bounds: BoundingBox) -> Self {
        Self {
            label: label.into(),
            score,
            bounds,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Confidence in `[0, 1]`.
    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corner_ordering() {
        assert!(BoundingBox::new(0, 0, u32::MAX, 0).is_well_formed());
        assert!(BoundingBox::new(3, 3, 3, 3).is_well_formed());
        assert!(!BoundingBox::new(4, 0, 3, 0).is_well_formed());
    }

    #[test]
    fn full_frame_covers_last_pixel() {
        assert_eq!(BoundingBox::full_frame(640, 480), BoundingBox::new(0, 0, 639, 479));
        assert_eq!(BoundingBox::full_frame(0, 0), BoundingBox::new(0, 0, 0, 0));
    }
}
