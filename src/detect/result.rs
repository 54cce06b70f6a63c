use serde::Serialize;

/// Axis-aligned bounding box in source-image pixel coordinates.
///
/// Invariant: `x1 < x2`, `y1 < y2` for well-formed boxes. Degenerate boxes
/// can arrive from a detector and are rejected downstream, never an error.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Box center point.
    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Width over height. `None` for boxes with no vertical extent.
    pub fn aspect_ratio(&self) -> Option<f32> {
        let h = self.height();
        if h > 0.0 {
            Some(self.width() / h)
        } else {
            None
        }
    }

    /// A box that cannot contain a real object (zero or negative extent).
    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }
}

/// Source image dimensions, carried alongside detections so relative
/// geometry checks do not depend on a live frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageDims {
    pub width: u32,
    pub height: u32,
}

impl ImageDims {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> f32 {
        self.width as f32 * self.height as f32
    }

    pub fn center(&self) -> (f32, f32) {
        (self.width as f32 / 2.0, self.height as f32 / 2.0)
    }
}

/// One raw candidate from the detector, in its native vocabulary.
///
/// Produced fresh per inference call and never mutated; re-scoring happens
/// downstream on copies.
#[derive(Clone, Debug)]
pub struct RawDetection {
    /// Detector class label (e.g. "bottle", "organic").
    pub label: String,
    /// Detector confidence in [0, 1].
    pub confidence: f32,
    /// Box in source-image pixel coordinates.
    pub bbox: BoundingBox,
}

impl RawDetection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_geometry() {
        let b = BoundingBox::new(10.0, 20.0, 110.0, 70.0);
        assert_eq!(b.width(), 100.0);
        assert_eq!(b.height(), 50.0);
        assert_eq!(b.area(), 5000.0);
        assert_eq!(b.center(), (60.0, 45.0));
        assert_eq!(b.aspect_ratio(), Some(2.0));
        assert!(!b.is_degenerate());
    }

    #[test]
    fn degenerate_boxes_have_no_aspect_ratio() {
        let flat = BoundingBox::new(0.0, 10.0, 50.0, 10.0);
        assert!(flat.is_degenerate());
        assert_eq!(flat.aspect_ratio(), None);

        let inverted = BoundingBox::new(50.0, 0.0, 10.0, 20.0);
        assert!(inverted.is_degenerate());
    }
}
