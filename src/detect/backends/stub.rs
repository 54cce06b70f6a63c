use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, RawDetection};

/// Scripted scene phases the stub cycles through. Each phase lasts
/// `PHASE_FRAMES` frames so a live loop sees stable detections long enough
/// to exercise the cooldown gate.
const PHASE_FRAMES: u64 = 45;

/// Stub backend for tests and demos. Emits a deterministic cycle of
/// waste-like detections without looking at pixel content.
pub struct StubBackend {
    frame_count: u64,
    labels: Vec<String>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            frame_count: 0,
            labels: vec!["organic".to_string(), "recyclable".to_string()],
        }
    }

    /// Candidates for the current scene phase, before the floor is applied.
    ///
    /// The cycle covers the interesting shapes: a clean scene, a centered
    /// banana, a centered bottle, a cluttered frame with a duplicate and a
    /// sliver, and a low-confidence edge case.
    fn scripted_candidates(&self, width: u32, height: u32) -> Vec<RawDetection> {
        let w = width as f32;
        let h = height as f32;
        let phase = (self.frame_count / PHASE_FRAMES) % 5;

        match phase {
            // Empty scene.
            0 => vec![],
            // Centered organic item, modest confidence.
            1 => vec![RawDetection::new(
                "banana",
                0.52,
                centered_box(w, h, 0.30, 0.25),
            )],
            // Centered bottle, high confidence.
            2 => vec![RawDetection::new(
                "bottle",
                0.78,
                centered_box(w, h, 0.18, 0.45),
            )],
            // Clutter: two recyclables (one weaker) plus a sliver artifact.
            3 => vec![
                RawDetection::new("bottle", 0.71, centered_box(w, h, 0.20, 0.40)),
                RawDetection::new(
                    "can",
                    0.48,
                    BoundingBox::new(w * 0.62, h * 0.55, w * 0.80, h * 0.85),
                ),
                RawDetection::new(
                    "bottle",
                    0.66,
                    BoundingBox::new(0.0, h * 0.48, w, h * 0.52),
                ),
            ],
            // Low-confidence organic near the frame edge.
            _ => vec![RawDetection::new(
                "apple",
                0.21,
                BoundingBox::new(0.0, 0.0, w * 0.12, h * 0.14),
            )],
        }
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn labels(&self) -> Vec<String> {
        self.labels.clone()
    }

    fn detect(
        &mut self,
        _pixels: &[u8],
        width: u32,
        height: u32,
        conf_floor: f32,
        _iou: f32,
    ) -> Result<Vec<RawDetection>> {
        self.frame_count += 1;

        let detections = self
            .scripted_candidates(width, height)
            .into_iter()
            .filter(|d| d.confidence >= conf_floor)
            .collect();

        Ok(detections)
    }
}

fn centered_box(w: f32, h: f32, rel_w: f32, rel_h: f32) -> BoundingBox {
    let bw = w * rel_w;
    let bh = h * rel_h;
    BoundingBox::new(
        (w - bw) / 2.0,
        (h - bh) / 2.0,
        (w + bw) / 2.0,
        (h + bh) / 2.0,
    )
}
