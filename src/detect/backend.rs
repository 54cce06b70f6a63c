use anyhow::Result;

use crate::detect::result::RawDetection;

/// Detector backend trait.
///
/// The decision pipeline never depends on a backend's internal architecture,
/// only on this contract: given an RGB frame, return candidate detections
/// above `conf_floor`. Non-max suppression happens inside the backend (or the
/// exported model); `iou` is the threshold handed to it.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Class labels in the backend's native vocabulary.
    fn labels(&self) -> Vec<String>;

    /// Run detection on a frame.
    ///
    /// `pixels` is tightly packed RGB, `width * height * 3` bytes.
    /// Implementations must treat the pixel slice as read-only and ephemeral.
    fn detect(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        conf_floor: f32,
        iou: f32,
    ) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook (e.g. a dummy inference to page in weights).
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

impl DetectorBackend for Box<dyn DetectorBackend> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn labels(&self) -> Vec<String> {
        (**self).labels()
    }

    fn detect(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        conf_floor: f32,
        iou: f32,
    ) -> Result<Vec<RawDetection>> {
        (**self).detect(pixels, width, height, conf_floor, iou)
    }

    fn warm_up(&mut self) -> Result<()> {
        (**self).warm_up()
    }
}
