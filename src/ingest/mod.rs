//! Frame ingestion sources.
//!
//! Frame capture is an external collaborator; the pipeline only needs a
//! source that yields RGB frames:
//! - `CameraSource`: live capture, with a `stub://` synthetic backend so the
//!   whole application runs without hardware
//! - `FileSource`: image-file playback for offline runs and demos
//!
//! Sources are responsible for frame pacing; they never retain frames beyond
//! handoff to the caller.

mod camera;
mod file;

pub use camera::{CameraConfig, CameraSource, CameraStats};
pub use file::{FileConfig, FileSource};

use crate::detect::ImageDims;

/// One captured frame: tightly packed RGB bytes plus dimensions.
#[derive(Clone, Debug)]
pub struct Frame {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            pixels,
            width,
            height,
        }
    }

    pub fn dims(&self) -> ImageDims {
        ImageDims::new(self.width, self.height)
    }
}
