//! Live camera frame source.
//!
//! `CameraSource` paces frames to the configured rate and produces `Frame`
//! instances. Real capture hardware is an external concern; the `stub://`
//! backend generates a synthetic scene so the live loop, the stub detector,
//! and the tests all run without a camera attached.

use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use crate::ingest::Frame;

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Capture URL. `stub://` URLs select the synthetic backend.
    pub url: String,
    /// Target frame rate; the source sleeps to hold this pace.
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            url: "stub://front_camera".to_string(),
            target_fps: 30,
            width: 640,
            height: 480,
        }
    }
}

/// Camera frame source.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCameraSource),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        if config.target_fps == 0 {
            return Err(anyhow!("camera target_fps must be at least 1"));
        }
        if config.url.starts_with("stub://") {
            Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCameraSource::new(config)),
            })
        } else {
            Err(anyhow!(
                "unsupported camera url '{}': only stub:// sources are built in",
                config.url
            ))
        }
    }

    /// Open the capture device.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.connect(),
        }
    }

    /// Capture the next frame, pacing to the target rate.
    pub fn next_frame(&mut self) -> Result<Frame> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.next_frame(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.is_healthy(),
        }
    }

    pub fn stats(&self) -> CameraStats {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.stats(),
        }
    }
}

/// Statistics for a camera source.
#[derive(Clone, Debug)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub url: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests and demos
// ----------------------------------------------------------------------------

struct SyntheticCameraSource {
    config: CameraConfig,
    frame_count: u64,
    last_frame_at: Option<Instant>,
}

impl SyntheticCameraSource {
    fn new(config: CameraConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            last_frame_at: None,
        }
    }

    fn connect(&mut self) -> Result<()> {
        log::info!(
            "CameraSource: connected to {} (synthetic)",
            self.config.url
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        self.pace();
        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());

        let pixels = self.generate_synthetic_pixels();
        Ok(Frame::new(pixels, self.config.width, self.config.height))
    }

    /// Sleep off the remainder of the frame interval.
    fn pace(&self) {
        let Some(last) = self.last_frame_at else {
            return;
        };
        let interval = Duration::from_secs(1) / self.config.target_fps;
        let elapsed = last.elapsed();
        if elapsed < interval {
            std::thread::sleep(interval - elapsed);
        }
    }

    /// Synthetic scene: flat background with an "object" patch that drifts
    /// every 50 frames, so downstream consumers see changing content.
    fn generate_synthetic_pixels(&self) -> Vec<u8> {
        let width = self.config.width as usize;
        let height = self.config.height as usize;
        let mut pixels = vec![32u8; width * height * 3];

        let phase = (self.frame_count / 50) % 4;
        let (ox, oy) = match phase {
            0 => (width / 4, height / 4),
            1 => (width / 2, height / 4),
            2 => (width / 2, height / 2),
            _ => (width / 4, height / 2),
        };
        let patch_w = width / 5;
        let patch_h = height / 5;

        for y in oy..(oy + patch_h).min(height) {
            for x in ox..(ox + patch_w).min(width) {
                let idx = (y * width + x) * 3;
                pixels[idx] = 200;
                pixels[idx + 1] = ((self.frame_count * 7) % 256) as u8;
                pixels[idx + 2] = 90;
            }
        }

        pixels
    }

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }
}
