//! Image-file frame source.
//!
//! Plays back still images from a directory in sorted order, looping, for
//! offline runs against captured scenes. Only local paths are accepted.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use crate::ingest::Frame;

/// Configuration for a file source.
#[derive(Clone, Debug, Default)]
pub struct FileConfig {
    /// Directory of .jpg/.jpeg/.png files.
    pub dir: String,
    /// Loop back to the first image after the last one.
    pub repeat: bool,
}

/// Image-file frame source.
pub struct FileSource {
    config: FileConfig,
    paths: Vec<PathBuf>,
    cursor: usize,
    frames_read: u64,
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        if config.dir.trim().is_empty() || config.dir.contains("://") {
            return Err(anyhow!(
                "file ingestion only supports local directory paths"
            ));
        }
        Ok(Self {
            config,
            paths: Vec::new(),
            cursor: 0,
            frames_read: 0,
        })
    }

    /// Scan the directory for image files.
    pub fn connect(&mut self) -> Result<()> {
        let dir = Path::new(&self.config.dir);
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("failed to read image directory {}", dir.display()))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| is_image_path(path))
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(anyhow!("no image files in {}", dir.display()));
        }

        log::info!(
            "FileSource: {} images in {}",
            paths.len(),
            dir.display()
        );
        self.paths = paths;
        self.cursor = 0;
        Ok(())
    }

    /// Decode the next image. Returns `None` when a non-repeating source is
    /// exhausted.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.cursor >= self.paths.len() {
            if !self.config.repeat {
                return Ok(None);
            }
            self.cursor = 0;
        }

        let path = &self.paths[self.cursor];
        self.cursor += 1;

        let decoded = image::open(path)
            .with_context(|| format!("failed to decode {}", path.display()))?
            .to_rgb8();
        let (width, height) = decoded.dimensions();
        self.frames_read += 1;

        Ok(Some(Frame::new(decoded.into_raw(), width, height)))
    }

    pub fn is_healthy(&self) -> bool {
        !self.paths.is_empty()
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }
}

fn is_image_path(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    matches!(ext.to_lowercase().as_str(), "jpg" | "jpeg" | "png")
}
