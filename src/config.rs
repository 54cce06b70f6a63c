use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::classify::{FilterConfig, GeometryBounds, WasteCategory};

const DEFAULT_API_ADDR: &str = "127.0.0.1:8000";
const DEFAULT_CAMERA_URL: &str = "stub://front_camera";
const DEFAULT_CAMERA_FPS: u32 = 30;
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_COOLDOWN_SECS: f64 = 3.0;

#[derive(Debug, Deserialize, Default)]
struct BorlacamConfigFile {
    api: Option<ApiConfigFile>,
    camera: Option<CameraConfigFile>,
    thresholds: Option<ThresholdConfigFile>,
    filter: Option<FilterConfigFile>,
    announce: Option<AnnounceConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiConfigFile {
    addr: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ThresholdConfigFile {
    categories: Option<HashMap<WasteCategory, f32>>,
    iou: Option<f32>,
    fallback: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct FilterConfigFile {
    profile: Option<String>,
    final_floor: Option<f32>,
    max_results: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct AnnounceConfigFile {
    cooldown_secs: Option<f64>,
    command: Option<String>,
    args: Option<Vec<String>>,
    enabled: Option<bool>,
}

/// Filter geometry profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterProfile {
    /// Serving tuning: wide admissible area range, low final floor.
    Permissive,
    /// Live-camera tuning: tight area range, higher final floor.
    Strict,
}

impl FilterProfile {
    fn parse(value: &str) -> Result<Self> {
        match value {
            "permissive" => Ok(FilterProfile::Permissive),
            "strict" => Ok(FilterProfile::Strict),
            other => Err(anyhow!(
                "unknown filter profile '{}', expected 'permissive' or 'strict'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub url: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct AnnounceSettings {
    pub cooldown: Duration,
    /// External speech command (e.g. "espeak"). None falls back to logging.
    pub command: Option<String>,
    pub args: Vec<String>,
    pub enabled: bool,
}

/// Resolved application configuration.
///
/// Loaded once at startup; owned by the session (camera loop or API
/// handler) and passed by reference from there.
#[derive(Debug, Clone)]
pub struct BorlacamConfig {
    pub api_addr: String,
    pub camera: CameraSettings,
    pub filter: FilterConfig,
    pub announce: AnnounceSettings,
}

impl BorlacamConfig {
    /// Load from the file named by `BORLACAM_CONFIG` (when set), apply env
    /// overrides, validate. A missing file is not an error: defaults apply.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("BORLACAM_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => read_config_file(Path::new(path))?,
            None => BorlacamConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: BorlacamConfigFile) -> Result<Self> {
        let api_addr = file
            .api
            .and_then(|api| api.addr)
            .unwrap_or_else(|| DEFAULT_API_ADDR.to_string());

        let camera = CameraSettings {
            url: file
                .camera
                .as_ref()
                .and_then(|cam| cam.url.clone())
                .unwrap_or_else(|| DEFAULT_CAMERA_URL.to_string()),
            target_fps: file
                .camera
                .as_ref()
                .and_then(|cam| cam.target_fps)
                .unwrap_or(DEFAULT_CAMERA_FPS),
            width: file
                .camera
                .as_ref()
                .and_then(|cam| cam.width)
                .unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: file
                .camera
                .and_then(|cam| cam.height)
                .unwrap_or(DEFAULT_CAMERA_HEIGHT),
        };

        let profile = file
            .filter
            .as_ref()
            .and_then(|f| f.profile.as_deref())
            .map(FilterProfile::parse)
            .transpose()?
            .unwrap_or(FilterProfile::Permissive);

        let mut filter = match profile {
            FilterProfile::Permissive => FilterConfig::default(),
            FilterProfile::Strict => FilterConfig::strict(),
        };
        if let Some(thresholds) = file.thresholds {
            if let Some(categories) = thresholds.categories {
                // Supplied categories merge over the defaults.
                for (category, value) in categories {
                    filter.thresholds.insert(category, value);
                }
            }
            if let Some(iou) = thresholds.iou {
                filter.iou = iou;
            }
            if let Some(fallback) = thresholds.fallback {
                filter.fallback_confidence = fallback;
            }
        }
        if let Some(filter_file) = file.filter {
            if let Some(floor) = filter_file.final_floor {
                filter.final_floor = floor;
            }
            if let Some(max_results) = filter_file.max_results {
                filter.max_results = max_results;
            }
        }

        let announce_file = file.announce.unwrap_or_default();
        let announce = AnnounceSettings {
            cooldown: Duration::from_secs_f64(
                announce_file.cooldown_secs.unwrap_or(DEFAULT_COOLDOWN_SECS),
            ),
            command: announce_file.command,
            args: announce_file.args.unwrap_or_default(),
            enabled: announce_file.enabled.unwrap_or(true),
        };

        Ok(Self {
            api_addr,
            camera,
            filter,
            announce,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("BORLACAM_API_ADDR") {
            if !addr.trim().is_empty() {
                self.api_addr = addr;
            }
        }
        if let Ok(url) = std::env::var("BORLACAM_CAMERA_URL") {
            if !url.trim().is_empty() {
                self.camera.url = url;
            }
        }
        if let Ok(profile) = std::env::var("BORLACAM_PROFILE") {
            if !profile.trim().is_empty() {
                match FilterProfile::parse(profile.trim())? {
                    FilterProfile::Permissive => {
                        self.filter.geometry = GeometryBounds::permissive();
                    }
                    FilterProfile::Strict => {
                        self.filter.geometry = GeometryBounds::strict();
                    }
                }
            }
        }
        if let Ok(cooldown) = std::env::var("BORLACAM_COOLDOWN_SECS") {
            let seconds: f64 = cooldown
                .parse()
                .map_err(|_| anyhow!("BORLACAM_COOLDOWN_SECS must be a number of seconds"))?;
            self.announce.cooldown = Duration::from_secs_f64(seconds);
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        for (category, threshold) in &self.filter.thresholds {
            if !(0.0..=1.0).contains(threshold) {
                return Err(anyhow!(
                    "threshold for {} must be in [0, 1], got {}",
                    category,
                    threshold
                ));
            }
        }
        if !(0.0..=1.0).contains(&self.filter.fallback_confidence) {
            return Err(anyhow!(
                "fallback confidence must be in [0, 1], got {}",
                self.filter.fallback_confidence
            ));
        }
        if !(0.0..1.0).contains(&self.filter.iou) {
            return Err(anyhow!(
                "iou must be in [0, 1), got {}",
                self.filter.iou
            ));
        }
        if self.filter.max_results == 0 {
            return Err(anyhow!("max_results must be at least 1"));
        }
        if self.announce.cooldown.is_zero() {
            return Err(anyhow!("announcement cooldown must be greater than zero"));
        }
        if self.camera.target_fps == 0 {
            return Err(anyhow!("camera target_fps must be at least 1"));
        }
        if self.filter.geometry.min_relative_area >= self.filter.geometry.max_relative_area {
            return Err(anyhow!("geometry area bounds are inverted"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<BorlacamConfigFile> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            log::warn!(
                "config file {} not found, using defaults",
                path.display()
            );
            return Ok(BorlacamConfigFile::default());
        }
        Err(err) => {
            return Err(anyhow!(
                "failed to read config file {}: {}",
                path.display(),
                err
            ))
        }
    };
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
