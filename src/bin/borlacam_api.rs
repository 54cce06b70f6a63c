//! borlacam_api - inference API service
//!
//! This daemon:
//! 1. Loads the detection backend
//! 2. Serves /api/predict, /api/status, /api/labels and /health
//! 3. Does NOT open a camera; every request carries its own image

use anyhow::Result;
use std::sync::mpsc;

use borlacam::api::{ApiConfig, ApiServer};
use borlacam::{BorlacamConfig, CategoryMap, DetectorBackend, PrecisionFilter, StubBackend};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = BorlacamConfig::load()?;
    let filter = PrecisionFilter::new(config.filter.clone(), CategoryMap::with_defaults());

    let mut backend = build_backend(&config)?;
    backend.warm_up()?;
    log::info!("detection backend ready: {}", backend.name());

    let api_config = ApiConfig {
        addr: config.api_addr.clone(),
        ..ApiConfig::default()
    };
    let api_handle = ApiServer::new(api_config, filter)
        .with_backend(backend)
        .spawn()?;
    log::info!("inference api listening on {}", api_handle.addr);

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .expect("error setting Ctrl-C handler");

    log::info!("borlacam_api waiting for shutdown signal (Ctrl-C)...");
    let _ = rx.recv();
    log::info!("shutdown signal received, stopping API server...");
    api_handle.stop()?;

    Ok(())
}

#[cfg(feature = "backend-tract")]
fn build_backend(config: &BorlacamConfig) -> Result<Box<dyn DetectorBackend>> {
    if let Ok(model_path) = std::env::var("BORLACAM_MODEL") {
        let backend = borlacam::TractBackend::new(
            &model_path,
            config.camera.width,
            config.camera.height,
            vec!["organic".to_string(), "recyclable".to_string()],
        )?;
        return Ok(Box::new(backend));
    }
    log::warn!("BORLACAM_MODEL not set, using stub backend");
    Ok(Box::new(StubBackend::new()))
}

#[cfg(not(feature = "backend-tract"))]
fn build_backend(_config: &BorlacamConfig) -> Result<Box<dyn DetectorBackend>> {
    Ok(Box::new(StubBackend::new()))
}
