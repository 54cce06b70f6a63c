use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use borlacam::{BorlacamConfig, WasteCategory};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "BORLACAM_CONFIG",
        "BORLACAM_API_ADDR",
        "BORLACAM_CAMERA_URL",
        "BORLACAM_COOLDOWN_SECS",
        "BORLACAM_PROFILE",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "api": {
            "addr": "0.0.0.0:9000"
        },
        "camera": {
            "url": "stub://bench_camera",
            "target_fps": 15,
            "width": 800,
            "height": 600
        },
        "thresholds": {
            "categories": {"organic": 0.35, "recyclable": 0.65},
            "iou": 0.4,
            "fallback": 0.2
        },
        "filter": {
            "profile": "strict",
            "max_results": 3
        },
        "announce": {
            "cooldown_secs": 5.0,
            "command": "espeak",
            "enabled": false
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("BORLACAM_CONFIG", file.path());
    std::env::set_var("BORLACAM_CAMERA_URL", "stub://override_camera");
    std::env::set_var("BORLACAM_COOLDOWN_SECS", "7.5");

    let cfg = BorlacamConfig::load().expect("load config");

    assert_eq!(cfg.api_addr, "0.0.0.0:9000");
    // Env override wins over the file value.
    assert_eq!(cfg.camera.url, "stub://override_camera");
    assert_eq!(cfg.camera.target_fps, 15);
    assert_eq!(cfg.camera.width, 800);
    assert_eq!(cfg.camera.height, 600);
    assert_eq!(cfg.filter.threshold_for(WasteCategory::Organic), 0.35);
    assert_eq!(cfg.filter.threshold_for(WasteCategory::Recyclable), 0.65);
    assert_eq!(cfg.filter.iou, 0.4);
    assert_eq!(cfg.filter.fallback_confidence, 0.2);
    assert_eq!(cfg.filter.max_results, 3);
    // Strict profile geometry.
    assert_eq!(cfg.filter.geometry.min_relative_area, 0.1);
    assert_eq!(cfg.announce.cooldown, Duration::from_secs_f64(7.5));
    assert_eq!(cfg.announce.command.as_deref(), Some("espeak"));
    assert!(!cfg.announce.enabled);

    clear_env();
}

#[test]
fn missing_config_file_applies_defaults() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("BORLACAM_CONFIG", "/nonexistent/borlacam.json");
    let cfg = BorlacamConfig::load().expect("defaults despite missing file");

    assert_eq!(cfg.filter.threshold_for(WasteCategory::Organic), 0.4);
    assert_eq!(cfg.filter.threshold_for(WasteCategory::Recyclable), 0.7);
    assert_eq!(cfg.announce.cooldown, Duration::from_secs(3));

    clear_env();
}

#[test]
fn invalid_cooldown_env_is_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("BORLACAM_COOLDOWN_SECS", "three seconds");
    assert!(BorlacamConfig::load().is_err());

    clear_env();
}

#[test]
fn profile_env_switches_geometry() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("BORLACAM_PROFILE", "strict");
    let cfg = BorlacamConfig::load().expect("load config");
    assert_eq!(cfg.filter.geometry.min_relative_area, 0.1);

    clear_env();
}
