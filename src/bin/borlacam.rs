//! borlacam - live waste-classification camera daemon
//!
//! This daemon:
//! 1. Ingests frames from the configured camera source
//! 2. Runs the detection backend on each frame
//! 3. Applies the precision filter (thresholds, geometry, re-scoring, dedup)
//! 4. Announces confident detections through the cooldown gate
//! 5. Renders a live statistics panel
//!
//! Interactive controls on stdin: `q` quit, `s` toggle sound, `+`/`-`
//! adjust the detector confidence floor.

use anyhow::Result;
use clap::Parser;
use std::io::{BufRead, IsTerminal};
use std::sync::mpsc;
use std::time::Instant;

use borlacam::ui::Ui;
use borlacam::{
    phrase_for, AnnouncementGate, Announcer, AudioSink, BorlacamConfig, CameraConfig,
    CameraSource, CategoryMap, CommandSink, DetectorBackend, FileConfig, FileSource, Frame,
    LogSink, PrecisionFilter, SessionStats, StubBackend,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Camera URL (stub:// selects the synthetic source).
    #[arg(long)]
    camera: Option<String>,
    /// Play back image files from this directory instead of a camera.
    #[arg(long, conflicts_with = "camera")]
    images: Option<String>,
    /// Stop after this many frames (0 = run until quit).
    #[arg(long, default_value_t = 0)]
    max_frames: u64,
    /// Disable voice announcements.
    #[arg(long)]
    no_sound: bool,
    /// UI mode: auto, plain, pretty.
    #[arg(long)]
    ui: Option<String>,
}

enum Control {
    Quit,
    ToggleSound,
    RaiseConfidence,
    LowerConfidence,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = BorlacamConfig::load()?;
    if let Some(camera) = args.camera.clone() {
        config.camera.url = camera;
    }

    let ui = Ui::from_flag(args.ui.as_deref(), std::io::stderr().is_terminal());

    let mut backend = build_backend(&config)?;
    {
        let _stage = ui.stage("load detection model");
        backend.warm_up()?;
    }
    log::info!("detection backend: {}", backend.name());

    let mut source = match &args.images {
        Some(dir) => {
            let mut file_source = FileSource::new(FileConfig {
                dir: dir.clone(),
                repeat: false,
            })?;
            let _stage = ui.stage("scan image directory");
            file_source.connect()?;
            FrameFeed::Files(file_source)
        }
        None => {
            let mut camera = CameraSource::new(CameraConfig {
                url: config.camera.url.clone(),
                target_fps: config.camera.target_fps,
                width: config.camera.width,
                height: config.camera.height,
            })?;
            let _stage = ui.stage("open camera");
            camera.connect()?;
            FrameFeed::Camera(camera)
        }
    };

    let filter = PrecisionFilter::new(config.filter.clone(), CategoryMap::with_defaults());
    let mut gate = AnnouncementGate::new(config.announce.cooldown);
    let announcer = Announcer::spawn(build_sink(&config));
    let mut stats = SessionStats::new();

    let (control_tx, control_rx) = mpsc::channel();
    let ctrlc_tx = control_tx.clone();
    ctrlc::set_handler(move || {
        let _ = ctrlc_tx.send(Control::Quit);
    })
    .expect("error setting Ctrl-C handler");
    spawn_stdin_reader(control_tx);

    let mut sound_enabled = config.announce.enabled && !args.no_sound;
    let mut confidence_floor = config.filter.fallback_confidence;
    let mut panel = ui.stats_panel();

    let feed = args
        .images
        .clone()
        .unwrap_or_else(|| config.camera.url.clone());
    log::info!(
        "borlacam running. source={} cooldown={:.1}s",
        feed,
        config.announce.cooldown.as_secs_f64()
    );

    'frames: loop {
        while let Ok(control) = control_rx.try_recv() {
            match control {
                Control::Quit => break 'frames,
                Control::ToggleSound => {
                    sound_enabled = !sound_enabled;
                    log::info!("sound {}", if sound_enabled { "enabled" } else { "disabled" });
                }
                Control::RaiseConfidence => {
                    confidence_floor = (confidence_floor + 0.1).min(0.9);
                    log::info!("confidence floor {:.1}", confidence_floor);
                }
                Control::LowerConfidence => {
                    confidence_floor = (confidence_floor - 0.1).max(0.1);
                    log::info!("confidence floor {:.1}", confidence_floor);
                }
            }
        }

        let Some(frame) = source.next_frame()? else {
            log::info!("image playback finished");
            break;
        };
        let started = Instant::now();

        let raw = backend.detect(
            &frame.pixels,
            frame.width,
            frame.height,
            confidence_floor,
            filter.config().iou,
        )?;
        let decision = filter.evaluate(raw, frame.dims());

        for det in &decision.accepted {
            if sound_enabled && gate.should_announce(det.category, Instant::now()) {
                announcer.announce(phrase_for(det.category, &det.label));
            }
        }

        stats.record_frame(&decision, started.elapsed());
        panel.update(&stats, sound_enabled, confidence_floor);

        if args.max_frames > 0 && stats.frames() >= args.max_frames {
            break;
        }
    }

    panel.finish();
    stats.log_summary();
    // In-flight announcements are abandoned, not awaited.
    drop(announcer);
    Ok(())
}

enum FrameFeed {
    Camera(CameraSource),
    Files(FileSource),
}

impl FrameFeed {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match self {
            FrameFeed::Camera(source) => source.next_frame().map(Some),
            FrameFeed::Files(source) => source.next_frame(),
        }
    }
}

fn spawn_stdin_reader(tx: mpsc::Sender<Control>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let control = match line.trim() {
                "q" => Some(Control::Quit),
                "s" => Some(Control::ToggleSound),
                "+" | "=" => Some(Control::RaiseConfidence),
                "-" => Some(Control::LowerConfidence),
                _ => None,
            };
            if let Some(control) = control {
                let quit = matches!(control, Control::Quit);
                if tx.send(control).is_err() || quit {
                    break;
                }
            }
        }
    });
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

fn build_sink(config: &BorlacamConfig) -> Box<dyn AudioSink> {
    match &config.announce.command {
        Some(command) => Box::new(CommandSink::new(
            command.clone(),
            config.announce.args.clone(),
        )),
        None => Box::new(LogSink),
    }
}
