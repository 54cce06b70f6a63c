use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

use crate::classify::{SessionStats, WasteCategory};

#[derive(Clone, Copy, Debug)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        Self { mode, is_tty }
    }

    pub fn from_flag(ui_flag: Option<&str>, is_tty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty)
    }

    fn use_pretty(&self) -> bool {
        match self.mode {
            UiMode::Pretty => true,
            UiMode::Auto => self.is_tty,
            UiMode::Plain => false,
        }
    }

    /// Startup stage with a spinner (or plain stderr line).
    pub fn stage(&self, name: &str) -> StageGuard {
        if self.use_pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// Live statistics panel for the camera loop.
    pub fn stats_panel(&self) -> StatsPanel {
        if self.use_pretty() {
            let bar = ProgressBar::new_spinner();
            bar.set_draw_target(ProgressDrawTarget::stderr());
            let style = ProgressStyle::with_template("{msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            bar.set_style(style);
            StatsPanel {
                bar: Some(bar),
                last_plain_log: Instant::now(),
            }
        } else {
            StatsPanel {
                bar: None,
                last_plain_log: Instant::now(),
            }
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

/// Single-line live panel: FPS, per-category counts, sound state, and the
/// current confidence floor.
pub struct StatsPanel {
    bar: Option<ProgressBar>,
    last_plain_log: Instant,
}

impl StatsPanel {
    pub fn update(&mut self, stats: &SessionStats, sound_enabled: bool, confidence_floor: f32) {
        let line = format!(
            "FPS {:>5.1} | organic {} | recyclable {} | uncertain {} | sound {} | conf {:.1}",
            stats.average_fps(),
            stats.category_count(WasteCategory::Organic),
            stats.category_count(WasteCategory::Recyclable),
            stats.uncertain_detections(),
            if sound_enabled { "ON" } else { "OFF" },
            confidence_floor,
        );

        match &self.bar {
            Some(bar) => bar.set_message(line),
            None => {
                // Plain mode: one line every few seconds instead of a
                // redrawn panel.
                if self.last_plain_log.elapsed() >= Duration::from_secs(5) {
                    eprintln!("{line}");
                    self.last_plain_log = Instant::now();
                }
            }
        }
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
