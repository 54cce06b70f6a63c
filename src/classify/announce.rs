//! Cooldown-gated voice announcements.
//!
//! The gate is a per-category state machine: a category is silent until a
//! confident detection announces it, then stays quiet until the cooldown
//! elapses. The announcer is a single background worker fed by a bounded
//! channel; sends never block and never surface failures, and shutdown does
//! not wait for in-flight speech.

use std::collections::HashMap;
use std::process::{Command, Stdio};
use std::sync::mpsc::{sync_channel, SyncSender, TrySendError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::classify::category::WasteCategory;

pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(3);

/// Pending announcements the channel will hold before dropping new ones.
const QUEUE_DEPTH: usize = 8;

/// Per-category cooldown gate.
///
/// Categories are independent: two categories detected in the same frame
/// each consult their own timer.
#[derive(Debug)]
pub struct AnnouncementGate {
    cooldown: Duration,
    last_announced: HashMap<WasteCategory, Instant>,
}

impl AnnouncementGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_announced: HashMap::new(),
        }
    }

    /// Decide whether `category` may be announced at `now`. Returns true and
    /// records the timestamp when the category is silent or its cooldown has
    /// elapsed.
    pub fn should_announce(&mut self, category: WasteCategory, now: Instant) -> bool {
        if let Some(last) = self.last_announced.get(&category) {
            if now.saturating_duration_since(*last) < self.cooldown {
                return false;
            }
        }
        self.last_announced.insert(category, now);
        true
    }

    /// Forget all cooldowns (session reset).
    pub fn reset(&mut self) {
        self.last_announced.clear();
    }
}

impl Default for AnnouncementGate {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

/// Announcement phrasing: category decides the suffix, label the subject.
pub fn phrase_for(category: WasteCategory, label: &str) -> String {
    let subject = title_case(label);
    match category {
        WasteCategory::Recyclable => format!("{subject} detected - Recyclable waste"),
        WasteCategory::Organic => format!("{subject} detected - Compostable waste"),
        WasteCategory::Trash => format!("{subject} detected"),
    }
}

fn title_case(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Audio rendering capability. May silently no-op when unavailable; callers
/// never depend on delivery.
pub trait AudioSink: Send {
    fn say(&self, text: &str) -> Result<()>;
}

/// Sink that only logs. Used when no speech command is configured.
pub struct LogSink;

impl AudioSink for LogSink {
    fn say(&self, text: &str) -> Result<()> {
        log::info!("announce: {text}");
        Ok(())
    }
}

/// Sink that spawns an external speech command (e.g. espeak) per phrase.
pub struct CommandSink {
    program: String,
    args: Vec<String>,
}

impl CommandSink {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl AudioSink for CommandSink {
    fn say(&self, text: &str) -> Result<()> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .with_context(|| format!("failed to run speech command '{}'", self.program))?;
        if !status.success() {
            anyhow::bail!("speech command '{}' exited with {}", self.program, status);
        }
        Ok(())
    }
}

/// Fire-and-forget announcement dispatcher.
///
/// A slow or broken sink never delays the frame loop: `announce` does a
/// non-blocking send and drops the phrase when the queue is full or the
/// worker is gone. Dropping the announcer closes the channel without joining
/// the worker, so in-flight speech is abandoned rather than awaited.
pub struct Announcer {
    tx: SyncSender<String>,
    _worker: Option<JoinHandle<()>>,
}

impl Announcer {
    pub fn spawn(sink: Box<dyn AudioSink>) -> Self {
        let (tx, rx) = sync_channel::<String>(QUEUE_DEPTH);
        let worker = std::thread::spawn(move || {
            while let Ok(text) = rx.recv() {
                if let Err(err) = sink.say(&text) {
                    log::warn!("announcement failed: {err:#}");
                }
            }
        });
        Self {
            tx,
            _worker: Some(worker),
        }
    }

    /// Queue a phrase. Never blocks; dropped phrases are logged at debug.
    pub fn announce(&self, text: String) {
        match self.tx.try_send(text) {
            Ok(()) => {}
            Err(TrySendError::Full(text)) => {
                log::debug!("announcement queue full, dropping: {text}");
            }
            Err(TrySendError::Disconnected(text)) => {
                log::debug!("announcement worker gone, dropping: {text}");
            }
        }
    }
}
