//! BorlaCam - real-time waste classification.
//!
//! This crate implements the decision pipeline that turns raw object-detector
//! output into trustworthy waste classifications, plus the serving and
//! monitoring scaffolding around it.
//!
//! # Architecture
//!
//! Data flows through the pipeline leaf-first:
//!
//! 1. **Detection source** (`detect`): a `DetectorBackend` yields raw
//!    candidates (label, confidence, box) for a frame.
//! 2. **Category mapper** (`classify::CategoryMap`): raw labels collapse to
//!    a closed set of waste categories; unknown labels fall back to trash.
//! 3. **Precision filter** (`classify::PrecisionFilter`): class-specific
//!    thresholds, geometric plausibility, confidence re-scoring, and
//!    per-category de-duplication produce at most a handful of results.
//! 4. **Announcement gate** (`classify::AnnouncementGate`): per-category
//!    cooldowns decide which results get spoken; the `Announcer` worker
//!    renders them without ever blocking the frame loop.
//! 5. **Serving shell** (`api`): the same detect→filter path behind
//!    `POST /api/predict`, with health and status endpoints for the
//!    monitoring loop (`monitor`).
//!
//! The filter and gate hold no hidden global state: sessions construct them
//! and pass them by reference, so the live camera loop and the API handler
//! share one code path.

pub mod api;
pub mod classify;
pub mod config;
pub mod detect;
pub mod ingest;
pub mod monitor;
pub mod ui;

pub use classify::{
    phrase_for, AnnouncementGate, Announcer, AudioSink, CategoryMap, CommandSink, DetectionStatus,
    FilterConfig, FrameDecision, LogSink, PrecisionFilter, ScoredDetection, SessionStats,
    WasteCategory,
};
pub use config::{AnnounceSettings, BorlacamConfig, CameraSettings, FilterProfile};
pub use detect::{BoundingBox, DetectorBackend, ImageDims, RawDetection, StubBackend};
#[cfg(feature = "backend-tract")]
pub use detect::TractBackend;
pub use ingest::{CameraConfig, CameraSource, FileConfig, FileSource, Frame};
