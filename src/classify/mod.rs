mod announce;
mod category;
mod filter;
mod stats;

pub use announce::{
    phrase_for, AnnouncementGate, Announcer, AudioSink, CommandSink, LogSink, DEFAULT_COOLDOWN,
};
pub use category::{CategoryMap, WasteCategory};
pub use filter::{
    BoostPolicy, BoostTier, DetectionStatus, FilterConfig, FrameDecision, GeometryBounds,
    PrecisionFilter, ScoredDetection,
};
pub use stats::{SessionStats, StatsSummary};
