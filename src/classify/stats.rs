//! Session statistics.
//!
//! Aggregates the precision filter's per-frame decisions into the numbers
//! the live panel shows and the end-of-session summary logs: totals per
//! category, uncertain counts, average confidences, and a bounded
//! processing-time window for the FPS estimate.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::classify::category::WasteCategory;
use crate::classify::filter::FrameDecision;

/// Processing-time samples kept for the rolling FPS estimate.
const TIME_WINDOW: usize = 100;

#[derive(Clone, Debug, Default)]
struct CategoryTally {
    count: u64,
    confidence_sum: f64,
}

/// Running statistics for one detection session.
#[derive(Debug)]
pub struct SessionStats {
    session_start: SystemTime,
    frames: u64,
    total_detections: u64,
    uncertain_detections: u64,
    per_category: HashMap<WasteCategory, CategoryTally>,
    processing_times: VecDeque<Duration>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            session_start: SystemTime::now(),
            frames: 0,
            total_detections: 0,
            uncertain_detections: 0,
            per_category: HashMap::new(),
            processing_times: VecDeque::with_capacity(TIME_WINDOW),
        }
    }

    /// Fold one frame's decision into the running totals.
    pub fn record_frame(&mut self, decision: &FrameDecision, elapsed: Duration) {
        self.frames += 1;
        self.total_detections += (decision.accepted.len() + decision.rejected.len()) as u64;
        self.uncertain_detections += decision.rejected.len() as u64;

        for det in &decision.accepted {
            let tally = self.per_category.entry(det.category).or_default();
            tally.count += 1;
            tally.confidence_sum += det.score as f64;
        }

        if self.processing_times.len() >= TIME_WINDOW {
            self.processing_times.pop_front();
        }
        self.processing_times.push_back(elapsed);
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn total_detections(&self) -> u64 {
        self.total_detections
    }

    pub fn uncertain_detections(&self) -> u64 {
        self.uncertain_detections
    }

    pub fn category_count(&self, category: WasteCategory) -> u64 {
        self.per_category
            .get(&category)
            .map(|t| t.count)
            .unwrap_or(0)
    }

    /// Mean confidence of accepted detections for a category.
    pub fn average_confidence(&self, category: WasteCategory) -> Option<f64> {
        let tally = self.per_category.get(&category)?;
        if tally.count == 0 {
            return None;
        }
        Some(tally.confidence_sum / tally.count as f64)
    }

    /// Frames per second over the rolling processing-time window.
    pub fn average_fps(&self) -> f64 {
        if self.processing_times.is_empty() {
            return 0.0;
        }
        let total: Duration = self.processing_times.iter().sum();
        let avg = total.as_secs_f64() / self.processing_times.len() as f64;
        if avg > 0.0 {
            1.0 / avg
        } else {
            0.0
        }
    }

    /// Snapshot for serialization and the final log.
    pub fn summary(&self) -> StatsSummary {
        let mut categories = HashMap::new();
        for (category, tally) in &self.per_category {
            categories.insert(
                *category,
                CategorySummary {
                    count: tally.count,
                    average_confidence: if tally.count > 0 {
                        tally.confidence_sum / tally.count as f64
                    } else {
                        0.0
                    },
                },
            );
        }

        StatsSummary {
            session_start_epoch_s: self
                .session_start
                .duration_since(SystemTime::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            frames: self.frames,
            total_detections: self.total_detections,
            uncertain_detections: self.uncertain_detections,
            average_fps: self.average_fps(),
            categories,
        }
    }

    /// Log the end-of-session summary.
    pub fn log_summary(&self) {
        let summary = self.summary();
        log::info!("detection session summary");
        log::info!(
            "frames={} detections={} uncertain={} ({:.1}%)",
            summary.frames,
            summary.total_detections,
            summary.uncertain_detections,
            percentage(summary.uncertain_detections, summary.total_detections),
        );
        for category in WasteCategory::all() {
            if let Some(cat) = summary.categories.get(&category) {
                log::info!(
                    "{}: {} accepted, avg confidence {:.3}",
                    category,
                    cat.count,
                    cat.average_confidence
                );
            }
        }
        log::info!("average fps: {:.1}", summary.average_fps);
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct CategorySummary {
    pub count: u64,
    pub average_confidence: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct StatsSummary {
    pub session_start_epoch_s: u64,
    pub frames: u64,
    pub total_detections: u64,
    pub uncertain_detections: u64,
    pub average_fps: f64,
    pub categories: HashMap<WasteCategory, CategorySummary>,
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::filter::{DetectionStatus, ScoredDetection};
    use crate::detect::BoundingBox;

    fn accepted(category: WasteCategory, score: f32) -> ScoredDetection {
        ScoredDetection {
            label: category.as_str().to_string(),
            category,
            score,
            bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            status: DetectionStatus::Confident,
        }
    }

    fn rejected(category: WasteCategory) -> ScoredDetection {
        ScoredDetection {
            label: category.as_str().to_string(),
            category,
            score: 0.1,
            bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            status: DetectionStatus::Uncertain {
                reason: "confidence 0.100 below threshold 0.400".to_string(),
            },
        }
    }

    #[test]
    fn tallies_accepted_and_uncertain() {
        let mut stats = SessionStats::new();
        let decision = FrameDecision {
            accepted: vec![
                accepted(WasteCategory::Organic, 0.8),
                accepted(WasteCategory::Recyclable, 0.6),
            ],
            rejected: vec![rejected(WasteCategory::Organic)],
        };
        stats.record_frame(&decision, Duration::from_millis(20));

        assert_eq!(stats.frames(), 1);
        assert_eq!(stats.total_detections(), 3);
        assert_eq!(stats.uncertain_detections(), 1);
        assert_eq!(stats.category_count(WasteCategory::Organic), 1);
        assert_eq!(stats.category_count(WasteCategory::Recyclable), 1);
        assert_eq!(stats.category_count(WasteCategory::Trash), 0);
    }

    #[test]
    fn average_confidence_per_category() {
        let mut stats = SessionStats::new();
        for score in [0.6f32, 0.8] {
            let decision = FrameDecision {
                accepted: vec![accepted(WasteCategory::Organic, score)],
                rejected: vec![],
            };
            stats.record_frame(&decision, Duration::from_millis(10));
        }

        let avg = stats.average_confidence(WasteCategory::Organic).unwrap();
        assert!((avg - 0.7).abs() < 1e-6);
        assert!(stats.average_confidence(WasteCategory::Trash).is_none());
    }

    #[test]
    fn fps_reflects_processing_times() {
        let mut stats = SessionStats::new();
        assert_eq!(stats.average_fps(), 0.0);

        for _ in 0..10 {
            stats.record_frame(&FrameDecision::default(), Duration::from_millis(50));
        }
        let fps = stats.average_fps();
        assert!((fps - 20.0).abs() < 0.5, "expected ~20 fps, got {fps}");
    }

    #[test]
    fn processing_window_is_bounded() {
        let mut stats = SessionStats::new();
        for _ in 0..(TIME_WINDOW + 50) {
            stats.record_frame(&FrameDecision::default(), Duration::from_millis(5));
        }
        assert!(stats.processing_times.len() <= TIME_WINDOW);
        assert_eq!(stats.frames(), (TIME_WINDOW + 50) as u64);
    }

    #[test]
    fn summary_serializes() {
        let mut stats = SessionStats::new();
        let decision = FrameDecision {
            accepted: vec![accepted(WasteCategory::Recyclable, 0.9)],
            rejected: vec![],
        };
        stats.record_frame(&decision, Duration::from_millis(15));

        let json = serde_json::to_value(stats.summary()).unwrap();
        assert_eq!(json["frames"], 1);
        assert_eq!(json["categories"]["recyclable"]["count"], 1);
    }
}
