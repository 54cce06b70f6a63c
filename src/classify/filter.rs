//! Precision-first decision pipeline.
//!
//! Turns raw per-frame detector output into a small set of trustworthy,
//! de-duplicated waste classifications. Stages, in order:
//!
//! 1. Acceptance against per-category confidence thresholds
//! 2. Geometric plausibility (area, aspect ratio, edge, position)
//! 3. Confidence re-scoring (center bias, per-category tiers, shape prior)
//! 4. Per-category de-duplication
//! 5. Final score floor
//! 6. Ordering and result cap
//!
//! The filter holds no mutable state; a session constructs one and passes it
//! by reference into the frame loop or the API handler. Heuristic edge cases
//! (missing threshold, degenerate box, empty input) resolve to safe defaults
//! and never error.

use std::collections::HashMap;

use crate::classify::category::{CategoryMap, WasteCategory};
use crate::detect::{BoundingBox, ImageDims, RawDetection};

/// Outcome of the acceptance stage for one detection.
#[derive(Clone, Debug, PartialEq)]
pub enum DetectionStatus {
    Confident,
    Uncertain { reason: String },
}

/// A raw detection after categorization and filtering decisions.
///
/// `score` carries the possibly-boosted confidence; the original detector
/// value is not retained past the frame.
#[derive(Clone, Debug)]
pub struct ScoredDetection {
    pub label: String,
    pub category: WasteCategory,
    pub score: f32,
    pub bbox: BoundingBox,
    pub status: DetectionStatus,
}

impl ScoredDetection {
    pub fn is_confident(&self) -> bool {
        matches!(self.status, DetectionStatus::Confident)
    }
}

/// Everything the filter decided about one frame: the trustworthy result set
/// plus the rejections, which feed session statistics.
#[derive(Clone, Debug, Default)]
pub struct FrameDecision {
    /// Survivors, ordered by descending score, at most one per category.
    pub accepted: Vec<ScoredDetection>,
    /// Demoted detections with their rejection reasons.
    pub rejected: Vec<ScoredDetection>,
}

/// Geometric plausibility bounds.
///
/// The two profiles mirror the deployed tunings: `permissive` for the
/// serving path, `strict` for high-precision live runs.
#[derive(Clone, Debug)]
pub struct GeometryBounds {
    /// Admissible relative box area (box area / image area), inclusive.
    pub min_relative_area: f32,
    pub max_relative_area: f32,
    /// Reject aspect ratios above this bound or below its reciprocal.
    pub max_aspect_ratio: f32,
    /// Fraction of the frame dimension treated as "near the edge".
    pub edge_margin: f32,
    /// Below this confidence, near-edge boxes are rejected.
    pub edge_confidence: f32,
    /// Center factor below which a detection counts as far off-center.
    pub offcenter_bias: f32,
    /// Below this confidence, far-off-center boxes are rejected.
    pub offcenter_confidence: f32,
}

impl GeometryBounds {
    pub fn permissive() -> Self {
        Self {
            min_relative_area: 0.01,
            max_relative_area: 0.99,
            max_aspect_ratio: 10.0,
            edge_margin: 0.02,
            edge_confidence: 0.25,
            offcenter_bias: 0.2,
            offcenter_confidence: 0.45,
        }
    }

    pub fn strict() -> Self {
        Self {
            min_relative_area: 0.1,
            max_relative_area: 0.9,
            max_aspect_ratio: 10.0,
            edge_margin: 0.05,
            edge_confidence: 0.4,
            offcenter_bias: 0.3,
            offcenter_confidence: 0.6,
        }
    }
}

/// One confidence tier: scores above `min_score` get multiplied by
/// `multiplier`, capped at `cap`.
#[derive(Clone, Copy, Debug)]
pub struct BoostTier {
    pub min_score: f32,
    pub multiplier: f32,
    pub cap: f32,
}

/// Re-scoring policy. Heuristic domain calibration, not statistics: the
/// numbers are configuration, the shape is the contract — higher-confidence
/// and more-centered detections are boosted more, a boost never lowers a
/// score, and no boost reaches 1.0.
#[derive(Clone, Debug)]
pub struct BoostPolicy {
    /// Center factor above which the center boost applies.
    pub center_bias: f32,
    pub center_multiplier: f32,
    /// Hard ceiling for any boosted score. Must stay below 1.0.
    pub score_cap: f32,
    /// Per-category tiers, ordered by descending `min_score`; the first
    /// matching tier applies.
    pub tiers: HashMap<WasteCategory, Vec<BoostTier>>,
    /// Aspect ratios below `shape_tall` or above `shape_wide` look like
    /// bottles or lying cans and earn recyclables an extra boost.
    pub shape_tall: f32,
    pub shape_wide: f32,
    pub shape_multiplier: f32,
}

impl Default for BoostPolicy {
    fn default() -> Self {
        let mut tiers = HashMap::new();
        // Organic scores run low; boost more aggressively.
        tiers.insert(
            WasteCategory::Organic,
            vec![
                BoostTier {
                    min_score: 0.45,
                    multiplier: 1.15,
                    cap: 0.98,
                },
                BoostTier {
                    min_score: 0.35,
                    multiplier: 1.12,
                    cap: 0.95,
                },
                BoostTier {
                    min_score: 0.25,
                    multiplier: 1.08,
                    cap: 0.92,
                },
            ],
        );
        // Recyclable recall is high but precision lags; moderate boosts.
        tiers.insert(
            WasteCategory::Recyclable,
            vec![
                BoostTier {
                    min_score: 0.4,
                    multiplier: 1.15,
                    cap: 0.95,
                },
                BoostTier {
                    min_score: 0.3,
                    multiplier: 1.10,
                    cap: 0.90,
                },
                BoostTier {
                    min_score: 0.25,
                    multiplier: 1.05,
                    cap: 0.85,
                },
            ],
        );

        Self {
            center_bias: 0.5,
            center_multiplier: 1.1,
            score_cap: 0.98,
            tiers,
            shape_tall: 0.6,
            shape_wide: 1.8,
            shape_multiplier: 1.1,
        }
    }
}

/// Full filter configuration. Loaded once at startup and immutable during a
/// detection pass.
#[derive(Clone, Debug)]
pub struct FilterConfig {
    /// Per-category acceptance thresholds.
    pub thresholds: HashMap<WasteCategory, f32>,
    /// Threshold for categories with no configured entry.
    pub fallback_confidence: f32,
    /// IoU threshold handed to the detector call.
    pub iou: f32,
    pub geometry: GeometryBounds,
    pub boosts: BoostPolicy,
    /// Safety net after boosting: categories below this are dropped.
    pub final_floor: f32,
    /// Result cap per frame.
    pub max_results: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        let mut thresholds = HashMap::new();
        // Lower threshold for the majority class, higher for the minority.
        thresholds.insert(WasteCategory::Organic, 0.4);
        thresholds.insert(WasteCategory::Recyclable, 0.7);

        Self {
            thresholds,
            fallback_confidence: 0.25,
            iou: 0.45,
            geometry: GeometryBounds::permissive(),
            boosts: BoostPolicy::default(),
            final_floor: 0.2,
            max_results: 5,
        }
    }
}

impl FilterConfig {
    /// High-precision profile for live camera runs.
    pub fn strict() -> Self {
        Self {
            geometry: GeometryBounds::strict(),
            final_floor: 0.3,
            ..Self::default()
        }
    }

    /// Acceptance threshold for a category. Categories without a configured
    /// entry use the global fallback; lookups never fail.
    pub fn threshold_for(&self, category: WasteCategory) -> f32 {
        self.thresholds
            .get(&category)
            .copied()
            .unwrap_or(self.fallback_confidence)
    }
}

/// The precision filter. Stateless; owns its configuration and the
/// label→category table.
#[derive(Clone, Debug)]
pub struct PrecisionFilter {
    config: FilterConfig,
    categories: CategoryMap,
}

impl PrecisionFilter {
    pub fn new(config: FilterConfig, categories: CategoryMap) -> Self {
        Self { config, categories }
    }

    pub fn with_defaults() -> Self {
        Self::new(FilterConfig::default(), CategoryMap::with_defaults())
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn categories(&self) -> &CategoryMap {
        &self.categories
    }

    /// Run the full pipeline and return the trustworthy result set, ordered
    /// by descending score. Empty input yields empty output.
    pub fn filter(&self, raw: Vec<RawDetection>, dims: ImageDims) -> Vec<ScoredDetection> {
        self.evaluate(raw, dims).accepted
    }

    /// Run the full pipeline, keeping rejections for statistics.
    pub fn evaluate(&self, raw: Vec<RawDetection>, dims: ImageDims) -> FrameDecision {
        let mut survivors: Vec<ScoredDetection> = Vec::new();
        let mut rejected: Vec<ScoredDetection> = Vec::new();

        for det in raw {
            let category = self.categories.map(&det.label);
            let threshold = self.config.threshold_for(category);

            if det.confidence < threshold {
                let reason = format!(
                    "confidence {:.3} below threshold {:.3}",
                    det.confidence, threshold
                );
                rejected.push(demoted(det, category, reason));
                continue;
            }

            if let Err(reason) = self.geometry_verdict(&det.bbox, det.confidence, dims) {
                rejected.push(demoted(det, category, reason));
                continue;
            }

            let score = self.rescore(category, det.confidence, &det.bbox, dims);
            log::debug!(
                "accepted {} as {} ({:.3} -> {:.3})",
                det.label,
                category,
                det.confidence,
                score
            );
            survivors.push(ScoredDetection {
                label: det.label,
                category,
                score,
                bbox: det.bbox,
                status: DetectionStatus::Confident,
            });
        }

        // One survivor per category: multiple detections of the same
        // category in one frame are the same real-world decision, not
        // independent evidence.
        let mut best: HashMap<WasteCategory, ScoredDetection> = HashMap::new();
        for det in survivors {
            let replaces = match best.get(&det.category) {
                Some(existing) => det.score > existing.score,
                None => true,
            };
            if replaces {
                if let Some(previous) = best.insert(det.category, det) {
                    rejected.push(duplicate_of(previous));
                }
            } else {
                rejected.push(duplicate_of(det));
            }
        }

        let mut accepted: Vec<ScoredDetection> = Vec::new();
        for (_, det) in best {
            if det.score >= self.config.final_floor {
                accepted.push(det);
            } else {
                let reason = format!(
                    "final score {:.3} below floor {:.3}",
                    det.score, self.config.final_floor
                );
                rejected.push(ScoredDetection {
                    status: DetectionStatus::Uncertain { reason },
                    ..det
                });
            }
        }

        accepted.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        accepted.truncate(self.config.max_results);

        FrameDecision { accepted, rejected }
    }

    /// Plausibility checks for a confident detection. `Err` carries the
    /// rejection reason.
    fn geometry_verdict(
        &self,
        bbox: &BoundingBox,
        confidence: f32,
        dims: ImageDims,
    ) -> Result<(), String> {
        let g = &self.config.geometry;

        if bbox.is_degenerate() || dims.area() <= 0.0 {
            return Err("degenerate box".to_string());
        }

        let relative_area = bbox.area() / dims.area();
        if relative_area < g.min_relative_area || relative_area > g.max_relative_area {
            return Err(format!(
                "relative area {:.4} outside [{:.3}, {:.3}]",
                relative_area, g.min_relative_area, g.max_relative_area
            ));
        }

        if let Some(ratio) = bbox.aspect_ratio() {
            let min_ratio = 1.0 / g.max_aspect_ratio;
            if ratio > g.max_aspect_ratio || ratio < min_ratio {
                return Err(format!(
                    "aspect ratio {:.2} outside [{:.2}, {:.2}]",
                    ratio, min_ratio, g.max_aspect_ratio
                ));
            }
        }

        // Partially-visible objects near the frame boundary are only
        // rejected at low confidence, so large centered objects brushing an
        // edge are not punished for proximity alone.
        let margin_x = dims.width as f32 * g.edge_margin;
        let margin_y = dims.height as f32 * g.edge_margin;
        let near_edge = bbox.x1 < margin_x
            || bbox.x2 > dims.width as f32 - margin_x
            || bbox.y1 < margin_y
            || bbox.y2 > dims.height as f32 - margin_y;
        if near_edge && confidence < g.edge_confidence {
            return Err(format!(
                "near frame edge with low confidence {:.3}",
                confidence
            ));
        }

        let factor = center_factor(bbox, dims);
        if factor < g.offcenter_bias && confidence < g.offcenter_confidence {
            return Err(format!(
                "off-center (factor {:.2}) with low confidence {:.3}",
                factor, confidence
            ));
        }

        Ok(())
    }

    /// Monotonic, category-specific confidence boost. Never decreases a
    /// score; never reaches 1.0.
    fn rescore(
        &self,
        category: WasteCategory,
        confidence: f32,
        bbox: &BoundingBox,
        dims: ImageDims,
    ) -> f32 {
        let b = &self.config.boosts;
        let mut score = confidence;

        // Centered objects are deliberately presented to the camera.
        if center_factor(bbox, dims) > b.center_bias {
            score = boost(score, b.center_multiplier, b.score_cap);
        }

        if let Some(tiers) = b.tiers.get(&category) {
            for tier in tiers {
                if score > tier.min_score {
                    score = boost(score, tier.multiplier, tier.cap);
                    break;
                }
            }
        }

        // Shape prior: bottle-tall or can-wide boxes.
        if category == WasteCategory::Recyclable {
            if let Some(ratio) = bbox.aspect_ratio() {
                if ratio < b.shape_tall || ratio > b.shape_wide {
                    score = boost(score, b.shape_multiplier, b.score_cap);
                }
            }
        }

        score
    }
}

/// How close a box center is to the image center, 1.0 at dead center and
/// 0.0 at the farthest corner.
fn center_factor(bbox: &BoundingBox, dims: ImageDims) -> f32 {
    let (cx, cy) = bbox.center();
    let (ix, iy) = dims.center();
    let distance = ((cx - ix).powi(2) + (cy - iy).powi(2)).sqrt();
    let max_distance = ((dims.width as f32).powi(2) + (dims.height as f32).powi(2)).sqrt() / 2.0;
    if max_distance <= 0.0 {
        return 0.0;
    }
    1.0 - (distance / max_distance)
}

/// Apply one multiplicative boost. Scores already at or above the cap pass
/// through unchanged to preserve relative ranking.
fn boost(score: f32, multiplier: f32, cap: f32) -> f32 {
    if score >= cap {
        return score;
    }
    (score * multiplier).min(cap)
}

fn demoted(det: RawDetection, category: WasteCategory, reason: String) -> ScoredDetection {
    log::debug!("rejected {}: {}", det.label, reason);
    ScoredDetection {
        label: det.label,
        category,
        score: det.confidence,
        bbox: det.bbox,
        status: DetectionStatus::Uncertain { reason },
    }
}

fn duplicate_of(det: ScoredDetection) -> ScoredDetection {
    let reason = format!("duplicate {} detection", det.category);
    ScoredDetection {
        status: DetectionStatus::Uncertain { reason },
        ..det
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter_with(config: FilterConfig) -> PrecisionFilter {
        PrecisionFilter::new(config, CategoryMap::with_defaults())
    }

    fn open_config() -> FilterConfig {
        // Thresholds low enough that acceptance never interferes with the
        // stage under test.
        let mut config = FilterConfig::default();
        config.thresholds.insert(WasteCategory::Organic, 0.1);
        config.thresholds.insert(WasteCategory::Recyclable, 0.1);
        config.fallback_confidence = 0.1;
        config.final_floor = 0.1;
        config
    }

    fn dims() -> ImageDims {
        ImageDims::new(640, 480)
    }

    /// Box of the given relative area, centered in the frame.
    fn centered(dims: ImageDims, relative_area: f32) -> BoundingBox {
        let side = (dims.area() * relative_area).sqrt();
        let (cx, cy) = dims.center();
        BoundingBox::new(
            cx - side / 2.0,
            cy - side / 2.0,
            cx + side / 2.0,
            cy + side / 2.0,
        )
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let filter = PrecisionFilter::with_defaults();
        let decision = filter.evaluate(vec![], dims());
        assert!(decision.accepted.is_empty());
        assert!(decision.rejected.is_empty());
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        let mut config = open_config();
        config.thresholds.insert(WasteCategory::Organic, 0.4);
        let filter = filter_with(config);

        let at = filter.filter(
            vec![RawDetection::new("banana", 0.4, centered(dims(), 0.2))],
            dims(),
        );
        assert_eq!(at.len(), 1);

        let below = filter.filter(
            vec![RawDetection::new("banana", 0.399, centered(dims(), 0.2))],
            dims(),
        );
        assert!(below.is_empty());
    }

    #[test]
    fn below_threshold_reason_names_value_and_threshold() {
        let mut config = open_config();
        config.thresholds.insert(WasteCategory::Organic, 0.4);
        let filter = filter_with(config);

        let decision = filter.evaluate(
            vec![RawDetection::new("banana", 0.3, centered(dims(), 0.2))],
            dims(),
        );
        assert_eq!(decision.rejected.len(), 1);
        match &decision.rejected[0].status {
            DetectionStatus::Uncertain { reason } => {
                assert!(reason.contains("0.300"));
                assert!(reason.contains("0.400"));
            }
            other => panic!("expected uncertain status, got {other:?}"),
        }
    }

    #[test]
    fn area_boundary_is_inclusive_both_sides() {
        let d = ImageDims::new(100, 100);
        let filter = filter_with(open_config());

        // Exactly at the lower bound (1% of a 100x100 frame = 10x10 box).
        let at_min = BoundingBox::new(45.0, 45.0, 55.0, 55.0);
        assert_eq!(
            filter
                .filter(vec![RawDetection::new("bottle", 0.8, at_min)], d)
                .len(),
            1
        );

        // Just below the lower bound.
        let below_min = BoundingBox::new(45.0, 45.0, 54.9, 55.0);
        assert!(filter
            .filter(vec![RawDetection::new("bottle", 0.8, below_min)], d)
            .is_empty());

        // Exactly at the upper bound is still admissible.
        let mut config = open_config();
        config.geometry.max_relative_area = 0.81;
        let filter = filter_with(config);
        let at_max = BoundingBox::new(5.0, 5.0, 95.0, 95.0);
        assert_eq!(
            filter
                .filter(vec![RawDetection::new("bottle", 0.8, at_max)], d)
                .len(),
            1
        );
    }

    #[test]
    fn full_frame_and_sliver_boxes_are_rejected() {
        let d = dims();
        let filter = filter_with(open_config());

        let full_frame = BoundingBox::new(0.0, 0.0, 640.0, 480.0);
        assert!(filter
            .filter(vec![RawDetection::new("bottle", 0.9, full_frame)], d)
            .is_empty());

        let sliver = BoundingBox::new(100.0, 238.0, 540.0, 242.0);
        assert!(filter
            .filter(vec![RawDetection::new("bottle", 0.9, sliver)], d)
            .is_empty());
    }

    #[test]
    fn edge_boxes_rejected_only_at_low_confidence() {
        let d = dims();
        let filter = filter_with(open_config());
        let near_edge = BoundingBox::new(2.0, 100.0, 200.0, 300.0);

        let weak = filter.evaluate(vec![RawDetection::new("bottle", 0.2, near_edge)], d);
        assert!(weak.accepted.is_empty());
        assert_eq!(weak.rejected.len(), 1);

        let strong = filter.filter(vec![RawDetection::new("bottle", 0.8, near_edge)], d);
        assert_eq!(strong.len(), 1);
    }

    #[test]
    fn degenerate_boxes_are_rejected_not_errors() {
        let filter = filter_with(open_config());
        let zero_area = BoundingBox::new(50.0, 50.0, 50.0, 120.0);
        let decision = filter.evaluate(vec![RawDetection::new("bottle", 0.9, zero_area)], dims());
        assert!(decision.accepted.is_empty());
        assert_eq!(decision.rejected.len(), 1);
    }

    #[test]
    fn rescoring_never_decreases_and_never_reaches_one() {
        let filter = PrecisionFilter::with_defaults();
        let d = dims();
        let boxes = [
            centered(d, 0.2),
            BoundingBox::new(10.0, 10.0, 120.0, 200.0),
            BoundingBox::new(500.0, 380.0, 630.0, 470.0),
        ];

        for category in WasteCategory::all() {
            for bbox in &boxes {
                for conf in [0.05f32, 0.25, 0.3, 0.41, 0.5, 0.75, 0.9, 0.97, 0.99] {
                    let score = filter.rescore(category, conf, bbox, d);
                    assert!(score >= conf, "{category} {conf} boosted down to {score}");
                    assert!(score < 1.0, "{category} {conf} boosted to {score}");
                }
            }
        }
    }

    #[test]
    fn centered_detections_are_boosted() {
        let filter = PrecisionFilter::with_defaults();
        let d = dims();
        let center_score =
            filter.rescore(WasteCategory::Organic, 0.5, &centered(d, 0.2), d);
        assert!(center_score > 0.5);
    }

    #[test]
    fn dedup_keeps_highest_scoring_per_category() {
        let d = dims();
        let filter = filter_with(open_config());
        // Slightly offset second box so both pass geometry but scores differ
        // only by confidence.
        let a = centered(d, 0.2);
        let accepted = filter.filter(
            vec![
                RawDetection::new("bottle", 0.41, a),
                RawDetection::new("bottle", 0.39, a),
            ],
            d,
        );
        assert_eq!(accepted.len(), 1);
        let survivor = &accepted[0];
        // The 0.41 detection survives; its boosted score stays above the
        // boosted 0.39.
        let weaker = filter.rescore(WasteCategory::Recyclable, 0.39, &a, d);
        assert!(survivor.score > weaker);
    }

    #[test]
    fn never_more_results_than_inputs_and_no_duplicate_categories() {
        let d = dims();
        let filter = filter_with(open_config());
        let input = vec![
            RawDetection::new("bottle", 0.9, centered(d, 0.2)),
            RawDetection::new("can", 0.8, centered(d, 0.15)),
            RawDetection::new("banana", 0.7, centered(d, 0.25)),
            RawDetection::new("apple", 0.6, centered(d, 0.1)),
            RawDetection::new("teddy bear", 0.5, centered(d, 0.3)),
        ];
        let n = input.len();
        let accepted = filter.filter(input, d);

        assert!(accepted.len() <= n);
        let mut seen = std::collections::HashSet::new();
        for det in &accepted {
            assert!(seen.insert(det.category), "duplicate {}", det.category);
        }
    }

    #[test]
    fn results_ordered_by_descending_score_and_capped() {
        let d = dims();
        let mut config = open_config();
        config.max_results = 1;
        let filter = filter_with(config);

        let accepted = filter.filter(
            vec![
                RawDetection::new("banana", 0.6, centered(d, 0.2)),
                RawDetection::new("bottle", 0.9, centered(d, 0.15)),
            ],
            d,
        );
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].category, WasteCategory::Recyclable);

        let filter = filter_with(open_config());
        let accepted = filter.filter(
            vec![
                RawDetection::new("banana", 0.6, centered(d, 0.2)),
                RawDetection::new("bottle", 0.9, centered(d, 0.15)),
            ],
            d,
        );
        assert!(accepted.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn unmapped_category_uses_fallback_threshold() {
        let mut config = FilterConfig::default();
        config.thresholds.clear();
        config.fallback_confidence = 0.25;
        let filter = filter_with(config);
        let d = dims();

        let accepted = filter.filter(
            vec![RawDetection::new("mystery object", 0.3, centered(d, 0.2))],
            d,
        );
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].category, WasteCategory::Trash);
    }

    #[test]
    fn final_floor_rejects_post_boost_stragglers() {
        let mut config = open_config();
        config.final_floor = 0.5;
        let filter = filter_with(config);
        let d = dims();

        let decision = filter.evaluate(
            vec![RawDetection::new("banana", 0.15, centered(d, 0.2))],
            d,
        );
        assert!(decision.accepted.is_empty());
        assert_eq!(decision.rejected.len(), 1);
    }
}
