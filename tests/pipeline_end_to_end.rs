use std::time::{Duration, Instant};

use anyhow::Result;

use borlacam::{
    AnnouncementGate, BoundingBox, CameraConfig, CameraSource, CategoryMap, DetectorBackend,
    FilterConfig, ImageDims, PrecisionFilter, RawDetection, SessionStats, StubBackend,
    WasteCategory,
};

/// Centered box covering the given fraction of the frame.
fn centered_box(dims: ImageDims, relative_area: f32) -> BoundingBox {
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
fn bottle_and_banana_scenario() {
    // Deployment tuning under test: recyclable 0.4, organic 0.25.
    let mut config = FilterConfig::default();
    config.thresholds.insert(WasteCategory::Recyclable, 0.4);
    config.thresholds.insert(WasteCategory::Organic, 0.25);
    let filter = PrecisionFilter::new(config, CategoryMap::with_defaults());

    let dims = ImageDims::new(640, 480);
    let raw = vec![
        RawDetection::new("bottle", 0.42, centered_box(dims, 0.05)),
        RawDetection::new("banana", 0.30, centered_box(dims, 0.50)),
    ];

    let accepted = filter.filter(raw, dims);

    assert_eq!(accepted.len(), 2);
    // Ordered by confidence, the centered bottle boosted above its raw score.
    assert_eq!(accepted[0].category, WasteCategory::Recyclable);
    assert_eq!(accepted[0].label, "bottle");
    assert!(accepted[0].score > 0.42);
    assert_eq!(accepted[1].category, WasteCategory::Organic);
    assert!(accepted[1].score >= 0.30);
    assert!(accepted.iter().all(|d| d.score < 1.0));
}

#[test]
fn synthetic_session_announces_each_category_once() -> Result<()> {
    let mut source = CameraSource::new(CameraConfig {
        url: "stub://session_test".to_string(),
        target_fps: 1000,
        width: 320,
        height: 240,
    })?;
    source.connect()?;

    let mut backend = StubBackend::new();
    let filter = PrecisionFilter::new(FilterConfig::default(), CategoryMap::with_defaults());
    let mut gate = AnnouncementGate::new(Duration::from_secs(3));
    let mut stats = SessionStats::new();

    let mut organic_announced = 0u32;
    let mut recyclable_announced = 0u32;

    // 150 frames walk the stub through empty, banana, bottle, and clutter
    // scenes; at 1000 fps the whole run stays inside one cooldown window.
    for _ in 0..150 {
        let frame = source.next_frame()?;
        let started = Instant::now();
        let raw = backend.detect(
            &frame.pixels,
            frame.width,
            frame.height,
            filter.config().fallback_confidence,
            filter.config().iou,
        )?;
        let decision = filter.evaluate(raw, frame.dims());

        for det in &decision.accepted {
            if gate.should_announce(det.category, Instant::now()) {
                match det.category {
                    WasteCategory::Organic => organic_announced += 1,
                    WasteCategory::Recyclable => recyclable_announced += 1,
                    WasteCategory::Trash => {}
                }
            }
        }
        stats.record_frame(&decision, started.elapsed());
    }

    assert_eq!(stats.frames(), 150);
    // Each category was detected confidently across many frames but the
    // cooldown collapses the repeats to a single announcement.
    assert_eq!(organic_announced, 1);
    assert_eq!(recyclable_announced, 1);
    // The clutter scene produces below-threshold and sliver rejections.
    assert!(stats.uncertain_detections() > 0);
    assert!(stats.category_count(WasteCategory::Organic) > 0);
    assert!(stats.category_count(WasteCategory::Recyclable) > 0);
    Ok(())
}

#[test]
fn empty_scenes_yield_empty_results() {
    let filter = PrecisionFilter::with_defaults();
    let accepted = filter.filter(vec![], ImageDims::new(640, 480));
    assert!(accepted.is_empty());
}
