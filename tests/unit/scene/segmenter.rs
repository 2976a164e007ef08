use proptest::prelude::*;

use super::*;

fn seg() -> SceneSegmenter {
    SceneSegmenter::new(SegmenterConfig::default()).unwrap()
}

/// Flat signal sampled every `step` seconds with dips at `cuts`.
fn signal(duration: f64, step: f64, cuts: &[f64]) -> Vec<SignalPoint> {
    let mut out = Vec::new();
    let mut t = step;
    while t < duration {
        let dip = cuts.iter().any(|c| (c - t).abs() < step / 2.0);
        out.push(SignalPoint::new(t, if dip { 0.1 } else { 0.95 }));
        t += step;
    }
    out
}

fn assert_contiguous(scenes: &[Scene], duration: f64) {
    assert_eq!(scenes.first().unwrap().start, 0.0);
    assert_eq!(scenes.last().unwrap().end, duration);
    for w in scenes.windows(2) {
        assert_eq!(w[0].end, w[1].start);
    }
    for (i, s) in scenes.iter().enumerate() {
        assert_eq!(s.id, i);
        assert!(s.end > s.start);
        assert!((0.0..=1.0).contains(&s.confidence));
    }
}

#[test]
fn boundaries_follow_similarity_dips() {
    let scenes = seg().segment(signal(30.0, 0.5, &[10.0, 20.0]), 30.0).unwrap();
    assert_eq!(scenes.len(), 3);
    assert_eq!(scenes[1].start, 10.0);
    assert_eq!(scenes[2].start, 20.0);
    assert_eq!(scenes[0].confidence, 1.0);
    assert!(scenes[1].confidence > 0.8);
    assert_contiguous(&scenes, 30.0);
}

#[test]
fn lower_sensitivity_proposes_more_boundaries() {
    let points = vec![
        SignalPoint::new(5.0, 0.8),
        SignalPoint::new(10.0, 0.5),
        SignalPoint::new(15.0, 0.95),
    ];
    let strict = SceneSegmenter::new(SegmenterConfig {
        sensitivity: 0.3,
        min_scene_duration: 3.0,
    })
    .unwrap();
    let loose = SceneSegmenter::new(SegmenterConfig {
        sensitivity: 0.1,
        min_scene_duration: 3.0,
    })
    .unwrap();
    assert_eq!(strict.segment(points.clone(), 20.0).unwrap().len(), 2);
    assert_eq!(loose.segment(points, 20.0).unwrap().len(), 3);
}

#[test]
fn short_scene_merges_into_shorter_neighbour() {
    // [0,10) [10,11) [11,15) : the 1s scene joins the 4s neighbour, not the 10s one.
    let scenes = seg().segment(signal(15.0, 0.5, &[10.0, 11.0]), 15.0).unwrap();
    assert_eq!(scenes.len(), 2);
    assert_eq!(scenes[0].end, 10.0);
    assert_eq!(scenes[1].start, 10.0);
    assert_eq!(scenes[1].end, 15.0);
    assert_contiguous(&scenes, 15.0);
}

#[test]
fn leading_short_scene_merges_right() {
    let scenes = seg().segment(signal(12.0, 0.5, &[1.0]), 12.0).unwrap();
    assert_eq!(scenes.len(), 1);
    assert_eq!(scenes[0].confidence, 1.0);
}

#[test]
fn empty_signal_is_a_segmentation_error() {
    let err = seg().segment(Vec::new(), 30.0).unwrap_err();
    assert!(matches!(err, RecutError::Segmentation(_)));
}

#[test]
fn short_source_is_a_segmentation_error() {
    let err = seg().segment(signal(2.0, 0.5, &[]), 2.0).unwrap_err();
    assert!(matches!(err, RecutError::Segmentation(_)));
}

#[test]
fn fallback_yields_single_whole_scene() {
    let scenes = seg()
        .segment_or_whole(std::iter::empty::<RecutResult<SignalPoint>>(), 42.0)
        .unwrap();
    assert_eq!(
        scenes,
        vec![Scene {
            id: 0,
            start: 0.0,
            end: 42.0,
            confidence: 1.0
        }]
    );
    let tiny = seg()
        .segment_or_whole(std::iter::empty::<RecutResult<SignalPoint>>(), 1.5)
        .unwrap();
    assert_eq!(tiny.len(), 1);
    assert_eq!(tiny[0].end, 1.5);
}

#[test]
fn decode_errors_propagate() {
    let points = vec![
        Ok(SignalPoint::new(1.0, 0.9)),
        Err(RecutError::stage("decoder died")),
    ];
    let err = seg().segment_or_whole(points, 30.0).unwrap_err();
    assert!(matches!(err, RecutError::StageExecution(_)));
}

#[test]
fn invalid_config_is_policy_error() {
    let err = SceneSegmenter::new(SegmenterConfig {
        sensitivity: 1.5,
        min_scene_duration: 3.0,
    })
    .unwrap_err();
    assert!(matches!(err, RecutError::Policy(_)));
}

proptest! {
    #[test]
    fn filtering_is_idempotent(cuts in prop::collection::vec(0.5f64..99.5, 0..30), min in 0.5f64..10.0) {
        let mut cuts = cuts;
        cuts.sort_by(f64::total_cmp);
        cuts.dedup_by(|a, b| (*a - *b).abs() < 1e-3);
        let mut raw = Vec::new();
        let mut start = 0.0;
        for c in cuts {
            raw.push(Scene { id: raw.len(), start, end: c, confidence: 0.5 });
            start = c;
        }
        raw.push(Scene { id: raw.len(), start, end: 100.0, confidence: 0.5 });

        let once = filter_scenes(raw, min);
        let twice = filter_scenes(once.clone(), min);
        prop_assert_eq!(&once, &twice);
        for s in &once {
            prop_assert!(s.duration() + 1e-6 >= min);
        }
        assert_contiguous(&once, 100.0);
    }
}
