use super::*;

#[test]
fn order_is_fixed() {
    let names: Vec<&str> = DegradeStrategy::ORDER.iter().map(|s| s.as_str()).collect();
    assert_eq!(
        names,
        [
            "retry_lower_quality",
            "retry_software_encoding",
            "split_into_chunks",
            "emergency_basic"
        ]
    );
}

#[test]
fn first_rung_is_undegraded() {
    let p = DegradeStrategy::RetryLowerQuality.profile(1);
    assert_eq!(p, DegradeProfile::NONE);
    assert!(!p.is_degraded());
    assert_eq!(DegradeStrategy::RetryLowerQuality.profile(3).quality_step, 2);
}

#[test]
fn later_strategies_degrade_further() {
    let sw = DegradeStrategy::RetrySoftwareEncoding.profile(1);
    assert!(sw.software_only);
    assert!(sw.chunk_seconds.is_none());

    let chunks: Vec<f64> = (1..=3)
        .map(|a| DegradeStrategy::SplitIntoChunks.profile(a).chunk_seconds.unwrap())
        .collect();
    assert_eq!(chunks, vec![120.0, 60.0, 30.0]);

    let basic = DegradeStrategy::EmergencyBasic.profile(1);
    assert!(basic.effects_disabled);
    assert!(basic.software_only);
    assert_eq!(basic.quality_step, MAX_QUALITY_STEP);
}

#[test]
fn serializes_as_snake_case() {
    let json = serde_json::to_string(&DegradeStrategy::SplitIntoChunks).unwrap();
    assert_eq!(json, "\"split_into_chunks\"");
}
