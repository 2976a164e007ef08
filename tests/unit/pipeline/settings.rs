use super::*;

#[test]
fn defaults_are_valid() {
    let s = Settings::default();
    s.validate().unwrap();
    assert_eq!(s.trim_range().unwrap(), None);
    assert_eq!(s.min_cut_seconds, 3.0);
    assert_eq!(s.max_cut_seconds, 7.0);
    assert_eq!(s.scene_sensitivity, 0.3);
    EngineConfig::default().validate().unwrap();
    assert_eq!(EngineConfig::default().stage_timeout(), Duration::from_secs(300));
}

#[test]
fn parses_camel_case_with_defaults_for_missing_fields() {
    let json = r#"{
        "trimIn": 5,
        "trimOut": 65.5,
        "sceneSensitivity": 0.5,
        "qualityPreset": "high",
        "colorPreset": "mono",
        "seed": 42,
        "blurRegions": [{"x": 10, "y": 20, "width": 100, "height": 50}]
    }"#;
    let s: Settings = serde_json::from_str(json).unwrap();
    s.validate().unwrap();
    assert_eq!(s.seed, Some(42));
    assert_eq!(s.quality_preset, QualityPreset::High);
    assert_eq!(s.color_preset, ColorPreset::Mono);
    assert_eq!(s.silence_threshold_db, -40.0);
    assert_eq!(s.blur_regions.len(), 1);
    assert_eq!(s.blur_regions[0].strength, 10);

    let r = s.trim_range().unwrap().unwrap();
    assert_eq!(r.start, 5.0);
    assert_eq!(r.end, 65.5);
    assert_eq!(s.cut_policy(7).seed, 7);
    assert_eq!(s.segmenter_config().sensitivity, 0.5);
}

#[test]
fn open_ended_trim_runs_to_the_end() {
    let s = Settings {
        trim_in: Some(12.0),
        ..Settings::default()
    };
    let r = s.trim_range().unwrap().unwrap();
    assert_eq!(r.start, 12.0);
    assert_eq!(r.end, f64::MAX);

    let s = Settings {
        trim_out: Some(8.0),
        ..Settings::default()
    };
    assert_eq!(s.trim_range().unwrap().unwrap().start, 0.0);
}

#[test]
fn inverted_trim_is_a_policy_error() {
    let s = Settings {
        trim_in: Some(10.0),
        trim_out: Some(4.0),
        ..Settings::default()
    };
    assert!(matches!(s.validate(), Err(RecutError::Policy(_))));
}

#[test]
fn rejects_unusable_settings() {
    let bad = [
        Settings {
            min_cut_seconds: 8.0,
            max_cut_seconds: 4.0,
            ..Settings::default()
        },
        Settings {
            scene_sensitivity: 1.5,
            ..Settings::default()
        },
        Settings {
            silence_threshold_db: 6.0,
            ..Settings::default()
        },
        Settings {
            sample_fps: 0.0,
            ..Settings::default()
        },
    ];
    for s in bad {
        assert!(s.validate().is_err(), "{s:?}");
    }
}

#[test]
fn engine_config_rejects_zero_timeout_and_empty_prefix() {
    let mut c = EngineConfig::default();
    c.stage_timeout_secs = 0;
    assert!(matches!(c.validate(), Err(RecutError::Policy(_))));

    let mut c = EngineConfig::default();
    c.workspace.prefix.clear();
    assert!(c.validate().is_err());
}

#[test]
fn from_path_reads_json_and_reports_bad_files() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("settings.json");
    std::fs::write(&good, r#"{"minCutSeconds": 2, "maxCutSeconds": 5}"#).unwrap();
    let s = Settings::from_path(&good).unwrap();
    assert_eq!(s.min_cut_seconds, 2.0);
    assert_eq!(s.max_cut_seconds, 5.0);

    let broken = dir.path().join("broken.json");
    std::fs::write(&broken, "{ not json").unwrap();
    assert!(matches!(
        Settings::from_path(&broken),
        Err(RecutError::Validation(_))
    ));
    assert!(matches!(
        EngineConfig::from_path(dir.path().join("missing.json")),
        Err(RecutError::Validation(_))
    ));

    let engine = dir.path().join("engine.json");
    std::fs::write(&engine, r#"{"stage_timeout_secs": 30}"#).unwrap();
    let c = EngineConfig::from_path(&engine).unwrap();
    assert_eq!(c.stage_timeout(), Duration::from_secs(30));
    assert_eq!(c.retry, RetryPolicy::default());
}
