use super::*;

fn snap(disk: f64, mem: f32, cpu: f32) -> ResourceSnapshot {
    ResourceSnapshot::now(disk, mem, cpu)
}

#[test]
fn disk_thresholds_classify_levels() {
    let t = Thresholds::default();
    assert_eq!(t.classify(&snap(5.0, 10.0, 10.0)), ResourceLevel::Critical);
    assert_eq!(t.classify(&snap(15.0, 10.0, 10.0)), ResourceLevel::Warning);
    assert_eq!(t.classify(&snap(25.0, 10.0, 10.0)), ResourceLevel::Normal);
}

#[test]
fn memory_and_cpu_thresholds() {
    let t = Thresholds::default();
    assert_eq!(t.classify(&snap(100.0, 80.0, 10.0)), ResourceLevel::Warning);
    assert_eq!(t.classify(&snap(100.0, 95.0, 10.0)), ResourceLevel::Critical);
    assert_eq!(t.classify(&snap(100.0, 10.0, 88.0)), ResourceLevel::Warning);
    assert_eq!(t.classify(&snap(100.0, 10.0, 91.0)), ResourceLevel::Critical);
    assert_eq!(t.classify(&snap(100.0, 75.0, 85.0)), ResourceLevel::Normal);
}

#[test]
fn overall_is_worst_metric() {
    let t = Thresholds::default();
    let levels = t.metric_levels(&snap(15.0, 95.0, 10.0));
    assert_eq!(levels.disk, ResourceLevel::Warning);
    assert_eq!(levels.memory, ResourceLevel::Critical);
    assert_eq!(levels.cpu, ResourceLevel::Normal);
    assert_eq!(levels.overall(), ResourceLevel::Critical);
}

#[test]
fn inverted_thresholds_are_rejected() {
    let t = Thresholds {
        disk_critical_gb: 30.0,
        ..Thresholds::default()
    };
    assert!(matches!(t.validate(), Err(RecutError::Policy(_))));
    assert!(Thresholds::default().validate().is_ok());
}

#[test]
fn cpu_spike_needs_to_be_sustained() {
    let mut c = SustainedClassifier::new(Thresholds::default(), 3);
    let hot = snap(100.0, 10.0, 99.0);
    assert_eq!(c.observe(&hot), ResourceLevel::Warning);
    assert_eq!(c.observe(&hot), ResourceLevel::Warning);
    assert_eq!(c.observe(&hot), ResourceLevel::Critical);
    assert_eq!(c.observe(&snap(100.0, 10.0, 10.0)), ResourceLevel::Normal);
    assert_eq!(c.observe(&hot), ResourceLevel::Warning);
}

#[test]
fn low_disk_is_critical_immediately() {
    let mut c = SustainedClassifier::new(Thresholds::default(), 3);
    assert_eq!(c.observe(&snap(5.0, 10.0, 10.0)), ResourceLevel::Critical);
}

#[test]
fn levels_are_ordered() {
    assert!(ResourceLevel::Normal < ResourceLevel::Warning);
    assert!(ResourceLevel::Warning < ResourceLevel::Critical);
}
