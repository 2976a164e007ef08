use super::*;

use std::time::Instant;

#[derive(Clone)]
struct Knob(Arc<Mutex<ResourceSnapshot>>);

impl Knob {
    fn new(disk: f64) -> Self {
        Self(Arc::new(Mutex::new(ResourceSnapshot::now(disk, 10.0, 10.0))))
    }

    fn set_disk(&self, disk: f64) {
        self.0.lock().unwrap().free_disk_gb = disk;
    }
}

impl ResourceProbe for Knob {
    fn sample(&mut self) -> ResourceSnapshot {
        let mut s = self.0.lock().unwrap().clone();
        s.sampled_at = chrono::Utc::now();
        s
    }
}

fn fast() -> MonitorConfig {
    MonitorConfig {
        sample_interval_ms: 5,
        ..MonitorConfig::default()
    }
}

#[test]
fn view_is_normal_before_first_sample() {
    let m = ResourceMonitor::new(Knob::new(5.0), &fast()).unwrap();
    assert!(m.view().latest().is_none());
    assert_eq!(m.view().level(), ResourceLevel::Normal);
    assert_eq!(ResourceView::detached().level(), ResourceLevel::Normal);
}

#[test]
fn tick_publishes_classified_status() {
    let knob = Knob::new(5.0);
    let m = ResourceMonitor::new(knob.clone(), &fast()).unwrap();
    let status = m.tick();
    assert_eq!(status.level, ResourceLevel::Critical);
    assert_eq!(m.view().level(), ResourceLevel::Critical);

    knob.set_disk(15.0);
    m.tick();
    assert_eq!(m.view().level(), ResourceLevel::Warning);
    knob.set_disk(25.0);
    m.tick();
    assert_eq!(m.view().level(), ResourceLevel::Normal);
    assert_eq!(m.view().latest().unwrap().snapshot.free_disk_gb, 25.0);
}

#[test]
fn subscribers_receive_level_changes_only() {
    let knob = Knob::new(25.0);
    let m = ResourceMonitor::new(knob.clone(), &fast()).unwrap();
    let rx = m.view().subscribe();
    m.tick();
    m.tick();
    knob.set_disk(5.0);
    m.tick();
    m.tick();

    let levels: Vec<ResourceLevel> = rx.try_iter().map(|s| s.level).collect();
    assert_eq!(levels, vec![ResourceLevel::Normal, ResourceLevel::Critical]);
}

#[test]
fn dropped_subscriber_does_not_block_publishing() {
    let knob = Knob::new(25.0);
    let m = ResourceMonitor::new(knob.clone(), &fast()).unwrap();
    drop(m.view().subscribe());
    knob.set_disk(5.0);
    assert_eq!(m.tick().level, ResourceLevel::Critical);
}

#[test]
fn background_thread_tracks_probe() {
    let knob = Knob::new(25.0);
    let mut m = ResourceMonitor::spawn(knob.clone(), &fast()).unwrap();
    assert_eq!(m.view().level(), ResourceLevel::Normal);

    knob.set_disk(5.0);
    let deadline = Instant::now() + Duration::from_secs(5);
    while m.view().level() != ResourceLevel::Critical && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(m.view().level(), ResourceLevel::Critical);
    m.stop();
    m.stop();
}

#[test]
fn zero_interval_is_rejected() {
    let cfg = MonitorConfig {
        sample_interval_ms: 0,
        ..MonitorConfig::default()
    };
    assert!(ResourceMonitor::new(Knob::new(25.0), &cfg).is_err());
}

#[test]
fn host_probe_reports_sane_values() {
    let mut p = SysinfoProbe::new(std::env::temp_dir(), Duration::from_secs(30));
    let s = p.sample();
    assert!(s.free_disk_gb >= 0.0);
    assert!((0.0..=100.0).contains(&s.memory_percent));
    assert!(s.cpu_percent >= 0.0);
}
