use super::*;

#[test]
fn clones_share_state() {
    let a = CancelToken::new();
    let b = a.clone();
    assert!(b.check().is_ok());
    a.cancel();
    assert!(b.is_cancelled());
    assert!(matches!(b.check(), Err(RecutError::Cancelled)));
}

#[test]
fn sleep_wakes_on_cancel() {
    let token = CancelToken::new();
    let remote = token.clone();
    let t = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(30));
        remote.cancel();
    });
    let started = Instant::now();
    let res = token.sleep(Duration::from_secs(10));
    t.join().unwrap();
    assert!(matches!(res, Err(RecutError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(5));
}
