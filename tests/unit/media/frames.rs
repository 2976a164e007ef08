use super::*;


use crate::foundation::cancel::CancelToken;
#[cfg(unix)]
use crate::media::process::stub_program;

fn frame(time: f64, rgb: [u8; 3]) -> RecutResult<SampledFrame> {
    Ok(SampledFrame {
        time,
        width: 4,
        height: 4,
        rgb: rgb.iter().copied().cycle().take(4 * 4 * 3).collect(),
    })
}

#[test]
fn first_frame_only_primes_the_signal() {
    let points: Vec<_> = similarity_signal(vec![frame(0.0, [10, 20, 30])]).collect();
    assert!(points.is_empty());
}

#[test]
fn identical_frames_are_fully_similar_and_cuts_drop() {
    let frames = vec![
        frame(0.0, [200, 10, 10]),
        frame(0.5, [200, 10, 10]),
        frame(1.0, [10, 10, 200]),
    ];
    let points: Vec<SignalPoint> = similarity_signal(frames)
        .collect::<RecutResult<_>>()
        .unwrap();
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].time, 0.5);
    assert!(points[0].similarity > 0.99);
    assert!(points[1].similarity < points[0].similarity);
}

#[test]
fn decoder_errors_pass_through() {
    let frames = vec![
        frame(0.0, [1, 2, 3]),
        Err(RecutError::stage("decoder died")),
    ];
    let out: Vec<_> = similarity_signal(frames).collect();
    assert_eq!(out.len(), 1);
    assert!(matches!(out[0], Err(RecutError::StageExecution(_))));
}

#[test]
fn sampler_rejects_bad_rate() {
    let sampler = FfmpegFrameSampler::default();
    let err = sampler
        .frames(
            Path::new("x.mp4"),
            0.0,
            &StageInterrupt::cancel_only(CancelToken::new()),
        )
        .err()
        .unwrap();
    assert!(matches!(err, RecutError::Policy(_)));
}

#[cfg(unix)]
#[test]
fn sampler_reads_whole_frames_until_eof() {
    let dir = tempfile::tempdir().unwrap();
    // Two 1x1 rgb24 frames.
    let prog = stub_program(dir.path(), "ffmpeg-frames", "printf 'abcdef'");
    let sampler = FfmpegFrameSampler::default()
        .with_program(prog)
        .with_size(1, 1);
    let frames: Vec<SampledFrame> = sampler
        .frames(
            Path::new("x.mp4"),
            2.0,
            &StageInterrupt::cancel_only(CancelToken::new()),
        )
        .unwrap()
        .collect::<RecutResult<_>>()
        .unwrap();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].rgb, b"abc");
    assert_eq!(frames[1].rgb, b"def");
    assert_eq!(frames[1].time, 0.5);
}

#[cfg(unix)]
#[test]
fn failing_decoder_is_a_stage_error() {
    let dir = tempfile::tempdir().unwrap();
    let prog = stub_program(dir.path(), "ffmpeg-broken", "exit 1");
    let mut it = FfmpegFrameSampler::default()
        .with_program(prog)
        .frames(
            Path::new("x.mp4"),
            2.0,
            &StageInterrupt::cancel_only(CancelToken::new()),
        )
        .unwrap();
    assert!(matches!(it.next(), Some(Err(RecutError::StageExecution(_)))));
    assert!(it.next().is_none());
}

#[cfg(unix)]
#[test]
fn cancellation_stops_a_stalled_decoder() {
    let dir = tempfile::tempdir().unwrap();
    let prog = stub_program(dir.path(), "ffmpeg-stall", "exec sleep 30");
    let cancel = CancelToken::new();
    let mut it = FfmpegFrameSampler::default()
        .with_program(prog)
        .frames(
            Path::new("x.mp4"),
            2.0,
            &StageInterrupt::cancel_only(cancel.clone()),
        )
        .unwrap();

    let remote = cancel.clone();
    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(200));
        remote.cancel();
    });
    let started = Instant::now();
    let first = it.next();
    canceller.join().unwrap();

    assert!(matches!(first, Some(Err(RecutError::Cancelled))));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(it.next().is_none());
}

#[cfg(unix)]
#[test]
fn timeout_stops_a_stalled_decoder() {
    let dir = tempfile::tempdir().unwrap();
    let prog = stub_program(dir.path(), "ffmpeg-stall", "exec sleep 30");
    let mut it = FfmpegFrameSampler::default()
        .with_program(prog)
        .with_timeout(Duration::from_millis(300))
        .frames(
            Path::new("x.mp4"),
            2.0,
            &StageInterrupt::cancel_only(CancelToken::new()),
        )
        .unwrap();

    let started = Instant::now();
    let first = it.next();
    assert!(matches!(first, Some(Err(RecutError::StageExecution(_)))), "{first:?}");
    assert!(started.elapsed() < Duration::from_secs(5));
}
