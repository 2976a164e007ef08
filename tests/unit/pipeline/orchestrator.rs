use super::*;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::media::{
    FrameSource, FrameStream, MediaProbe, SampledFrame, TranscodeOutcome, TranscodeRequest,
    Transcoder,
};
use crate::recovery::RetryPolicy;
use crate::workspace::WorkspaceConfig;

/// Writes a few bytes to every requested output; can fail or cancel on a given call.
#[derive(Default)]
struct FakeTranscoder {
    calls: AtomicUsize,
    exit_code: i32,
    cancel_on_call: Option<(usize, CancelToken)>,
    cancel_after_call: Option<(usize, CancelToken)>,
}

impl Transcoder for FakeTranscoder {
    fn run(&self, req: &TranscodeRequest, interrupt: &StageInterrupt) -> RecutResult<TranscodeOutcome> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some((at, token)) = &self.cancel_on_call {
            if *at == n {
                token.cancel();
            }
        }
        interrupt.check()?;
        std::fs::write(&req.output, b"media").unwrap();
        if let Some((at, token)) = &self.cancel_after_call {
            if *at == n {
                token.cancel();
            }
        }
        Ok(TranscodeOutcome {
            exit_code: Some(self.exit_code),
            diagnostics: String::new(),
        })
    }
}

struct FixedProbe(MediaInfo);

impl MediaProbe for FixedProbe {
    fn probe(&self, _path: &Path) -> RecutResult<MediaInfo> {
        Ok(self.0.clone())
    }
}

/// 30 seconds at 2 fps with hard colour changes at 10 s and 20 s.
struct ThreeShots;

impl FrameSource for ThreeShots {
    fn frames(&self, _path: &Path, fps: f64, _interrupt: &StageInterrupt) -> RecutResult<FrameStream> {
        let frames = (0..60).map(move |i| {
            let time = i as f64 / fps;
            let px: [u8; 3] = match time {
                t if t < 10.0 => [200, 20, 20],
                t if t < 20.0 => [20, 200, 20],
                _ => [20, 20, 200],
            };
            Ok(SampledFrame {
                time,
                width: 2,
                height: 2,
                rgb: px.iter().copied().cycle().take(12).collect(),
            })
        });
        Ok(Box::new(frames))
    }
}

fn media(has_audio: bool) -> MediaInfo {
    MediaInfo {
        duration: 30.0,
        container: "mp4".into(),
        width: 640,
        height: 360,
        frame_rate: 25.0,
        has_audio,
        video_codec: Some("h264".into()),
        audio_codec: has_audio.then(|| "aac".into()),
        ..MediaInfo::default()
    }
}

struct Rig {
    pipeline: Pipeline,
    transcoder: Arc<FakeTranscoder>,
    input: PathBuf,
    ws_base: PathBuf,
    out_dir: PathBuf,
    _dirs: [tempfile::TempDir; 3],
}

impl Rig {
    fn settings(&self) -> Settings {
        Settings {
            output_dir: self.out_dir.clone(),
            seed: Some(11),
            ..Settings::default()
        }
    }

    fn workspace_roots(&self) -> usize {
        std::fs::read_dir(&self.ws_base)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with("recut_ws_"))
            .count()
    }

    fn outputs(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.out_dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn calls(&self) -> usize {
        self.transcoder.calls.load(Ordering::SeqCst)
    }
}

fn rig_with(transcoder: FakeTranscoder, has_audio: bool) -> Rig {
    let src = tempfile::tempdir().unwrap();
    let ws = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let input = src.path().join("holiday.mp4");
    std::fs::write(&input, b"source").unwrap();

    let config = EngineConfig {
        workspace: WorkspaceConfig {
            base_dir: ws.path().to_path_buf(),
            ..WorkspaceConfig::default()
        },
        retry: RetryPolicy {
            backoff_base_ms: 0,
            ..RetryPolicy::default()
        },
        ..EngineConfig::default()
    };
    let transcoder = Arc::new(transcoder);
    let executor = TransformExecutor::new(
        transcoder.clone(),
        Arc::new(FixedProbe(media(has_audio))),
        Arc::new(ThreeShots),
        Duration::from_secs(5),
    );
    let pipeline = Pipeline::new(config, executor, ResourceView::detached()).unwrap();
    Rig {
        pipeline,
        transcoder,
        input,
        ws_base: ws.path().to_path_buf(),
        out_dir: out.path().join("final"),
        _dirs: [src, ws, out],
    }
}

fn rig() -> Rig {
    rig_with(FakeTranscoder::default(), true)
}

#[test]
fn successful_run_promotes_video_and_audio_and_reclaims_workspace() {
    let r = rig();
    let progress = ProgressHandle::default();
    let out = r
        .pipeline
        .run(&r.input, &r.settings(), &CancelToken::new(), &progress)
        .unwrap();

    assert_eq!(out.video, r.out_dir.join("holiday_recut.mp4"));
    assert_eq!(out.audio.as_deref(), Some(r.out_dir.join("holiday_recut.wav").as_path()));
    assert!(out.video.is_file());
    assert_eq!(r.outputs(), vec!["holiday_recut.mp4", "holiday_recut.wav"]);
    assert_eq!(r.workspace_roots(), 0);

    assert_eq!(out.seed, 11);
    assert_eq!(out.scenes.len(), 3);
    assert!(!out.cuts.is_empty());
    assert!(out.order.iter().all(|&i| i < out.cuts.len()));
    assert!(out.attempts.iter().all(|a| !a.failed()));

    let p = progress.snapshot();
    assert_eq!(p.status, RunStatus::Succeeded);
    assert_eq!(p.fraction, 1.0);
    assert_eq!(p.stage, Some(StageKind::FinalRender));
}

#[test]
fn source_without_audio_yields_video_only() {
    let r = rig_with(FakeTranscoder::default(), false);
    let out = r
        .pipeline
        .run(&r.input, &r.settings(), &CancelToken::new(), &ProgressHandle::default())
        .unwrap();
    assert_eq!(out.audio, None);
    assert_eq!(r.outputs(), vec!["holiday_recut.mp4"]);
}

#[test]
fn fixed_seed_reproduces_the_cut_plan() {
    let a = rig();
    let b = rig();
    let first = a
        .pipeline
        .run(&a.input, &a.settings(), &CancelToken::new(), &ProgressHandle::default())
        .unwrap();
    let second = b
        .pipeline
        .run(&b.input, &b.settings(), &CancelToken::new(), &ProgressHandle::default())
        .unwrap();
    assert_eq!(first.cuts, second.cuts);
    assert_eq!(first.order, second.order);
}

#[test]
fn cancellation_mid_stage_leaves_no_outputs() {
    let cancel = CancelToken::new();
    let r = rig_with(
        FakeTranscoder {
            cancel_on_call: Some((2, cancel.clone())),
            ..FakeTranscoder::default()
        },
        true,
    );
    let progress = ProgressHandle::default();
    let err = r
        .pipeline
        .run(&r.input, &r.settings(), &cancel, &progress)
        .unwrap_err();

    assert!(matches!(err, RecutError::Cancelled));
    assert!(r.outputs().is_empty());
    assert_eq!(r.workspace_roots(), 0);
    assert_eq!(progress.snapshot().status, RunStatus::Cancelled);
    assert_eq!(r.calls(), 3);
}

#[test]
fn cancellation_after_final_render_still_withholds_outputs() {
    let cancel = CancelToken::new();
    // silence removal (1), 3 clips + concat (4), colour (1), render + wav (2)
    let last_call = 7;
    let r = rig_with(
        FakeTranscoder {
            cancel_after_call: Some((last_call, cancel.clone())),
            ..FakeTranscoder::default()
        },
        true,
    );
    let err = r
        .pipeline
        .run(&r.input, &r.settings(), &cancel, &ProgressHandle::default())
        .unwrap_err();
    assert!(matches!(err, RecutError::Cancelled));
    assert_eq!(r.calls(), last_call + 1);
    assert!(r.outputs().is_empty());
    assert_eq!(r.workspace_roots(), 0);
}

#[test]
fn persistent_stage_failure_aborts_after_the_full_ladder() {
    let r = rig_with(
        FakeTranscoder {
            exit_code: 1,
            ..FakeTranscoder::default()
        },
        true,
    );
    let progress = ProgressHandle::default();
    let err = r
        .pipeline
        .run(&r.input, &r.settings(), &CancelToken::new(), &progress)
        .unwrap_err();

    match err {
        RecutError::ProcessingFailure { stage, attempts, .. } => {
            assert_eq!(stage, StageKind::SilenceRemoval.as_str());
            assert_eq!(attempts, 12);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(r.outputs().is_empty());
    assert_eq!(r.workspace_roots(), 0);
    assert!(matches!(progress.snapshot().status, RunStatus::Aborted(_)));
}

#[test]
fn invalid_settings_fail_before_any_work() {
    let r = rig();
    let settings = Settings {
        min_cut_seconds: 9.0,
        max_cut_seconds: 2.0,
        ..r.settings()
    };
    let progress = ProgressHandle::default();
    let err = r
        .pipeline
        .run(&r.input, &settings, &CancelToken::new(), &progress)
        .unwrap_err();
    assert!(matches!(err, RecutError::Policy(_)));
    assert_eq!(r.calls(), 0);
    assert_eq!(r.workspace_roots(), 0);
    assert!(matches!(progress.snapshot().status, RunStatus::Aborted(_)));
}

#[test]
fn missing_input_is_a_validation_error() {
    let r = rig();
    let err = r
        .pipeline
        .run(
            &r.ws_base.join("nope.mp4"),
            &r.settings(),
            &CancelToken::new(),
            &ProgressHandle::default(),
        )
        .unwrap_err();
    assert!(matches!(err, RecutError::Validation(_)));
}

#[test]
fn trim_past_the_end_is_a_policy_error() {
    let r = rig();
    let settings = Settings {
        trim_in: Some(45.0),
        ..r.settings()
    };
    let err = r
        .pipeline
        .run(&r.input, &settings, &CancelToken::new(), &ProgressHandle::default())
        .unwrap_err();
    assert!(matches!(err, RecutError::Policy(_)), "{err}");
    assert!(r.outputs().is_empty());
}

#[test]
fn plan_matches_the_rendered_cut_list() {
    let r = rig();
    let plan = r
        .pipeline
        .plan(&r.input, &r.settings(), &CancelToken::new())
        .unwrap();
    assert_eq!(plan.seed, 11);
    assert_eq!(plan.media.duration, 30.0);
    assert_eq!(plan.scenes.len(), 3);
    assert_eq!(r.calls(), 0);

    let out = r
        .pipeline
        .run(&r.input, &r.settings(), &CancelToken::new(), &ProgressHandle::default())
        .unwrap();
    assert_eq!(plan.cuts, out.cuts);
    assert_eq!(plan.order, out.order);
}
