use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::cuts::Cut;
use crate::exec::encode::{
    self, BlurRegion, ColorPreset, RenderOptions, ZOOMPAN_FILTER, audio_encode_args,
    decode_args, join_filters, scale_filter, video_encode_args,
};
use crate::exec::stage::StageKind;
use crate::foundation::core::{TimeRange, format_secs};
use crate::foundation::error::{RecutError, RecutResult};
use crate::media::{
    FfmpegFrameSampler, FfmpegTranscoder, FfprobeProbe, FrameSource, MediaInfo, MediaProbe,
    TranscodeOutcome, TranscodeRequest, Transcoder, similarity_signal,
};
use crate::recovery::AttemptContext;
use crate::scene::{Scene, SceneSegmenter, SegmenterConfig};
use crate::workspace::{ArtifactHandle, ScopedWorkspace};

/// Input or output of a stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MediaRef {
    /// A file owned by the caller; never reclaimed.
    External(PathBuf),
    /// A workspace artifact.
    Artifact(ArtifactHandle),
}

impl MediaRef {
    pub fn resolve(&self, ws: &ScopedWorkspace) -> RecutResult<PathBuf> {
        match self {
            MediaRef::External(p) => Ok(p.clone()),
            MediaRef::Artifact(h) => ws.path(*h),
        }
    }

    pub fn handle(&self) -> Option<ArtifactHandle> {
        match self {
            MediaRef::External(_) => None,
            MediaRef::Artifact(h) => Some(*h),
        }
    }
}

/// Artifacts produced by the final render.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderedOutputs {
    pub video: ArtifactHandle,
    /// Absent when the source carries no audio stream.
    pub audio: Option<ArtifactHandle>,
}

enum VideoFilter {
    Simple(String),
    Complex { graph: String, output: String },
}

/// What one encode pass should do.
struct EncodeSpec {
    /// Portion of the input to process; `None` for all of it.
    window: Option<TimeRange>,
    video_filter: Option<VideoFilter>,
    audio_filter: Option<String>,
    /// Stream-copy video when nothing forces a re-encode.
    copy_video: bool,
    extra_args: Vec<String>,
}

impl EncodeSpec {
    fn new() -> Self {
        Self {
            window: None,
            video_filter: None,
            audio_filter: None,
            copy_video: false,
            extra_args: Vec::new(),
        }
    }
}

/// Runs individual stages against a workspace via the external collaborators.
///
/// Every method is one attempt: it honours the attempt's degrade profile and interrupt,
/// and releases whatever it allocated if the attempt fails.
#[derive(Clone)]
pub struct TransformExecutor {
    transcoder: Arc<dyn Transcoder>,
    probe: Arc<dyn MediaProbe>,
    frames: Arc<dyn FrameSource>,
    stage_timeout: Duration,
    render: RenderOptions,
}

impl std::fmt::Debug for TransformExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformExecutor")
            .field("stage_timeout", &self.stage_timeout)
            .field("render", &self.render)
            .finish_non_exhaustive()
    }
}

impl TransformExecutor {
    pub fn new(
        transcoder: Arc<dyn Transcoder>,
        probe: Arc<dyn MediaProbe>,
        frames: Arc<dyn FrameSource>,
        stage_timeout: Duration,
    ) -> Self {
        Self {
            transcoder,
            probe,
            frames,
            stage_timeout,
            render: RenderOptions::default(),
        }
    }

    /// Executor using the system `ffmpeg`/`ffprobe`.
    pub fn with_ffmpeg(stage_timeout: Duration) -> Self {
        Self::new(
            Arc::new(FfmpegTranscoder::default()),
            Arc::new(FfprobeProbe::default().with_timeout(stage_timeout)),
            Arc::new(FfmpegFrameSampler::default().with_timeout(stage_timeout)),
            stage_timeout,
        )
    }

    pub fn with_render_options(mut self, render: RenderOptions) -> Self {
        self.render = render;
        self
    }

    pub fn render_options(&self) -> &RenderOptions {
        &self.render
    }

    pub fn probe(&self, path: &Path) -> RecutResult<MediaInfo> {
        self.probe.probe(path)
    }

    /// Keep only `range` of the input. Stream copy unless the attempt is degraded.
    #[tracing::instrument(skip(self, ws, ctx), fields(strategy = %ctx.strategy, attempt = ctx.attempt))]
    pub fn trim(
        &self,
        ws: &mut ScopedWorkspace,
        input: &MediaRef,
        range: TimeRange,
        ctx: &AttemptContext,
    ) -> RecutResult<MediaRef> {
        let path = input.resolve(ws)?;
        let info = self.probe.probe(&path)?;
        if range.start >= info.duration {
            return Err(RecutError::policy(format!(
                "trim start {}s is past the end of the input ({}s)",
                format_secs(range.start),
                format_secs(info.duration)
            )));
        }
        let window = TimeRange::new(range.start, range.end.min(info.duration))?;

        if !ctx.profile.is_degraded() {
            let out = self.produce(ws, StageKind::Trim, "mp4", ctx, |out| {
                TranscodeRequest::new(&path, out, self.stage_timeout)
                    .input_args(["-ss".to_owned(), format_secs(window.start)])
                    .args([
                        "-t".to_owned(),
                        format_secs(window.duration()),
                        "-c".into(),
                        "copy".into(),
                        "-avoid_negative_ts".into(),
                        "make_zero".into(),
                    ])
            })?;
            return Ok(MediaRef::Artifact(out));
        }

        let spec = EncodeSpec {
            window: Some(window),
            ..EncodeSpec::new()
        };
        self.encode(ws, StageKind::Trim, &path, &info, ctx, spec)
            .map(MediaRef::Artifact)
    }

    /// Blur each region in place. Passes the input through when there is nothing to do.
    #[tracing::instrument(skip(self, ws, regions, ctx), fields(regions = regions.len()))]
    pub fn region_effects(
        &self,
        ws: &mut ScopedWorkspace,
        input: &MediaRef,
        regions: &[BlurRegion],
        ctx: &AttemptContext,
    ) -> RecutResult<MediaRef> {
        let Some((graph, output)) = encode::blur_filter_graph(regions) else {
            return Ok(input.clone());
        };
        if ctx.profile.effects_disabled {
            tracing::info!("effects disabled; skipping region blur");
            return Ok(input.clone());
        }
        let path = input.resolve(ws)?;
        let info = self.probe.probe(&path)?;
        let spec = EncodeSpec {
            video_filter: Some(VideoFilter::Complex { graph, output }),
            ..EncodeSpec::new()
        };
        self.encode(ws, StageKind::RegionEffects, &path, &info, ctx, spec)
            .map(MediaRef::Artifact)
    }

    /// Strip leading silence below `threshold_db`. Inputs without audio pass through.
    #[tracing::instrument(skip(self, ws, ctx))]
    pub fn remove_silence(
        &self,
        ws: &mut ScopedWorkspace,
        input: &MediaRef,
        threshold_db: f64,
        ctx: &AttemptContext,
    ) -> RecutResult<MediaRef> {
        let path = input.resolve(ws)?;
        let info = self.probe.probe(&path)?;
        if !info.has_audio {
            tracing::info!("input has no audio; skipping silence removal");
            return Ok(input.clone());
        }
        if ctx.profile.effects_disabled {
            return Ok(input.clone());
        }
        let spec = EncodeSpec {
            audio_filter: Some(encode::silence_filter(threshold_db)),
            copy_video: true,
            ..EncodeSpec::new()
        };
        self.encode(ws, StageKind::SilenceRemoval, &path, &info, ctx, spec)
            .map(MediaRef::Artifact)
    }

    /// Sample frames, build the similarity signal and segment it into scenes.
    ///
    /// Insufficient signal yields the whole input as one scene.
    #[tracing::instrument(skip(self, ws, cfg, ctx))]
    pub fn detect_scenes(
        &self,
        ws: &ScopedWorkspace,
        input: &MediaRef,
        cfg: &SegmenterConfig,
        sample_fps: f64,
        ctx: &AttemptContext,
    ) -> RecutResult<Vec<Scene>> {
        let path = input.resolve(ws)?;
        let info = self.probe.probe(&path)?;
        if !(info.duration > 0.0) {
            return Err(RecutError::validation(format!(
                "'{}' has no measurable duration",
                path.display()
            )));
        }
        let segmenter = SceneSegmenter::new(cfg.clone())?;

        let interrupt = ctx.interrupt.clone();
        let frames = self
            .frames
            .frames(&path, sample_fps, &interrupt)?
            .map(move |frame| {
                interrupt.check()?;
                frame
            });
        let scenes = segmenter.segment_or_whole(similarity_signal(frames), info.duration)?;
        tracing::info!(scenes = scenes.len(), "scenes detected");
        Ok(scenes)
    }

    /// Extract every cut and concatenate them in `order`.
    #[tracing::instrument(skip(self, ws, scenes, cuts, order, ctx), fields(cuts = cuts.len()))]
    pub fn compile_cuts(
        &self,
        ws: &mut ScopedWorkspace,
        input: &MediaRef,
        scenes: &[Scene],
        cuts: &[Cut],
        order: &[usize],
        ctx: &AttemptContext,
    ) -> RecutResult<MediaRef> {
        if order.is_empty() {
            return Err(RecutError::validation("no cuts to compile"));
        }
        let path = input.resolve(ws)?;
        let info = self.probe.probe(&path)?;

        let mut clips = Vec::with_capacity(order.len());
        let result = self
            .extract_clips(ws, &path, &info, scenes, cuts, order, ctx, &mut clips)
            .and_then(|()| self.concat(ws, StageKind::CutCompile, &clips, ctx));
        for clip in clips {
            release_quietly(ws, clip);
        }
        result.map(MediaRef::Artifact)
    }

    #[allow(clippy::too_many_arguments)]
    fn extract_clips(
        &self,
        ws: &mut ScopedWorkspace,
        path: &Path,
        info: &MediaInfo,
        scenes: &[Scene],
        cuts: &[Cut],
        order: &[usize],
        ctx: &AttemptContext,
        clips: &mut Vec<ArtifactHandle>,
    ) -> RecutResult<()> {
        for &idx in order {
            let cut = cuts
                .get(idx)
                .ok_or_else(|| RecutError::validation(format!("cut index {idx} out of range")))?;
            let scene = scenes
                .iter()
                .find(|s| s.id == cut.scene_id)
                .ok_or_else(|| {
                    RecutError::validation(format!("cut references unknown scene {}", cut.scene_id))
                })?;
            let window = TimeRange::new(cut.source_start(scene), cut.source_start(scene) + cut.duration)?;
            let spec = EncodeSpec {
                window: Some(window),
                ..EncodeSpec::new()
            };
            let clip = self.encode_once(ws, StageKind::CutCompile, path, info, ctx, &spec)?;
            clips.push(clip);
        }
        Ok(())
    }

    /// Apply the colour look and optional zoom/pan.
    #[tracing::instrument(skip(self, ws, ctx))]
    pub fn color_pan(
        &self,
        ws: &mut ScopedWorkspace,
        input: &MediaRef,
        color: ColorPreset,
        panning: bool,
        ctx: &AttemptContext,
    ) -> RecutResult<MediaRef> {
        if ctx.profile.effects_disabled {
            tracing::info!("effects disabled; skipping colour and pan");
            return Ok(input.clone());
        }
        let path = input.resolve(ws)?;
        let info = self.probe.probe(&path)?;

        let zoompan = panning.then(|| {
            let mut f = ZOOMPAN_FILTER.to_owned();
            if info.width > 0 && info.height > 0 {
                f.push_str(&format!(":s={}x{}", info.width, info.height));
            }
            if info.frame_rate > 0.0 {
                f.push_str(&format!(":fps={}", info.frame_rate));
            }
            f
        });
        let Some(chain) = join_filters([color.filter(), zoompan.as_deref()]) else {
            return Ok(input.clone());
        };
        let spec = EncodeSpec {
            video_filter: Some(VideoFilter::Simple(chain)),
            ..EncodeSpec::new()
        };
        self.encode(ws, StageKind::ColorPan, &path, &info, ctx, spec)
            .map(MediaRef::Artifact)
    }

    /// Encode the deliverable video and extract its audio as PCM WAV.
    #[tracing::instrument(skip(self, ws, ctx))]
    pub fn final_render(
        &self,
        ws: &mut ScopedWorkspace,
        input: &MediaRef,
        ctx: &AttemptContext,
    ) -> RecutResult<RenderedOutputs> {
        let path = input.resolve(ws)?;
        let info = self.probe.probe(&path)?;
        let spec = EncodeSpec {
            extra_args: vec!["-movflags".into(), "+faststart".into()],
            ..EncodeSpec::new()
        };
        let video = self.encode(ws, StageKind::FinalRender, &path, &info, ctx, spec)?;
        if !info.has_audio {
            return Ok(RenderedOutputs { video, audio: None });
        }

        let video_path = ws.path(video)?;
        let audio = self.produce(ws, StageKind::FinalRender, "wav", ctx, |out| {
            TranscodeRequest::new(&video_path, out, self.stage_timeout)
                .args(encode::wav_extract_args())
        });
        match audio {
            Ok(audio) => Ok(RenderedOutputs {
                video,
                audio: Some(audio),
            }),
            Err(e) => {
                release_quietly(ws, video);
                Err(e)
            }
        }
    }

    /// Encode `spec`, splitting into chunks when the attempt's profile asks for it.
    fn encode(
        &self,
        ws: &mut ScopedWorkspace,
        stage: StageKind,
        path: &Path,
        info: &MediaInfo,
        ctx: &AttemptContext,
        spec: EncodeSpec,
    ) -> RecutResult<ArtifactHandle> {
        let window = match spec.window {
            Some(w) => Some(w),
            None if info.duration > 0.0 => Some(TimeRange::new(0.0, info.duration)?),
            None => None,
        };
        let chunks = match (ctx.profile.chunk_seconds, window) {
            (Some(len), Some(w)) if w.duration() > len => w.split(len),
            _ => return self.encode_once(ws, stage, path, info, ctx, &spec),
        };
        tracing::info!(%stage, chunks = chunks.len(), "encoding in chunks");

        let mut parts = Vec::with_capacity(chunks.len());
        let mut result = Ok(());
        for chunk in chunks {
            let part_spec = EncodeSpec {
                window: Some(chunk),
                video_filter: match &spec.video_filter {
                    Some(VideoFilter::Simple(f)) => Some(VideoFilter::Simple(f.clone())),
                    Some(VideoFilter::Complex { graph, output }) => Some(VideoFilter::Complex {
                        graph: graph.clone(),
                        output: output.clone(),
                    }),
                    None => None,
                },
                audio_filter: spec.audio_filter.clone(),
                copy_video: false,
                extra_args: Vec::new(),
            };
            match self.encode_once(ws, stage, path, info, ctx, &part_spec) {
                Ok(h) => parts.push(h),
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
        let joined = result.and_then(|()| self.concat(ws, stage, &parts, ctx));
        for part in parts {
            release_quietly(ws, part);
        }
        joined
    }

    fn encode_once(
        &self,
        ws: &mut ScopedWorkspace,
        stage: StageKind,
        path: &Path,
        info: &MediaInfo,
        ctx: &AttemptContext,
        spec: &EncodeSpec,
    ) -> RecutResult<ArtifactHandle> {
        let profile = &ctx.profile;
        let mut input_args = decode_args(&self.render, profile);
        let mut args = Vec::new();
        if let Some(w) = spec.window {
            input_args.extend(["-ss".to_owned(), format_secs(w.start)]);
            args.extend(["-t".to_owned(), format_secs(w.duration())]);
        }

        let scale = scale_filter(profile);
        let reencode = match &spec.video_filter {
            Some(VideoFilter::Simple(chain)) => {
                let vf = join_filters([Some(chain.as_str()), scale.as_deref()])
                    .unwrap_or_else(|| chain.clone());
                args.extend(["-vf".to_owned(), vf]);
                true
            }
            Some(VideoFilter::Complex { graph, output }) => {
                let (graph, output) = match &scale {
                    Some(s) => (format!("{graph};{output}{s}[scaled]"), "[scaled]".to_owned()),
                    None => (graph.clone(), output.clone()),
                };
                args.extend([
                    "-filter_complex".to_owned(),
                    graph,
                    "-map".into(),
                    output,
                    "-map".into(),
                    "0:a?".into(),
                ]);
                true
            }
            None => {
                if let Some(s) = &scale {
                    args.extend(["-vf".to_owned(), s.clone()]);
                }
                scale.is_some() || !spec.copy_video || profile.is_degraded()
            }
        };
        if reencode {
            args.extend(video_encode_args(&self.render, profile));
        } else {
            args.extend(["-c:v".to_owned(), "copy".into()]);
        }

        if info.has_audio {
            if let Some(af) = &spec.audio_filter {
                args.extend(["-af".to_owned(), af.clone()]);
            }
            args.extend(audio_encode_args(profile));
        } else {
            args.push("-an".into());
        }
        args.extend(spec.extra_args.iter().cloned());

        self.produce(ws, stage, "mp4", ctx, |out| {
            TranscodeRequest::new(path, out, self.stage_timeout)
                .input_args(input_args)
                .args(args)
        })
    }

    /// Stream-copy concatenation of `parts` through the concat demuxer.
    fn concat(
        &self,
        ws: &mut ScopedWorkspace,
        stage: StageKind,
        parts: &[ArtifactHandle],
        ctx: &AttemptContext,
    ) -> RecutResult<ArtifactHandle> {
        let paths = parts
            .iter()
            .map(|h| ws.path(*h))
            .collect::<RecutResult<Vec<_>>>()?;
        let list = ws.allocate("txt", stage.as_str())?;
        let list_path = ws.path(list)?;
        let joined = std::fs::write(&list_path, encode::concat_list(&paths))
            .map_err(RecutError::from)
            .and_then(|()| {
                self.produce(ws, stage, "mp4", ctx, |out| {
                    TranscodeRequest::new(&list_path, out, self.stage_timeout)
                        .input_args(["-f", "concat", "-safe", "0"])
                        .args(["-c", "copy"])
                })
            });
        release_quietly(ws, list);
        joined
    }

    /// Allocate an output, run the transcoder into it, and validate the result.
    fn produce<F>(
        &self,
        ws: &mut ScopedWorkspace,
        stage: StageKind,
        ext: &str,
        ctx: &AttemptContext,
        build: F,
    ) -> RecutResult<ArtifactHandle>
    where
        F: FnOnce(PathBuf) -> TranscodeRequest,
    {
        let out = ws.allocate(ext, stage.as_str())?;
        let out_path = ws.path(out)?;
        let req = build(out_path.clone());
        let checked = self
            .transcoder
            .run(&req, &ctx.interrupt)
            .and_then(|outcome| check_output(stage, &outcome, &out_path));
        match checked {
            Ok(()) => Ok(out),
            Err(e) => {
                release_quietly(ws, out);
                Err(e)
            }
        }
    }
}

/// Non-success status or an empty output file is a stage failure.
pub fn check_output(stage: StageKind, outcome: &TranscodeOutcome, output: &Path) -> RecutResult<()> {
    if !outcome.success() {
        let code = outcome
            .exit_code
            .map_or_else(|| "signal".to_owned(), |c| c.to_string());
        return Err(RecutError::stage(format!(
            "{stage} transcode failed (exit {code}): {}",
            outcome.diagnostics
        )));
    }
    let size = std::fs::metadata(output).map(|m| m.len()).unwrap_or(0);
    if size == 0 {
        return Err(RecutError::stage(format!(
            "{stage} produced an empty output '{}'",
            output.display()
        )));
    }
    Ok(())
}

fn release_quietly(ws: &mut ScopedWorkspace, handle: ArtifactHandle) {
    if let Err(e) = ws.release(handle) {
        tracing::warn!(%handle, error = %e, "failed to release artifact");
    }
}

#[cfg(test)]
#[path = "../../tests/unit/exec/executor.rs"]
mod tests;
