use std::path::{Path, PathBuf};

use crate::cuts::{Cut, generate_cuts, zigzag_with};
use crate::exec::{MediaRef, RenderedOutputs, StageKind, TransformExecutor};
use crate::foundation::cancel::CancelToken;
use crate::foundation::error::{RecutError, RecutResult};
use crate::media::MediaInfo;
use crate::monitor::ResourceView;
use crate::pipeline::progress::{ProgressHandle, RunStatus};
use crate::pipeline::settings::{EngineConfig, Settings};
use crate::recovery::{
    AttemptContext, DegradeProfile, DegradeStrategy, RecoveryAttempt, RecoverySupervisor,
    StageInterrupt,
};
use crate::scene::Scene;
use crate::workspace::{ArtifactHandle, ScopedWorkspace};

/// Deliverables and diagnostics of a successful run.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PipelineOutput {
    pub video: PathBuf,
    /// Absent when the source has no audio.
    pub audio: Option<PathBuf>,
    pub seed: u64,
    pub scenes: Vec<Scene>,
    pub cuts: Vec<Cut>,
    pub order: Vec<usize>,
    pub attempts: Vec<RecoveryAttempt>,
}

/// Scenes, cuts and their zigzag order, without rendering anything.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CutPlan {
    pub media: MediaInfo,
    pub seed: u64,
    pub scenes: Vec<Scene>,
    pub cuts: Vec<Cut>,
    pub order: Vec<usize>,
}

/// Sole entry point for running the stage graph.
#[derive(Clone, Debug)]
pub struct Pipeline {
    config: EngineConfig,
    executor: TransformExecutor,
    resources: ResourceView,
}

/// Per-run mutable state threaded through the stages.
struct Run<'a> {
    ws: &'a mut ScopedWorkspace,
    sup: RecoverySupervisor,
    progress: &'a ProgressHandle,
    cancel: &'a CancelToken,
    current: MediaRef,
}

impl Run<'_> {
    /// Run one stage under supervision. The current input is protected from eager cleanup.
    fn stage<T, F>(&mut self, kind: StageKind, op: F) -> RecutResult<T>
    where
        F: FnMut(&mut ScopedWorkspace, &AttemptContext) -> RecutResult<T>,
    {
        self.cancel.check()?;
        self.progress.begin_stage(kind);
        tracing::info!(stage = %kind, "stage started");
        let keep: Vec<ArtifactHandle> = self.current.handle().into_iter().collect();
        let out = self
            .sup
            .execute(kind.as_str(), kind.is_critical(), self.ws, &keep, op)?;
        self.progress.complete_stage(kind);
        Ok(out)
    }

    /// Make `next` the current media, reclaiming the consumed input.
    fn advance(&mut self, next: MediaRef, owner: StageKind) -> RecutResult<()> {
        if next == self.current {
            return Ok(());
        }
        if let Some(h) = next.handle() {
            self.ws.transfer(h, owner.as_str())?;
        }
        if let Some(prev) = self.current.handle() {
            self.ws.release(prev)?;
        }
        self.current = next;
        Ok(())
    }
}

impl Pipeline {
    pub fn new(
        config: EngineConfig,
        executor: TransformExecutor,
        resources: ResourceView,
    ) -> RecutResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            executor,
            resources,
        })
    }

    /// Pipeline on the system `ffmpeg`/`ffprobe`.
    pub fn with_ffmpeg(config: EngineConfig, resources: ResourceView) -> RecutResult<Self> {
        let executor = TransformExecutor::with_ffmpeg(config.stage_timeout());
        Self::new(config, executor, resources)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn resources(&self) -> &ResourceView {
        &self.resources
    }

    /// Run every stage on `input`.
    ///
    /// The run's workspace is torn down on every exit path. Final outputs land in
    /// `settings.output_dir` only when the run succeeds.
    #[tracing::instrument(skip(self, settings, cancel, progress))]
    pub fn run(
        &self,
        input: &Path,
        settings: &Settings,
        cancel: &CancelToken,
        progress: &ProgressHandle,
    ) -> RecutResult<PipelineOutput> {
        let result = self.run_inner(input, settings, cancel, progress);
        let status = match &result {
            Ok(_) => RunStatus::Succeeded,
            Err(RecutError::Cancelled) => RunStatus::Cancelled,
            Err(e) => RunStatus::Aborted(e.to_string()),
        };
        match &status {
            RunStatus::Succeeded => tracing::info!("pipeline succeeded"),
            RunStatus::Cancelled => tracing::info!("pipeline cancelled"),
            RunStatus::Aborted(reason) => tracing::error!(%reason, "pipeline aborted"),
            _ => {}
        }
        progress.finish(status);
        result
    }

    fn run_inner(
        &self,
        input: &Path,
        settings: &Settings,
        cancel: &CancelToken,
        progress: &ProgressHandle,
    ) -> RecutResult<PipelineOutput> {
        settings.validate()?;
        if !input.is_file() {
            return Err(RecutError::validation(format!(
                "input '{}' is not a readable file",
                input.display()
            )));
        }

        let mut ws = ScopedWorkspace::new(self.config.workspace.clone())
            .with_final_dir(&settings.output_dir);
        let result = self.run_stages(&mut ws, input, settings, cancel, progress);
        match ws.teardown() {
            Ok(report) => tracing::debug!(
                reclaimed = report.reclaimed,
                kept_final = report.kept_final,
                "run workspace reclaimed"
            ),
            Err(e) => tracing::warn!(error = %e, "run workspace teardown failed"),
        }
        result
    }

    fn run_stages(
        &self,
        ws: &mut ScopedWorkspace,
        input: &Path,
        settings: &Settings,
        cancel: &CancelToken,
        progress: &ProgressHandle,
    ) -> RecutResult<PipelineOutput> {
        let seed = settings.seed.unwrap_or_else(rand::random);
        tracing::info!(seed, run = %ws.run_token(), "pipeline started");

        let exec = self
            .executor
            .clone()
            .with_render_options(settings.render_options(&self.config.hardware_encoder));
        let mut run = Run {
            ws,
            sup: RecoverySupervisor::new(
                self.config.retry.clone(),
                self.resources.clone(),
                cancel.clone(),
            ),
            progress,
            cancel,
            current: MediaRef::External(input.to_path_buf()),
        };

        if let Some(range) = settings.trim_range()? {
            let src = run.current.clone();
            let next = run.stage(StageKind::Trim, |ws, ctx| exec.trim(ws, &src, range, ctx))?;
            run.advance(next, StageKind::RegionEffects)?;
        }

        let src = run.current.clone();
        let next = run.stage(StageKind::RegionEffects, |ws, ctx| {
            exec.region_effects(ws, &src, &settings.blur_regions, ctx)
        })?;
        run.advance(next, StageKind::SilenceRemoval)?;

        let src = run.current.clone();
        let next = run.stage(StageKind::SilenceRemoval, |ws, ctx| {
            exec.remove_silence(ws, &src, settings.silence_threshold_db, ctx)
        })?;
        run.advance(next, StageKind::SceneDetect)?;

        let src = run.current.clone();
        let seg = settings.segmenter_config();
        let scenes = run.stage(StageKind::SceneDetect, |ws, ctx| {
            exec.detect_scenes(ws, &src, &seg, settings.sample_fps, ctx)
        })?;

        let policy = settings.cut_policy(seed);
        let cuts = generate_cuts(&scenes, &policy)?;
        let order = zigzag_with(cuts.len(), policy.zigzag_tail);
        tracing::info!(scenes = scenes.len(), cuts = cuts.len(), "cut plan ready");

        let next = run.stage(StageKind::CutCompile, |ws, ctx| {
            exec.compile_cuts(ws, &src, &scenes, &cuts, &order, ctx)
        })?;
        run.advance(next, StageKind::ColorPan)?;

        let src = run.current.clone();
        let next = run.stage(StageKind::ColorPan, |ws, ctx| {
            exec.color_pan(ws, &src, settings.color_preset, settings.panning, ctx)
        })?;
        run.advance(next, StageKind::FinalRender)?;

        let src = run.current.clone();
        let rendered = run.stage(StageKind::FinalRender, |ws, ctx| {
            exec.final_render(ws, &src, ctx)
        })?;

        // Last safe stopping point before anything becomes visible to the caller.
        run.cancel.check()?;
        let (video, audio) = promote(run.ws, rendered, input)?;

        Ok(PipelineOutput {
            video,
            audio,
            seed,
            scenes,
            cuts,
            order,
            attempts: run.sup.into_log(),
        })
    }

    /// Detect scenes on `input` and derive the cut plan, without rendering.
    #[tracing::instrument(skip(self, settings, cancel))]
    pub fn plan(
        &self,
        input: &Path,
        settings: &Settings,
        cancel: &CancelToken,
    ) -> RecutResult<CutPlan> {
        settings.validate()?;
        let seed = settings.seed.unwrap_or_else(rand::random);
        let media = self.executor.probe(input)?;
        let ws = ScopedWorkspace::new(self.config.workspace.clone());
        let ctx = AttemptContext {
            strategy: DegradeStrategy::RetryLowerQuality,
            attempt: 1,
            profile: DegradeProfile::NONE,
            interrupt: StageInterrupt::cancel_only(cancel.clone()),
        };
        let scenes = self.executor.detect_scenes(
            &ws,
            &MediaRef::External(input.to_path_buf()),
            &settings.segmenter_config(),
            settings.sample_fps,
            &ctx,
        )?;
        let policy = settings.cut_policy(seed);
        let cuts = generate_cuts(&scenes, &policy)?;
        let order = zigzag_with(cuts.len(), policy.zigzag_tail);
        Ok(CutPlan {
            media,
            seed,
            scenes,
            cuts,
            order,
        })
    }
}

/// Move the rendered artifacts into the output directory as `<stem>_recut.*`.
///
/// If the audio cannot be promoted, the already promoted video is removed again.
fn promote(
    ws: &mut ScopedWorkspace,
    rendered: RenderedOutputs,
    input: &Path,
) -> RecutResult<(PathBuf, Option<PathBuf>)> {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_owned());

    let video = ws.mark_final_as(rendered.video, format!("{stem}_recut.mp4"))?;
    let Some(audio) = rendered.audio else {
        return Ok((video, None));
    };
    match ws.mark_final_as(audio, format!("{stem}_recut.wav")) {
        Ok(audio) => Ok((video, Some(audio))),
        Err(e) => {
            if let Err(rm) = std::fs::remove_file(&video) {
                tracing::warn!(path = %video.display(), error = %rm, "failed to withdraw partial output");
            }
            Err(e)
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/orchestrator.rs"]
mod tests;
