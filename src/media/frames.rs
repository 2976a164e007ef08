use std::io::Read as _;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crate::foundation::error::{RecutError, RecutResult};
use crate::media::process;
use crate::recovery::StageInterrupt;
use crate::scene::{SignalPoint, SimilarityTracker};

/// One decoded, downscaled RGB frame.
#[derive(Clone, Debug, PartialEq)]
pub struct SampledFrame {
    /// Source time in seconds.
    pub time: f64,
    pub width: u32,
    pub height: u32,
    /// Packed `rgb24`.
    pub rgb: Vec<u8>,
}

/// Lazy stream of sampled frames.
pub type FrameStream = Box<dyn Iterator<Item = RecutResult<SampledFrame>> + Send>;

/// External frame-sampling collaborator.
pub trait FrameSource: Send + Sync {
    /// Sample `path` at `fps` frames per second. The returned stream is lazy and stops
    /// with an error once `interrupt` trips.
    fn frames(&self, path: &Path, fps: f64, interrupt: &StageInterrupt)
    -> RecutResult<FrameStream>;
}

/// Samples frames by decoding through `ffmpeg` into a pipe.
///
/// Decoder output is read on a background thread so a stalled decoder can still be killed
/// on interrupt or when `timeout` passes.
#[derive(Clone, Debug)]
pub struct FfmpegFrameSampler {
    program: PathBuf,
    width: u32,
    height: u32,
    timeout: Duration,
}

impl Default for FfmpegFrameSampler {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            width: 64,
            height: 36,
            timeout: Duration::from_secs(300),
        }
    }
}

impl FfmpegFrameSampler {
    /// Sampler producing `width`x`height` frames.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Hard wall-clock limit for the whole decode.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl FrameSource for FfmpegFrameSampler {
    fn frames(
        &self,
        path: &Path,
        fps: f64,
        interrupt: &StageInterrupt,
    ) -> RecutResult<FrameStream> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(RecutError::policy("sample fps must be > 0"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(RecutError::policy("sample frame size must be non-zero"));
        }
        interrupt.check()?;

        let started = Instant::now();
        let mut child = Command::new(&self.program)
            .args(["-v", "error", "-i"])
            .arg(path)
            .args([
                "-an",
                "-vf",
                &format!("fps={fps},scale={}:{}", self.width, self.height),
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| RecutError::stage(format!("failed to spawn frame decoder: {e}")))?;

        let Some(stdout) = child.stdout.take() else {
            process::kill(&mut child);
            return Err(RecutError::stage("failed to open decoder stdout (unexpected)"));
        };
        let frame_len = self.width as usize * self.height as usize * 3;
        let (tx, rx) = mpsc::sync_channel(FRAME_BUFFER);
        std::thread::spawn(move || read_frames(stdout, frame_len, &tx));

        Ok(Box::new(FfmpegFrames {
            child,
            frames: rx,
            width: self.width,
            height: self.height,
            fps,
            index: 0,
            interrupt: interrupt.clone(),
            started,
            timeout: self.timeout,
            done: false,
        }))
    }
}

/// Frames decoded ahead of the consumer.
const FRAME_BUFFER: usize = 8;

/// Push whole frames from `pipe` until EOF, a read error, or the consumer going away.
fn read_frames(
    mut pipe: ChildStdout,
    frame_len: usize,
    tx: &mpsc::SyncSender<std::io::Result<Vec<u8>>>,
) {
    loop {
        let mut rgb = vec![0u8; frame_len];
        let read = match pipe.read_exact(&mut rgb) {
            Ok(()) => Ok(rgb),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return,
            Err(e) => Err(e),
        };
        let failed = read.is_err();
        if tx.send(read).is_err() || failed {
            return;
        }
    }
}

struct FfmpegFrames {
    child: Child,
    frames: mpsc::Receiver<std::io::Result<Vec<u8>>>,
    width: u32,
    height: u32,
    fps: f64,
    index: u64,
    interrupt: StageInterrupt,
    started: Instant,
    timeout: Duration,
    done: bool,
}

impl FfmpegFrames {
    fn fail(&mut self, e: RecutError) -> Option<RecutResult<SampledFrame>> {
        self.done = true;
        process::kill(&mut self.child);
        tracing::warn!(error = %e, "frame decoder stopped early");
        Some(Err(e))
    }

    /// Stdout hit EOF; collect the exit status under the remaining time budget.
    fn finish(&mut self) -> Option<RecutResult<SampledFrame>> {
        self.done = true;
        let interrupt = self.interrupt.clone();
        match process::supervise(
            &mut self.child,
            "frame decoder",
            self.started,
            self.timeout,
            || interrupt.check(),
        ) {
            Ok(status) if status.success() => None,
            Ok(status) => Some(Err(RecutError::stage(format!(
                "frame decoder exited with {status}"
            )))),
            Err(e) => Some(Err(e)),
        }
    }
}

impl Iterator for FfmpegFrames {
    type Item = RecutResult<SampledFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let rgb = loop {
            if let Err(e) = self.interrupt.check() {
                return self.fail(e);
            }
            if self.started.elapsed() >= self.timeout {
                return self.fail(RecutError::stage(format!(
                    "frame decoder timed out after {}s",
                    self.timeout.as_secs_f64()
                )));
            }
            match self.frames.recv_timeout(process::POLL_INTERVAL) {
                Ok(Ok(rgb)) => break rgb,
                Ok(Err(e)) => return self.fail(e.into()),
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => return self.finish(),
            }
        };

        let time = self.index as f64 / self.fps;
        self.index += 1;
        Some(Ok(SampledFrame {
            time,
            width: self.width,
            height: self.height,
            rgb,
        }))
    }
}

impl Drop for FfmpegFrames {
    fn drop(&mut self) {
        if !self.done {
            process::kill(&mut self.child);
        }
    }
}

/// Lazily turn sampled frames into a similarity signal between consecutive frames.
pub fn similarity_signal<I>(frames: I) -> impl Iterator<Item = RecutResult<SignalPoint>>
where
    I: IntoIterator<Item = RecutResult<SampledFrame>>,
{
    let mut tracker = SimilarityTracker::new();
    frames.into_iter().filter_map(move |frame| match frame {
        Ok(f) => tracker.push_frame(f.time, &f.rgb).map(Ok),
        Err(e) => Some(Err(e)),
    })
}

#[cfg(test)]
#[path = "../../tests/unit/media/frames.rs"]
mod tests;
