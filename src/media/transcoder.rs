use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::foundation::error::{RecutError, RecutResult};
use crate::media::process;
use crate::recovery::StageInterrupt;

/// One transcoder invocation.
///
/// Rendered as `<program> -y -hide_banner -loglevel error <input_args> -i <input> <args> <output>`.
#[derive(Clone, Debug, PartialEq)]
pub struct TranscodeRequest {
    /// Options that must precede `-i` (seek, demuxer, hwaccel).
    pub input_args: Vec<OsString>,
    pub input: PathBuf,
    /// Output options (filters, codecs, maps).
    pub args: Vec<OsString>,
    pub output: PathBuf,
    /// Hard wall-clock limit.
    pub timeout: Duration,
}

impl TranscodeRequest {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            input_args: Vec::new(),
            input: input.into(),
            args: Vec::new(),
            output: output.into(),
            timeout,
        }
    }

    pub fn input_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.input_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Full argument vector, excluding the program name.
    pub fn command_line(&self) -> Vec<OsString> {
        let mut out: Vec<OsString> = ["-y", "-hide_banner", "-loglevel", "error"]
            .into_iter()
            .map(OsString::from)
            .collect();
        out.extend(self.input_args.iter().cloned());
        out.push("-i".into());
        out.push(self.input.clone().into_os_string());
        out.extend(self.args.iter().cloned());
        out.push(self.output.clone().into_os_string());
        out
    }

    /// Whether `flag` appears among the output options.
    pub fn has_arg(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }
}

/// What the transcoder reported.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscodeOutcome {
    /// Exit code; `None` if the process was killed by a signal.
    pub exit_code: Option<i32>,
    /// Captured diagnostic output (stderr).
    pub diagnostics: String,
}

impl TranscodeOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// External transcode engine.
///
/// Implementations must stop the in-flight invocation (not merely stop waiting) when
/// `interrupt` trips or the request times out.
pub trait Transcoder: Send + Sync {
    /// Run `req` to completion.
    ///
    /// Returns `Ok` with the reported status even when the engine failed; `Err` only for
    /// timeouts, interrupts, or failure to launch.
    fn run(&self, req: &TranscodeRequest, interrupt: &StageInterrupt)
    -> RecutResult<TranscodeOutcome>;
}

/// [`Transcoder`] backed by the system `ffmpeg`.
#[derive(Clone, Debug)]
pub struct FfmpegTranscoder {
    program: PathBuf,
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Transcoder for FfmpegTranscoder {
    fn run(
        &self,
        req: &TranscodeRequest,
        interrupt: &StageInterrupt,
    ) -> RecutResult<TranscodeOutcome> {
        interrupt.check()?;
        tracing::debug!(program = %self.program.display(), args = ?req.command_line(), "spawning transcoder");

        let started = Instant::now();
        let mut child = Command::new(&self.program)
            .args(req.command_line())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                RecutError::stage(format!(
                    "failed to spawn '{}' (is it installed and on PATH?): {e}",
                    self.program.display()
                ))
            })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RecutError::stage("failed to open transcoder stderr (unexpected)"))?;
        let stderr_drain = process::drain(stderr);

        // On error the drain thread is left to finish on its own once the pipe closes.
        let status =
            process::supervise(&mut child, "transcoder", started, req.timeout, || {
                interrupt.check()
            })?;
        let diagnostics = process::drained_text(stderr_drain);

        Ok(TranscodeOutcome {
            exit_code: status.code(),
            diagnostics,
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/transcoder.rs"]
mod tests;
