//! External media collaborators: the transcoder, the metadata probe, and the frame sampler.
//!
//! The default implementations shell out to the system `ffmpeg`/`ffprobe` binaries.

pub mod frames;
pub mod probe;
pub(crate) mod process;
pub mod transcoder;

pub use frames::{FfmpegFrameSampler, FrameSource, FrameStream, SampledFrame, similarity_signal};
pub use probe::{FfprobeProbe, MediaInfo, MediaProbe};
pub use transcoder::{FfmpegTranscoder, TranscodeOutcome, TranscodeRequest, Transcoder};

/// True if `ffmpeg -version` runs successfully.
pub fn is_ffmpeg_on_path() -> bool {
    tool_runs("ffmpeg")
}

/// True if `ffprobe -version` runs successfully.
pub fn is_ffprobe_on_path() -> bool {
    tool_runs("ffprobe")
}

fn tool_runs(program: &str) -> bool {
    std::process::Command::new(program)
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
