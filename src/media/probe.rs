use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::foundation::error::{RecutError, RecutResult};
use crate::media::process;

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(300);

/// Structured description of a media file.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    /// Seconds.
    pub duration: f64,
    /// Container format name(s) as reported, e.g. `mov,mp4,m4a,3gp,3g2,mj2`.
    pub container: String,
    /// Codec names of every stream, in stream order.
    pub codecs: Vec<String>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub width: u32,
    pub height: u32,
    /// Frames per second of the first video stream.
    pub frame_rate: f64,
    pub has_audio: bool,
    /// File size in bytes.
    pub size: u64,
    /// Overall bitrate in bits per second.
    pub bitrate: Option<u64>,
}

impl MediaInfo {
    pub fn has_video(&self) -> bool {
        self.video_codec.is_some()
    }
}

/// External media metadata probe.
pub trait MediaProbe: Send + Sync {
    fn probe(&self, path: &Path) -> RecutResult<MediaInfo>;
}

/// [`MediaProbe`] backed by the system `ffprobe`.
#[derive(Clone, Debug)]
pub struct FfprobeProbe {
    program: PathBuf,
    timeout: Duration,
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl FfprobeProbe {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Hard wall-clock limit for one probe; the process is killed when it passes.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl MediaProbe for FfprobeProbe {
    #[tracing::instrument(skip(self))]
    fn probe(&self, path: &Path) -> RecutResult<MediaInfo> {
        let started = Instant::now();
        let mut child = Command::new(&self.program)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_streams",
                "-show_format",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RecutError::stage(format!("failed to run ffprobe: {e}")))?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            process::kill(&mut child);
            return Err(RecutError::stage("failed to open ffprobe pipes (unexpected)"));
        };
        let (stdout, stderr) = (process::drain(stdout), process::drain(stderr));

        let status = process::supervise(&mut child, "ffprobe", started, self.timeout, || Ok(()))?;
        if !status.success() {
            return Err(RecutError::validation(format!(
                "ffprobe failed for '{}': {}",
                path.display(),
                process::drained_text(stderr)
            )));
        }
        let bytes = match stdout.join() {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(RecutError::stage("ffprobe output reader panicked")),
        };
        parse_ffprobe_json(&bytes)
    }
}

/// Parse `ffprobe -print_format json -show_streams -show_format` output.
pub fn parse_ffprobe_json(bytes: &[u8]) -> RecutResult<MediaInfo> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        codec_name: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
        avg_frame_rate: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        format_name: Option<String>,
        duration: Option<String>,
        size: Option<String>,
        bit_rate: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        #[serde(default)]
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let parsed: ProbeOut = serde_json::from_slice(bytes)
        .map_err(|e| RecutError::validation(format!("ffprobe json parse failed: {e}")))?;

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    let audio = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"));

    let frame_rate = video
        .and_then(|v| {
            [v.avg_frame_rate.as_deref(), v.r_frame_rate.as_deref()]
                .into_iter()
                .flatten()
                .filter_map(parse_ff_ratio)
                .find(|fps| *fps > 0.0)
        })
        .unwrap_or(0.0);

    let format = parsed.format.as_ref();
    let parse_u64 = |s: Option<&String>| s.and_then(|v| v.parse::<u64>().ok());

    Ok(MediaInfo {
        duration: format
            .and_then(|f| f.duration.as_ref())
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0),
        container: format
            .and_then(|f| f.format_name.clone())
            .unwrap_or_default(),
        codecs: parsed
            .streams
            .iter()
            .filter_map(|s| s.codec_name.clone())
            .collect(),
        video_codec: video.and_then(|v| v.codec_name.clone()),
        audio_codec: audio.and_then(|a| a.codec_name.clone()),
        width: video.and_then(|v| v.width).unwrap_or(0),
        height: video.and_then(|v| v.height).unwrap_or(0),
        frame_rate,
        has_audio: audio.is_some(),
        size: parse_u64(format.and_then(|f| f.size.as_ref())).unwrap_or(0),
        bitrate: parse_u64(format.and_then(|f| f.bit_rate.as_ref())),
    })
}

/// Parse an ffmpeg rational such as `30000/1001`.
fn parse_ff_ratio(s: &str) -> Option<f64> {
    let (num, den) = s.split_once('/')?;
    let num = num.trim().parse::<f64>().ok()?;
    let den = den.trim().parse::<f64>().ok()?;
    (den != 0.0).then(|| num / den)
}

#[cfg(test)]
#[path = "../../tests/unit/media/probe.rs"]
mod tests;
