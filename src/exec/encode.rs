//! Pure builders for transcoder arguments.

use std::path::Path;

use crate::foundation::error::{RecutError, RecutResult};
use crate::recovery::DegradeProfile;

/// Zoom towards the centre, capped at 1.5x.
pub const ZOOMPAN_FILTER: &str =
    "zoompan=z='min(zoom+0.0015,1.5)':d=1:x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)'";

/// Software encoder presets from slowest to fastest.
const X264_PRESETS: [&str; 5] = ["slow", "medium", "fast", "veryfast", "ultrafast"];

/// Output heights used by successive quality steps.
const STEP_HEIGHTS: [u32; 3] = [720, 540, 360];

/// Encoding quality chosen by the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityPreset {
    Draft,
    #[default]
    Standard,
    High,
}

impl QualityPreset {
    fn base_crf(self) -> u8 {
        match self {
            QualityPreset::Draft => 28,
            QualityPreset::Standard => 23,
            QualityPreset::High => 18,
        }
    }

    fn base_preset(self) -> usize {
        match self {
            QualityPreset::Draft => 3,
            QualityPreset::Standard => 2,
            QualityPreset::High => 0,
        }
    }
}

/// Colour grading looks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorPreset {
    #[default]
    Cinematic,
    Vibrant,
    Dramatic,
    Natural,
    Mono,
}

impl ColorPreset {
    /// Video filter implementing the look; `None` for an untouched image.
    pub fn filter(self) -> Option<&'static str> {
        match self {
            ColorPreset::Cinematic => {
                Some("colorchannelmixer=0.3:0.7:0.1:0:0.2:0.8:0:0:0.1:0.9:0:0:0:0:1")
            }
            ColorPreset::Vibrant => Some("eq=contrast=1.1:brightness=0:saturation=1.3"),
            ColorPreset::Dramatic => {
                Some("colorchannelmixer=0.4:0.6:0:0:0.3:0.7:0:0:0.2:0.8:0:0:0:0:1")
            }
            ColorPreset::Natural => None,
            ColorPreset::Mono => Some("hue=s=0"),
        }
    }
}

/// A rectangle to blur, in source pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BlurRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_blur_strength")]
    pub strength: u32,
}

fn default_blur_strength() -> u32 {
    10
}

impl BlurRegion {
    pub fn validate(&self) -> RecutResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RecutError::policy("blur region width/height must be non-zero"));
        }
        if self.strength == 0 {
            return Err(RecutError::policy("blur strength must be non-zero"));
        }
        Ok(())
    }
}

/// Caller-level rendering choices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderOptions {
    pub quality: QualityPreset,
    pub hardware_acceleration: bool,
    /// Encoder used when hardware acceleration is active.
    pub hardware_encoder: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            quality: QualityPreset::Standard,
            hardware_acceleration: false,
            hardware_encoder: "h264_nvenc".to_owned(),
        }
    }
}

impl RenderOptions {
    fn use_hardware(&self, profile: &DegradeProfile) -> bool {
        self.hardware_acceleration && !profile.software_only
    }
}

/// Options placed before `-i` for decoding.
pub fn decode_args(opts: &RenderOptions, profile: &DegradeProfile) -> Vec<String> {
    if opts.use_hardware(profile) {
        vec!["-hwaccel".into(), "auto".into()]
    } else {
        Vec::new()
    }
}

/// Video codec options for one encode.
pub fn video_encode_args(opts: &RenderOptions, profile: &DegradeProfile) -> Vec<String> {
    let step = profile.quality_step;
    let crf = opts
        .quality
        .base_crf()
        .saturating_add(step.saturating_mul(4))
        .min(51)
        .to_string();
    if opts.use_hardware(profile) {
        return vec![
            "-c:v".into(),
            opts.hardware_encoder.clone(),
            "-cq".into(),
            crf,
            "-pix_fmt".into(),
            "yuv420p".into(),
        ];
    }
    let preset_idx = (opts.quality.base_preset() + usize::from(step)).min(X264_PRESETS.len() - 1);
    let mut args: Vec<String> = vec![
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        X264_PRESETS[preset_idx].into(),
        "-crf".into(),
        crf,
        "-pix_fmt".into(),
        "yuv420p".into(),
    ];
    if profile.software_only {
        args.extend(["-profile:v".into(), "baseline".into()]);
    }
    args
}

/// Downscale filter for degraded quality steps; never upscales.
pub fn scale_filter(profile: &DegradeProfile) -> Option<String> {
    let step = usize::from(profile.quality_step);
    (step > 0).then(|| {
        let h = STEP_HEIGHTS[(step - 1).min(STEP_HEIGHTS.len() - 1)];
        format!("scale=-2:'min(ih,{h})'")
    })
}

/// Audio codec options for one encode.
pub fn audio_encode_args(profile: &DegradeProfile) -> Vec<String> {
    let bitrate = if profile.quality_step >= 2 { "128k" } else { "192k" };
    vec!["-c:a".into(), "aac".into(), "-b:a".into(), bitrate.into()]
}

/// Output options for a PCM WAV extract.
pub fn wav_extract_args() -> Vec<String> {
    ["-vn", "-acodec", "pcm_s16le", "-ar", "44100", "-ac", "2"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// `silenceremove` filter cutting leading silence below `threshold_db`.
pub fn silence_filter(threshold_db: f64) -> String {
    format!("silenceremove=start_periods=1:start_threshold={threshold_db}dB")
}

/// Join optional video filters into one chain.
pub fn join_filters<'a>(filters: impl IntoIterator<Item = Option<&'a str>>) -> Option<String> {
    let parts: Vec<&str> = filters
        .into_iter()
        .flatten()
        .filter(|f| !f.is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join(","))
}

/// `filter_complex` graph blurring each region in turn, and the label of its output.
///
/// Each region is split off, cropped, blurred and overlaid back at its position.
pub fn blur_filter_graph(regions: &[BlurRegion]) -> Option<(String, String)> {
    if regions.is_empty() {
        return None;
    }
    let mut graph = String::new();
    let mut input = "[0:v]".to_owned();
    for (i, r) in regions.iter().enumerate() {
        if i > 0 {
            graph.push(';');
        }
        let out = format!("[v{}]", i + 1);
        graph.push_str(&format!(
            "{input}split[m{i}][b{i}];[b{i}]crop={w}:{h}:{x}:{y},boxblur={s}:1[r{i}];[m{i}][r{i}]overlay={x}:{y}{out}",
            w = r.width,
            h = r.height,
            x = r.x,
            y = r.y,
            s = r.strength,
        ));
        input = out;
    }
    Some((graph, input))
}

/// Contents of a concat-demuxer list file.
pub fn concat_list<P: AsRef<Path>>(paths: &[P]) -> String {
    paths
        .iter()
        .map(|p| {
            let s = p.as_ref().to_string_lossy().replace('\'', r"'\''");
            format!("file '{s}'\n")
        })
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/exec/encode.rs"]
mod tests;
