use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "recut", version)]
struct Cli {
    /// Engine configuration JSON (workspace, timeouts, retry, monitor thresholds).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full transformation pipeline (requires `ffmpeg`/`ffprobe` on PATH).
    Run(RunArgs),
    /// Print media metadata as JSON.
    Probe(ProbeArgs),
    /// Print scenes, cuts and zigzag order as JSON without rendering.
    Plan(PlanArgs),
    /// Remove workspace roots left behind by crashed runs.
    Sweep,
    /// Print one classified resource snapshot as JSON.
    Monitor,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Input video.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Directory for the final video and audio.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    #[command(flatten)]
    common: SettingsArgs,

    /// Trim start in seconds.
    #[arg(long)]
    trim_in: Option<f64>,

    /// Trim end in seconds.
    #[arg(long)]
    trim_out: Option<f64>,

    #[arg(long, value_enum)]
    color: Option<ColorArg>,

    #[arg(long, value_enum)]
    quality: Option<QualityArg>,

    /// Use hardware decoding/encoding when available.
    #[arg(long)]
    hw: bool,

    /// Add a slow zoom/pan.
    #[arg(long)]
    panning: bool,
}

#[derive(Parser, Debug)]
struct ProbeArgs {
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct PlanArgs {
    #[arg(long = "in")]
    in_path: PathBuf,

    #[command(flatten)]
    common: SettingsArgs,
}

#[derive(clap::Args, Debug)]
struct SettingsArgs {
    /// Run settings JSON; flags override individual fields.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Cut sampling seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Scene boundary sensitivity in (0, 1).
    #[arg(long)]
    sensitivity: Option<f64>,

    /// How a zigzag tail shorter than one block is ordered.
    #[arg(long, value_enum)]
    tail: Option<TailArg>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ColorArg {
    Cinematic,
    Vibrant,
    Dramatic,
    Natural,
    Mono,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum QualityArg {
    Draft,
    Standard,
    High,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TailArg {
    Truncate,
    Identity,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    match cli.cmd {
        Command::Run(args) => cmd_run(config, args),
        Command::Probe(args) => cmd_probe(args),
        Command::Plan(args) => cmd_plan(config, args),
        Command::Sweep => cmd_sweep(config),
        Command::Monitor => cmd_monitor(config),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<recut::EngineConfig> {
    let config = match path {
        Some(p) => recut::EngineConfig::from_path(p)
            .with_context(|| format!("load engine config '{}'", p.display()))?,
        None => recut::EngineConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn load_settings(args: &SettingsArgs) -> anyhow::Result<recut::Settings> {
    let mut settings = match &args.settings {
        Some(p) => recut::Settings::from_path(p)
            .with_context(|| format!("load settings '{}'", p.display()))?,
        None => recut::Settings::default(),
    };
    if args.seed.is_some() {
        settings.seed = args.seed;
    }
    if let Some(s) = args.sensitivity {
        settings.scene_sensitivity = s;
    }
    if let Some(t) = args.tail {
        settings.zigzag_tail = match t {
            TailArg::Truncate => recut::ZigzagTail::Truncate,
            TailArg::Identity => recut::ZigzagTail::Identity,
        };
    }
    Ok(settings)
}

fn require_tools() -> anyhow::Result<()> {
    if !recut::media::is_ffmpeg_on_path() || !recut::media::is_ffprobe_on_path() {
        anyhow::bail!("ffmpeg and ffprobe are required but were not found on PATH");
    }
    Ok(())
}

fn cmd_run(config: recut::EngineConfig, args: RunArgs) -> anyhow::Result<()> {
    require_tools()?;
    let mut settings = load_settings(&args.common)?;
    if let Some(dir) = args.out_dir {
        settings.output_dir = dir;
    }
    if args.trim_in.is_some() {
        settings.trim_in = args.trim_in;
    }
    if args.trim_out.is_some() {
        settings.trim_out = args.trim_out;
    }
    if let Some(c) = args.color {
        settings.color_preset = match c {
            ColorArg::Cinematic => recut::ColorPreset::Cinematic,
            ColorArg::Vibrant => recut::ColorPreset::Vibrant,
            ColorArg::Dramatic => recut::ColorPreset::Dramatic,
            ColorArg::Natural => recut::ColorPreset::Natural,
            ColorArg::Mono => recut::ColorPreset::Mono,
        };
    }
    if let Some(q) = args.quality {
        settings.quality_preset = match q {
            QualityArg::Draft => recut::QualityPreset::Draft,
            QualityArg::Standard => recut::QualityPreset::Standard,
            QualityArg::High => recut::QualityPreset::High,
        };
    }
    settings.hardware_acceleration |= args.hw;
    settings.panning |= args.panning;

    let monitor = recut::ResourceMonitor::spawn(
        recut::monitor::SysinfoProbe::new(
            &config.workspace.base_dir,
            config.monitor.disk_interval(),
        ),
        &config.monitor,
    )?;
    let pipeline = recut::Pipeline::with_ffmpeg(config, monitor.view())?;
    let progress = recut::ProgressHandle::new(monitor.view());
    let out = pipeline
        .run(&args.in_path, &settings, &recut::CancelToken::new(), &progress)
        .with_context(|| format!("recut '{}'", args.in_path.display()))?;

    eprintln!(
        "seed {}: {} scenes, {} cuts, {} recovery attempts",
        out.seed,
        out.scenes.len(),
        out.cuts.len(),
        out.attempts.len()
    );
    eprintln!("wrote {}", out.video.display());
    if let Some(audio) = &out.audio {
        eprintln!("wrote {}", audio.display());
    }
    Ok(())
}

fn cmd_probe(args: ProbeArgs) -> anyhow::Result<()> {
    use recut::MediaProbe as _;
    let info = recut::media::FfprobeProbe::default()
        .probe(&args.in_path)
        .with_context(|| format!("probe '{}'", args.in_path.display()))?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

fn cmd_plan(config: recut::EngineConfig, args: PlanArgs) -> anyhow::Result<()> {
    require_tools()?;
    let settings = load_settings(&args.common)?;
    let pipeline = recut::Pipeline::with_ffmpeg(config, recut::ResourceView::detached())?;
    let plan = pipeline
        .plan(&args.in_path, &settings, &recut::CancelToken::new())
        .with_context(|| format!("plan '{}'", args.in_path.display()))?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

fn cmd_sweep(config: recut::EngineConfig) -> anyhow::Result<()> {
    let ws = &config.workspace;
    let removed = recut::workspace::sweep_stale(
        &ws.base_dir,
        &ws.prefix,
        Duration::from_secs(ws.stale_grace_secs),
    )?;
    for root in &removed {
        eprintln!("removed {}", root.display());
    }
    eprintln!("swept {} stale workspace root(s)", removed.len());
    Ok(())
}

fn cmd_monitor(config: recut::EngineConfig) -> anyhow::Result<()> {
    let monitor = recut::ResourceMonitor::new(
        recut::monitor::SysinfoProbe::new(&config.workspace.base_dir, Duration::ZERO),
        &config.monitor,
    )?;
    // CPU usage is measured between two refreshes.
    monitor.tick();
    std::thread::sleep(Duration::from_millis(250));
    let status = monitor.tick();
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
