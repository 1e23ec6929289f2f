use std::{
    cell::{Cell, RefCell},
    path::{Path, PathBuf},
    rc::Rc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Ticks without a single composited frame before `play` gives up.
const MAX_IDLE_TICKS: u32 = 600;

#[derive(Parser, Debug)]
#[command(name = "alphavid", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play a stream headless and write every composited frame as a PNG.
    Play(PlayArgs),
    /// Print the dimensions, frame count and duration of a stream.
    Probe(ProbeArgs),
}

#[derive(Parser, Debug)]
struct PlayArgs {
    /// Source: a video file (needs the `media-ffmpeg` feature) or a directory of PNG/JPEG frames.
    #[arg(long = "in")]
    in_path: Option<String>,

    /// Visible output width. Source frames are twice as wide.
    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Directory for `frame_00000.png`, `frame_00001.png`, ...
    #[arg(long)]
    out_dir: PathBuf,

    #[arg(long)]
    loop_playback: bool,

    /// Read the whole source into memory before decoding.
    #[arg(long)]
    use_blob: bool,

    #[arg(long, value_enum)]
    backend: Option<BackendChoice>,

    /// Device pixel ratio applied to the output surface.
    #[arg(long)]
    dpr: Option<f64>,

    /// Display refresh rate, also used as the frame rate of image sequences.
    #[arg(long, default_value_t = 30.0)]
    fps: f64,

    /// Stop after writing this many frames.
    #[arg(long)]
    max_frames: Option<u64>,

    /// JSON player config. Flags given on the command line override it.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ProbeArgs {
    #[arg(long = "in")]
    in_path: String,

    /// Frame rate assumed for image sequences.
    #[arg(long, default_value_t = 30.0)]
    fps: f64,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendChoice {
    Cpu,
    #[cfg(feature = "gpu")]
    Gpu,
}

impl From<BackendChoice> for alphavid::BackendKind {
    fn from(c: BackendChoice) -> Self {
        match c {
            BackendChoice::Cpu => alphavid::BackendKind::Cpu,
            #[cfg(feature = "gpu")]
            BackendChoice::Gpu => alphavid::BackendKind::Gpu,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Play(args) => cmd_play(args),
        Command::Probe(args) => cmd_probe(args),
    }
}

fn fps_from_f64(fps: f64) -> anyhow::Result<alphavid::Fps> {
    if !(fps.is_finite() && fps > 0.0) {
        anyhow::bail!("--fps must be finite and > 0, got {fps}");
    }
    // Three decimals covers 29.97 and friends.
    let num = (fps * 1000.0).round() as u32;
    Ok(alphavid::Fps::new(num, 1000)?)
}

fn resolve_config(
    args: &PlayArgs,
    sequence_fps: alphavid::Fps,
) -> anyhow::Result<alphavid::PlayerConfig> {
    let mut cfg = match &args.config {
        Some(path) => alphavid::PlayerConfig::from_json_file(path)
            .with_context(|| format!("load config '{}'", path.display()))?,
        None => {
            let src = args
                .in_path
                .clone()
                .context("--in is required without --config")?;
            let width = args.width.context("--width is required without --config")?;
            let height = args.height.context("--height is required without --config")?;
            let mut cfg = alphavid::PlayerConfig::new(src, width, height);
            cfg.sequence_fps = sequence_fps;
            cfg
        }
    };

    if let Some(src) = &args.in_path {
        cfg.src = src.clone();
    }
    if let Some(w) = args.width {
        cfg.width = w;
    }
    if let Some(h) = args.height {
        cfg.height = h;
    }
    if let Some(dpr) = args.dpr {
        cfg.device_pixel_ratio = dpr;
    }
    if let Some(b) = args.backend {
        cfg.backend = b.into();
    }
    cfg.loop_playback |= args.loop_playback;
    cfg.use_blob |= args.use_blob;
    cfg.autoplay = true;
    cfg.validate()?;
    Ok(cfg)
}

fn cmd_play(args: PlayArgs) -> anyhow::Result<()> {
    let tick_fps = fps_from_f64(args.fps)?;
    let cfg = resolve_config(&args, tick_fps)?;
    if cfg.loop_playback && args.max_frames.is_none() {
        anyhow::bail!("--max-frames is required with --loop-playback");
    }

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create output dir '{}'", args.out_dir.display()))?;

    let ended = Rc::new(Cell::new(false));
    let failure: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));

    let decoder = alphavid::AutoDecoder::new(cfg.sequence_fps);
    let container = alphavid::Container::new();
    let opts = cfg
        .into_options(container)
        .decoder(decoder)
        .on_end({
            let ended = ended.clone();
            move || ended.set(true)
        })
        .on_error({
            let failure = failure.clone();
            move |err: &alphavid::MediaError| *failure.borrow_mut() = Some(err.to_string())
        });

    let mut player = alphavid::AlphaVideoPlayer::new(opts)?;
    if !player.compositor().is_enabled() {
        anyhow::bail!("no usable rendering context for the requested backend");
    }

    let dt = tick_fps.frame_duration();
    let mut written: u64 = 0;
    let mut last_draws = 0;
    let mut idle_ticks = 0u32;

    loop {
        player.pump(dt);

        if let Some(msg) = failure.borrow_mut().take() {
            anyhow::bail!("playback failed: {msg}");
        }

        let draws = player.compositor().stats().draws;
        if draws != last_draws {
            last_draws = draws;
            idle_ticks = 0;
            let frame = player
                .read_pixels()
                .context("compositor returned no pixels")?;
            let path = args.out_dir.join(format!("frame_{written:05}.png"));
            frame.save_png(&path)?;
            written += 1;
        } else {
            idle_ticks += 1;
            if idle_ticks > MAX_IDLE_TICKS {
                anyhow::bail!("no frame composited after {MAX_IDLE_TICKS} ticks");
            }
        }

        if ended.get() || args.max_frames.is_some_and(|max| written >= max) {
            break;
        }
    }

    player.dispose();
    eprintln!("wrote {written} frames to {}", args.out_dir.display());
    Ok(())
}

fn cmd_probe(args: ProbeArgs) -> anyhow::Result<()> {
    use alphavid::FrameDecoder as _;

    let fps = fps_from_f64(args.fps)?;
    let resource = alphavid::MediaResource::Url(args.in_path.clone());
    let is_dir = Path::new(&args.in_path).is_dir();

    if !is_dir && alphavid::FfmpegDecoder::is_available() {
        let info = alphavid::FfmpegDecoder::new()
            .probe(&resource)
            .with_context(|| format!("probe '{}'", args.in_path))?;
        println!("source: {}x{}", info.width, info.height);
        println!("output: {}x{}", info.width / 2, info.height);
        println!("fps: {}/{}", info.fps_num, info.fps_den);
        println!("duration: {:.3}s", info.duration_sec);
        return Ok(());
    }

    let stream = alphavid::AutoDecoder::new(fps)
        .decode(&resource)
        .with_context(|| format!("decode '{}'", args.in_path))?;
    let size = stream.size();
    println!("source: {}x{}", size.width, size.height);
    println!("output: {}x{}", size.width / 2, size.height);
    println!("frames: {}", stream.frames.len());
    println!("duration: {:.3}s", stream.duration().as_secs_f64());
    Ok(())
}
