use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    thread,
    time::Duration,
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use playhead::{
    DownloadOptions, DownloadRequest, FfmpegToolkit, FrameExtractor, FrameOptions,
    HttpDownloader, ImageFormat, MediaToolkit, ProgressCallback, ProgressInfo, SessionManager,
    SessionOptions, ThumbnailHandle, ToolOptions, VideoDownloader,
};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  playhead download https://example.com/clip.mp4 clip.mp4 --progress\n  playhead metadata clip.mp4 --json\n  playhead frame clip.mp4 --at 00:01:15.5 --out frame.jpg\n  playhead frames clip.mp4 --every 10 --out frames --progress\n  playhead play clip.mp4 --seek 30 --tick-ms 100\n  playhead completions zsh > _playhead";

const PLAY_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Parser)]
#[command(
    name = "playhead",
    version,
    about = "Download videos, inspect them, extract frames, and simulate playback",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show debug logging.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar where supported.
    #[arg(long, global = true)]
    progress: bool,

    /// Allow overwriting existing output files.
    #[arg(long, global = true)]
    overwrite: bool,

    /// Path to the ffmpeg binary (defaults to $PLAYHEAD_FFMPEG or `ffmpeg`).
    #[arg(long, global = true)]
    ffmpeg: Option<PathBuf>,

    /// Path to the ffprobe binary (defaults to $PLAYHEAD_FFPROBE or `ffprobe`).
    #[arg(long, global = true)]
    ffprobe: Option<PathBuf>,

    /// Kill ffmpeg/ffprobe after this many seconds.
    #[arg(long, global = true)]
    tool_timeout: Option<u64>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Download a video over HTTP, resuming a partial file.
    Download {
        url: String,
        output: PathBuf,
        /// Start over instead of resuming an existing file.
        #[arg(long)]
        no_resume: bool,
    },
    /// Print probed metadata.
    Metadata {
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Extract one frame.
    Frame {
        input: PathBuf,
        /// Position as seconds, MM:SS, or HH:MM:SS(.mmm).
        #[arg(long, default_value = "0")]
        at: String,
        #[arg(long)]
        out: PathBuf,
        /// jpg, png, bmp, or webp. Defaults to the output extension.
        #[arg(long)]
        format: Option<String>,
        /// Quality from 1 (worst) to 100 (best).
        #[arg(long, default_value_t = 90)]
        quality: u8,
    },
    /// Extract one frame every N seconds.
    Frames {
        input: PathBuf,
        /// Seconds between frames.
        #[arg(long, default_value_t = 10.0)]
        every: f64,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value = "jpg")]
        format: String,
        #[arg(long, default_value_t = 90)]
        quality: u8,
    },
    /// Write a thumbnail taken at 10% of the duration.
    Thumbnail {
        input: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Write evenly spaced preview frames.
    Previews {
        input: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 5)]
        count: usize,
    },
    /// Write a thumbnail and five previews, then print a summary.
    Summary {
        input: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Check that a video can drive playback and extraction.
    Validate {
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Simulate playback and show the position until the end.
    Play {
        input: PathBuf,
        /// Start position as seconds, MM:SS, or HH:MM:SS(.mmm).
        #[arg(long)]
        seek: Option<String>,
        /// Wall-clock milliseconds per tick.
        #[arg(long, default_value_t = 1000)]
        tick_ms: u64,
        /// Simulated seconds per tick.
        #[arg(long, default_value_t = 1.0)]
        step: f64,
        /// Write the frame at the final position to this file.
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_timecode(value: &str) -> Result<f64, Box<dyn std::error::Error>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("time value cannot be empty".into());
    }

    if let Ok(seconds) = trimmed.parse::<f64>() {
        return Ok(seconds.max(0.0));
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [minutes, seconds] => (0_u64, minutes.parse::<u64>()?, seconds.parse::<f64>()?),
        [hours, minutes, seconds] => (
            hours.parse::<u64>()?,
            minutes.parse::<u64>()?,
            seconds.parse::<f64>()?,
        ),
        _ => return Err(format!("invalid time format: {trimmed}").into()),
    };

    let total = (hours as f64 * 3600.0) + (minutes as f64 * 60.0) + seconds;
    Ok(total.max(0.0))
}

fn parse_image_format(value: &str) -> Result<ImageFormat, Box<dyn std::error::Error>> {
    ImageFormat::from_extension(value).ok_or_else(|| format!("unsupported format: {value}").into())
}

fn frame_options(format: ImageFormat, quality: u8) -> FrameOptions {
    FrameOptions::new().with_format(format).with_quality(quality)
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        if overwrite {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("overwriting {}", path.display()).yellow()
            );
        } else {
            return Err(format!(
                "output already exists: {} (use --overwrite to replace)",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

fn init_logging(global: &GlobalOptions) {
    let level = if global.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn tool_options(global: &GlobalOptions) -> ToolOptions {
    let mut options = ToolOptions::from_env();
    if let Some(ffmpeg) = &global.ffmpeg {
        options = options.with_ffmpeg(ffmpeg);
    }
    if let Some(ffprobe) = &global.ffprobe {
        options = options.with_ffprobe(ffprobe);
    }
    if let Some(seconds) = global.tool_timeout {
        options = options.with_timeout(Duration::from_secs(seconds));
    }
    options
}

fn progress_bar(length: u64, template: &str) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let bar = ProgressBar::new(length);
    let style = ProgressStyle::with_template(template)?;
    bar.set_style(style.progress_chars("##-"));
    Ok(bar)
}

/// Mirrors library progress reports onto an indicatif bar.
struct BarProgress {
    bar: ProgressBar,
}

impl ProgressCallback for BarProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Some(total) = info.total {
            self.bar.set_length(total);
        }
        self.bar.set_position(info.current);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli.global);

    let toolkit: Arc<dyn MediaToolkit> = Arc::new(FfmpegToolkit::new(tool_options(&cli.global)));
    let extractor = FrameExtractor::new(Arc::clone(&toolkit));

    match cli.command {
        Commands::Download {
            url,
            output,
            no_resume,
        } => {
            let request = DownloadRequest::builder()
                .url(url)
                .destination(&output)
                .resume(!no_resume)
                .build()?;

            let mut options = DownloadOptions::new();
            let bar = if cli.global.progress {
                let bar = progress_bar(
                    0,
                    "{spinner:.green} {bar:40.cyan/blue} {bytes}/{total_bytes} {bytes_per_sec} {eta}",
                )?;
                options = options.with_progress(Arc::new(BarProgress { bar: bar.clone() }));
                Some(bar)
            } else {
                None
            };

            let bytes = HttpDownloader::new(options).download(&request)?;
            if let Some(bar) = bar {
                bar.finish_and_clear();
            }
            println!(
                "{} {}",
                "success:".green().bold(),
                format!("{} ({bytes} bytes) -> {}", request.url(), output.display()).green()
            );
        }
        Commands::Metadata { input, json } => {
            let metadata = toolkit.probe(&input)?;
            if json {
                let payload = json!({
                    "metadata": metadata,
                    "total_frames": metadata.total_frames(),
                    "resolution": metadata.resolution(),
                    "formatted_duration": metadata.formatted_duration(),
                    "formatted_file_size": metadata.formatted_file_size(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("File: {}", metadata.path.display());
                println!("Format: {}", metadata.format);
                println!(
                    "Duration: {} ({:.3}s)",
                    metadata.formatted_duration(),
                    metadata.duration_seconds
                );
                println!(
                    "Video: {} @ {:.2} fps, {} frames [{}]",
                    metadata.resolution(),
                    metadata.frame_rate,
                    metadata.total_frames(),
                    metadata.video_codec
                );
                match &metadata.audio_codec {
                    Some(codec) => println!("Audio: {codec}"),
                    None => println!("Audio: none"),
                }
                println!("Size: {}", metadata.formatted_file_size());
            }
        }
        Commands::Frame {
            input,
            at,
            out,
            format,
            quality,
        } => {
            ensure_writable_path(&out, cli.global.overwrite)?;
            let format = match format {
                Some(format) => parse_image_format(&format)?,
                None => out
                    .extension()
                    .and_then(|extension| extension.to_str())
                    .and_then(ImageFormat::from_extension)
                    .unwrap_or_default(),
            };
            let timestamp = parse_timecode(&at)?;
            let frame = extractor.frame_at_with_options(
                &input,
                timestamp,
                &out,
                &frame_options(format, quality),
            )?;
            println!(
                "{} {} (frame {} at {}, {}x{}, {})",
                "saved".green().bold(),
                frame.path.display(),
                frame.frame_number,
                frame.formatted_timestamp(),
                frame.width,
                frame.height,
                frame.formatted_file_size()
            );
        }
        Commands::Frames {
            input,
            every,
            out,
            format,
            quality,
        } => {
            if every <= 0.0 {
                return Err("--every must be greater than 0".into());
            }
            if out.exists() && !cli.global.overwrite {
                return Err(format!(
                    "output directory already exists: {} (use --overwrite)",
                    out.display()
                )
                .into());
            }
            let options = frame_options(parse_image_format(&format)?, quality);

            let frames = if cli.global.progress {
                let bar = progress_bar(0, "{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}")?;
                let frames = extractor.frames_at_intervals_with_progress(
                    &input,
                    every,
                    &out,
                    &options,
                    Arc::new(BarProgress { bar: bar.clone() }),
                )?;
                bar.finish_and_clear();
                frames
            } else {
                extractor.frames_at_intervals(&input, every, &out, &options)?
            };

            if cli.global.verbose {
                for frame in &frames {
                    eprintln!(
                        "saved frame {} -> {}",
                        frame.frame_number,
                        frame.path.display()
                    );
                }
            }
            println!(
                "{} {}",
                "success:".green().bold(),
                format!("Extracted {} frame(s) to {}", frames.len(), out.display()).green()
            );
        }
        Commands::Thumbnail { input, out } => {
            ensure_writable_path(&out, cli.global.overwrite)?;
            let metadata = extractor.probe(&input)?;
            let frame = ThumbnailHandle::thumbnail(&extractor, &metadata, &out)?;
            println!(
                "{} {} (at {})",
                "saved".green().bold(),
                frame.path.display(),
                frame.formatted_timestamp()
            );
        }
        Commands::Previews { input, out, count } => {
            fs::create_dir_all(&out)?;
            let metadata = extractor.probe(&input)?;
            let frames = ThumbnailHandle::previews(&extractor, &metadata, &out, count)?;
            for frame in &frames {
                println!(
                    "{} {} (at {})",
                    "saved".green().bold(),
                    frame.path.display(),
                    frame.formatted_timestamp()
                );
            }
        }
        Commands::Summary { input, out, json } => {
            let metadata = extractor.probe(&input)?;
            let summary = ThumbnailHandle::summary(&extractor, &metadata, &out)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{}", summary.summary_info());
                println!("{} {}", "saved".green().bold(), summary.thumbnail.path.display());
                for frame in &summary.preview_frames {
                    println!("{} {}", "saved".green().bold(), frame.path.display());
                }
            }
        }
        Commands::Validate { input, json } => {
            let report = toolkit.probe(&input)?.validate();
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{report}");
            }
            if !report.is_valid() {
                return Err(format!("{} failed validation", input.display()).into());
            }
        }
        Commands::Play {
            input,
            seek,
            tick_ms,
            step,
            snapshot,
        } => {
            let options = SessionOptions::new()
                .with_tick_interval(Duration::from_millis(tick_ms))
                .with_tick_step(step);
            let manager = SessionManager::new(
                Arc::clone(&toolkit),
                Arc::new(HttpDownloader::default()),
                options,
            )?;

            let started = manager.start_session(&input)?;
            let id = started.video_id().clone();
            if let Some(seek) = seek {
                manager.seek(&id, parse_timecode(&seek)?);
            }

            let bar = progress_bar(
                started.total_frames(),
                "{spinner:.green} {bar:40.cyan/blue} {msg} frame {pos}/{len}",
            )?;
            loop {
                let Some(current) = manager.progress(&id) else {
                    break;
                };
                bar.set_position(current.current_frame());
                bar.set_message(format!(
                    "{} / {}",
                    current.formatted_current_time(),
                    current.formatted_duration()
                ));
                if !current.is_playing() {
                    break;
                }
                thread::sleep(PLAY_POLL_INTERVAL);
            }
            bar.finish();

            if let Some(path) = snapshot {
                ensure_writable_path(&path, cli.global.overwrite)?;
                let frame = manager.extract_frame_at_current_position(&id, &path)?;
                println!("{} {}", "saved".green().bold(), frame.path.display());
            }

            if let Some(last) = manager.stop(&id) {
                println!(
                    "{} {}",
                    "success:".green().bold(),
                    format!(
                        "Played {} to {} ({:.1}%)",
                        input.display(),
                        last.formatted_current_time(),
                        last.progress_percentage()
                    )
                    .green()
                );
            }
            manager.shutdown();
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "playhead", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}
