use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use frame_studio::{
    config::Config,
    edits::EditPipeline,
    engine::{AnnotateOptions, EditorEngine},
    files,
    video::{AssemblyOptions, CompositionPlan, FreezePolicy, StitchSource},
};

#[derive(Parser)]
#[command(
    name = "frame-studio",
    version,
    about = "Extract, annotate, stitch and re-assemble video frames and images",
    long_about = "frame-studio turns videos into numbered frame sequences and back, stitches videos and images side by side, burns in subtitles, timers and frame info, and batch-edits image directories. Video work is done by ffmpeg."
)]
struct Cli {
    /// Configuration file (optional)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Replace existing output files instead of writing `<name>_<n>` copies
    #[arg(long, global = true)]
    overwrite: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode a video into `<target>_<fps>FPS/<prefix>_<index>.png`
    ExtractFrames {
        video: PathBuf,
        target: PathBuf,
        #[arg(long, default_value = "")]
        prefix: String,
    },

    /// Encode a directory of PNG frames into an MP4
    Assemble {
        frames_dir: PathBuf,
        target_dir: PathBuf,
        /// Output frame rate (default: directory suffix, then config)
        #[arg(long)]
        fps: Option<f64>,
        /// Frame indices to hold, comma separated
        #[arg(long, value_delimiter = ',')]
        freeze: Vec<usize>,
        /// Hold the last frame
        #[arg(long)]
        freeze_last: bool,
        /// Length of each hold (default: video.freeze_seconds)
        #[arg(long)]
        freeze_seconds: Option<f64>,
        /// Burn each frame's file name in as a subtitle
        #[arg(long)]
        subtitles: bool,
        /// Output file name without extension
        #[arg(long)]
        name: Option<String>,
    },

    /// Compose videos side by side, left to right
    StitchVideos {
        #[arg(required = true, num_args = 1..)]
        videos: Vec<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
        /// Subtitle per video, in order
        #[arg(long = "subtitle")]
        subtitles: Vec<String>,
        /// Use each file name as its subtitle
        #[arg(long, conflicts_with = "subtitles")]
        subtitles_from_names: bool,
        /// Slow-motion factor (1 = real time)
        #[arg(long, default_value_t = 1.0)]
        slow: f64,
        /// Seconds to hold the last frame of every video
        #[arg(long, default_value_t = 0.0)]
        freeze: f64,
        /// Overlay an elapsed-time counter on each video
        #[arg(long)]
        timers: bool,
        /// Drop all audio
        #[arg(long)]
        no_audio: bool,
    },

    /// Stitch every image of a directory into one PNG
    StitchImages {
        source_dir: PathBuf,
        output: PathBuf,
        #[arg(long)]
        subtitles: bool,
    },

    /// Stitch two frame directories pairwise
    ComposePairs {
        left_dir: PathBuf,
        right_dir: PathBuf,
        target_dir: PathBuf,
        #[arg(long)]
        subtitles: bool,
    },

    /// Apply edits to every image of a directory
    EditImages {
        source_dir: PathBuf,
        target_dir: PathBuf,
        /// `name` or `name:key=value,...`; repeat to chain edits
        #[arg(short, long = "edit", required = true)]
        edits: Vec<String>,
    },

    /// Copy PNG frames to `<index:08>.png` in name order
    RenameFrames {
        source_dir: PathBuf,
        target_dir: PathBuf,
    },

    /// Write a frame-info box onto every frame
    AnnotateFrames {
        source_dir: PathBuf,
        target_dir: PathBuf,
        /// JSON keyframe titles
        #[arg(long)]
        keyframes: Option<PathBuf>,
        #[arg(long)]
        fps: Option<f64>,
        /// Resize output frames, e.g. 1280x720
        #[arg(long, value_parser = parse_size)]
        resize: Option<(u32, u32)>,
    },

    /// Extract a video and annotate its frames in one go
    ExtractAnnotated {
        video: PathBuf,
        target_dir: PathBuf,
        #[arg(long)]
        keyframes: Option<PathBuf>,
        #[arg(long, value_parser = parse_size)]
        resize: Option<(u32, u32)>,
    },

    /// Re-encode a video at another frame rate
    ConvertFps {
        video: PathBuf,
        fps: f64,
        /// Move the original into the trash directory afterwards
        #[arg(long)]
        trash_original: bool,
    },

    /// Render text as a QR code PNG
    Qr {
        content: String,
        output: PathBuf,
        /// Pixels per QR module
        #[arg(long, default_value_t = 10)]
        module_size: u32,
    },

    /// Print A4 product label sheets from a JSON product list
    Labels {
        products: PathBuf,
        target_dir: PathBuf,
        #[arg(long, default_value = "labels")]
        name: String,
    },
}

fn parse_size(value: &str) -> std::result::Result<(u32, u32), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {}", value))?;
    let parse = |s: &str| s.trim().parse::<u32>().ok().filter(|v| *v > 0);
    match (parse(w), parse(h)) {
        (Some(w), Some(h)) => Ok((w, h)),
        _ => Err(format!("expected positive WIDTHxHEIGHT, got {}", value)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();

    info!("Starting frame-studio v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => Config::default(),
    };
    let freeze_seconds = config.video.freeze_seconds;

    let engine = match EditorEngine::new(config) {
        Ok(engine) => engine.with_overwrite(cli.overwrite),
        Err(e) => bail!(e.user_message()),
    };

    if let Err(e) = run(&engine, cli.command, freeze_seconds).await {
        if e.is_recoverable() {
            tracing::warn!("This failure may be transient; re-running the command can help");
        }
        bail!(e.user_message());
    }
    Ok(())
}

async fn run(engine: &EditorEngine, command: Command, freeze_seconds: f64) -> frame_studio::Result<()> {
    match command {
        Command::ExtractFrames { video, target, prefix } => {
            let report = engine.extract_frames(&video, &target, &prefix).await?;
            println!("{}", report.directory.display());
        }

        Command::Assemble {
            frames_dir,
            target_dir,
            fps,
            freeze,
            freeze_last,
            freeze_seconds: seconds,
            subtitles,
            name,
        } => {
            let options = AssemblyOptions {
                fps,
                freeze: FreezePolicy::new(freeze, freeze_last, seconds.unwrap_or(freeze_seconds)),
                subtitles,
                output_name: name,
            };
            let encoded = engine.assemble_video(&frames_dir, &target_dir, options).await?;
            println!("{}", encoded.path.display());
        }

        Command::StitchVideos {
            videos,
            output,
            subtitles,
            subtitles_from_names,
            slow,
            freeze,
            timers,
            no_audio,
        } => {
            let sources = videos
                .into_iter()
                .enumerate()
                .map(|(i, path)| {
                    let subtitle = if subtitles_from_names {
                        Some(files::file_stem_string(&path))
                    } else {
                        subtitles.get(i).cloned()
                    };
                    match subtitle {
                        Some(text) => StitchSource::with_subtitle(path, text),
                        None => StitchSource::new(path),
                    }
                })
                .collect();
            let plan = CompositionPlan::new(sources)
                .with_slow_factor(slow)
                .with_freeze(freeze)
                .with_timers(timers)
                .without_audio(no_audio);
            let encoded = engine.stitch_videos(&plan, &output).await?;
            println!("{}", encoded.path.display());
        }

        Command::StitchImages {
            source_dir,
            output,
            subtitles,
        } => {
            let written = engine.stitch_images(&source_dir, &output, subtitles).await?;
            println!("{}", written.display());
        }

        Command::ComposePairs {
            left_dir,
            right_dir,
            target_dir,
            subtitles,
        } => {
            let count = engine.compose_pairs(&left_dir, &right_dir, &target_dir, subtitles).await?;
            info!("Composed {} frames into {:?}", count, target_dir);
        }

        Command::EditImages {
            source_dir,
            target_dir,
            edits,
        } => {
            let pipeline = EditPipeline::parse(edits.as_slice())?;
            let report = engine.edit_images(&source_dir, &target_dir, &pipeline).await?;
            for (path, reason) in &report.failures {
                eprintln!("{}: {}", path.display(), reason);
            }
            info!(
                "Edited {} images, {} failed",
                report.processed.len(),
                report.failures.len()
            );
        }

        Command::RenameFrames { source_dir, target_dir } => {
            let count = engine.rename_frames(&source_dir, &target_dir).await?;
            info!("Renamed {} frames into {:?}", count, target_dir);
        }

        Command::AnnotateFrames {
            source_dir,
            target_dir,
            keyframes,
            fps,
            resize,
        } => {
            let options = AnnotateOptions { keyframes, fps, resize };
            let count = engine.annotate_frames(&source_dir, &target_dir, options).await?;
            info!("Annotated {} frames into {:?}", count, target_dir);
        }

        Command::ExtractAnnotated {
            video,
            target_dir,
            keyframes,
            resize,
        } => {
            let options = AnnotateOptions {
                keyframes,
                fps: None,
                resize,
            };
            let count = engine.extract_annotated(&video, &target_dir, options).await?;
            info!("Annotated {} frames into {:?}", count, target_dir);
        }

        Command::ConvertFps {
            video,
            fps,
            trash_original,
        } => {
            let output = engine.convert_fps(&video, fps, trash_original).await?;
            println!("{}", output.display());
        }

        Command::Qr {
            content,
            output,
            module_size,
        } => {
            let written = engine.qr(&content, &output, module_size).await?;
            println!("{}", written.display());
        }

        Command::Labels {
            products,
            target_dir,
            name,
        } => {
            for sheet in engine.labels(&products, &target_dir, &name).await? {
                println!("{}", sheet.display());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1280x720"), Ok((1280, 720)));
        assert_eq!(parse_size("64X48"), Ok((64, 48)));
        assert!(parse_size("1280").is_err());
        assert!(parse_size("0x10").is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
