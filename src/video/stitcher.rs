//! # Side-by-Side Video Stitching
//!
//! Probes every source, computes a column layout and renders one filter graph
//! that scales, pads, stacks, captions and mixes the sources. The whole
//! composition is a single ffmpeg run.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::{Config, StitchConfig, VideoConfig};
use crate::error::{MediaError, Result};
use crate::files;
use crate::imaging::text::{best_fit, TextMeasure, TextPainter};
use crate::video::filter_graph::{number, Filter, FilterChain, FilterGraph};
use crate::video::tool::FfmpegTool;
use crate::video::types::{format_fps, rate_arg, EncodedVideo, VideoAsset};

/// One input column
#[derive(Debug, Clone, PartialEq)]
pub struct StitchSource {
    pub path: PathBuf,
    pub subtitle: Option<String>,
}

impl StitchSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            subtitle: None,
        }
    }

    pub fn with_subtitle<P: Into<PathBuf>, S: Into<String>>(path: P, subtitle: S) -> Self {
        Self {
            path: path.into(),
            subtitle: Some(subtitle.into()),
        }
    }

    /// The subtitle to draw; blank text leaves the column uncaptioned
    pub fn caption(&self) -> Option<&str> {
        self.subtitle.as_deref().filter(|text| !text.trim().is_empty())
    }
}

/// Everything one stitching run needs besides the configuration
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionPlan {
    /// Left to right
    pub sources: Vec<StitchSource>,

    /// Playback slow-down; 1.0 keeps the original speed
    pub slow_factor: f64,

    /// Seconds the final frame is held in the output
    pub freeze_seconds: f64,

    pub insert_timers: bool,

    pub remove_audio: bool,
}

impl CompositionPlan {
    pub fn new(sources: Vec<StitchSource>) -> Self {
        Self {
            sources,
            slow_factor: 1.0,
            freeze_seconds: 0.0,
            insert_timers: false,
            remove_audio: false,
        }
    }

    pub fn with_slow_factor(mut self, factor: f64) -> Self {
        self.slow_factor = factor;
        self
    }

    pub fn with_freeze(mut self, seconds: f64) -> Self {
        self.freeze_seconds = seconds;
        self
    }

    pub fn with_timers(mut self, insert_timers: bool) -> Self {
        self.insert_timers = insert_timers;
        self
    }

    pub fn without_audio(mut self, remove_audio: bool) -> Self {
        self.remove_audio = remove_audio;
        self
    }

    pub fn has_subtitles(&self) -> bool {
        self.sources.iter().any(|s| s.caption().is_some())
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |details: String| -> Result<()> {
            Err(MediaError::InvalidParameters { details }.into())
        };
        if self.sources.is_empty() {
            return invalid("no videos to stitch".to_string());
        }
        if !(self.slow_factor >= 1.0) {
            return invalid(format!("slow-motion factor must be at least 1, got {}", self.slow_factor));
        }
        if !(self.freeze_seconds >= 0.0) {
            return invalid(format!("freeze duration must not be negative, got {}", self.freeze_seconds));
        }
        Ok(())
    }
}

/// Column geometry and timing of a composition
#[derive(Debug, Clone, PartialEq)]
pub struct StitchLayout {
    /// Height of every column (the first source's height)
    pub height: u32,
    pub widths: Vec<u32>,
    /// x of each column's left edge
    pub offsets: Vec<u32>,
    pub padding: u32,
    /// Σ widths + (n - 1) × padding
    pub width: u32,
    /// Subtitle bar added below the columns (0 without subtitles)
    pub bar_height: u32,
    /// Common output frame rate
    pub fps: f64,
    /// Longest source plus the final hold, before slow motion
    pub duration: f64,
    /// Per-source duration
    pub durations: Vec<f64>,
}

fn round_even(value: f64) -> u32 {
    ((value / 2.0).round() as u32 * 2).max(2)
}

impl StitchLayout {
    pub fn compute(assets: &[VideoAsset], plan: &CompositionPlan, padding: u32, subtitle_fraction: f32) -> Result<Self> {
        let first = assets.first().ok_or_else(|| MediaError::InvalidParameters {
            details: "no videos to stitch".to_string(),
        })?;
        let height = first.height;

        let widths: Vec<u32> = assets
            .iter()
            .map(|asset| {
                if asset.height == height {
                    asset.width
                } else {
                    round_even(asset.width as f64 * height as f64 / asset.height as f64)
                }
            })
            .collect();

        let mut offsets = Vec::with_capacity(widths.len());
        let mut x = 0;
        for width in &widths {
            offsets.push(x);
            x += width + padding;
        }
        let width = x - padding;

        let bar_height = if plan.has_subtitles() {
            round_even(height as f64 * subtitle_fraction as f64)
        } else {
            0
        };

        let fps = assets.iter().map(|a| a.fps).fold(f64::INFINITY, f64::min);
        let longest = assets.iter().map(|a| a.duration).fold(0.0, f64::max);
        let duration = longest + plan.freeze_seconds / plan.slow_factor;

        Ok(Self {
            height,
            widths,
            offsets,
            padding,
            width,
            bar_height,
            fps,
            duration,
            durations: assets.iter().map(|a| a.duration).collect(),
        })
    }

    /// Frame size actually encoded (yuv420p needs even dimensions)
    pub fn output_size(&self) -> (u32, u32) {
        let even = |v: u32| v + v % 2;
        (even(self.width), even(self.height + self.bar_height))
    }
}

/// One font size for every subtitle: the smallest best-fit size over all
/// columns, so no caption outgrows its column.
pub fn shared_subtitle_size<M: TextMeasure + ?Sized>(
    measure: &M,
    plan: &CompositionPlan,
    layout: &StitchLayout,
    fill_fraction: f32,
    initial_size: u32,
) -> Result<Option<u32>> {
    let mut size: Option<u32> = None;
    for (source, width) in plan.sources.iter().zip(&layout.widths) {
        let Some(text) = source.caption() else { continue };
        let fit = best_fit(
            measure,
            text,
            *width as f32 * fill_fraction,
            layout.bar_height as f32 * fill_fraction,
            initial_size,
        )?;
        size = Some(size.map_or(fit.font_size, |s| s.min(fit.font_size)));
    }
    Ok(size)
}

/// Where per-column timers come from
#[derive(Debug, Clone, PartialEq)]
pub enum TimerSource {
    None,
    /// Extra ffmpeg input holding a pre-rendered timer clip
    Asset { input: usize },
    /// Elapsed time drawn by drawtext
    DrawText,
}

/// Rendering details that do not come from the probe
#[derive(Debug, Clone, PartialEq)]
pub struct GraphOptions {
    pub timer: TimerSource,
    pub timer_height: u32,
    pub font_file: Option<PathBuf>,
    pub subtitle_font_size: Option<u32>,
    /// Slow-down the audio time-stretch can still follow
    pub max_audio_tempo_factor: f64,
}

/// A rendered-ready graph plus its output labels
#[derive(Debug, Clone, PartialEq)]
pub struct StitchGraph {
    pub graph: FilterGraph,
    pub video_label: String,
    pub audio_label: Option<String>,
}

fn with_font(filter: Filter, font_file: Option<&Path>) -> Filter {
    match font_file {
        Some(path) => filter.named("fontfile", path.display()),
        None => filter,
    }
}

/// Build the composition graph.
///
/// Frame rates are reconciled explicitly: sources faster than the slowest one
/// get an `fps` filter down to it. Every column is held on its last frame until
/// the composition's duration.
pub fn build_stitch_graph(
    assets: &[VideoAsset],
    plan: &CompositionPlan,
    layout: &StitchLayout,
    options: &GraphOptions,
) -> StitchGraph {
    let mut graph = FilterGraph::new();
    let count = assets.len();

    for (i, asset) in assets.iter().enumerate() {
        let mut chain = FilterChain::new()
            .input(format!("{}:v", i))
            .filter(Filter::new("scale").arg(layout.widths[i]).arg(layout.height))
            .filter(Filter::new("setsar").arg(1));
        if asset.fps > layout.fps + 1e-3 {
            chain = chain.filter(Filter::new("fps").arg(rate_arg(layout.fps)));
        }
        let hold = layout.duration - asset.duration;
        if hold > 1e-3 {
            chain = chain.filter(
                Filter::new("tpad")
                    .named("stop_mode", "clone")
                    .named("stop_duration", number(hold)),
            );
        }
        graph.push(chain.output(format!("v{}", i)));
    }

    if layout.padding > 0 {
        for i in 0..count.saturating_sub(1) {
            graph.push(
                FilterChain::new()
                    .filter(
                        Filter::new("color")
                            .named("c", "black")
                            .named("s", format!("{}x{}", layout.padding, layout.height))
                            .named("r", rate_arg(layout.fps))
                            .named("d", number(layout.duration)),
                    )
                    .output(format!("p{}", i)),
            );
        }
    }

    let mut stack = FilterChain::new();
    let mut stacked = 0;
    for i in 0..count {
        stack = stack.input(format!("v{}", i));
        stacked += 1;
        if layout.padding > 0 && i + 1 < count {
            stack = stack.input(format!("p{}", i));
            stacked += 1;
        }
    }
    let stack = if stacked > 1 {
        stack.filter(Filter::new("hstack").named("inputs", stacked))
    } else {
        stack.filter(Filter::new("null"))
    };
    graph.push(stack.output("stack"));
    let mut current = "stack".to_string();

    if let TimerSource::Asset { input } = options.timer {
        let mut split = FilterChain::new()
            .input(format!("{}:v", input))
            .filter(Filter::new("split").arg(count));
        for i in 0..count {
            split = split.output(format!("t{}", i));
        }
        graph.push(split);

        for (i, duration) in layout.durations.iter().enumerate() {
            graph.push(
                FilterChain::new()
                    .input(format!("t{}", i))
                    .filter(Filter::new("trim").named("duration", number(*duration)))
                    .filter(Filter::new("setpts").arg("PTS-STARTPTS"))
                    .filter(Filter::new("scale").arg(-2).arg(options.timer_height))
                    .output(format!("ts{}", i)),
            );
            let next = format!("ov{}", i);
            graph.push(
                FilterChain::new()
                    .input(current)
                    .input(format!("ts{}", i))
                    .filter(
                        Filter::new("overlay")
                            .named("x", layout.offsets[i])
                            .named("y", 0)
                            .named("eof_action", "pass"),
                    )
                    .output(next.clone()),
            );
            current = next;
        }
    }

    let mut tail = FilterChain::new().input(current);

    if options.timer == TimerSource::DrawText {
        for (i, duration) in layout.durations.iter().enumerate() {
            let timer = Filter::new("drawtext")
                .named("text", "%{pts:hms}")
                .named("fontsize", options.timer_height)
                .named("fontcolor", "white")
                .named("box", 1)
                .named("boxcolor", "black")
                .named("x", layout.offsets[i])
                .named("y", 0)
                .named("enable", format!("lte(t,{})", number(*duration)));
            tail = tail.filter(with_font(timer, options.font_file.as_deref()));
        }
    }

    if layout.bar_height > 0 {
        tail = tail.filter(
            Filter::new("pad")
                .arg("iw")
                .arg(format!("ih+{}", layout.bar_height))
                .arg(0)
                .arg(0)
                .named("color", "black"),
        );

        if let Some(font_size) = options.subtitle_font_size {
            for (i, source) in plan.sources.iter().enumerate() {
                let Some(text) = source.caption() else { continue };
                let caption = Filter::new("drawtext")
                    .named("text", text.trim())
                    .named("expansion", "none")
                    .named("fontsize", font_size)
                    .named("fontcolor", "white")
                    .named("x", format!("{}+({}-text_w)/2", layout.offsets[i], layout.widths[i]))
                    .named("y", format!("{}+({}-text_h)/2", layout.height, layout.bar_height));
                tail = tail.filter(with_font(caption, options.font_file.as_deref()));
            }
        }
    }

    if plan.slow_factor > 1.0 {
        tail = tail.filter(Filter::new("setpts").arg(format!("{}*PTS", number(plan.slow_factor))));
    }

    let (width, height) = layout.output_size();
    if (width, height) != (layout.width, layout.height + layout.bar_height) {
        tail = tail.filter(Filter::new("pad").arg(width).arg(height));
    }

    if tail.filters().is_empty() {
        tail = tail.filter(Filter::new("null"));
    }
    graph.push(tail.output("vout"));

    let audio_label = audio_chain(assets, plan, options).map(|chain| {
        graph.push(chain);
        "aout".to_string()
    });

    StitchGraph {
        graph,
        video_label: "vout".to_string(),
        audio_label,
    }
}

fn audio_chain(assets: &[VideoAsset], plan: &CompositionPlan, options: &GraphOptions) -> Option<FilterChain> {
    if plan.remove_audio {
        return None;
    }
    let with_audio: Vec<usize> = assets
        .iter()
        .enumerate()
        .filter(|(_, asset)| asset.has_audio)
        .map(|(i, _)| i)
        .collect();
    if with_audio.is_empty() {
        return None;
    }
    if plan.slow_factor > options.max_audio_tempo_factor {
        warn!(
            "Slow-motion factor {} exceeds the audio time-stretch limit of {}; dropping audio",
            plan.slow_factor, options.max_audio_tempo_factor
        );
        return None;
    }

    let mut chain = FilterChain::new();
    for i in &with_audio {
        chain = chain.input(format!("{}:a", i));
    }
    chain = chain
        .filter(
            Filter::new("amix")
                .named("inputs", with_audio.len())
                .named("duration", "longest"),
        )
        .filter(Filter::new("aformat").named("channel_layouts", "stereo"));
    if plan.slow_factor > 1.0 {
        chain = chain.filter(Filter::new("atempo").arg(number(1.0 / plan.slow_factor)));
    }
    Some(chain.output("aout"))
}

/// Composes videos side by side through one ffmpeg run
pub struct VideoStitcher {
    tool: FfmpegTool,
    stitch: StitchConfig,
    video: VideoConfig,
    subtitle_fraction: f32,
    overwrite: bool,
}

impl VideoStitcher {
    pub fn new(tool: FfmpegTool, config: &Config) -> Self {
        Self {
            tool,
            stitch: config.stitch.clone(),
            video: config.video.clone(),
            subtitle_fraction: config.imaging.subtitle_height_fraction,
            overwrite: false,
        }
    }

    /// Replace an existing output instead of writing `<name>_<n>`
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Where the composition is written
    pub fn output_path(&self, output: &Path) -> Result<PathBuf> {
        files::resolve_output_path(output, self.overwrite)
    }

    /// Probe, lay out, build and run. `output` is made collision-free first
    /// unless overwriting.
    pub async fn stitch(&self, plan: &CompositionPlan, output: &Path, painter: Option<&TextPainter>) -> Result<EncodedVideo> {
        plan.validate()?;
        if plan.sources.len() == 1 {
            warn!("Only one video given; the output has a single column");
        }

        let mut assets = Vec::with_capacity(plan.sources.len());
        for source in &plan.sources {
            assets.push(self.tool.probe_async(&source.path).await?);
        }

        let layout = StitchLayout::compute(&assets, plan, self.stitch.padding_width, self.subtitle_fraction)?;
        for asset in assets.iter().filter(|a| a.fps > layout.fps + 1e-3) {
            warn!(
                "{} runs at {} fps; converting to {} fps to match the slowest source",
                asset.path.display(),
                format_fps(asset.fps),
                format_fps(layout.fps)
            );
        }

        let subtitle_font_size = match (plan.has_subtitles(), painter) {
            (false, _) => None,
            (true, Some(painter)) => shared_subtitle_size(
                painter.font(),
                plan,
                &layout,
                painter.fill_fraction(),
                painter.initial_font_size(),
            )?,
            (true, None) => {
                return Err(MediaError::InvalidParameters {
                    details: "subtitles requested without a font".to_string(),
                }.into())
            }
        };

        let mut inputs: Vec<PathBuf> = assets.iter().map(|a| a.path.clone()).collect();
        let timer = if !plan.insert_timers {
            TimerSource::None
        } else if let Some(asset) = &self.stitch.timer_asset {
            if !asset.is_file() {
                return Err(MediaError::SourceNotFound {
                    path: asset.display().to_string(),
                }.into());
            }
            inputs.push(asset.clone());
            TimerSource::Asset { input: inputs.len() - 1 }
        } else {
            TimerSource::DrawText
        };

        let options = GraphOptions {
            timer,
            timer_height: round_even(layout.height as f64 * self.stitch.timer_height_fraction as f64),
            font_file: painter.map(|p| p.font().path().to_path_buf()),
            subtitle_font_size,
            max_audio_tempo_factor: self.stitch.max_audio_tempo_factor,
        };
        let stitched = build_stitch_graph(&assets, plan, &layout, &options);

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                files::create_directory(parent)?;
            }
        }
        let output = self.output_path(output)?;
        let args = self.command_args(&inputs, &stitched, &output);

        info!(
            "Stitching {} videos into {}x{} ({:.2}s)",
            assets.len(),
            layout.width,
            layout.height + layout.bar_height,
            layout.duration * plan.slow_factor
        );
        self.tool.run(&args).await?;

        let (width, height) = layout.output_size();
        let duration = layout.duration * plan.slow_factor;
        let frame_count = (duration * layout.fps).round() as usize;
        Ok(EncodedVideo::new(output, width, height, duration, frame_count))
    }

    fn command_args(&self, inputs: &[PathBuf], stitched: &StitchGraph, output: &Path) -> Vec<String> {
        let mut args: Vec<String> = vec!["-y".into(), "-v".into(), "error".into()];
        for input in inputs {
            args.push("-i".into());
            args.push(input.display().to_string());
        }
        args.push("-filter_complex".into());
        args.push(stitched.graph.render());
        args.push("-map".into());
        args.push(format!("[{}]", stitched.video_label));
        match &stitched.audio_label {
            Some(label) => {
                args.push("-map".into());
                args.push(format!("[{}]", label));
                args.push("-c:a".into());
                args.push("aac".into());
            }
            None => args.push("-an".into()),
        }
        args.extend([
            "-c:v".to_string(),
            self.video.codec.clone(),
            "-crf".to_string(),
            self.video.crf.to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            output.display().to_string(),
        ]);
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::text::tests::LinearMeasure;

    fn asset(name: &str, width: u32, height: u32, fps: f64, duration: f64, has_audio: bool) -> VideoAsset {
        VideoAsset {
            path: PathBuf::from(name),
            width,
            height,
            fps,
            duration,
            has_audio,
            rotation: 0,
        }
    }

    fn options() -> GraphOptions {
        GraphOptions {
            timer: TimerSource::None,
            timer_height: 40,
            font_file: None,
            subtitle_font_size: None,
            max_audio_tempo_factor: 2.0,
        }
    }

    fn filter_names(graph: &FilterGraph) -> Vec<String> {
        graph.filters().map(|f| f.name().to_string()).collect()
    }

    #[test]
    fn test_equal_sources_width_and_duration() {
        let assets = vec![
            asset("a.mp4", 640, 360, 30.0, 5.0, false),
            asset("b.mp4", 640, 360, 30.0, 5.0, false),
        ];
        let plan = CompositionPlan::new(vec![StitchSource::new("a.mp4"), StitchSource::new("b.mp4")]);
        let layout = StitchLayout::compute(&assets, &plan, 20, 0.1).unwrap();

        assert_eq!(layout.width, 640 + 640 + 20);
        assert_eq!(layout.offsets, vec![0, 660]);
        assert_eq!(layout.duration, 5.0);
        assert_eq!(layout.bar_height, 0);

        let stitched = build_stitch_graph(&assets, &plan, &layout, &options());
        let rendered = stitched.graph.render();
        assert!(rendered.contains("[0:v]scale=640:360,setsar=1[v0]"));
        assert!(rendered.contains("color=c=black:s=20x360:r=30:d=5[p0]"));
        assert!(rendered.contains("[v0][p0][v1]hstack=inputs=3[stack]"));
        assert!(!rendered.contains("tpad"));
        assert!(stitched.audio_label.is_none());
    }

    #[test]
    fn test_heights_follow_first_source() {
        let assets = vec![
            asset("a.mp4", 1280, 720, 30.0, 4.0, false),
            asset("b.mp4", 640, 480, 30.0, 4.0, false),
            asset("c.mp4", 1920, 1080, 30.0, 4.0, false),
        ];
        let plan = CompositionPlan::new(assets.iter().map(|a| StitchSource::new(a.path.clone())).collect());
        let layout = StitchLayout::compute(&assets, &plan, 10, 0.1).unwrap();

        assert_eq!(layout.height, 720);
        assert_eq!(layout.widths, vec![1280, 960, 1280]);
        assert_eq!(layout.width, 1280 + 960 + 1280 + 2 * 10);
    }

    #[test]
    fn test_freeze_and_slow_motion() {
        let assets = vec![
            asset("a.mp4", 320, 240, 30.0, 4.0, true),
            asset("b.mp4", 320, 240, 30.0, 3.0, true),
        ];
        let plan = CompositionPlan::new(vec![StitchSource::new("a.mp4"), StitchSource::new("b.mp4")])
            .with_slow_factor(2.0)
            .with_freeze(2.0);
        let layout = StitchLayout::compute(&assets, &plan, 20, 0.1).unwrap();
        assert_eq!(layout.duration, 5.0);

        let stitched = build_stitch_graph(&assets, &plan, &layout, &options());
        let rendered = stitched.graph.render();
        assert!(rendered.contains("tpad=stop_mode=clone:stop_duration=1[v0]"));
        assert!(rendered.contains("tpad=stop_mode=clone:stop_duration=2[v1]"));
        assert!(rendered.contains("setpts=2*PTS[vout]"));
        assert!(rendered.contains("[0:a][1:a]amix=inputs=2:duration=longest,aformat=channel_layouts=stereo,atempo=0.5[aout]"));
        assert_eq!(stitched.audio_label.as_deref(), Some("aout"));
    }

    #[test]
    fn test_audio_dropped_beyond_tempo_limit() {
        let assets = vec![asset("a.mp4", 320, 240, 30.0, 4.0, true)];
        let plan = CompositionPlan::new(vec![StitchSource::new("a.mp4")]).with_slow_factor(4.0);
        let layout = StitchLayout::compute(&assets, &plan, 20, 0.1).unwrap();

        let stitched = build_stitch_graph(&assets, &plan, &layout, &options());
        assert!(stitched.audio_label.is_none());
        assert!(!filter_names(&stitched.graph).contains(&"amix".to_string()));
    }

    #[test]
    fn test_remove_audio_and_silent_sources() {
        let assets = vec![
            asset("a.mp4", 320, 240, 30.0, 4.0, true),
            asset("b.mp4", 320, 240, 30.0, 4.0, false),
        ];
        let plan = CompositionPlan::new(vec![StitchSource::new("a.mp4"), StitchSource::new("b.mp4")]);
        let layout = StitchLayout::compute(&assets, &plan, 20, 0.1).unwrap();

        let stitched = build_stitch_graph(&assets, &plan, &layout, &options());
        assert!(stitched.graph.render().contains("[0:a]amix=inputs=1"));

        let muted = plan.clone().without_audio(true);
        assert!(build_stitch_graph(&assets, &muted, &layout, &options()).audio_label.is_none());
    }

    #[test]
    fn test_faster_source_is_converted_down() {
        let assets = vec![
            asset("a.mp4", 320, 240, 60.0, 4.0, false),
            asset("b.mp4", 320, 240, 25.0, 4.0, false),
        ];
        let plan = CompositionPlan::new(vec![StitchSource::new("a.mp4"), StitchSource::new("b.mp4")]);
        let layout = StitchLayout::compute(&assets, &plan, 0, 0.1).unwrap();
        assert_eq!(layout.fps, 25.0);

        let rendered = build_stitch_graph(&assets, &plan, &layout, &options()).graph.render();
        assert!(rendered.contains("[0:v]scale=320:240,setsar=1,fps=25[v0]"));
        assert!(rendered.contains("[1:v]scale=320:240,setsar=1[v1]"));
        // no padding columns
        assert!(rendered.contains("[v0][v1]hstack=inputs=2[stack]"));
    }

    #[test]
    fn test_ntsc_rate_stays_exact_in_graph() {
        let assets = vec![
            asset("a.mp4", 320, 240, 60.0, 4.0, false),
            asset("b.mp4", 320, 240, 30000.0 / 1001.0, 4.0, false),
        ];
        let plan = CompositionPlan::new(vec![StitchSource::new("a.mp4"), StitchSource::new("b.mp4")]);
        let layout = StitchLayout::compute(&assets, &plan, 0, 0.1).unwrap();

        let rendered = build_stitch_graph(&assets, &plan, &layout, &options()).graph.render();
        assert!(rendered.contains("[0:v]scale=320:240,setsar=1,fps=30000/1001[v0]"));
    }

    #[test]
    fn test_subtitles_share_one_size() {
        let assets = vec![
            asset("a.mp4", 400, 200, 30.0, 2.0, false),
            asset("b.mp4", 200, 100, 30.0, 2.0, false),
        ];
        let plan = CompositionPlan::new(vec![
            StitchSource::with_subtitle("a.mp4", "short"),
            StitchSource::with_subtitle("b.mp4", "a much longer caption"),
        ]);
        let layout = StitchLayout::compute(&assets, &plan, 20, 0.1).unwrap();
        assert_eq!(layout.bar_height, 20);
        assert_eq!(layout.widths, vec![400, 400]);

        let size = shared_subtitle_size(&LinearMeasure, &plan, &layout, 0.8, 100).unwrap().unwrap();
        let short = best_fit(&LinearMeasure, "short", 320.0, 16.0, 100).unwrap().font_size;
        let long = best_fit(&LinearMeasure, "a much longer caption", 320.0, 16.0, 100).unwrap().font_size;
        assert_eq!(size, short.min(long));

        let options = GraphOptions {
            subtitle_font_size: Some(size),
            font_file: Some(PathBuf::from("/fonts/Sans.ttf")),
            ..options()
        };
        let stitched = build_stitch_graph(&assets, &plan, &layout, &options);
        let captions: Vec<&Filter> = stitched.graph.filters().filter(|f| f.name() == "drawtext").collect();
        assert_eq!(captions.len(), 2);
        assert!(captions.iter().all(|f| f.get("fontsize") == Some(size.to_string().as_str())));
        assert_eq!(captions[1].get("x"), Some("420+(400-text_w)/2"));
        assert_eq!(captions[0].get("expansion"), Some("none"));
        assert!(stitched.graph.render().contains("pad=iw:ih+20:0:0:color=black"));
    }

    #[test]
    fn test_timer_asset_overlays() {
        let assets = vec![
            asset("a.mp4", 320, 240, 30.0, 4.0, false),
            asset("b.mp4", 320, 240, 30.0, 2.5, false),
        ];
        let plan = CompositionPlan::new(vec![StitchSource::new("a.mp4"), StitchSource::new("b.mp4")]).with_timers(true);
        let layout = StitchLayout::compute(&assets, &plan, 20, 0.1).unwrap();
        let options = GraphOptions {
            timer: TimerSource::Asset { input: 2 },
            ..options()
        };

        let rendered = build_stitch_graph(&assets, &plan, &layout, &options).graph.render();
        assert!(rendered.contains("[2:v]split=2[t0][t1]"));
        assert!(rendered.contains("[t1]trim=duration=2.5,setpts=PTS-STARTPTS,scale=-2:40[ts1]"));
        assert!(rendered.contains("[ov0][ts1]overlay=x=340:y=0:eof_action=pass[ov1]"));
    }

    #[test]
    fn test_drawtext_timers_stop_with_their_source() {
        let assets = vec![
            asset("a.mp4", 320, 240, 30.0, 4.0, false),
            asset("b.mp4", 320, 240, 30.0, 2.5, false),
        ];
        let plan = CompositionPlan::new(vec![StitchSource::new("a.mp4"), StitchSource::new("b.mp4")]).with_timers(true);
        let layout = StitchLayout::compute(&assets, &plan, 20, 0.1).unwrap();
        let options = GraphOptions {
            timer: TimerSource::DrawText,
            ..options()
        };

        let stitched = build_stitch_graph(&assets, &plan, &layout, &options);
        let timers: Vec<&Filter> = stitched.graph.filters().filter(|f| f.name() == "drawtext").collect();
        assert_eq!(timers.len(), 2);
        assert_eq!(timers[1].get("enable"), Some("lte(t,2.5)"));
        assert_eq!(timers[1].get("x"), Some("340"));
    }

    #[test]
    fn test_blank_subtitle_leaves_column_uncaptioned() {
        let assets = vec![
            asset("a.mp4", 400, 200, 30.0, 2.0, false),
            asset("b.mp4", 400, 200, 30.0, 2.0, false),
        ];
        let plan = CompositionPlan::new(vec![
            StitchSource::with_subtitle("a.mp4", "  "),
            StitchSource::with_subtitle("b.mp4", "after"),
        ]);
        let layout = StitchLayout::compute(&assets, &plan, 20, 0.1).unwrap();

        let size = shared_subtitle_size(&LinearMeasure, &plan, &layout, 0.8, 100).unwrap();
        let expected = best_fit(&LinearMeasure, "after", 320.0, 16.0, 100).unwrap().font_size;
        assert_eq!(size, Some(expected));

        let options = GraphOptions {
            subtitle_font_size: size,
            ..options()
        };
        let stitched = build_stitch_graph(&assets, &plan, &layout, &options);
        let captions: Vec<&Filter> = stitched.graph.filters().filter(|f| f.name() == "drawtext").collect();
        assert_eq!(captions.len(), 1);
        assert_eq!(captions[0].get("x"), Some("420+(400-text_w)/2"));

        let blank = CompositionPlan::new(vec![StitchSource::with_subtitle("a.mp4", "")]);
        assert!(!blank.has_subtitles());
    }

    #[test]
    fn test_output_path_honours_overwrite() {
        let root = tempfile::tempdir().unwrap();
        let output = root.path().join("side_by_side.mp4");
        std::fs::write(&output, b"old").unwrap();
        let tool = FfmpegTool::new("ffmpeg", "ffprobe");

        let stitcher = VideoStitcher::new(tool.clone(), &Config::default());
        assert_eq!(stitcher.output_path(&output).unwrap(), root.path().join("side_by_side_1.mp4"));

        let stitcher = VideoStitcher::new(tool, &Config::default()).with_overwrite(true);
        assert_eq!(stitcher.output_path(&output).unwrap(), output);
    }

    #[test]
    fn test_odd_output_is_padded_even() {
        let assets = vec![
            asset("a.mp4", 321, 241, 30.0, 1.0, false),
            asset("b.mp4", 320, 241, 30.0, 1.0, false),
        ];
        let plan = CompositionPlan::new(vec![StitchSource::new("a.mp4"), StitchSource::new("b.mp4")]);
        let layout = StitchLayout::compute(&assets, &plan, 20, 0.1).unwrap();
        assert_eq!(layout.width, 661);
        assert_eq!(layout.output_size(), (662, 242));

        let rendered = build_stitch_graph(&assets, &plan, &layout, &options()).graph.render();
        assert!(rendered.ends_with("pad=662:242[vout]"));
    }

    #[test]
    fn test_plan_validation() {
        assert!(CompositionPlan::new(vec![]).validate().is_err());
        let plan = CompositionPlan::new(vec![StitchSource::new("a.mp4")]);
        assert!(plan.clone().with_slow_factor(0.5).validate().is_err());
        assert!(plan.clone().with_freeze(-1.0).validate().is_err());
        assert!(plan.validate().is_ok());
    }
}
