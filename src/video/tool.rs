use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Deserialize;
use tracing::{debug, info};

use crate::config::VideoConfig;
use crate::error::{MediaError, Result};
use crate::files;
use crate::video::types::{format_fps, rate_arg, VideoAsset};

/// Lines of ffmpeg stderr kept in an error
const DIAGNOSTIC_LINES: usize = 20;

/// Handle on the external `ffmpeg` and `ffprobe` executables
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegTool {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(ffmpeg: P, ffprobe: Q) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    pub fn from_config(config: &VideoConfig) -> Self {
        Self::new(config.ffmpeg.clone(), config.ffprobe.clone())
    }

    pub fn ffmpeg(&self) -> &Path {
        &self.ffmpeg
    }

    /// A blocking `ffmpeg` command with no arguments yet
    pub fn ffmpeg_command(&self) -> Command {
        Command::new(&self.ffmpeg)
    }

    pub fn check_available(&self) -> bool {
        Command::new(&self.ffmpeg)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    pub fn ensure_available(&self) -> Result<()> {
        if self.check_available() {
            Ok(())
        } else {
            Err(MediaError::ExternalToolFailure {
                command: format!("{} -version", self.ffmpeg.display()),
                diagnostic: "ffmpeg not found. Please install ffmpeg or set video.ffmpeg.".to_string(),
            }.into())
        }
    }

    fn probe_args(path: &Path) -> Vec<String> {
        vec![
            "-v".to_string(),
            "error".to_string(),
            "-print_format".to_string(),
            "json".to_string(),
            "-show_streams".to_string(),
            "-show_format".to_string(),
            path.display().to_string(),
        ]
    }

    fn ensure_source(path: &Path) -> Result<()> {
        if path.is_file() {
            Ok(())
        } else {
            Err(MediaError::SourceNotFound {
                path: path.display().to_string(),
            }.into())
        }
    }

    /// Probe a video with ffprobe
    pub fn probe(&self, path: &Path) -> Result<VideoAsset> {
        Self::ensure_source(path)?;
        let args = Self::probe_args(path);
        let command = command_line(&self.ffprobe, &args);

        let output = Command::new(&self.ffprobe)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| tool_failure(&command, e.to_string()))?;
        if !output.status.success() {
            return Err(tool_failure(&command, diagnostic_tail(&output.stderr)));
        }

        parse_probe_output(path, &String::from_utf8_lossy(&output.stdout))
    }

    /// Probe a video with ffprobe without blocking the runtime
    pub async fn probe_async(&self, path: &Path) -> Result<VideoAsset> {
        Self::ensure_source(path)?;
        let args = Self::probe_args(path);
        let command = command_line(&self.ffprobe, &args);

        let output = tokio::process::Command::new(&self.ffprobe)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| tool_failure(&command, e.to_string()))?;
        if !output.status.success() {
            return Err(tool_failure(&command, diagnostic_tail(&output.stderr)));
        }

        parse_probe_output(path, &String::from_utf8_lossy(&output.stdout))
    }

    /// Run ffmpeg to completion.
    ///
    /// A non-zero exit becomes `ExternalToolFailure` carrying the full command
    /// line and the tail of ffmpeg's stderr.
    pub async fn run(&self, args: &[String]) -> Result<()> {
        let command = command_line(&self.ffmpeg, args);
        debug!("Running {}", command);

        let output = tokio::process::Command::new(&self.ffmpeg)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| tool_failure(&command, e.to_string()))?;

        if !output.status.success() {
            return Err(tool_failure(&command, diagnostic_tail(&output.stderr)));
        }
        Ok(())
    }

    /// Re-encode `input` at `fps` into `<stem>_<fps>fps<.ext>` next to it
    pub async fn convert_frame_rate(&self, input: &Path, fps: f64, overwrite: bool) -> Result<PathBuf> {
        Self::ensure_source(input)?;
        if !(fps.is_finite() && fps > 0.0) {
            return Err(MediaError::InvalidParameters {
                details: format!("target frame rate must be positive, got {}", fps),
            }.into());
        }

        let output = files::resolve_output_path(frame_rate_output_path(input, fps), overwrite)?;
        let args = vec![
            "-y".to_string(),
            "-i".to_string(),
            input.display().to_string(),
            "-filter:v".to_string(),
            format!("fps={}", rate_arg(fps)),
            output.display().to_string(),
        ];
        self.run(&args).await?;

        info!("Converted {} to {} fps: {}", input.display(), format_fps(fps), output.display());
        Ok(output)
    }
}

fn tool_failure(command: &str, diagnostic: String) -> crate::error::EditorError {
    MediaError::ExternalToolFailure {
        command: command.to_string(),
        diagnostic,
    }.into()
}

/// `<parent>/<stem>_<fps>fps<.ext>`
pub fn frame_rate_output_path(input: &Path, fps: f64) -> PathBuf {
    let stem = files::file_stem_string(input);
    let name = match input.extension() {
        Some(ext) => format!("{}_{}fps.{}", stem, format_fps(fps), ext.to_string_lossy()),
        None => format!("{}_{}fps", stem, format_fps(fps)),
    };
    input.with_file_name(name)
}

/// Printable command line, quoting arguments that contain spaces
pub fn command_line(program: &Path, args: &[String]) -> String {
    let mut line = program.display().to_string();
    for arg in args {
        line.push(' ');
        if arg.is_empty() || arg.contains(char::is_whitespace) {
            line.push('\'');
            line.push_str(&arg.replace('\'', "'\\''"));
            line.push('\'');
        } else {
            line.push_str(arg);
        }
    }
    line
}

/// Last lines of a tool's stderr
pub fn diagnostic_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(DIAGNOSTIC_LINES);
    lines[start..].join("\n")
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
    tags: Option<ProbeTags>,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ProbeTags {
    rotate: Option<String>,
}

impl ProbeStream {
    /// Clockwise display rotation normalized to 0..360. The display matrix
    /// stores it counter-clockwise, the legacy `rotate` tag clockwise.
    fn rotation(&self) -> u32 {
        let degrees = self
            .side_data_list
            .iter()
            .find_map(|side| side.rotation)
            .map(|ccw| -ccw)
            .or_else(|| {
                self.tags
                    .as_ref()
                    .and_then(|t| t.rotate.as_deref())
                    .and_then(|r| r.trim().parse::<f64>().ok())
            })
            .filter(|d| d.is_finite())
            .unwrap_or(0.0);
        ((degrees.round() as i64).rem_euclid(360)) as u32
    }
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Parse `30000/1001`, `25/1` or `24`; `0/0` and garbage give `None`
pub fn parse_frame_rate(value: &str) -> Option<f64> {
    let fps = match value.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => value.trim().parse().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

/// Build a [`VideoAsset`] from `ffprobe -print_format json -show_streams -show_format`
pub fn parse_probe_output(path: &Path, json: &str) -> Result<VideoAsset> {
    let probe: ProbeOutput = serde_json::from_str(json)?;
    let invalid = |details: String| MediaError::InvalidParameters { details };

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| invalid(format!("{}: no video stream", path.display())))?;
    let has_audio = probe
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(invalid(format!("{}: video stream has no dimensions", path.display())).into()),
    };
    // ffmpeg decodes rotated streams upright
    let rotation = video.rotation();
    let (width, height) = if rotation % 180 == 90 { (height, width) } else { (width, height) };

    let fps = video
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| video.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .ok_or_else(|| invalid(format!("{}: frame rate unknown", path.display())))?;

    let duration = video
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .or_else(|| {
            probe.format
                .as_ref()
                .and_then(|f| f.duration.as_deref())
                .and_then(|d| d.parse::<f64>().ok())
        })
        .filter(|d| *d > 0.0)
        .ok_or_else(|| invalid(format!("{}: duration unknown", path.display())))?;

    Ok(VideoAsset {
        path: path.to_path_buf(),
        width,
        height,
        fps,
        duration,
        has_audio,
        rotation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBE_JSON: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "video", "width": 1920, "height": 1080,
             "r_frame_rate": "30000/1001", "avg_frame_rate": "30000/1001", "duration": "12.512500"},
            {"index": 1, "codec_type": "audio", "sample_rate": "48000", "duration": "12.500000"}
        ],
        "format": {"filename": "left.mp4", "duration": "12.512500"}
    }"#;

    #[test]
    fn test_parse_probe_output() {
        let asset = parse_probe_output(Path::new("left.mp4"), PROBE_JSON).unwrap();
        assert_eq!((asset.width, asset.height), (1920, 1080));
        assert!((asset.fps - 29.97).abs() < 0.01);
        assert!((asset.duration - 12.5125).abs() < 1e-9);
        assert!(asset.has_audio);
        assert_eq!(asset.rotation, 0);
        assert_eq!(asset.name(), "left");
    }

    #[test]
    fn test_rotated_streams_report_decoded_size() {
        let json = r#"{
            "streams": [{"codec_type": "video", "width": 1920, "height": 1080,
                         "avg_frame_rate": "30/1", "duration": "4.0",
                         "side_data_list": [{"side_data_type": "Display Matrix", "rotation": -90}]}]
        }"#;
        let asset = parse_probe_output(Path::new("portrait.mp4"), json).unwrap();
        assert_eq!((asset.width, asset.height), (1080, 1920));
        assert_eq!(asset.rotation, 90);

        let legacy = r#"{
            "streams": [{"codec_type": "video", "width": 1280, "height": 720,
                         "avg_frame_rate": "25/1", "duration": "2.0",
                         "tags": {"rotate": "270", "language": "und"}}]
        }"#;
        let asset = parse_probe_output(Path::new("old_phone.mp4"), legacy).unwrap();
        assert_eq!((asset.width, asset.height), (720, 1280));
        assert_eq!(asset.rotation, 270);

        let upside_down = r#"{
            "streams": [{"codec_type": "video", "width": 640, "height": 480,
                         "avg_frame_rate": "25/1", "duration": "2.0",
                         "side_data_list": [{"rotation": 180}]}]
        }"#;
        let asset = parse_probe_output(Path::new("flipped.mp4"), upside_down).unwrap();
        assert_eq!((asset.width, asset.height), (640, 480));
        assert_eq!(asset.rotation, 180);
    }

    #[test]
    fn test_probe_falls_back_to_format_duration() {
        let json = r#"{
            "streams": [{"codec_type": "video", "width": 640, "height": 480,
                         "avg_frame_rate": "0/0", "r_frame_rate": "25/1"}],
            "format": {"duration": "3.0"}
        }"#;
        let asset = parse_probe_output(Path::new("clip.webm"), json).unwrap();
        assert_eq!(asset.fps, 25.0);
        assert_eq!(asset.duration, 3.0);
        assert!(!asset.has_audio);
    }

    #[test]
    fn test_probe_without_video_stream() {
        let json = r#"{"streams": [{"codec_type": "audio"}], "format": {"duration": "3.0"}}"#;
        assert!(parse_probe_output(Path::new("song.mp4"), json).is_err());
    }

    #[test]
    fn test_frame_rates() {
        assert_eq!(parse_frame_rate("25/1"), Some(25.0));
        assert_eq!(parse_frame_rate("60"), Some(60.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("n/a"), None);
    }

    #[test]
    fn test_frame_rate_output_path() {
        assert_eq!(
            frame_rate_output_path(Path::new("/videos/run.mp4"), 15.0),
            PathBuf::from("/videos/run_15fps.mp4")
        );
    }

    #[test]
    fn test_command_line_quotes_spaces() {
        let line = command_line(
            Path::new("ffmpeg"),
            &["-i".to_string(), "my clip.mp4".to_string()],
        );
        assert_eq!(line, "ffmpeg -i 'my clip.mp4'");
    }

    #[test]
    fn test_diagnostic_tail_keeps_last_lines() {
        let stderr: String = (0..50).map(|i| format!("line {}\n", i)).collect();
        let tail = diagnostic_tail(stderr.as_bytes());
        assert!(tail.starts_with("line 30"));
        assert!(tail.ends_with("line 49"));
    }

    #[tokio::test]
    async fn test_missing_source_is_reported_before_running() {
        let tool = FfmpegTool::new("ffmpeg", "ffprobe");
        let err = tool.convert_frame_rate(Path::new("/no/such/clip.mp4"), 15.0, false).await.unwrap_err();
        assert!(matches!(err, crate::EditorError::Media(MediaError::SourceNotFound { .. })));
    }
}
