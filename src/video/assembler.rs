use std::collections::BTreeSet;
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Stdio};
use std::thread::{self, JoinHandle};

use tracing::{debug, info};

use crate::config::VideoConfig;
use crate::error::{MediaError, Result};
use crate::files;
use crate::imaging::primitives::WHITE;
use crate::imaging::text::TextPainter;
use crate::progress;
use crate::video::tool::{command_line, diagnostic_tail, FfmpegTool};
use crate::video::types::{format_fps, rate_arg, EncodeParams, EncodedVideo, Frame, FrameSequence};

/// Longest single hold, in seconds
pub const MAX_FREEZE_SECONDS: f64 = 3600.0;

/// Highest frame rate a sequence is encoded at
pub const MAX_FPS: f64 = 1000.0;

/// Reject rates ffmpeg cannot encode at
pub fn validate_fps(fps: f64) -> Result<()> {
    if fps.is_finite() && fps > 0.0 && fps <= MAX_FPS {
        Ok(())
    } else {
        Err(MediaError::InvalidParameters {
            details: format!("frame rate must be between 0 and {}, got {}", MAX_FPS, fps),
        }.into())
    }
}

/// Which frames are held, and for how long
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FreezePolicy {
    /// 0-based indices followed by a freeze
    pub frames: BTreeSet<usize>,

    /// Also freeze after the final frame
    pub freeze_last: bool,

    pub seconds: f64,
}

impl FreezePolicy {
    pub fn new<I: IntoIterator<Item = usize>>(frames: I, freeze_last: bool, seconds: f64) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            freeze_last,
            seconds,
        }
    }

    /// Extra copies added by one freeze
    pub fn repeats(&self, fps: f64) -> usize {
        (self.seconds * fps).round().max(0.0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty() && !self.freeze_last
    }

    pub fn validate(&self) -> Result<()> {
        if self.seconds.is_finite() && (0.0..=MAX_FREEZE_SECONDS).contains(&self.seconds) {
            Ok(())
        } else {
            Err(MediaError::InvalidParameters {
                details: format!(
                    "freeze duration must be between 0 and {} seconds, got {}",
                    MAX_FREEZE_SECONDS, self.seconds
                ),
            }.into())
        }
    }
}

/// Source index of every frame to encode, in output order.
///
/// Each frozen index is followed by its extra copies; indices past the end of
/// the sequence are ignored.
pub fn plan_frame_order(frame_count: usize, freeze: &FreezePolicy, fps: f64) -> Vec<usize> {
    let repeats = freeze.repeats(fps);
    let mut order = Vec::with_capacity(frame_count);

    for index in 0..frame_count {
        order.push(index);
        let mut copies = 0;
        if freeze.frames.contains(&index) {
            copies += repeats;
        }
        if freeze.freeze_last && index + 1 == frame_count {
            copies += repeats;
        }
        order.extend(std::iter::repeat(index).take(copies));
    }
    order
}

/// Destination of encoded frames.
///
/// `begin` is called once, with the size of the first frame, before any frame
/// is written; every later frame has that size.
pub trait FrameSink {
    fn begin(&mut self, width: u32, height: u32) -> Result<()>;

    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    fn finish(&mut self) -> Result<()>;
}

/// Pipes raw RGB frames into an ffmpeg process
pub struct FfmpegEncoder {
    tool: FfmpegTool,
    output: PathBuf,
    params: EncodeParams,
    command: String,
    child: Option<Child>,
    stdin: Option<BufWriter<ChildStdin>>,
    stderr_drain: Option<JoinHandle<Vec<u8>>>,
}

impl FfmpegEncoder {
    pub fn new(tool: FfmpegTool, output: PathBuf, params: EncodeParams) -> Self {
        Self {
            tool,
            output,
            params,
            command: String::new(),
            child: None,
            stdin: None,
            stderr_drain: None,
        }
    }

    fn args(&self, width: u32, height: u32) -> Vec<String> {
        vec![
            "-y".into(),
            "-v".into(),
            "error".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "rgb24".into(),
            "-s".into(),
            format!("{}x{}", width, height),
            "-r".into(),
            rate_arg(self.params.fps),
            "-i".into(),
            "-".into(),
            // yuv420p needs even dimensions
            "-vf".into(),
            "pad=ceil(iw/2)*2:ceil(ih/2)*2".into(),
            "-c:v".into(),
            self.params.codec.clone(),
            "-crf".into(),
            self.params.crf.to_string(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            self.output.display().to_string(),
        ]
    }

    fn failure(&mut self, fallback: String) -> crate::error::EditorError {
        let diagnostic = self
            .stderr_drain
            .take()
            .and_then(|drain| drain.join().ok())
            .map(|stderr| diagnostic_tail(&stderr))
            .filter(|text| !text.is_empty())
            .unwrap_or(fallback);
        MediaError::ExternalToolFailure {
            command: self.command.clone(),
            diagnostic,
        }.into()
    }
}

impl FrameSink for FfmpegEncoder {
    fn begin(&mut self, width: u32, height: u32) -> Result<()> {
        let args = self.args(width, height);
        self.command = command_line(self.tool.ffmpeg(), &args);
        debug!("Running {}", self.command);

        let mut child = self
            .tool
            .ffmpeg_command()
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| MediaError::ExternalToolFailure {
                command: self.command.clone(),
                diagnostic: e.to_string(),
            })?;

        self.stdin = child.stdin.take().map(BufWriter::new);
        self.stderr_drain = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut collected = Vec::new();
                let _ = stderr.read_to_end(&mut collected);
                collected
            })
        });
        self.child = Some(child);
        Ok(())
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(self.failure("encoder was not started".to_string()));
        };
        match stdin.write_all(frame.rgb_bytes()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                // ffmpeg exited; its stderr says why
                self.stdin = None;
                if let Some(mut child) = self.child.take() {
                    let _ = child.wait();
                }
                Err(self.failure(e.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin.flush()?;
        }
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child.wait()?;
        if !status.success() {
            return Err(self.failure(format!("ffmpeg exited with {}", status)));
        }
        Ok(())
    }
}

/// Feed a sequence through `sink` in planned order.
///
/// Each distinct frame is decoded once; subtitles, when given, burn the frame's
/// file stem into a bar at the bottom. Returns the number of frames written.
pub fn encode_sequence<S: FrameSink + ?Sized>(
    sequence: &FrameSequence,
    order: &[usize],
    subtitles: Option<(&TextPainter, f32)>,
    sink: &mut S,
) -> Result<usize> {
    let bar = progress::progress_bar(Some(order.len() as u64), "encoding frames");
    let mut locked: Option<(u32, u32)> = None;
    let mut current: Option<(usize, Frame)> = None;
    let mut written = 0;

    for &index in order {
        let reuse = matches!(&current, Some((loaded, _)) if *loaded == index);
        if !reuse {
            let path = &sequence.frames()[index];
            let mut frame = Frame::open(path)?;

            match locked {
                None => {
                    sink.begin(frame.width(), frame.height())?;
                    locked = Some(frame.dimensions());
                }
                Some((width, height)) if (width, height) != frame.dimensions() => {
                    return Err(MediaError::DimensionMismatch {
                        frame: path.display().to_string(),
                        expected_width: width,
                        expected_height: height,
                        actual_width: frame.width(),
                        actual_height: frame.height(),
                    }.into());
                }
                Some(_) => {}
            }

            if let Some((painter, fraction)) = subtitles {
                painter.subtitle(&mut frame, &files::file_stem_string(path), WHITE, fraction)?;
            }
            current = Some((index, frame));
        }

        if let Some((_, frame)) = &current {
            sink.write_frame(frame)?;
            written += 1;
            bar.inc(1);
        }
    }

    bar.finish_and_clear();
    sink.finish()?;
    Ok(written)
}

/// Options for one frames-to-video run
#[derive(Debug, Clone, Default)]
pub struct AssemblyOptions {
    /// Output frame rate; falls back to the directory suffix, then the config
    pub fps: Option<f64>,
    pub freeze: FreezePolicy,
    /// Burn each frame's file stem in as a subtitle
    pub subtitles: bool,
    /// Output file stem; defaults to the frame directory's name
    pub output_name: Option<String>,
}

impl AssemblyOptions {
    pub fn validate(&self) -> Result<()> {
        if let Some(fps) = self.fps {
            validate_fps(fps)?;
        }
        self.freeze.validate()
    }
}

/// Encodes PNG sequences into MP4
pub struct FrameAssembler {
    tool: FfmpegTool,
    video: VideoConfig,
    subtitle_fraction: f32,
    overwrite: bool,
}

impl FrameAssembler {
    pub fn new(tool: FfmpegTool, video: VideoConfig, subtitle_fraction: f32) -> Self {
        Self {
            tool,
            video,
            subtitle_fraction,
            overwrite: false,
        }
    }

    /// Replace an existing video instead of writing `<name>_<n>.mp4`
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn resolve_fps(&self, requested: Option<f64>, sequence: &FrameSequence) -> f64 {
        requested
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .or_else(|| sequence.detected_fps())
            .unwrap_or(self.video.default_fps)
    }

    /// `<target>/<name>.mp4`, made collision-free unless overwriting
    pub fn output_path(&self, frames_dir: &Path, target_dir: &Path, options: &AssemblyOptions) -> Result<PathBuf> {
        let name = options
            .output_name
            .clone()
            .unwrap_or_else(|| files::file_stem_string(frames_dir));
        files::resolve_output_path(target_dir.join(format!("{}.mp4", name)), self.overwrite)
    }

    /// Encode every PNG of `frames_dir` into one video in `target_dir`. Blocking.
    pub fn assemble(
        &self,
        frames_dir: &Path,
        target_dir: &Path,
        options: &AssemblyOptions,
        painter: Option<&TextPainter>,
    ) -> Result<EncodedVideo> {
        options.validate()?;
        let sequence = FrameSequence::from_directory(frames_dir)?;
        let fps = self.resolve_fps(options.fps, &sequence);
        validate_fps(fps)?;
        let order = plan_frame_order(sequence.len(), &options.freeze, fps);

        files::create_directory(target_dir)?;
        let output = self.output_path(frames_dir, target_dir, options)?;
        info!(
            "Assembling {} frames ({} after freezes) at {} fps into {}",
            sequence.len(),
            order.len(),
            format_fps(fps),
            output.display()
        );

        let subtitles = match (options.subtitles, painter) {
            (true, Some(painter)) => Some((painter, self.subtitle_fraction)),
            (true, None) => {
                return Err(MediaError::InvalidParameters {
                    details: "subtitles requested without a font".to_string(),
                }.into())
            }
            (false, _) => None,
        };

        let params = EncodeParams::from_config(&self.video, fps);
        let mut encoder = FfmpegEncoder::new(self.tool.clone(), output.clone(), params);
        let written = encode_sequence(&sequence, &order, subtitles, &mut encoder)?;

        let (width, height) = image::image_dimensions(&sequence.frames()[0])?;
        let encoded = EncodedVideo::new(output, width, height, written as f64 / fps, written);
        info!("Video written: {} ({:.2}s)", encoded.path.display(), encoded.duration);
        Ok(encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[derive(Default)]
    struct MemorySink {
        size: Option<(u32, u32)>,
        frames: Vec<Frame>,
        finished: bool,
    }

    impl FrameSink for MemorySink {
        fn begin(&mut self, width: u32, height: u32) -> Result<()> {
            self.size = Some((width, height));
            Ok(())
        }

        fn write_frame(&mut self, frame: &Frame) -> Result<()> {
            self.frames.push(frame.clone());
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            self.finished = true;
            Ok(())
        }
    }

    fn write_sequence(dir: &Path, count: usize) -> FrameSequence {
        for i in 0..count {
            Frame::new_filled(4, 4, [i as u8, 0, 0])
                .as_image()
                .save(dir.join(format!("{:08}.png", i)))
                .unwrap();
        }
        FrameSequence::from_directory(dir).unwrap()
    }

    #[test]
    fn test_plan_without_freeze() {
        let order = plan_frame_order(30, &FreezePolicy::default(), 30.0);
        assert_eq!(order, (0..30).collect::<Vec<_>>());
    }

    #[test]
    fn test_plan_freeze_listed_and_last() {
        let freeze = FreezePolicy::new([1], true, 0.2);
        let order = plan_frame_order(3, &freeze, 10.0);
        assert_eq!(order, vec![0, 1, 1, 1, 2, 2, 2]);
    }

    #[test]
    fn test_only_listed_frames_freeze() {
        let freeze = FreezePolicy::new([0, 4], false, 1.0);
        let order = plan_frame_order(10, &freeze, 24.0);
        assert_eq!(order.len(), 10 + 2 * 24);
        assert_eq!(order.iter().filter(|&&i| i == 5).count(), 1);
        // out-of-range indices are ignored
        let order = plan_frame_order(3, &FreezePolicy::new([7], false, 1.0), 24.0);
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn test_thirty_frames_make_one_second() {
        let dir = tempdir().unwrap();
        let sequence = write_sequence(dir.path(), 30);
        let order = plan_frame_order(sequence.len(), &FreezePolicy::default(), 30.0);

        let mut sink = MemorySink::default();
        let written = encode_sequence(&sequence, &order, None, &mut sink).unwrap();

        assert_eq!(written, 30);
        assert_eq!(written as f64 / 30.0, 1.0);
        assert_eq!(sink.size, Some((4, 4)));
        assert!(sink.finished);
        assert_eq!(sink.frames[29].get_pixel(0, 0), [29, 0, 0]);
    }

    #[test]
    fn test_frozen_frames_are_copies() {
        let dir = tempdir().unwrap();
        let sequence = write_sequence(dir.path(), 3);
        let freeze = FreezePolicy::new([0], false, 0.5);
        let order = plan_frame_order(sequence.len(), &freeze, 4.0);

        let mut sink = MemorySink::default();
        assert_eq!(encode_sequence(&sequence, &order, None, &mut sink).unwrap(), 5);
        assert_eq!(sink.frames[2].get_pixel(0, 0), [0, 0, 0]);
        assert_eq!(sink.frames[3].get_pixel(0, 0), [1, 0, 0]);
    }

    #[test]
    fn test_size_change_is_rejected() {
        let dir = tempdir().unwrap();
        Frame::new_black(4, 4).as_image().save(dir.path().join("00000000.png")).unwrap();
        Frame::new_black(6, 4).as_image().save(dir.path().join("00000001.png")).unwrap();
        let sequence = FrameSequence::from_directory(dir.path()).unwrap();

        let mut sink = MemorySink::default();
        let err = encode_sequence(&sequence, &[0, 1], None, &mut sink).unwrap_err();
        assert!(matches!(
            err,
            crate::EditorError::Media(MediaError::DimensionMismatch { expected_width: 4, actual_width: 6, .. })
        ));
        assert_eq!(sink.frames.len(), 1);
    }

    #[test]
    fn test_fps_resolution_order() {
        let root = tempdir().unwrap();
        let dir = root.path().join("walk_12FPS");
        std::fs::create_dir(&dir).unwrap();
        let sequence = write_sequence(&dir, 1);
        let assembler = FrameAssembler::new(FfmpegTool::new("ffmpeg", "ffprobe"), VideoConfig::default(), 0.1);

        assert_eq!(assembler.resolve_fps(Some(60.0), &sequence), 60.0);
        assert_eq!(assembler.resolve_fps(None, &sequence), 12.0);

        let plain = write_sequence(root.path(), 1);
        assert_eq!(assembler.resolve_fps(None, &plain), 30.0);
    }

    #[test]
    fn test_output_path_is_collision_free() {
        let root = tempdir().unwrap();
        let frames = root.path().join("run_30FPS");
        std::fs::write(root.path().join("run_30FPS.mp4"), b"old").unwrap();
        let assembler = FrameAssembler::new(FfmpegTool::new("ffmpeg", "ffprobe"), VideoConfig::default(), 0.1);

        let path = assembler.output_path(&frames, root.path(), &AssemblyOptions::default()).unwrap();
        assert_eq!(path, root.path().join("run_30FPS_1.mp4"));
    }

    #[test]
    fn test_output_path_overwrites_when_asked() {
        let root = tempdir().unwrap();
        let frames = root.path().join("run_30FPS");
        std::fs::write(root.path().join("run_30FPS.mp4"), b"old").unwrap();
        let assembler = FrameAssembler::new(FfmpegTool::new("ffmpeg", "ffprobe"), VideoConfig::default(), 0.1)
            .with_overwrite(true);

        let path = assembler.output_path(&frames, root.path(), &AssemblyOptions::default()).unwrap();
        assert_eq!(path, root.path().join("run_30FPS.mp4"));
    }

    fn is_invalid(result: Result<()>) -> bool {
        matches!(result, Err(crate::EditorError::Media(MediaError::InvalidParameters { .. })))
    }

    #[test]
    fn test_freeze_duration_is_validated() {
        let options = |seconds: f64| AssemblyOptions {
            freeze: FreezePolicy::new([0], false, seconds),
            ..AssemblyOptions::default()
        };
        assert!(options(0.0).validate().is_ok());
        assert!(options(2.0).validate().is_ok());
        assert!(is_invalid(options(-1.0).validate()));
        assert!(is_invalid(options(1e30).validate()));
        assert!(is_invalid(options(f64::INFINITY).validate()));
        assert!(is_invalid(options(f64::NAN).validate()));
    }

    #[test]
    fn test_requested_fps_is_validated() {
        let options = |fps: f64| AssemblyOptions {
            fps: Some(fps),
            ..AssemblyOptions::default()
        };
        assert!(options(24.0).validate().is_ok());
        assert!(is_invalid(options(0.0).validate()));
        assert!(is_invalid(options(-30.0).validate()));
        assert!(is_invalid(options(f64::INFINITY).validate()));
        assert!(is_invalid(options(f64::NAN).validate()));
        assert!(is_invalid(options(1e9).validate()));
    }

    #[test]
    fn test_invalid_freeze_fails_before_encoding() {
        let root = tempdir().unwrap();
        let frames = root.path().join("run_30FPS");
        std::fs::create_dir(&frames).unwrap();
        write_sequence(&frames, 2);
        let assembler = FrameAssembler::new(FfmpegTool::new("ffmpeg", "ffprobe"), VideoConfig::default(), 0.1);
        let options = AssemblyOptions {
            freeze: FreezePolicy::new([0], false, 1e30),
            ..AssemblyOptions::default()
        };

        let err = assembler.assemble(&frames, root.path(), &options, None).unwrap_err();
        assert!(matches!(err, crate::EditorError::Media(MediaError::InvalidParameters { .. })));
        assert!(!root.path().join("run_30FPS.mp4").exists());
    }
}
