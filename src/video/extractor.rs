use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::thread;

use tracing::{debug, info, warn};

use crate::error::{MediaError, Result};
use crate::files;
use crate::imaging::primitives;
use crate::progress;
use crate::video::tool::{command_line, diagnostic_tail, FfmpegTool};
use crate::video::types::{fps_directory_name, frame_file_name, Frame};

/// What an extraction produced
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionReport {
    /// `<parent>/<stem>_<fps>FPS`
    pub directory: PathBuf,
    pub fps: f64,
    pub frame_count: usize,
}

/// Splits raw `rgb24` video into frames
pub struct RawFrameReader<R> {
    reader: R,
    width: u32,
    height: u32,
    frame_size: usize,
}

impl<R: Read> RawFrameReader<R> {
    pub fn new(reader: R, width: u32, height: u32) -> Self {
        Self {
            reader,
            width,
            height,
            frame_size: width as usize * height as usize * 3,
        }
    }
}

impl<R: Read> Iterator for RawFrameReader<R> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.frame_size == 0 {
            return None;
        }

        let mut buffer = vec![0u8; self.frame_size];
        let mut filled = 0;
        while filled < self.frame_size {
            match self.reader.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }

        if filled == 0 {
            return None;
        }
        if filled < self.frame_size {
            return Some(Err(MediaError::InvalidParameters {
                details: format!("stream ended inside a frame ({} of {} bytes)", filled, self.frame_size),
            }.into()));
        }

        Frame::from_rgb_bytes(self.width, self.height, buffer).map(Ok)
    }
}

/// Write frames as `[<prefix>_]<index:08>.png` into `directory`, in order.
///
/// Stops at the first error; frames written before it stay on disk.
pub fn write_frames<I>(frames: I, directory: &Path, prefix: &str, overwrite: bool) -> Result<usize>
where
    I: IntoIterator<Item = Result<Frame>>,
{
    let mut count = 0;
    for frame in frames {
        let frame = frame?;
        primitives::save_sequence_frame(&frame, &directory.join(frame_file_name(prefix, count)), overwrite)?;
        count += 1;
    }
    Ok(count)
}

/// Directory frames of a video go to: a sibling of `target` named
/// `<target name>_<fps>FPS`
pub fn output_directory(target: &Path, fps: f64) -> PathBuf {
    let name = fps_directory_name(&files::file_stem_string(target), fps);
    match target.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

/// Decodes videos into numbered PNG sequences through ffmpeg
pub struct FrameExtractor {
    tool: FfmpegTool,
    overwrite: bool,
}

impl FrameExtractor {
    pub fn new(tool: FfmpegTool) -> Self {
        Self {
            tool,
            overwrite: false,
        }
    }

    /// Allow replacing frames left by an earlier extraction
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Decode every frame of `video` into `output_directory(target, fps)`.
    ///
    /// Blocking; the engine runs it on the blocking pool.
    pub fn extract(&self, video: &Path, target: &Path, prefix: &str) -> Result<ExtractionReport> {
        let asset = self.tool.probe(video)?;
        let directory = output_directory(target, asset.fps);
        files::create_directory(&directory)?;

        info!(
            "Extracting {} ({}x{} @ {:.2} fps) into {}",
            video.display(),
            asset.width,
            asset.height,
            asset.fps,
            directory.display()
        );
        if asset.rotation != 0 {
            debug!("{} is rotated {} degrees; frames are decoded upright", video.display(), asset.rotation);
        }

        let args: Vec<String> = vec![
            "-v".into(),
            "error".into(),
            "-i".into(),
            video.display().to_string(),
            "-vsync".into(),
            "passthrough".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "rgb24".into(),
            // the reader slices the pipe at exactly this size
            "-s".into(),
            format!("{}x{}", asset.width, asset.height),
            "-".into(),
        ];
        let command = command_line(self.tool.ffmpeg(), &args);
        debug!("Running {}", command);

        let failure = |diagnostic: String| MediaError::ExternalToolFailure {
            command: command.clone(),
            diagnostic,
        };

        let mut child = self
            .tool
            .ffmpeg_command()
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| failure(e.to_string()))?;

        let stdout = child.stdout.take().ok_or_else(|| failure("no stdout pipe".to_string()))?;
        let mut stderr = child.stderr.take().ok_or_else(|| failure("no stderr pipe".to_string()))?;
        let stderr_drain = thread::spawn(move || {
            let mut collected = Vec::new();
            let _ = stderr.read_to_end(&mut collected);
            collected
        });

        let expected = (asset.duration * asset.fps).round() as u64;
        let bar = progress::progress_bar(Some(expected), "extracting frames");
        let frames = RawFrameReader::new(BufReader::new(stdout), asset.width, asset.height)
            .inspect(|_| bar.inc(1));
        let written = write_frames(frames, &directory, prefix, self.overwrite);
        bar.finish_and_clear();

        if written.is_err() {
            let _ = child.kill();
        }
        let status = child.wait()?;
        let diagnostic = diagnostic_tail(&stderr_drain.join().unwrap_or_default());

        let frame_count = written?;
        if !status.success() {
            warn!("ffmpeg stopped after {} frames", frame_count);
            return Err(failure(diagnostic).into());
        }

        info!("Extracted {} frames at {:.2} fps", frame_count, asset.fps);
        Ok(ExtractionReport {
            directory,
            fps: asset.fps,
            frame_count,
        })
    }
}
