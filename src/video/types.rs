use std::path::{Path, PathBuf};

use image::{ImageBuffer, Rgb, RgbImage};

use crate::error::{MediaError, Result};
use crate::files;

/// Represents a single decoded frame or still image
///
/// This is a simple wrapper around an RGB image buffer. Everything that draws
/// on, stitches or encodes pixels goes through it.
#[derive(Clone, Debug)]
pub struct Frame {
    buffer: RgbImage,
}

impl Frame {
    /// Create a new frame from an RGB image buffer
    pub fn new(buffer: RgbImage) -> Self {
        Self { buffer }
    }

    /// Create a new frame with the given dimensions filled with black
    pub fn new_black(width: u32, height: u32) -> Self {
        let buffer = ImageBuffer::new(width, height);
        Self { buffer }
    }

    /// Create a new frame with the given dimensions filled with the specified color
    pub fn new_filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        let buffer = ImageBuffer::from_pixel(width, height, Rgb(color));
        Self { buffer }
    }

    /// Decode an image file into a frame
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MediaError::SourceNotFound {
                path: path.display().to_string(),
            }.into());
        }
        let image = image::open(path)?;
        let rgb_image = match image {
            image::DynamicImage::ImageRgb8(img) => img,
            other => other.to_rgb8(),
        };
        Ok(Self::new(rgb_image))
    }

    /// Get the width of the frame
    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    /// Get the height of the frame
    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    /// (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    /// Get a pixel at the given coordinates (returns RGB array)
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.buffer.get_pixel(x, y).0
    }

    /// Set a pixel at the given coordinates
    pub fn set_pixel(&mut self, x: u32, y: u32, color: [u8; 3]) {
        self.buffer.put_pixel(x, y, Rgb(color));
    }

    /// Get the underlying image buffer
    pub fn as_image(&self) -> &RgbImage {
        &self.buffer
    }

    /// Get a mutable reference to the underlying image buffer
    pub fn as_image_mut(&mut self) -> &mut RgbImage {
        &mut self.buffer
    }

    /// Take the underlying image buffer
    pub fn into_image(self) -> RgbImage {
        self.buffer
    }

    /// Raw packed RGB bytes, row-major
    pub fn rgb_bytes(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    /// Create a frame from raw RGB bytes
    pub fn from_rgb_bytes(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        ImageBuffer::from_raw(width, height, data)
            .map(|buffer| Self { buffer })
    }
}

/// A video file plus the metadata probed from it
#[derive(Debug, Clone, PartialEq)]
pub struct VideoAsset {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Duration in seconds
    pub duration: f64,
    pub has_audio: bool,
    /// Display rotation in degrees, clockwise. ffmpeg applies it while
    /// decoding, so `width` and `height` are already the rotated size.
    pub rotation: u32,
}

impl VideoAsset {
    /// File stem, used as the default subtitle
    pub fn name(&self) -> String {
        files::file_stem_string(&self.path)
    }
}

/// Encoder settings for one output video
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeParams {
    /// Output frame rate
    pub fps: f64,

    /// ffmpeg video encoder
    pub codec: String,

    /// Constant rate factor
    pub crf: u8,
}

impl EncodeParams {
    pub fn from_config(config: &crate::config::VideoConfig, fps: f64) -> Self {
        Self {
            fps,
            codec: config.codec.clone(),
            crf: config.crf,
        }
    }
}

/// Represents an encoded video output
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedVideo {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub duration: f64,
    pub frame_count: usize,
    pub file_size: u64,
}

impl EncodedVideo {
    /// Report for a finished file; the size is read from disk when it exists
    pub fn new(path: PathBuf, width: u32, height: u32, duration: f64, frame_count: usize) -> Self {
        let file_size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        Self {
            path,
            width,
            height,
            duration,
            frame_count,
            file_size,
        }
    }
}

/// An ordered, gap-free set of frame images in one directory
#[derive(Debug, Clone)]
pub struct FrameSequence {
    directory: PathBuf,
    frames: Vec<PathBuf>,
    detected_fps: Option<f64>,
}

impl FrameSequence {
    /// Collect the PNG frames of a directory in file-name order
    pub fn from_directory<P: AsRef<Path>>(directory: P) -> Result<Self> {
        let directory = directory.as_ref();
        let frames = files::list_pngs(directory)?;
        if frames.is_empty() {
            return Err(MediaError::EmptySequence {
                path: directory.display().to_string(),
            }.into());
        }

        let detected_fps = directory
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(parse_fps_suffix);

        Ok(Self {
            directory: directory.to_path_buf(),
            frames,
            detected_fps,
        })
    }

    /// Build a sequence from an explicit list of frame files
    pub fn from_frames(directory: PathBuf, frames: Vec<PathBuf>) -> Self {
        Self {
            directory,
            frames,
            detected_fps: None,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Get all frames in sequence order
    pub fn frames(&self) -> &[PathBuf] {
        &self.frames
    }

    /// Get the total number of frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Check if the sequence is empty
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame rate recorded in the directory name (`…_30FPS`), if any
    pub fn detected_fps(&self) -> Option<f64> {
        self.detected_fps
    }

    /// Get frames as an iterator
    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.frames.iter()
    }
}

/// `30` for whole rates, `29.97` otherwise
pub fn format_fps(fps: f64) -> String {
    if (fps - fps.round()).abs() < 1e-6 {
        format!("{}", fps.round() as i64)
    } else {
        format!("{:.2}", fps)
    }
}

/// Largest gap between a decimal rate and its NTSC rational still read as NTSC
const NTSC_TOLERANCE: f64 = 4.5e-3;

/// `n * 1000 / 1001` when `fps` is a rounded NTSC rate (29.97, 23.976, 59.94)
pub fn ntsc_rate(fps: f64) -> Option<u32> {
    if (fps - fps.round()).abs() < 1e-6 {
        return None;
    }
    let nominal = (fps * 1.001).round();
    (nominal > 0.0 && nominal < 1000.0 && (fps - nominal / 1.001).abs() < NTSC_TOLERANCE).then_some(nominal as u32)
}

/// Frame rate as handed to ffmpeg: `30`, `30000/1001`, or a decimal
pub fn rate_arg(fps: f64) -> String {
    if let Some(nominal) = ntsc_rate(fps) {
        return format!("{}/1001", nominal * 1000);
    }
    if (fps - fps.round()).abs() < 1e-6 {
        return format!("{}", fps.round() as i64);
    }
    let text = format!("{:.6}", fps);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Directory name carrying the source frame rate: `<stem>_<fps>FPS`
pub fn fps_directory_name(stem: &str, fps: f64) -> String {
    format!("{}_{}FPS", stem, format_fps(fps))
}

/// Recover the frame rate from a `<stem>_<fps>FPS` directory name.
///
/// Rounded NTSC rates come back exact, so `29.97` reads as 30000/1001.
pub fn parse_fps_suffix(name: &str) -> Option<f64> {
    let rest = name.strip_suffix("FPS")?;
    let (_, fps) = rest.rsplit_once('_')?;
    let fps = fps.parse::<f64>().ok().filter(|fps| fps.is_finite() && *fps > 0.0)?;
    Some(match ntsc_rate(fps) {
        Some(nominal) => nominal as f64 * 1000.0 / 1001.0,
        None => fps,
    })
}

/// `[<prefix>_]<index:08>.png`
pub fn frame_file_name(prefix: &str, index: usize) -> String {
    if prefix.is_empty() {
        format!("{:08}.png", index)
    } else {
        format!("{}_{:08}.png", prefix, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_frame_bytes_roundtrip() {
        let frame = Frame::new_filled(4, 2, [10, 20, 30]);
        let bytes = frame.rgb_bytes().to_vec();
        assert_eq!(bytes.len(), 4 * 2 * 3);

        let rebuilt = Frame::from_rgb_bytes(4, 2, bytes).unwrap();
        assert_eq!(rebuilt.get_pixel(3, 1), [10, 20, 30]);
        assert!(Frame::from_rgb_bytes(4, 2, vec![0; 5]).is_none());
    }

    #[test]
    fn test_fps_directory_names() {
        assert_eq!(fps_directory_name("clip", 30.0), "clip_30FPS");
        assert_eq!(fps_directory_name("clip", 29.97), "clip_29.97FPS");
        assert_eq!(parse_fps_suffix("clip_30FPS"), Some(30.0));
        assert_eq!(parse_fps_suffix("my_clip_29.97FPS"), Some(30000.0 / 1001.0));
        assert_eq!(parse_fps_suffix("clip_12.5FPS"), Some(12.5));
        assert_eq!(parse_fps_suffix("clip"), None);
        assert_eq!(parse_fps_suffix("clip_xFPS"), None);
        assert_eq!(parse_fps_suffix("clip_infFPS"), None);
        assert_eq!(parse_fps_suffix("clip_NaNFPS"), None);
        assert_eq!(parse_fps_suffix("clip_-5FPS"), None);
    }

    #[test]
    fn test_ntsc_rates_stay_exact() {
        assert_eq!(rate_arg(30.0), "30");
        assert_eq!(rate_arg(30000.0 / 1001.0), "30000/1001");
        assert_eq!(rate_arg(29.97), "30000/1001");
        assert_eq!(rate_arg(23.976), "24000/1001");
        assert_eq!(rate_arg(59.94), "60000/1001");
        assert_eq!(rate_arg(12.5), "12.5");
        assert_eq!(rate_arg(24.98), "24.98");

        // the directory name stays readable, the rate survives the round trip
        let name = fps_directory_name("clip", 30000.0 / 1001.0);
        assert_eq!(name, "clip_29.97FPS");
        assert_eq!(rate_arg(parse_fps_suffix(&name).unwrap()), "30000/1001");
    }

    #[test]
    fn test_frame_file_names() {
        assert_eq!(frame_file_name("", 0), "00000000.png");
        assert_eq!(frame_file_name("left", 42), "left_00000042.png");
    }

    #[test]
    fn test_sequence_from_directory() {
        let root = tempdir().unwrap();
        let dir = root.path().join("walk_25FPS");
        std::fs::create_dir(&dir).unwrap();
        for i in 0..3 {
            Frame::new_black(2, 2).as_image().save(dir.join(frame_file_name("", i))).unwrap();
        }

        let sequence = FrameSequence::from_directory(&dir).unwrap();
        assert_eq!(sequence.len(), 3);
        assert_eq!(sequence.detected_fps(), Some(25.0));
        assert!(sequence.frames()[0].ends_with("00000000.png"));
    }

    #[test]
    fn test_empty_sequence_rejected() {
        let root = tempdir().unwrap();
        let err = FrameSequence::from_directory(root.path()).unwrap_err();
        assert!(matches!(err, crate::EditorError::Media(MediaError::EmptySequence { .. })));
    }
}
