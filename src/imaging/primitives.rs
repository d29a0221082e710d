use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FsError, MediaError, Result};
use crate::files;
use crate::video::types::Frame;

pub const WHITE: [u8; 3] = [255, 255, 255];
pub const BLACK: [u8; 3] = [0, 0, 0];

const METERS_PER_INCH: f64 = 0.0254;

/// Which point of a shape a position refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    #[default]
    TopLeft,
    BottomLeft,
    Center,
}

impl Anchor {
    /// Top-left corner of a `width` x `height` box whose anchor point sits at `(x, y)`
    pub fn top_left(self, x: f32, y: f32, width: f32, height: f32) -> (f32, f32) {
        match self {
            Anchor::TopLeft => (x, y),
            Anchor::BottomLeft => (x, y - height),
            Anchor::Center => (x - width / 2.0, y - height / 2.0),
        }
    }
}

/// How a raster is written to disk
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Resolution recorded in PNG files (pHYs chunk)
    pub dpi: Option<u32>,

    /// Replace an existing file instead of picking `<stem>_<n>`
    pub overwrite: bool,
}

/// A white canvas
pub fn blank(width: u32, height: u32) -> Frame {
    Frame::new_filled(width, height, WHITE)
}

/// Write `frame` to `path`, creating parent directories.
///
/// The format follows the extension. Returns the path actually written, which
/// differs from `path` when a file already exists there and overwriting is off.
pub fn save(frame: &Frame, path: &Path, options: &SaveOptions) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            files::create_directory(parent)?;
        }
    }
    let target = files::resolve_output_path(path, options.overwrite)?;

    let is_png = target
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("png"))
        .unwrap_or(false);

    match options.dpi {
        Some(dpi) if is_png => save_png_with_dpi(frame, &target, dpi)?,
        _ => frame.as_image().save(&target)?,
    }

    debug!("Saved {}x{} image to {}", frame.width(), frame.height(), target.display());
    Ok(target)
}

/// Write one frame of a numbered sequence.
///
/// Sequence names carry meaning, so an existing file is never renamed around:
/// it is replaced when `overwrite` is set and reported as a collision otherwise.
pub fn save_sequence_frame(frame: &Frame, path: &Path, overwrite: bool) -> Result<()> {
    if !overwrite && path.exists() {
        return Err(FsError::PathCollision {
            path: path.display().to_string(),
        }.into());
    }
    frame.as_image().save(path)?;
    Ok(())
}

fn save_png_with_dpi(frame: &Frame, path: &Path, dpi: u32) -> Result<()> {
    let pixels_per_meter = (dpi as f64 / METERS_PER_INCH).round() as u32;

    let writer = BufWriter::new(File::create(path)?);
    let mut encoder = png::Encoder::new(writer, frame.width(), frame.height());
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_pixel_dims(Some(png::PixelDimensions {
        xppu: pixels_per_meter,
        yppu: pixels_per_meter,
        unit: png::Unit::Meter,
    }));

    let mut writer = encoder.write_header()?;
    writer.write_image_data(frame.rgb_bytes())?;
    writer.finish()?;
    Ok(())
}

/// Rotate counter-clockwise by a multiple of 90 degrees, expanding the canvas
pub fn rotate(frame: &Frame, degrees: i32) -> Result<Frame> {
    if degrees % 90 != 0 {
        return Err(MediaError::InvalidParameters {
            details: format!("rotation must be a multiple of 90 degrees, got {}", degrees),
        }.into());
    }

    let image = frame.as_image();
    let rotated = match degrees.rem_euclid(360) {
        0 => image.clone(),
        90 => imageops::rotate270(image),
        180 => imageops::rotate180(image),
        _ => imageops::rotate90(image),
    };
    Ok(Frame::new(rotated))
}

pub fn resize(frame: &Frame, width: u32, height: u32) -> Result<Frame> {
    if width == 0 || height == 0 {
        return Err(MediaError::InvalidParameters {
            details: format!("cannot resize to {}x{}", width, height),
        }.into());
    }
    if frame.dimensions() == (width, height) {
        return Ok(frame.clone());
    }
    Ok(Frame::new(imageops::resize(frame.as_image(), width, height, FilterType::Lanczos3)))
}

/// Scale to `height`, keeping the aspect ratio (width truncated, at least 1)
pub fn resize_to_height(frame: &Frame, height: u32) -> Result<Frame> {
    let width = ((height as f64 / frame.height() as f64) * frame.width() as f64) as u32;
    resize(frame, width.max(1), height)
}

pub fn invert(frame: &mut Frame) {
    imageops::invert(frame.as_image_mut());
}

pub fn grayscale(frame: &Frame) -> Frame {
    let gray = imageops::grayscale(frame.as_image());
    Frame::new(image::DynamicImage::ImageLuma8(gray).to_rgb8())
}

/// Copy of the pixel data only.
///
/// Decoded frames never carry EXIF or text chunks, so rebuilding the buffer and
/// saving it drops whatever metadata the source file had.
pub fn strip_metadata(frame: &Frame) -> Frame {
    Frame::from_rgb_bytes(frame.width(), frame.height(), frame.rgb_bytes().to_vec())
        .unwrap_or_else(|| frame.clone())
}

/// Rectangle drawing options
#[derive(Debug, Clone, Copy)]
pub struct RectStyle {
    pub fill: Option<[u8; 3]>,
    pub outline: Option<[u8; 3]>,
    pub outline_width: u32,
}

impl RectStyle {
    pub fn filled(color: [u8; 3]) -> Self {
        Self {
            fill: Some(color),
            outline: None,
            outline_width: 0,
        }
    }

    pub fn outlined(color: [u8; 3], width: u32) -> Self {
        Self {
            fill: None,
            outline: Some(color),
            outline_width: width.max(1),
        }
    }
}

/// Draw a rectangle whose `anchor` point sits at `position`.
///
/// Parts outside the frame are clipped.
pub fn draw_rectangle(
    frame: &mut Frame,
    position: (f32, f32),
    width: u32,
    height: u32,
    anchor: Anchor,
    style: RectStyle,
) {
    if width == 0 || height == 0 {
        return;
    }
    let (x, y) = anchor.top_left(position.0, position.1, width as f32, height as f32);
    let (x, y) = (x.round() as i32, y.round() as i32);
    let canvas = frame.as_image_mut();

    if let Some(fill) = style.fill {
        draw_filled_rect_mut(canvas, Rect::at(x, y).of_size(width, height), image::Rgb(fill));
    }

    if let Some(outline) = style.outline {
        // one hollow rectangle per pixel of line width, growing inwards
        for inset in 0..style.outline_width {
            let w = width.saturating_sub(2 * inset);
            let h = height.saturating_sub(2 * inset);
            if w == 0 || h == 0 {
                break;
            }
            let rect = Rect::at(x + inset as i32, y + inset as i32).of_size(w, h);
            draw_hollow_rect_mut(canvas, rect, image::Rgb(outline));
        }
    }
}

/// Paste `overlay` onto `base` with its `anchor` point at `position`.
///
/// `resizing_factor` scales the overlay first (1.0 keeps it as is).
pub fn paste(
    base: &mut Frame,
    overlay: &Frame,
    position: (f32, f32),
    anchor: Anchor,
    resizing_factor: f32,
) -> Result<()> {
    if !(resizing_factor > 0.0) {
        return Err(MediaError::InvalidParameters {
            details: format!("resizing factor must be positive, got {}", resizing_factor),
        }.into());
    }

    let scaled;
    let overlay = if (resizing_factor - 1.0).abs() > f32::EPSILON {
        let width = ((overlay.width() as f32 * resizing_factor).round() as u32).max(1);
        let height = ((overlay.height() as f32 * resizing_factor).round() as u32).max(1);
        scaled = resize(overlay, width, height)?;
        &scaled
    } else {
        overlay
    };

    let (x, y) = anchor.top_left(
        position.0,
        position.1,
        overlay.width() as f32,
        overlay.height() as f32,
    );
    imageops::overlay(base.as_image_mut(), overlay.as_image(), x.round() as i64, y.round() as i64);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_rotate_quarter_turns() {
        let mut frame = Frame::new_black(4, 2);
        frame.set_pixel(3, 0, WHITE);

        // counter-clockwise: top-right corner ends up top-left
        let rotated = rotate(&frame, 90).unwrap();
        assert_eq!(rotated.dimensions(), (2, 4));
        assert_eq!(rotated.get_pixel(0, 0), WHITE);

        let back = rotate(&rotated, -90).unwrap();
        assert_eq!(back.get_pixel(3, 0), WHITE);

        assert!(rotate(&frame, 45).is_err());
    }

    #[test]
    fn test_invert() {
        let mut frame = Frame::new_filled(2, 2, [10, 200, 0]);
        invert(&mut frame);
        assert_eq!(frame.get_pixel(1, 1), [245, 55, 255]);
    }

    #[test]
    fn test_rectangle_anchors() {
        let mut frame = blank(20, 20);
        draw_rectangle(&mut frame, (10.0, 20.0), 4, 4, Anchor::BottomLeft, RectStyle::filled(BLACK));
        assert_eq!(frame.get_pixel(10, 16), BLACK);
        assert_eq!(frame.get_pixel(13, 19), BLACK);
        assert_eq!(frame.get_pixel(10, 15), WHITE);

        let mut frame = blank(20, 20);
        draw_rectangle(&mut frame, (10.0, 10.0), 4, 4, Anchor::Center, RectStyle::outlined(BLACK, 1));
        assert_eq!(frame.get_pixel(8, 8), BLACK);
        assert_eq!(frame.get_pixel(10, 10), WHITE);
    }

    #[test]
    fn test_paste_with_resizing_factor() {
        let mut base = blank(10, 10);
        let overlay = Frame::new_black(2, 2);
        paste(&mut base, &overlay, (0.0, 10.0), Anchor::BottomLeft, 2.0).unwrap();

        assert_eq!(base.get_pixel(0, 6), BLACK);
        assert_eq!(base.get_pixel(3, 9), BLACK);
        assert_eq!(base.get_pixel(4, 9), WHITE);
        assert_eq!(base.get_pixel(0, 5), WHITE);
    }

    #[test]
    fn test_resize_to_height_keeps_aspect() {
        let frame = Frame::new_black(40, 20);
        let scaled = resize_to_height(&frame, 10).unwrap();
        assert_eq!(scaled.dimensions(), (20, 10));
    }

    #[test]
    fn test_save_records_dpi() {
        let dir = tempdir().unwrap();
        let options = SaveOptions {
            dpi: Some(300),
            overwrite: false,
        };
        let path = save(&blank(8, 8), &dir.path().join("sheet.png"), &options).unwrap();

        let decoder = png::Decoder::new(File::open(&path).unwrap());
        let reader = decoder.read_info().unwrap();
        let dims = reader.info().pixel_dims.unwrap();
        assert_eq!(dims.xppu, 11811);
        assert_eq!(dims.unit, png::Unit::Meter);
    }

    #[test]
    fn test_save_never_overwrites_by_default() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("out.png");
        let first = save(&blank(2, 2), &target, &SaveOptions::default()).unwrap();
        let second = save(&Frame::new_black(2, 2), &target, &SaveOptions::default()).unwrap();

        assert_ne!(first, second);
        assert_eq!(Frame::open(&first).unwrap().get_pixel(0, 0), WHITE);
        assert_eq!(Frame::open(&second).unwrap().get_pixel(0, 0), BLACK);
    }
}
