//! # Best-Fit Text
//!
//! Font sizes are chosen by a bracket search against a [`TextMeasure`]: the
//! height decides the size, the width only ever shrinks it. Drawing goes
//! through [`TextPainter`], which pairs a loaded font with the imaging
//! settings.

use std::path::{Path, PathBuf};

use imageproc::drawing::draw_text_mut;
use rusttype::{point, Font, Scale};
use tracing::debug;

use crate::config::ImagingConfig;
use crate::error::{LayoutError, Result};
use crate::imaging::primitives::{draw_rectangle, Anchor, RectStyle, BLACK};
use crate::video::types::Frame;

/// Upper bound of the size search
pub const MAX_FONT_SIZE: u32 = 4096;

/// Fonts tried, in order, when no font is configured
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Rendered extent of a piece of text
pub trait TextMeasure {
    /// `(width, height)` in pixels of `text` drawn at `font_size`
    fn measure(&self, text: &str, font_size: u32) -> (u32, u32);
}

/// Result of a best-fit search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextLayout {
    pub font_size: u32,
    pub width: u32,
    pub height: u32,
}

/// Largest size whose `metric` stays within `bound`, searched from `start`.
///
/// Shrinks one step at a time while the metric is at or above the bound, then
/// grows while the next size still fits.
fn bracket_search(metric: impl Fn(u32) -> u32, bound: f32, start: u32) -> Option<u32> {
    let fits = |size: u32| metric(size) as f32 <= bound;

    let mut size = start.clamp(1, MAX_FONT_SIZE);
    while size > 1 && metric(size) as f32 >= bound {
        size -= 1;
    }
    if !fits(size) {
        return None;
    }
    while size < MAX_FONT_SIZE && fits(size + 1) {
        size += 1;
    }
    Some(size)
}

/// Choose the font size for `text` inside a `max_width` x `max_height` box.
pub fn best_fit<M: TextMeasure + ?Sized>(
    measure: &M,
    text: &str,
    max_width: f32,
    max_height: f32,
    initial_size: u32,
) -> Result<TextLayout> {
    let out_of_bounds = || LayoutError::InvalidLayoutBounds {
        text: text.to_string(),
        max_width,
        max_height,
    };

    if text.trim().is_empty() || !(max_width > 0.0) || !(max_height > 0.0) {
        return Err(out_of_bounds().into());
    }

    let by_height = bracket_search(|size| measure.measure(text, size).1, max_height, initial_size)
        .ok_or_else(out_of_bounds)?;

    let (width, _) = measure.measure(text, by_height);
    let font_size = if width as f32 > max_width {
        bracket_search(|size| measure.measure(text, size).0, max_width, by_height)
            .ok_or_else(out_of_bounds)?
            .min(by_height)
    } else {
        by_height
    };

    let (width, height) = measure.measure(text, font_size);
    Ok(TextLayout {
        font_size,
        width,
        height,
    })
}

/// A TrueType font loaded into memory
pub struct TextFont {
    font: Font<'static>,
    path: PathBuf,
}

impl std::fmt::Debug for TextFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextFont").field("path", &self.path).finish()
    }
}

impl TextFont {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| LayoutError::FontUnavailable {
            details: format!("{}: {}", path.display(), e),
        })?;
        let font = Font::try_from_vec(data).ok_or_else(|| LayoutError::FontUnavailable {
            details: format!("{} is not a TrueType font", path.display()),
        })?;

        debug!("Loaded font {}", path.display());
        Ok(Self {
            font,
            path: path.to_path_buf(),
        })
    }

    /// The configured font, or the first well-known system font found
    pub fn locate(configured: Option<&Path>) -> Result<Self> {
        if let Some(path) = configured {
            return Self::load(path);
        }

        let found = SYSTEM_FONT_CANDIDATES
            .iter()
            .map(Path::new)
            .find(|path| path.is_file());
        match found {
            Some(path) => Self::load(path),
            None => Err(LayoutError::FontUnavailable {
                details: "no font configured and no system font found".to_string(),
            }.into()),
        }
    }

    /// File the font was read from; handed to ffmpeg's drawtext
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn font(&self) -> &Font<'static> {
        &self.font
    }

    fn line_width(&self, line: &str, scale: Scale) -> f32 {
        self.font
            .layout(line, scale, point(0.0, 0.0))
            .last()
            .map(|glyph| glyph.position().x + glyph.unpositioned().h_metrics().advance_width)
            .unwrap_or(0.0)
    }

    /// (line height, distance between baselines)
    fn line_metrics(&self, scale: Scale) -> (f32, f32) {
        let v = self.font.v_metrics(scale);
        let height = v.ascent - v.descent;
        (height, height + v.line_gap)
    }
}

impl TextMeasure for TextFont {
    fn measure(&self, text: &str, font_size: u32) -> (u32, u32) {
        let scale = Scale::uniform(font_size as f32);
        let lines: Vec<&str> = text.lines().collect();
        if lines.is_empty() {
            return (0, 0);
        }

        let width = lines
            .iter()
            .map(|line| self.line_width(line, scale))
            .fold(0.0_f32, f32::max);
        let (line_height, line_step) = self.line_metrics(scale);
        let height = line_height + line_step * (lines.len() - 1) as f32;

        (width.ceil() as u32, height.ceil() as u32)
    }
}

/// Draws best-fit text with the configured sizing rules
#[derive(Debug)]
pub struct TextPainter {
    font: TextFont,
    initial_font_size: u32,
    fill_fraction: f32,
}

impl TextPainter {
    pub fn new(font: TextFont, config: &ImagingConfig) -> Self {
        Self {
            font,
            initial_font_size: config.initial_font_size,
            fill_fraction: config.text_fill_fraction,
        }
    }

    pub fn font(&self) -> &TextFont {
        &self.font
    }

    /// Share of a box the text may occupy
    pub fn fill_fraction(&self) -> f32 {
        self.fill_fraction
    }

    pub fn initial_font_size(&self) -> u32 {
        self.initial_font_size
    }

    pub fn fit(&self, text: &str, max_width: f32, max_height: f32) -> Result<TextLayout> {
        best_fit(&self.font, text, max_width, max_height, self.initial_font_size)
    }

    /// Draw `text` at a fixed size with its top-left corner at `(x, y)`
    pub fn draw_at(&self, frame: &mut Frame, text: &str, x: i32, y: i32, font_size: u32, color: [u8; 3]) {
        let scale = Scale::uniform(font_size as f32);
        let (_, line_step) = self.font.line_metrics(scale);
        for (i, line) in text.lines().enumerate() {
            let line_y = y + (line_step * i as f32).round() as i32;
            draw_text_mut(frame.as_image_mut(), image::Rgb(color), x, line_y, scale, self.font.font(), line);
        }
    }

    /// Fit `text` into `max_width` x `max_height` and draw it with its
    /// `anchor` point at `position`
    #[allow(clippy::too_many_arguments)]
    pub fn draw_fitted(
        &self,
        frame: &mut Frame,
        text: &str,
        position: (f32, f32),
        max_width: f32,
        max_height: f32,
        color: [u8; 3],
        anchor: Anchor,
    ) -> Result<TextLayout> {
        let layout = self.fit(text, max_width, max_height)?;
        let (x, y) = anchor.top_left(position.0, position.1, layout.width as f32, layout.height as f32);
        self.draw_at(frame, text, x.round() as i32, y.round() as i32, layout.font_size, color);
        Ok(layout)
    }

    /// Black box of `box_width` x `box_height` with best-fit text inside.
    ///
    /// The text sits one percent of the box size in from the box's top-left
    /// corner and fills at most `fill_fraction` of it.
    #[allow(clippy::too_many_arguments)]
    pub fn text_box(
        &self,
        frame: &mut Frame,
        text: &str,
        position: (f32, f32),
        box_width: u32,
        box_height: u32,
        color: [u8; 3],
        anchor: Anchor,
    ) -> Result<TextLayout> {
        draw_rectangle(frame, position, box_width, box_height, anchor, RectStyle::filled(BLACK));

        let (left, top) = anchor.top_left(position.0, position.1, box_width as f32, box_height as f32);
        let quiet_x = box_width as f32 * 0.01;
        let quiet_y = box_height as f32 * 0.01;
        self.draw_fitted(
            frame,
            text,
            (left + quiet_x, top + quiet_y),
            box_width as f32 * self.fill_fraction,
            box_height as f32 * self.fill_fraction,
            color,
            Anchor::TopLeft,
        )
    }

    /// Black bar across the bottom `height_fraction` of the frame with `text`
    /// centered in it
    pub fn subtitle(&self, frame: &mut Frame, text: &str, color: [u8; 3], height_fraction: f32) -> Result<TextLayout> {
        let (width, height) = frame.dimensions();
        let bar_height = ((height as f32 * height_fraction).round() as u32).max(1);

        draw_rectangle(
            frame,
            (0.0, height as f32),
            width,
            bar_height,
            Anchor::BottomLeft,
            RectStyle::filled(BLACK),
        );

        let center = (width as f32 / 2.0, height as f32 - bar_height as f32 / 2.0);
        self.draw_fitted(
            frame,
            text,
            center,
            width as f32 * self.fill_fraction,
            bar_height as f32 * self.fill_fraction,
            color,
            Anchor::Center,
        )
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Width grows by half the size per character, height by 1.2x the size per line
    pub(crate) struct LinearMeasure;

    impl TextMeasure for LinearMeasure {
        fn measure(&self, text: &str, font_size: u32) -> (u32, u32) {
            let longest = text.lines().map(|l| l.chars().count()).max().unwrap_or(0) as u32;
            let lines = text.lines().count().max(1) as u32;
            let width = (longest * font_size + 1) / 2;
            let height = (lines * font_size * 6 + 4) / 5;
            (width, height)
        }
    }

    pub(crate) fn system_font() -> Option<TextFont> {
        TextFont::locate(None).ok()
    }

    fn brute_force(text: &str, max_width: f32, max_height: f32) -> Option<u32> {
        (1..=MAX_FONT_SIZE).rev().find(|&size| {
            let (w, h) = LinearMeasure.measure(text, size);
            w as f32 <= max_width && h as f32 <= max_height
        })
    }

    #[test]
    fn test_height_bound_decides() {
        let layout = best_fit(&LinearMeasure, "abcd", 1000.0, 60.0, 100).unwrap();
        assert_eq!(layout.font_size, 50);
        assert_eq!(layout.height, 60);
        assert_eq!(layout.width, 100);
    }

    #[test]
    fn test_width_clamps_size() {
        let layout = best_fit(&LinearMeasure, "abcd", 40.0, 60.0, 100).unwrap();
        assert_eq!(layout.font_size, 20);
        assert!(layout.width as f32 <= 40.0);
    }

    #[test]
    fn test_grows_past_initial_size() {
        let layout = best_fit(&LinearMeasure, "a", 10_000.0, 600.0, 100).unwrap();
        assert_eq!(layout.font_size, 500);
    }

    #[test]
    fn test_matches_brute_force_optimum() {
        let cases = [
            ("Frame 12", 200.0, 30.0),
            ("12:00:01", 55.5, 90.0),
            ("two\nlines", 300.0, 47.0),
            ("x", 3.0, 3.0),
            ("wide label text", 120.0, 400.0),
        ];
        for (text, max_w, max_h) in cases {
            let layout = best_fit(&LinearMeasure, text, max_w, max_h, 100).unwrap();
            assert_eq!(Some(layout.font_size), brute_force(text, max_w, max_h), "{}", text);
            assert!(layout.width as f32 <= max_w && layout.height as f32 <= max_h);
        }
    }

    #[test]
    fn test_invalid_bounds() {
        assert!(best_fit(&LinearMeasure, "", 100.0, 100.0, 100).is_err());
        assert!(best_fit(&LinearMeasure, "a", 0.0, 100.0, 100).is_err());
        assert!(best_fit(&LinearMeasure, "a", 100.0, -1.0, 100).is_err());
        // size 1 is already 2 px tall
        let err = best_fit(&LinearMeasure, "a", 100.0, 1.0, 100).unwrap_err();
        assert!(matches!(
            err,
            crate::EditorError::Layout(LayoutError::InvalidLayoutBounds { .. })
        ));
    }

    #[test]
    fn test_font_measure_fits_bounds() {
        let Some(font) = system_font() else {
            eprintln!("no system font, skipping");
            return;
        };
        let layout = best_fit(&font, "00:00:01.50", 300.0, 40.0, 100).unwrap();
        assert!(layout.width <= 300 && layout.height <= 40);
        let (_, taller) = font.measure("00:00:01.50", layout.font_size + 1);
        let (wider, _) = font.measure("00:00:01.50", layout.font_size + 1);
        assert!(taller > 40 || wider > 300);
    }

    #[test]
    fn test_subtitle_draws_inside_bar() {
        let Some(font) = system_font() else {
            eprintln!("no system font, skipping");
            return;
        };
        let painter = TextPainter::new(font, &ImagingConfig::default());
        let mut frame = Frame::new_filled(200, 100, [255, 255, 255]);
        let layout = painter.subtitle(&mut frame, "clip", [255, 255, 255], 0.1).unwrap();

        assert!(layout.height <= 8);
        // bar covers the bottom 10 rows, the rest is untouched
        assert_eq!(frame.get_pixel(0, 95), BLACK);
        assert_eq!(frame.get_pixel(0, 85), [255, 255, 255]);
    }
}
