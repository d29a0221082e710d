use crate::{
    edits::traits::{EditConfig, EditContext, ImageEdit},
    error::{EditError, Result},
    files,
    imaging::primitives::{self, WHITE},
    video::types::Frame,
};

pub const DEGREES: &str = "degrees";
pub const WIDTH: &str = "width";
pub const HEIGHT: &str = "height";
pub const SCALE: &str = "scale";
pub const TEXT: &str = "text";

fn invalid(edit: &str, details: impl Into<String>) -> crate::error::EditorError {
    EditError::InvalidParameters {
        edit: edit.to_string(),
        details: details.into(),
    }
    .into()
}

/// Counter-clockwise rotation by a multiple of 90 degrees
pub struct RotateEdit;

impl ImageEdit for RotateEdit {
    fn name(&self) -> &str {
        "rotate"
    }

    fn description(&self) -> &str {
        "Rotate counter-clockwise by a multiple of 90 degrees, expanding the canvas"
    }

    fn apply(&self, frame: &mut Frame, _context: &EditContext<'_>, config: &EditConfig) -> Result<()> {
        *frame = primitives::rotate(frame, config.get_i32_or(DEGREES, 90))?;
        Ok(())
    }

    fn validate_config(&self, config: &EditConfig) -> Result<()> {
        match config.get_i32(DEGREES) {
            None if config.contains(DEGREES) => Err(invalid(self.name(), "degrees must be an integer")),
            Some(degrees) if degrees % 90 != 0 => Err(invalid(
                self.name(),
                format!("degrees must be a multiple of 90, got {}", degrees),
            )),
            _ => Ok(()),
        }
    }

    fn parameters(&self) -> Vec<(&'static str, &'static str)> {
        vec![(DEGREES, "Multiple of 90 (default 90)")]
    }
}

pub struct InvertEdit;

impl ImageEdit for InvertEdit {
    fn name(&self) -> &str {
        "invert"
    }

    fn description(&self) -> &str {
        "Invert every color channel"
    }

    fn apply(&self, frame: &mut Frame, _context: &EditContext<'_>, _config: &EditConfig) -> Result<()> {
        primitives::invert(frame);
        Ok(())
    }
}

pub struct StripMetadataEdit;

impl ImageEdit for StripMetadataEdit {
    fn name(&self) -> &str {
        "strip-metadata"
    }

    fn description(&self) -> &str {
        "Drop EXIF and other metadata, keeping only pixels"
    }

    fn apply(&self, frame: &mut Frame, _context: &EditContext<'_>, _config: &EditConfig) -> Result<()> {
        *frame = primitives::strip_metadata(frame);
        Ok(())
    }
}

/// Resize to an exact size, to a width or height keeping the aspect ratio, or by a factor
pub struct ResizeEdit;

impl ResizeEdit {
    fn target_size(frame: &Frame, config: &EditConfig) -> Option<(u32, u32)> {
        let (w, h) = (frame.width() as f32, frame.height() as f32);
        let width = config.get_i32(WIDTH).filter(|v| *v > 0).map(|v| v as f32);
        let height = config.get_i32(HEIGHT).filter(|v| *v > 0).map(|v| v as f32);
        let scale = config.get_f32(SCALE).filter(|v| *v > 0.0);

        let (tw, th) = match (width, height, scale) {
            (Some(tw), Some(th), _) => (tw, th),
            (Some(tw), None, _) => (tw, h * tw / w),
            (None, Some(th), _) => (w * th / h, th),
            (None, None, Some(s)) => (w * s, h * s),
            (None, None, None) => return None,
        };
        Some(((tw.round() as u32).max(1), (th.round() as u32).max(1)))
    }
}

impl ImageEdit for ResizeEdit {
    fn name(&self) -> &str {
        "resize"
    }

    fn description(&self) -> &str {
        "Resize to width/height (aspect kept when only one is given) or by a scale factor"
    }

    fn apply(&self, frame: &mut Frame, _context: &EditContext<'_>, config: &EditConfig) -> Result<()> {
        let (width, height) = Self::target_size(frame, config)
            .ok_or_else(|| invalid(self.name(), "give width, height or scale"))?;
        *frame = primitives::resize(frame, width, height)?;
        Ok(())
    }

    fn validate_config(&self, config: &EditConfig) -> Result<()> {
        let positive_int = |key: &str| config.get_i32(key).map(|v| v > 0);
        let valid = match (positive_int(WIDTH), positive_int(HEIGHT), config.get_f32(SCALE)) {
            (Some(false), _, _) | (_, Some(false), _) => false,
            (Some(true), _, _) | (_, Some(true), _) => true,
            (None, None, Some(scale)) => scale > 0.0,
            (None, None, None) => false,
        };
        if valid {
            Ok(())
        } else {
            Err(invalid(self.name(), "give a positive width, height or scale"))
        }
    }

    fn parameters(&self) -> Vec<(&'static str, &'static str)> {
        vec![
            (WIDTH, "Target width in pixels"),
            (HEIGHT, "Target height in pixels"),
            (SCALE, "Scale factor, used when neither width nor height is given"),
        ]
    }
}

/// Subtitle bar with the file stem, or a fixed text
pub struct SubtitleEdit;

impl ImageEdit for SubtitleEdit {
    fn name(&self) -> &str {
        "subtitle"
    }

    fn description(&self) -> &str {
        "Black bar at the bottom with the file name (or `text`) in white"
    }

    fn apply(&self, frame: &mut Frame, context: &EditContext<'_>, config: &EditConfig) -> Result<()> {
        let painter = context
            .painter
            .ok_or_else(|| invalid(self.name(), "no font available"))?;
        let text = match config.get_string(TEXT) {
            Some(text) => text.to_string(),
            None => files::file_stem_string(context.source),
        };
        painter.subtitle(frame, &text, WHITE, context.subtitle_fraction)?;
        Ok(())
    }

    fn parameters(&self) -> Vec<(&'static str, &'static str)> {
        vec![(TEXT, "Subtitle text (default: file stem)")]
    }
}

pub struct GrayscaleEdit;

impl ImageEdit for GrayscaleEdit {
    fn name(&self) -> &str {
        "grayscale"
    }

    fn description(&self) -> &str {
        "Convert to grayscale"
    }

    fn apply(&self, frame: &mut Frame, _context: &EditContext<'_>, _config: &EditConfig) -> Result<()> {
        *frame = primitives::grayscale(frame);
        Ok(())
    }
}
