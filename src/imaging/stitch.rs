use std::path::PathBuf;

use image::imageops;
use tracing::debug;

use crate::error::{MediaError, Result};
use crate::files;
use crate::imaging::primitives::{self, WHITE};
use crate::imaging::text::TextPainter;
use crate::video::types::Frame;

/// One column of a side-by-side image
#[derive(Debug, Clone)]
pub struct StitchItem {
    pub frame: Frame,
    pub subtitle: Option<String>,
}

impl StitchItem {
    pub fn new(frame: Frame) -> Self {
        Self { frame, subtitle: None }
    }

    pub fn with_subtitle<S: Into<String>>(frame: Frame, subtitle: S) -> Self {
        Self {
            frame,
            subtitle: Some(subtitle.into()),
        }
    }
}

/// Place images left to right on one canvas.
///
/// The first image fixes the height; the others are scaled to it keeping their
/// aspect ratio. Items carrying a subtitle get a subtitle bar before being
/// placed, which needs a `painter`.
pub fn stitch_side_by_side(
    items: &[StitchItem],
    painter: Option<&TextPainter>,
    subtitle_fraction: f32,
) -> Result<Frame> {
    let first = items.first().ok_or_else(|| MediaError::InvalidParameters {
        details: "nothing to stitch".to_string(),
    })?;
    let height = first.frame.height();

    let mut columns = Vec::with_capacity(items.len());
    for item in items {
        let mut column = if item.frame.height() == height {
            item.frame.clone()
        } else {
            primitives::resize_to_height(&item.frame, height)?
        };

        if let (Some(subtitle), Some(painter)) = (&item.subtitle, painter) {
            painter.subtitle(&mut column, subtitle, WHITE, subtitle_fraction)?;
        }
        columns.push(column);
    }

    let width: u32 = columns.iter().map(Frame::width).sum();
    let mut canvas = primitives::blank(width, height);
    let mut x_offset = 0i64;
    for column in &columns {
        imageops::overlay(canvas.as_image_mut(), column.as_image(), x_offset, 0);
        x_offset += column.width() as i64;
    }

    debug!("Stitched {} images into {}x{}", columns.len(), width, height);
    Ok(canvas)
}

/// Stitch image files, subtitling each with its file stem when a painter is given
pub fn stitch_image_files(paths: &[PathBuf], painter: Option<&TextPainter>, subtitle_fraction: f32) -> Result<Frame> {
    let items = paths
        .iter()
        .map(|path| {
            let frame = Frame::open(path)?;
            Ok(match painter {
                Some(_) => StitchItem::with_subtitle(frame, files::file_stem_string(path)),
                None => StitchItem::new(frame),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    stitch_side_by_side(&items, painter, subtitle_fraction)
}
