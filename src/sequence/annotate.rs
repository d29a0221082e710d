use std::path::Path;

use tracing::info;

use crate::config::ImagingConfig;
use crate::error::{MediaError, Result};
use crate::files;
use crate::imaging::primitives::{self, Anchor, WHITE};
use crate::imaging::text::TextPainter;
use crate::progress::progress_bar;
use crate::sequence::keyframes::KeyframeMap;
use crate::video::types::{frame_file_name, Frame};

/// What gets written on one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameInfo {
    /// Position in the sequence, from 0
    pub index: usize,

    /// Title of the active keyframe
    pub title: Option<String>,

    /// Frames since the active keyframe started, from 0
    pub counter: usize,
}

impl FrameInfo {
    /// The info block text, one item per line
    pub fn text(&self, fps: f64) -> String {
        let elapsed = self.counter as f64 / fps;
        let total = self.index as f64 / fps;
        match &self.title {
            Some(title) => format!(
                "{}...\nFrame #{}\n{:.3} seconds\nTotal: {:.3} seconds",
                title,
                self.counter + 1,
                elapsed,
                total
            ),
            None => format!("Frame #{}\n{:.3} seconds", self.index + 1, total),
        }
    }
}

/// Title and counter for each of `count` frames.
///
/// The counter restarts at every keyframe; frames before the first keyframe
/// have no title and count from the start of the sequence.
pub fn plan_annotations(count: usize, keyframes: &KeyframeMap) -> Vec<FrameInfo> {
    (0..count)
        .map(|index| match keyframes.active(index) {
            Some((start, title)) => FrameInfo {
                index,
                title: Some(title.to_string()),
                counter: index - start,
            },
            None => FrameInfo {
                index,
                title: None,
                counter: index,
            },
        })
        .collect()
}

/// Writes a frame-info box in the top-left corner of every frame
pub struct FrameAnnotator<'a> {
    painter: &'a TextPainter,
    box_width_fraction: f32,
    box_height_fraction: f32,
    resize: Option<(u32, u32)>,
    overwrite: bool,
}

impl<'a> FrameAnnotator<'a> {
    pub fn new(painter: &'a TextPainter, config: &ImagingConfig) -> Self {
        Self {
            painter,
            box_width_fraction: config.info_box_width_fraction,
            box_height_fraction: config.info_box_height_fraction,
            resize: None,
            overwrite: false,
        }
    }

    /// Resize every annotated frame before it is written
    pub fn with_resize(mut self, resize: Option<(u32, u32)>) -> Self {
        self.resize = resize;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Draw the info box for `info` onto `frame`
    pub fn annotate(&self, frame: &mut Frame, info: &FrameInfo, fps: f64) -> Result<()> {
        let box_width = ((frame.width() as f32 * self.box_width_fraction).round() as u32).max(1);
        let box_height = ((frame.height() as f32 * self.box_height_fraction).round() as u32).max(1);
        self.painter
            .text_box(frame, &info.text(fps), (0.0, 0.0), box_width, box_height, WHITE, Anchor::TopLeft)?;
        Ok(())
    }

    /// Annotate every PNG of `source_dir` into `target_dir` as `<index:08>.png`.
    ///
    /// Returns the number of frames written.
    pub fn annotate_directory(
        &self,
        source_dir: &Path,
        target_dir: &Path,
        keyframes: &KeyframeMap,
        fps: f64,
    ) -> Result<usize> {
        if !(fps > 0.0) {
            return Err(MediaError::InvalidParameters {
                details: format!("frame rate must be positive, got {}", fps),
            }.into());
        }
        let frames = files::list_pngs(source_dir)?;
        if frames.is_empty() {
            return Err(MediaError::EmptySequence {
                path: source_dir.display().to_string(),
            }.into());
        }
        files::create_directory(target_dir)?;

        info!(
            "Annotating {} frames from {} at {} fps ({} keyframes)",
            frames.len(),
            source_dir.display(),
            fps,
            keyframes.len()
        );

        let plan = plan_annotations(frames.len(), keyframes);
        let bar = progress_bar(Some(frames.len() as u64), "annotating");
        for (path, info) in frames.iter().zip(&plan) {
            let mut frame = Frame::open(path)?;
            self.annotate(&mut frame, info, fps)?;
            if let Some((width, height)) = self.resize {
                frame = primitives::resize(&frame, width, height)?;
            }
            primitives::save_sequence_frame(&frame, &target_dir.join(frame_file_name("", info.index)), self.overwrite)?;
            bar.inc(1);
        }
        bar.finish_and_clear();

        Ok(plan.len())
    }
}
