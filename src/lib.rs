//! # frame-studio
//!
//! Extract, annotate, stitch and re-assemble video frames and images.
//!
//! Video decoding, encoding and filter graphs run in an external `ffmpeg`
//! process; drawing, text and compositing happen in-process on RGB frames.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use frame_studio::{
//!     config::Config,
//!     engine::EditorEngine,
//!     video::{CompositionPlan, StitchSource},
//! };
//! use std::path::Path;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let engine = EditorEngine::new(Config::default())?;
//!
//! let plan = CompositionPlan::new(vec![
//!     StitchSource::with_subtitle("before.mp4", "Before"),
//!     StitchSource::with_subtitle("after.mp4", "After"),
//! ])
//! .with_slow_factor(2.0)
//! .with_timers(true);
//!
//! engine.stitch_videos(&plan, Path::new("comparison.mp4")).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`files`] - Directory listing and collision-free output paths
//! - [`imaging`] - Raster primitives, best-fit text, stitching, QR codes
//! - [`video`] - Frame extraction, sequence assembly, side-by-side stitching
//! - [`edits`] - Named image edits applied in batch
//! - [`sequence`] - Renaming, keyframes, annotation, pairs and label sheets
//! - [`engine`] - One entry point per workflow
//! - [`config`] - Configuration management
//!
//! ## Custom Edits
//!
//! Batch edits implement the [`ImageEdit`](edits::ImageEdit) trait and are
//! registered by name:
//!
//! ```rust,no_run
//! use frame_studio::edits::{EditConfig, EditContext, EditRegistry, ImageEdit};
//! use frame_studio::video::types::Frame;
//! use frame_studio::Result;
//!
//! struct Threshold;
//!
//! impl ImageEdit for Threshold {
//!     fn name(&self) -> &str {
//!         "threshold"
//!     }
//!
//!     fn description(&self) -> &str {
//!         "Black or white per pixel"
//!     }
//!
//!     fn apply(&self, frame: &mut Frame, _context: &EditContext<'_>, _config: &EditConfig) -> Result<()> {
//!         for pixel in frame.as_image_mut().pixels_mut() {
//!             let level = if pixel.0.iter().map(|&c| c as u32).sum::<u32>() > 384 { 255 } else { 0 };
//!             pixel.0 = [level; 3];
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let mut registry = EditRegistry::new();
//! registry.register("threshold", || Box::new(Threshold));
//! ```

pub mod config;
pub mod edits;
pub mod engine;
pub mod error;
pub mod files;
pub mod imaging;
pub mod progress;
pub mod sequence;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    config::Config,
    edits::{EditRegistry, ImageEdit},
    engine::EditorEngine,
    error::{EditorError, Result},
};
