//! # Imaging
//!
//! In-process raster work on [`Frame`](crate::video::types::Frame)s: drawing,
//! pasting, resizing, best-fit text, side-by-side stitching and QR codes.

pub mod primitives;
pub mod qr;
pub mod stitch;
pub mod text;

pub use primitives::{Anchor, RectStyle, SaveOptions};
pub use stitch::{stitch_image_files, stitch_side_by_side, StitchItem};
pub use text::{best_fit, TextFont, TextLayout, TextMeasure, TextPainter};
